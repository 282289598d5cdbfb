//! Audit Context
//!
//! One [`AuditContext`] exists per (page, device) pair for the duration of a
//! plan run. Its [`SharedData`] store lets a producing analyzer hand values
//! to a consuming analyzer of the same context. The store has no schema;
//! producers and consumers agree on key names by convention.
//!
//! The store is never written by two tasks of the same batch: the planner
//! keeps producers and their consumers in different batches, so the lock
//! here only guards against readers observing a partial write.

use crate::audit::error::{AuditError, ContextResult};
use crate::audit::types::{Device, PageConfig};
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::core::validation::validate_page_path;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Conventional key under which analyzers publish their headline metrics
pub const SHARED_METRICS_KEY: &str = "sharedMetrics";

/// Identifies a context by page path and device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey {
    pub page: String,
    pub device: Device,
}

impl ContextKey {
    pub fn new(page: impl Into<String>, device: Device) -> Self {
        Self {
            page: page.into(),
            device,
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.page, self.device)
    }
}

/// Handle to a context's key-value store
///
/// Cloning the handle shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct SharedData {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl SharedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &str) -> ContextResult<Option<Value>> {
        let store = handle_rwlock_read(self.inner.read(), poisoned)?;
        Ok(store.get(key).cloned())
    }

    /// Store `value` under `key`, returning the previous value if any
    pub fn insert(&self, key: impl Into<String>, value: Value) -> ContextResult<Option<Value>> {
        let mut store = handle_rwlock_write(self.inner.write(), poisoned)?;
        Ok(store.insert(key.into(), value))
    }

    pub fn contains(&self, key: &str) -> ContextResult<bool> {
        let store = handle_rwlock_read(self.inner.read(), poisoned)?;
        Ok(store.contains_key(key))
    }

    /// Sorted list of stored keys
    pub fn keys(&self) -> ContextResult<Vec<String>> {
        let store = handle_rwlock_read(self.inner.read(), poisoned)?;
        let mut keys: Vec<String> = store.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    pub fn len(&self) -> ContextResult<usize> {
        let store = handle_rwlock_read(self.inner.read(), poisoned)?;
        Ok(store.len())
    }

    pub fn is_empty(&self) -> ContextResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Point-in-time copy of the whole store
    pub fn snapshot(&self) -> ContextResult<HashMap<String, Value>> {
        let store = handle_rwlock_read(self.inner.read(), poisoned)?;
        Ok(store.clone())
    }

    /// True when both handles refer to the same store
    pub fn same_store(&self, other: &SharedData) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn poisoned(message: String) -> AuditError {
    AuditError::SharedDataPoisoned { message }
}

/// Bookkeeping attached to a context
#[derive(Debug, Clone)]
pub struct ContextMetadata {
    pub created_at: DateTime<Utc>,
    pub entries: HashMap<String, Value>,
}

impl Default for ContextMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            entries: HashMap::new(),
        }
    }
}

/// Execution handle for one (page, device) pair
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub url: String,
    pub device: Device,
    pub page_config: PageConfig,
    pub shared_data: SharedData,
    pub metadata: ContextMetadata,
}

impl AuditContext {
    /// Create a context for `page` under `device`
    ///
    /// The URL is the base URL without its trailing '/' followed by the
    /// normalised page path.
    pub fn new(base_url: &str, page: &PageConfig, device: Device) -> ContextResult<Self> {
        let path = validate_page_path(&page.path).map_err(|reason| AuditError::InvalidPage {
            path: page.path.clone(),
            reason,
        })?;

        let mut page_config = page.clone();
        page_config.path = path.clone();

        Ok(Self {
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            device,
            page_config,
            shared_data: SharedData::new(),
            metadata: ContextMetadata::default(),
        })
    }

    pub fn key(&self) -> ContextKey {
        ContextKey::new(self.page_config.path.clone(), self.device)
    }

    pub fn page_path(&self) -> &str {
        &self.page_config.path
    }

    /// Copy of this context with a fresh, empty shared data store
    ///
    /// Used when data sharing is disabled so that a plugin can neither see
    /// nor leak values through the real store.
    pub fn isolated(&self) -> Self {
        Self {
            shared_data: SharedData::new(),
            ..self.clone()
        }
    }
}

/// All contexts of one plan run, in page-then-device configuration order
#[derive(Debug, Clone, Default)]
pub struct ContextSet {
    contexts: Vec<AuditContext>,
    index: HashMap<ContextKey, usize>,
}

impl ContextSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand page configs into one context per (page, device)
    pub fn from_pages(base_url: &str, pages: &[PageConfig]) -> ContextResult<Self> {
        let mut set = Self::new();
        for page in pages {
            let devices = page.unique_devices();
            if devices.is_empty() {
                return Err(AuditError::InvalidPage {
                    path: page.path.clone(),
                    reason: "at least one device is required".to_string(),
                });
            }
            for device in devices {
                set.insert(AuditContext::new(base_url, page, device)?)?;
            }
        }
        log::debug!(
            "Created {} audit contexts for {} pages",
            set.len(),
            pages.len()
        );
        Ok(set)
    }

    /// Add a context; fails if its key is already present
    pub fn insert(&mut self, context: AuditContext) -> ContextResult<()> {
        let key = context.key();
        if self.index.contains_key(&key) {
            return Err(AuditError::DuplicateContext {
                key: key.to_string(),
            });
        }
        self.index.insert(key, self.contexts.len());
        self.contexts.push(context);
        Ok(())
    }

    pub fn get(&self, key: &ContextKey) -> Option<&AuditContext> {
        self.index.get(key).map(|&i| &self.contexts[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditContext> {
        self.contexts.iter()
    }

    pub fn keys(&self) -> Vec<ContextKey> {
        self.contexts.iter().map(AuditContext::key).collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
