//! Synchronization utilities for robust lock handling
//!
//! Converts lock poisoning into application errors so that a panicking
//! analyzer task cannot take the whole audit run down with it.

use std::sync::{LockResult, RwLockReadGuard, RwLockWriteGuard};

/// Handle poisoned RwLock read operations with consistent error handling
///
/// # Examples
/// ```
/// use std::sync::RwLock;
/// use pageaudit::core::sync::handle_rwlock_read;
///
/// let lock = RwLock::new(42);
/// let guard = handle_rwlock_read(lock.read(), |msg| msg).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_rwlock_read<T, E>(
    result: LockResult<RwLockReadGuard<'_, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'_, T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "read lock poisoned by a panicked writer: {}",
            poison_err
        ))
    })
}

/// Handle poisoned RwLock write operations with consistent error handling
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<'_, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'_, T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "write lock poisoned by a panicked holder: {}",
            poison_err
        ))
    })
}
