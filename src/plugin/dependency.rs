//! Dependency graph over plugin names
//!
//! Shared by the registry (execution order) and the planner (dependency
//! layers). Nodes keep insertion order, which is the tie-breaker for every
//! ordering produced here.

use std::collections::{HashMap, HashSet};

/// Directed graph where an edge `a -> b` means `a` must run before `b`
#[derive(Debug, Clone, Default)]
pub(crate) struct DependencyGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    /// prerequisites[i] holds the nodes that must precede node i
    prerequisites: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; adding an existing node is a no-op
    pub fn add_node(&mut self, name: &str) {
        if !self.index.contains_key(name) {
            self.index.insert(name.to_string(), self.nodes.len());
            self.nodes.push(name.to_string());
            self.prerequisites.push(Vec::new());
        }
    }

    /// Require `before` to run before `after`; edges to unknown nodes are ignored
    pub fn add_edge(&mut self, before: &str, after: &str) {
        if let (Some(&b), Some(&a)) = (self.index.get(before), self.index.get(after)) {
            if !self.prerequisites[a].contains(&b) {
                self.prerequisites[a].push(b);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Depth-first topological order, prerequisites first
    ///
    /// Returns the members of the first cycle found as the error value, in
    /// traversal order and closed with the repeated node.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();

        for node in 0..self.nodes.len() {
            self.visit(node, &mut order, &mut visited, &mut visiting)?;
        }

        Ok(order.into_iter().map(|i| self.nodes[i].clone()).collect())
    }

    fn visit(
        &self,
        node: usize,
        order: &mut Vec<usize>,
        visited: &mut HashSet<usize>,
        visiting: &mut Vec<usize>,
    ) -> Result<(), Vec<String>> {
        if visited.contains(&node) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|&n| n == node) {
            let mut cycle: Vec<String> = visiting[start..]
                .iter()
                .map(|&i| self.nodes[i].clone())
                .collect();
            cycle.push(self.nodes[node].clone());
            return Err(cycle);
        }

        visiting.push(node);
        for &prerequisite in &self.prerequisites[node] {
            self.visit(prerequisite, order, visited, visiting)?;
        }
        visiting.pop();

        visited.insert(node);
        order.push(node);
        Ok(())
    }

    /// Longest-path level of every node: 0 for nodes without prerequisites,
    /// otherwise one more than the highest prerequisite level
    pub fn levels(&self) -> Result<HashMap<String, usize>, Vec<String>> {
        let order = self.topological_order()?;
        let mut levels: HashMap<String, usize> = HashMap::with_capacity(order.len());

        for name in order {
            let node = self.index[&name];
            let level = self.prerequisites[node]
                .iter()
                .filter_map(|&p| levels.get(&self.nodes[p]))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            levels.insert(name, level);
        }

        Ok(levels)
    }
}
