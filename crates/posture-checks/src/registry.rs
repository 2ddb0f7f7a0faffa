//! Check registry - ordered index of all available checks

use posture_core::{Check, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available checks
///
/// Registration order is evaluation and report order. Ids are unique.
pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
    /// Position of each check in `checks`
    index: HashMap<String, usize>,
}

impl CheckRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in Linux catalogue
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for check in crate::builtin::linux_checks() {
            // Built-in ids are unique
            let _ = registry.register(Arc::new(check));
        }
        registry
    }

    /// Register a check, rejecting duplicate ids
    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<()> {
        let id = check.id().to_string();
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateCheck { check_id: id });
        }
        self.index.insert(id, self.checks.len());
        self.checks.push(check);
        Ok(())
    }

    /// Get a check by ID
    pub fn get(&self, id: &str) -> Option<Arc<dyn Check>> {
        self.index.get(id).map(|&i| Arc::clone(&self.checks[i]))
    }

    /// All check IDs in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.id())
    }

    /// All checks in registration order
    pub fn all(&self) -> impl Iterator<Item = Arc<dyn Check>> + '_ {
        self.checks.iter().cloned()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Checks carrying any of `tags`, in registration order
    pub fn by_tags(&self, tags: &[String]) -> Vec<Arc<dyn Check>> {
        self.checks
            .iter()
            .filter(|c| c.metadata().tags.iter().any(|t| tags.contains(t)))
            .cloned()
            .collect()
    }

    /// Checks that are enabled by default, in registration order
    pub fn enabled_by_default(&self) -> Vec<Arc<dyn Check>> {
        self.checks
            .iter()
            .filter(|c| c.metadata().enabled_by_default)
            .cloned()
            .collect()
    }

    /// Select checks by id, in the order given; unknown ids are an error
    pub fn by_ids(&self, ids: &[String]) -> Result<Vec<Arc<dyn Check>>> {
        ids.iter()
            .map(|id| {
                self.get(id).ok_or_else(|| Error::CheckNotFound {
                    check_id: id.clone(),
                })
            })
            .collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}
