//! Factor dimension registry.

use crate::error::{SimulationError, SimulationResult};
use std::collections::HashMap;

/// Bijective map from factor name to dense index.
///
/// Indices follow registration order and never change. After freezing,
/// existing names may be looked up (and re-added, which returns the same
/// index) but new names are rejected.
#[derive(Debug, Clone, Default)]
pub struct DimensionRegistry {
    names: Vec<String>,
    index: HashMap<String, usize>,
    frozen: bool,
}

impl DimensionRegistry {
    /// Empty, open registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `name`, registering it if new.
    ///
    /// # Errors
    /// `GridFrozen` for a new name after freeze.
    pub fn add_dimension(&mut self, name: &str) -> SimulationResult<usize> {
        if let Some(&i) = self.index.get(name) {
            return Ok(i);
        }
        if self.frozen {
            return Err(SimulationError::GridFrozen(format!("dimension {}", name)));
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        Ok(i)
    }

    /// Index of a registered name.
    ///
    /// # Errors
    /// `UnknownDimension` when `name` was never added.
    pub fn dimension(&self, name: &str) -> SimulationResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimulationError::UnknownDimension(name.to_string()))
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Name of dimension `i`, `None` past the last index.
    pub fn name(&self, i: usize) -> Option<&str> {
        self.names.get(i).map(String::as_str)
    }

    /// All names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Stops new registrations.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// True once frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let mut reg = DimensionRegistry::new();
        assert_eq!(reg.add_dimension("WTI").unwrap(), 0);
        assert_eq!(reg.add_dimension("EUR/USD").unwrap(), 1);
        assert_eq!(reg.add_dimension("WTI").unwrap(), 0);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.name(1), Some("EUR/USD"));
        assert_eq!(reg.name(2), None);
    }

    #[test]
    fn test_frozen_registry() {
        let mut reg = DimensionRegistry::new();
        reg.add_dimension("A").unwrap();
        reg.freeze();
        assert_eq!(reg.add_dimension("A").unwrap(), 0);
        assert!(matches!(
            reg.add_dimension("B"),
            Err(SimulationError::GridFrozen(_))
        ));
        assert!(matches!(
            reg.dimension("B"),
            Err(SimulationError::UnknownDimension(_))
        ));
    }
}
