//! Hashing utilities for cache keys

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute a hash for any hashable value
pub fn compute_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A fingerprint built from ordered components
///
/// Each component is hashed on its own, so `("ab", "c")` and `("a", "bc")`
/// produce different fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    components: Vec<u64>,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            components: Vec::with_capacity(capacity),
        }
    }

    pub fn push<T: Hash + ?Sized>(&mut self, value: &T) -> &mut Self {
        self.components.push(compute_hash(value));
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push(s)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Build a single hash from all components
    pub fn finalize(&self) -> u64 {
        compute_hash(&self.components)
    }

    /// Fixed-width hex form, suitable for cache keys
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.finalize())
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let mut a = Fingerprint::new();
        a.push_str("react").push_str("hello");
        let mut b = Fingerprint::new();
        b.push_str("react").push_str("hello");
        assert_eq!(a.to_hex(), b.to_hex());
        assert_eq!(a.to_hex().len(), 16);
    }

    #[test]
    fn test_fingerprint_component_boundaries() {
        let mut a = Fingerprint::new();
        a.push_str("ab").push_str("c");
        let mut b = Fingerprint::new();
        b.push_str("a").push_str("bc");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_fingerprint_order_matters() {
        let mut a = Fingerprint::new();
        a.push_str("x").push(&1u32);
        let mut b = Fingerprint::new();
        b.push(&1u32).push_str("x");
        assert_ne!(a.finalize(), b.finalize());
    }
}
