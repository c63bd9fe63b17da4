//! Optimized collection types.
//!
//! Re-exports AHash-backed hash collections. Every index map in the resource
//! system goes through these aliases.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

/// Create a hash map with pre-allocated capacity.
pub fn map_with_capacity<K, V>(capacity: usize) -> HashMap<K, V> {
    HashMap::with_capacity(capacity)
}
