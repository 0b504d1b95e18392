//! Hash containers built on *hashbrown* with a fixed *foldhash* seed.

// -----------------------------------------------------------------------------
// Modules

mod hasher;

// -----------------------------------------------------------------------------
// Exports

pub use hasher::{FixedHashState, FixedHasher};
pub use hasher::{NoOpHashState, NoOpHasher};

/// A [`hashbrown::HashMap`] using [`FixedHashState`] by default.
///
/// Construct it with `HashMap::default()`.
pub type HashMap<K, V, S = FixedHashState> = hashbrown::HashMap<K, V, S>;

/// A [`hashbrown::HashSet`] using [`FixedHashState`] by default.
pub type HashSet<T, S = FixedHashState> = hashbrown::HashSet<T, S>;

pub use hashbrown::hash_map::Entry;

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;

#[cfg(test)]
mod tests {
    use super::{HashMap, HashSet};

    #[test]
    fn fixed_state_is_deterministic() {
        use core::hash::BuildHasher;

        let a = super::FixedHashState.hash_one("strand");
        let b = super::FixedHashState.hash_one("strand");
        assert_eq!(a, b);
    }

    #[test]
    fn map_and_set() {
        let mut map: HashMap<&str, i32> = HashMap::default();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.get("a"), Some(&1));

        let set: HashSet<i32> = [1, 2, 2, 3].into_iter().collect();
        assert_eq!(set.len(), 3);
    }
}
