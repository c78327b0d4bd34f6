use fnv::FnvHasher;
use std::hash::{Hash, Hasher};

use super::model::EntityKind;

/// Deterministic 64-bit key for `pg_advisory_xact_lock`, combining the
/// entity kind with its candidate match key. FNV is
/// zero-dependency and stable across runs, unlike `std`'s default hasher
/// which is randomized per process.
pub fn hashed_lock_key(kind: EntityKind, match_key: &str) -> i64 {
    let mut hasher = FnvHasher::default();
    kind.as_str().hash(&mut hasher);
    match_key.hash(&mut hasher);
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_hash_identically() {
        let a = hashed_lock_key(EntityKind::Organization, "example pantry");
        let b = hashed_lock_key(EntityKind::Organization, "example pantry");
        assert_eq!(a, b);
    }

    #[test]
    fn different_entity_kind_changes_key() {
        let org = hashed_lock_key(EntityKind::Organization, "example pantry");
        let loc = hashed_lock_key(EntityKind::Location, "example pantry");
        assert_ne!(org, loc);
    }
}
