//! Set reconciliation between a persisted association and a desired one.
//!
//! Only the pure diff lives here. Applying it atomically is the storage
//! engine's job.

use std::collections::BTreeSet;

use uuid::Uuid;

/// Sort and deduplicate a list of ids.
pub fn normalize_ids(ids: &[Uuid]) -> Vec<Uuid> {
    ids.iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Edges to delete and edges to insert to turn `current` into `target`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff {
    pub to_remove: Vec<Uuid>,
    pub to_add: Vec<Uuid>,
}

impl SetDiff {
    pub fn between(current: &[Uuid], target: &[Uuid]) -> Self {
        let current: BTreeSet<Uuid> = current.iter().copied().collect();
        let target: BTreeSet<Uuid> = target.iter().copied().collect();

        Self {
            to_remove: current.difference(&target).copied().collect(),
            to_add: target.difference(&current).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        let mut v: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        v.sort();
        v
    }

    #[test]
    fn diff_moves_towards_target() {
        let v = ids(3);
        let (a, b, c) = (v[0], v[1], v[2]);

        let diff = SetDiff::between(&[a, b], &[b, c]);
        assert_eq!(diff.to_remove, vec![a]);
        assert_eq!(diff.to_add, vec![c]);
    }

    #[test]
    fn equal_sets_produce_empty_diff() {
        let v = ids(2);
        let diff = SetDiff::between(&[v[1], v[0]], &[v[0], v[1], v[0]]);
        assert!(diff.is_empty());
    }

    #[test]
    fn empty_target_removes_everything() {
        let v = ids(2);
        let diff = SetDiff::between(&v, &[]);
        assert_eq!(diff.to_remove, v);
        assert!(diff.to_add.is_empty());
    }

    #[test]
    fn duplicates_in_target_collapse() {
        let v = ids(1);
        let diff = SetDiff::between(&[], &[v[0], v[0]]);
        assert_eq!(diff.to_add, vec![v[0]]);
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let v = ids(2);
        assert_eq!(normalize_ids(&[v[1], v[0], v[1]]), v);
    }
}
