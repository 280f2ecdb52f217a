//! Set difference between the backend's open alerts and the stored snapshot

use std::collections::BTreeSet;

/// State transitions found by one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Open in the backend, not yet stored
    pub raised: BTreeSet<i64>,
    /// Stored, no longer open in the backend
    pub cleared: BTreeSet<i64>,
}

impl Diff {
    /// `raised = fetched - stored`, `cleared = stored - fetched`.
    /// Ids present on both sides are already known and produce nothing.
    pub fn compute(fetched: &BTreeSet<i64>, stored: &BTreeSet<i64>) -> Self {
        Self {
            raised: fetched.difference(stored).copied().collect(),
            cleared: stored.difference(fetched).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raised.is_empty() && self.cleared.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_raise_and_clear() {
        let diff = Diff::compute(&set(&[101, 102]), &set(&[101, 103]));
        assert_eq!(diff.raised, set(&[102]));
        assert_eq!(diff.cleared, set(&[103]));
    }

    #[test]
    fn test_unchanged_is_empty() {
        let diff = Diff::compute(&set(&[1, 2, 3]), &set(&[3, 2, 1]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_empty_sides() {
        let diff = Diff::compute(&set(&[]), &set(&[5, 6]));
        assert!(diff.raised.is_empty());
        assert_eq!(diff.cleared, set(&[5, 6]));

        let diff = Diff::compute(&set(&[5, 6]), &set(&[]));
        assert_eq!(diff.raised, set(&[5, 6]));
        assert!(diff.cleared.is_empty());
    }

    #[test]
    fn test_difference_laws_hold_across_generated_sets() {
        // Deterministic xorshift, so failures are reproducible
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..200 {
            let fetched: BTreeSet<i64> = (0..(next() % 20)).map(|_| (next() % 32) as i64).collect();
            let stored: BTreeSet<i64> = (0..(next() % 20)).map(|_| (next() % 32) as i64).collect();

            let diff = Diff::compute(&fetched, &stored);

            assert!(diff.raised.is_disjoint(&diff.cleared));
            assert!(diff.raised.iter().all(|id| fetched.contains(id) && !stored.contains(id)));
            assert!(diff.cleared.iter().all(|id| stored.contains(id) && !fetched.contains(id)));

            // Applying the diff to the stored set yields the fetched set
            let mut applied = stored.clone();
            applied.extend(diff.raised.iter().copied());
            for id in &diff.cleared {
                applied.remove(id);
            }
            assert_eq!(applied, fetched);
        }
    }
}
