use crate::NodeId;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Outcome of [`QuorumStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    /// The sender was already recorded under the key. Nothing changed.
    Duplicate,
    /// Recorded, and the key is still below or already past the threshold.
    Counted,
    /// Recorded, and this insertion moved the key onto the threshold.
    Crossed,
}

impl Added {
    pub fn is_new(self) -> bool {
        self != Added::Duplicate
    }

    pub fn crossed(self) -> bool {
        self == Added::Crossed
    }
}

/// Dedup-and-count store for quorum certificates and vote tallies.
///
/// Every key maps distinct senders to the value they sent. The first value
/// of a sender is kept, later ones are duplicates. `add` reports the
/// crossing of the threshold exactly once per key: on the insertion that
/// moves the count from below the threshold to at least the threshold.
#[derive(Debug, Clone)]
pub struct QuorumStore<K: Ord, V = ()> {
    threshold: usize,
    certs: BTreeMap<K, BTreeMap<NodeId, V>>,
}

impl<K: Ord, V> QuorumStore<K, V> {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            certs: BTreeMap::new(),
        }
    }

    /// Records `value` from `sender` under `key`.
    pub fn add(&mut self, key: K, sender: NodeId, value: V) -> Added {
        let votes = self.certs.entry(key).or_default();
        match votes.entry(sender) {
            Entry::Occupied(_) => Added::Duplicate,
            Entry::Vacant(e) => {
                e.insert(value);
                if votes.len() == self.threshold {
                    Added::Crossed
                } else {
                    Added::Counted
                }
            }
        }
    }

    pub fn count(&self, key: &K) -> usize {
        self.certs.get(key).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn has_quorum(&self, key: &K) -> bool {
        self.count(key) >= self.threshold
    }

    /// Senders recorded under `key`, in ascending order.
    pub fn signers(&self, key: &K) -> impl Iterator<Item = &NodeId> {
        self.certs.get(key).into_iter().flat_map(BTreeMap::keys)
    }

    /// The value of every sender recorded under `key`.
    pub fn votes(&self, key: &K) -> Option<&BTreeMap<NodeId, V>> {
        self.certs.get(key)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    #[test]
    fn test_crosses_once() {
        let mut store = QuorumStore::new(3);
        assert_eq!(store.add("k", 1, ()), Added::Counted);
        assert_eq!(store.add("k", 2, ()), Added::Counted);
        assert_eq!(store.add("k", 3, ()), Added::Crossed);
        assert_eq!(store.add("k", 4, ()), Added::Counted);
        assert_eq!(store.add("k", 3, ()), Added::Duplicate);
        assert_eq!(store.count(&"k"), 4);
        assert_eq!(store.count(&"other"), 0);
    }

    #[test]
    fn test_duplicate_sender_is_noop() {
        let mut store = QuorumStore::new(2);
        assert!(store.add(("vcbc", 1), 5, ()).is_new());
        assert!(!store.add(("vcbc", 1), 5, ()).is_new());
        assert_eq!(store.count(&("vcbc", 1)), 1);
        assert!(!store.has_quorum(&("vcbc", 1)));
        assert!(store.add(("vcbc", 1), 6, ()).crossed());
        assert_eq!(store.signers(&("vcbc", 1)).copied().collect::<Vec<_>>(), [5, 6]);
    }

    #[test]
    fn test_first_value_of_a_sender_is_kept() {
        let mut store = QuorumStore::new(2);
        assert_eq!(store.add(1, 7, true), Added::Counted);
        assert_eq!(store.add(1, 7, false), Added::Duplicate);
        assert_eq!(store.add(1, 8, false), Added::Crossed);

        let votes = store.votes(&1).unwrap();
        assert_eq!(votes.get(&7), Some(&true));
        assert_eq!(votes.get(&8), Some(&false));
        assert!(store.votes(&2).is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut store = QuorumStore::new(1);
        assert!(store.add(1, 1, ()).crossed());
        assert!(store.add(2, 1, ()).crossed());
        assert!(!store.add(1, 2, ()).crossed());
    }

    #[quickcheck]
    fn prop_threshold_crossed_exactly_once(senders: Vec<u8>, threshold: u8) -> bool {
        let threshold = threshold as usize % 8 + 1;
        let mut store = QuorumStore::new(threshold);
        let crossings = senders
            .iter()
            .filter(|s| store.add((), **s as NodeId % 10, ()).crossed())
            .count();

        let distinct = BTreeSet::from_iter(senders.iter().map(|s| *s as NodeId % 10)).len();
        if distinct >= threshold {
            crossings == 1
        } else {
            crossings == 0
        }
    }
}
