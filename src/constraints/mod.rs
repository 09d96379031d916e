//! Mutual-exclusion constraints between units
//!
//! A unit holding constraint keys may only run while no other running unit
//! holds any of the same keys. Reservation of a unit's keys is all-or-nothing,
//! so two units sharing several keys can never each hold part of the set.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::identity::IdentityKey;

/// Units transitively linked through shared constraint keys
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintGroup {
    pub keys: BTreeSet<String>,
    pub members: BTreeSet<IdentityKey>,
}

/// Constraint key bookkeeping for one run
#[derive(Debug, Default)]
pub struct ConstraintGraph {
    keys: HashMap<IdentityKey, Vec<String>>,
    holders: HashMap<String, IdentityKey>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a unit's constraint keys; duplicates within a unit collapse
    pub fn register(&mut self, identity: IdentityKey, constraint_keys: &[String]) {
        let keys: BTreeSet<&String> = constraint_keys.iter().collect();
        self.keys
            .insert(identity, keys.into_iter().cloned().collect());
    }

    pub fn is_constrained(&self, identity: &IdentityKey) -> bool {
        self.keys
            .get(identity)
            .map(|keys| !keys.is_empty())
            .unwrap_or(false)
    }

    /// Whether every key of the unit is currently free
    pub fn may_schedule(&self, identity: &IdentityKey) -> bool {
        self.keys
            .get(identity)
            .map(|keys| keys.iter().all(|k| !self.holders.contains_key(k)))
            .unwrap_or(true)
    }

    /// Reserve all of the unit's keys at once
    pub fn reserve(&mut self, identity: &IdentityKey) -> Result<(), EngineError> {
        let Some(keys) = self.keys.get(identity) else {
            return Ok(());
        };

        if let Some((constraint, holder)) = keys
            .iter()
            .find_map(|k| self.holders.get(k).map(|h| (k, h)))
        {
            return Err(EngineError::ConstraintDoubleReservation {
                constraint: constraint.clone(),
                holder: holder.clone(),
                requester: identity.clone(),
            });
        }

        for key in keys {
            self.holders.insert(key.clone(), identity.clone());
        }
        if !keys.is_empty() {
            debug!("{} reserved {:?}", identity, keys);
        }
        Ok(())
    }

    /// Free every key held by the unit
    pub fn release(&mut self, identity: &IdentityKey) {
        let Some(keys) = self.keys.get(identity) else {
            return;
        };
        for key in keys {
            if self.holders.get(key) == Some(identity) {
                self.holders.remove(key);
                trace!("{} released '{}'", identity, key);
            }
        }
    }

    /// Units currently holding at least one key
    pub fn holders(&self) -> BTreeSet<&IdentityKey> {
        self.holders.values().collect()
    }

    /// Position of the first queued unit whose keys are all free
    pub fn next_eligible<T, F>(&self, queue: &VecDeque<T>, identity_of: F) -> Option<usize>
    where
        F: Fn(&T) -> &IdentityKey,
    {
        queue
            .iter()
            .position(|item| self.may_schedule(identity_of(item)))
    }

    /// Partition constrained units into groups linked by shared keys
    pub fn groups(&self) -> Vec<ConstraintGroup> {
        let mut parent: BTreeMap<&str, &str> = BTreeMap::new();

        fn find<'a>(parent: &mut BTreeMap<&'a str, &'a str>, key: &'a str) -> &'a str {
            let mut root = key;
            while let Some(&next) = parent.get(root) {
                if next == root {
                    break;
                }
                root = next;
            }
            parent.insert(key, root);
            root
        }

        for keys in self.keys.values() {
            for key in keys {
                parent.entry(key.as_str()).or_insert(key.as_str());
            }
            if let Some((first, rest)) = keys.split_first() {
                for key in rest {
                    let a = find(&mut parent, first.as_str());
                    let b = find(&mut parent, key.as_str());
                    if a != b {
                        parent.insert(b, a);
                    }
                }
            }
        }

        let mut groups: BTreeMap<&str, ConstraintGroup> = BTreeMap::new();
        for (identity, keys) in &self.keys {
            let Some(first) = keys.first() else {
                continue;
            };
            let root = find(&mut parent, first.as_str());
            let group = groups.entry(root).or_default();
            group.members.insert(identity.clone());
            group.keys.extend(keys.iter().cloned());
        }

        groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> IdentityKey {
        IdentityKey::from_raw(name)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shared_key_excludes() {
        let mut graph = ConstraintGraph::new();
        graph.register(key("a"), &keys(&["db"]));
        graph.register(key("b"), &keys(&["db"]));
        graph.register(key("c"), &[]);

        graph.reserve(&key("a")).unwrap();
        assert!(!graph.may_schedule(&key("b")));
        assert!(graph.may_schedule(&key("c")));

        graph.release(&key("a"));
        assert!(graph.may_schedule(&key("b")));
    }

    #[test]
    fn test_unconstrained_never_excluded() {
        let mut graph = ConstraintGraph::new();
        graph.register(key("x"), &[]);
        graph.register(key("y"), &[]);
        graph.reserve(&key("x")).unwrap();
        graph.reserve(&key("y")).unwrap();
        assert!(graph.holders().is_empty());
        assert!(!graph.is_constrained(&key("x")));
    }

    #[test]
    fn test_multi_key_is_all_or_nothing() {
        let mut graph = ConstraintGraph::new();
        graph.register(key("a"), &keys(&["db", "fs"]));
        graph.register(key("b"), &keys(&["fs", "db"]));
        graph.register(key("c"), &keys(&["fs"]));

        graph.reserve(&key("c")).unwrap();
        assert!(!graph.may_schedule(&key("a")));
        let err = graph.reserve(&key("a")).unwrap_err();
        assert!(matches!(err, EngineError::ConstraintDoubleReservation { .. }));
        // The failed reservation must not leave "db" held
        assert_eq!(graph.holders().len(), 1);

        graph.release(&key("c"));
        graph.reserve(&key("a")).unwrap();
        assert!(!graph.may_schedule(&key("b")));
    }

    #[test]
    fn test_release_by_non_holder_is_noop() {
        let mut graph = ConstraintGraph::new();
        graph.register(key("a"), &keys(&["db"]));
        graph.register(key("b"), &keys(&["db"]));
        graph.reserve(&key("a")).unwrap();
        graph.release(&key("b"));
        assert!(!graph.may_schedule(&key("b")));
    }

    #[test]
    fn test_next_eligible_is_fifo() {
        let mut graph = ConstraintGraph::new();
        graph.register(key("a"), &keys(&["db"]));
        graph.register(key("b"), &keys(&["db"]));
        graph.register(key("c"), &keys(&["db"]));
        graph.register(key("d"), &[]);
        graph.reserve(&key("a")).unwrap();

        let queue: VecDeque<IdentityKey> = vec![key("b"), key("c"), key("d")].into();
        assert_eq!(graph.next_eligible(&queue, |k| k), Some(2));

        graph.release(&key("a"));
        assert_eq!(graph.next_eligible(&queue, |k| k), Some(0));
    }

    #[test]
    fn test_groups_link_only_through_shared_keys() {
        let mut graph = ConstraintGraph::new();
        graph.register(key("a1"), &keys(&["A"]));
        graph.register(key("a2"), &keys(&["A"]));
        graph.register(key("b1"), &keys(&["B"]));
        graph.register(key("b2"), &keys(&["B"]));
        graph.register(key("free"), &[]);
        assert_eq!(graph.groups().len(), 2);

        graph.register(key("bridge"), &keys(&["A", "B"]));
        let groups = graph.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 5);
        assert!(!groups[0].members.contains(&key("free")));
    }
}
