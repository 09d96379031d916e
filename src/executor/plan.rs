//! Run planning
//!
//! Expands repetitions into independent units, assigns identity keys,
//! rejects duplicates and applies category filtering. Nothing executes
//! until a plan has been built successfully.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::identity::{self, IdentityKey};
use crate::models::{Descriptor, UnitReport};

/// One schedulable unit: a descriptor at one repetition index
#[derive(Clone, Debug)]
pub struct PlannedUnit {
    pub identity: IdentityKey,
    pub descriptor: Arc<Descriptor>,
    pub repetition: u32,
    /// Registration order, used as the FIFO tie-break
    pub sequence: usize,
}

impl PlannedUnit {
    pub fn class_name(&self) -> &str {
        &self.descriptor.class_name
    }

    pub fn categories(&self) -> Vec<String> {
        self.descriptor.categories.iter().cloned().collect()
    }

    pub fn not_executed(&self) -> UnitReport {
        UnitReport::not_executed(
            self.identity.clone(),
            self.descriptor.class_name.clone(),
            self.descriptor.method_name.clone(),
            self.repetition,
            self.categories(),
        )
    }
}

/// Validated set of units for one run
#[derive(Debug, Default)]
pub struct TestPlan {
    /// Units that will be scheduled, in registration order
    pub runnable: Vec<PlannedUnit>,
    /// Units filtered out by category
    pub excluded: Vec<PlannedUnit>,
}

impl TestPlan {
    pub fn build(descriptors: Vec<Descriptor>, config: &EngineConfig) -> Result<Self, EngineError> {
        let mut seen: HashMap<IdentityKey, String> = HashMap::new();
        let mut plan = TestPlan::default();
        let mut sequence = 0;

        for descriptor in descriptors {
            let descriptor = Arc::new(descriptor);
            let included = config.is_included(&descriptor.categories);

            for repetition in 0..=descriptor.repeat_count {
                let identity = identity::build(&descriptor, repetition);
                let owner = format!("{}#{}", descriptor.display_name(), repetition);

                match seen.entry(identity.clone()) {
                    Entry::Occupied(first) => {
                        return Err(EngineError::DuplicateIdentity {
                            key: identity,
                            first: first.get().clone(),
                            second: owner,
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(owner);
                    }
                }

                let unit = PlannedUnit {
                    identity,
                    descriptor: Arc::clone(&descriptor),
                    repetition,
                    sequence,
                };
                sequence += 1;

                if included {
                    plan.runnable.push(unit);
                } else {
                    debug!("Excluding {} by category", unit.identity);
                    plan.excluded.push(unit);
                }
            }
        }

        Ok(plan)
    }

    pub fn total(&self) -> usize {
        self.runnable.len() + self.excluded.len()
    }

    /// Runnable unit count per owning class
    pub fn units_per_class(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for unit in &self.runnable {
            *counts.entry(unit.class_name().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArgumentSource;

    fn unit(class: &str, method: &str) -> Descriptor {
        Descriptor::new(class, method, |_ctx| async { Ok(()) })
    }

    #[test]
    fn test_repetitions_expand() {
        let plan = TestPlan::build(vec![unit("s::A", "a").with_repeat(2)], &EngineConfig::new())
            .unwrap();
        assert_eq!(plan.runnable.len(), 3);
        let reps: Vec<u32> = plan.runnable.iter().map(|u| u.repetition).collect();
        assert_eq!(reps, vec![0, 1, 2]);
        let sequences: Vec<usize> = plan.runnable.iter().map(|u| u.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_names_both() {
        let err = TestPlan::build(
            vec![unit("s::A", "a"), unit("s::B", "b"), unit("s::A", "a")],
            &EngineConfig::new(),
        )
        .unwrap_err();
        match err {
            EngineError::DuplicateIdentity { first, second, .. } => {
                assert_eq!(first, "s::A::a#0");
                assert_eq!(second, "s::A::a#0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_distinct_arguments_are_not_duplicates() {
        let plan = TestPlan::build(
            vec![
                unit("s::A", "a").with_method_parameters(["i32"], ArgumentSource::values(["1"])),
                unit("s::A", "a").with_method_parameters(["i32"], ArgumentSource::values(["2"])),
            ],
            &EngineConfig::new(),
        )
        .unwrap();
        assert_eq!(plan.runnable.len(), 2);
    }

    #[test]
    fn test_duplicates_detected_among_excluded() {
        let config = EngineConfig::new().with_category("slow", false);
        let err = TestPlan::build(
            vec![
                unit("s::A", "a").with_category("slow"),
                unit("s::A", "a").with_category("slow"),
            ],
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateIdentity { .. }));
    }

    #[test]
    fn test_category_filter_and_class_counts() {
        let config = EngineConfig::new().with_category("slow", false);
        let plan = TestPlan::build(
            vec![
                unit("s::A", "a").with_repeat(1),
                unit("s::A", "b").with_category("slow"),
                unit("s::B", "c"),
            ],
            &config,
        )
        .unwrap();

        assert_eq!(plan.total(), 4);
        assert_eq!(plan.excluded.len(), 1);
        assert_eq!(plan.excluded[0].not_executed().method_name, "b");

        let counts = plan.units_per_class();
        assert_eq!(counts.get("s::A"), Some(&2));
        assert_eq!(counts.get("s::B"), Some(&1));
    }
}
