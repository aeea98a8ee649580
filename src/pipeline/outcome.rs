//! Filter outcomes and the requirements that gate downstream components.
//!
//! An [`Outcome`] is a filter's verdict for a row: the producing filter's
//! identity plus a symbolic [`Category`]. Components declare
//! [`Requirement`]s on outcomes; a component runs for a row only when every
//! requirement is satisfied by the row's active outcome set.

use crate::pipeline::id::NodeId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Symbolic outcome category, e.g. `MATCH` or `NON_MATCH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Cow<'static, str>);

impl Category {
    pub const MATCH: Category = Category(Cow::Borrowed("MATCH"));
    pub const NON_MATCH: Category = Category(Cow::Borrowed("NON_MATCH"));

    pub const fn from_static(name: &'static str) -> Self {
        Category(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Category(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for Category {
    fn from(name: &'static str) -> Self {
        Category::from_static(name)
    }
}

/// A filter's verdict for a row. Two outcomes are equal only when both the
/// filter and the category match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub filter: NodeId,
    pub category: Category,
}

impl Outcome {
    pub fn new(filter: NodeId, category: impl Into<Category>) -> Self {
        Self {
            filter,
            category: category.into(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.filter, self.category)
    }
}

/// One entry of a component's activation condition. A component's
/// requirements are ANDed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// The row must carry exactly this outcome.
    Outcome(Outcome),
    /// The row must carry at least one of these outcomes.
    AnyOf(Vec<Outcome>),
}

impl Requirement {
    /// All outcomes referenced by this requirement.
    pub fn outcomes(&self) -> &[Outcome] {
        match self {
            Requirement::Outcome(outcome) => std::slice::from_ref(outcome),
            Requirement::AnyOf(outcomes) => outcomes,
        }
    }
}

impl From<Outcome> for Requirement {
    fn from(outcome: Outcome) -> Self {
        Requirement::Outcome(outcome)
    }
}

/// An outcome resolved against the plan: the category is replaced by its
/// index in the filter's declared category list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OutcomeKey {
    pub filter: NodeId,
    pub category: u16,
}

/// A requirement resolved against the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolvedRequirement {
    One(OutcomeKey),
    AnyOf(Vec<OutcomeKey>),
}

impl ResolvedRequirement {
    pub fn is_satisfied_by(&self, outcomes: &OutcomeSet) -> bool {
        match self {
            ResolvedRequirement::One(key) => outcomes.contains(*key),
            ResolvedRequirement::AnyOf(keys) => keys.iter().any(|key| outcomes.contains(*key)),
        }
    }
}

/// The outcomes recorded for one row so far. A fresh source row starts empty
/// (the implicit root outcome); each filter that runs adds exactly one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OutcomeSet {
    entries: Vec<OutcomeKey>,
}

impl OutcomeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: OutcomeKey) {
        match self.entries.iter_mut().find(|e| e.filter == key.filter) {
            Some(existing) => *existing = key,
            None => self.entries.push(key),
        }
    }

    #[inline]
    pub fn contains(&self, key: OutcomeKey) -> bool {
        self.entries.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_equality_needs_same_filter_and_category() {
        let a = Outcome::new(NodeId(1), Category::MATCH);
        let b = Outcome::new(NodeId(1), "MATCH");
        let c = Outcome::new(NodeId(2), Category::MATCH);
        let d = Outcome::new(NodeId(1), Category::NON_MATCH);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_outcome_set_records_one_entry_per_filter() {
        let mut set = OutcomeSet::new();
        set.record(OutcomeKey {
            filter: NodeId(0),
            category: 0,
        });
        set.record(OutcomeKey {
            filter: NodeId(0),
            category: 1,
        });
        assert_eq!(set.len(), 1);
        assert!(set.contains(OutcomeKey {
            filter: NodeId(0),
            category: 1
        }));
    }

    #[test]
    fn test_resolved_requirements() {
        let mut set = OutcomeSet::new();
        let matched = OutcomeKey {
            filter: NodeId(0),
            category: 0,
        };
        let other = OutcomeKey {
            filter: NodeId(0),
            category: 1,
        };
        set.record(matched);

        assert!(ResolvedRequirement::One(matched).is_satisfied_by(&set));
        assert!(!ResolvedRequirement::One(other).is_satisfied_by(&set));
        assert!(ResolvedRequirement::AnyOf(vec![other, matched]).is_satisfied_by(&set));
        assert!(!ResolvedRequirement::AnyOf(vec![]).is_satisfied_by(&set));
    }

    #[test]
    fn test_category_serializes_as_plain_string() {
        let json = serde_json::to_string(&Category::NON_MATCH).unwrap();
        assert_eq!(json, "\"NON_MATCH\"");
        let back: Category = serde_json::from_str("\"WITHIN\"").unwrap();
        assert_eq!(back, Category::from_static("WITHIN"));
    }
}
