//! Shared fixture injection
//!
//! Fixtures are lazily constructed objects shared between units. A fixture
//! lives in one of three scopes (global, per class, per explicit key) or is
//! not shared at all. Construction happens at most once per scope and type,
//! however many workers ask for it at the same moment.

mod store;

pub use store::{Fixture, FixtureKey, FixtureStore, OwnedFixtures};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a requester wants a fixture shared
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharing {
    /// Fresh instance per request
    None,
    /// One instance for the whole run
    Globally,
    /// One instance per owning class
    PerClass,
    /// One instance per explicit key
    Keyed(String),
}

impl Sharing {
    /// Resolve to a cache scope; `None` has no scope
    pub fn scope_for(&self, class_name: &str) -> Option<FixtureScope> {
        match self {
            Sharing::None => None,
            Sharing::Globally => Some(FixtureScope::Global),
            Sharing::PerClass => Some(FixtureScope::Class(class_name.to_string())),
            Sharing::Keyed(key) => Some(FixtureScope::Key(key.clone())),
        }
    }
}

/// Sharing scope plus its discriminator
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureScope {
    Global,
    Class(String),
    Key(String),
}

impl FixtureScope {
    /// Class scopes are disposed when their lease count drops to zero
    pub fn is_class(&self) -> bool {
        matches!(self, FixtureScope::Class(_))
    }
}

impl fmt::Display for FixtureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureScope::Global => write!(f, "global"),
            FixtureScope::Class(class) => write!(f, "class:{class}"),
            FixtureScope::Key(key) => write!(f, "key:{key}"),
        }
    }
}
