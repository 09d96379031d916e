//! Engine error types
//!
//! Fatal errors abort a run; everything a unit does wrong is recovered at the
//! unit boundary and recorded as failure detail instead.

use thiserror::Error;

use crate::identity::IdentityKey;

/// Errors that abort an entire run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Duplicate identity {key}: produced by both {first} and {second}")]
    DuplicateIdentity {
        key: IdentityKey,
        first: String,
        second: String,
    },

    #[error("Constraint deadlock: {} unit(s) waiting with no unit running", waiting.len())]
    ConstraintDeadlock { waiting: Vec<IdentityKey> },

    #[error("Constraint key '{constraint}' reserved by {requester} while held by {holder}")]
    ConstraintDoubleReservation {
        constraint: String,
        holder: IdentityKey,
        requester: IdentityKey,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker lost: {0}")]
    WorkerLost(String),
}

impl EngineError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::DuplicateIdentity { .. } => 3,
            EngineError::ConstraintDeadlock { .. }
            | EngineError::ConstraintDoubleReservation { .. } => 4,
            EngineError::InvalidConfig(_) => 2,
            EngineError::WorkerLost(_) => 5,
        }
    }
}

/// Errors from the fixture store
///
/// `Clone` so a single construction failure can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixtureError {
    #[error("Fixture {type_name} construction failed: {message}")]
    Construction { type_name: String, message: String },

    #[error("Fixture {type_name} in scope {scope} is already disposed")]
    Disposed { type_name: String, scope: String },

    #[error("Fixture entry for {type_name} holds a different type")]
    TypeMismatch { type_name: String },
}
