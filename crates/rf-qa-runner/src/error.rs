//! Error types for rf-qa-runner

use crate::state::{RunEvent, RunState};
use crate::storage::StorageError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller of a test run
///
/// File-local problems (bad Touchstone data, unreadable inputs) never show
/// up here; they are recorded as per-file outcomes.
#[derive(Debug, Error)]
pub enum Error {
    /// Mutation attempted on a terminal run
    #[error("Run is {state} and immutable; rejected event {event}")]
    ImmutableState {
        /// Terminal state of the run
        state: RunState,
        /// Rejected event
        event: RunEvent,
    },

    /// Event not valid in the current non-terminal state
    #[error("Invalid transition: {event} while {state}")]
    InvalidTransition {
        /// Current state
        state: RunState,
        /// Rejected event
        event: RunEvent,
    },

    /// Storage collaborator failure, propagated unmodified
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Core library error (requirement validation, hashing)
    #[error("Core error: {0}")]
    Core(#[from] rf_qa_core::Error),

    /// Invalid runner configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}
