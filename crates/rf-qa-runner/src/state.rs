//! Test run state machine
//!
//! ```text
//! CREATED --Begin--> PROCESSING --Resolve--> COMPLETED | FAILED
//!                               --Cancel---> FAILED
//!                               --InfrastructureFailure--> FAILED
//! ```
//!
//! COMPLETED and FAILED are terminal; any event there is an
//! [`Error::ImmutableState`]. The only way to change a [`TestRun`] is through
//! [`transition`], applied by the orchestrator at its commit points.

use crate::error::{Error, Result};
use crate::pipeline::{FileInput, FileOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Annotation recorded on runs forced to FAILED by cancellation or deadline
pub const INCOMPLETE_CANCELLED: &str = "incomplete — cancelled";

/// Lifecycle state of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Accepted, not started
    Created,
    /// Files being processed
    Processing,
    /// All outcomes known; at least one file evaluated
    Completed,
    /// Every file failed to load, the run was cancelled, or storage failed
    Failed,
}

impl RunState {
    /// COMPLETED and FAILED accept no further events
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Events driving the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEvent {
    /// Orchestrator starts processing
    Begin,
    /// Every per-file outcome is known
    Resolve {
        /// Files that reached evaluation (not `LoadFailed`)
        evaluated_files: usize,
    },
    /// Caller cancelled or the deadline passed
    Cancel,
    /// Storage collaborator could not record the run
    InfrastructureFailure,
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("begin"),
            Self::Resolve { evaluated_files } => write!(f, "resolve({evaluated_files} evaluated)"),
            Self::Cancel => f.write_str("cancel"),
            Self::InfrastructureFailure => f.write_str("infrastructure-failure"),
        }
    }
}

/// Pure transition function
///
/// # Errors
///
/// `ImmutableState` from a terminal state, `InvalidTransition` for any other
/// event that does not apply to the current state.
pub fn transition(state: RunState, event: RunEvent) -> Result<RunState> {
    match (state, event) {
        (s, event) if s.is_terminal() => Err(Error::ImmutableState { state: s, event }),
        (RunState::Created, RunEvent::Begin) => Ok(RunState::Processing),
        (RunState::Processing, RunEvent::Resolve { evaluated_files: 0 }) => Ok(RunState::Failed),
        (RunState::Processing, RunEvent::Resolve { .. }) => Ok(RunState::Completed),
        (RunState::Processing, RunEvent::Cancel | RunEvent::InfrastructureFailure) => {
            Ok(RunState::Failed)
        }
        (state, event) => Err(Error::InvalidTransition { state, event }),
    }
}

/// A test run: inputs, lifecycle state and, once resolved, ordered outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    run_id: String,
    inputs: Vec<FileInput>,
    state: RunState,
    outcomes: Vec<FileOutcome>,
    requirement_hash: Option<String>,
    pass: Option<bool>,
    annotation: Option<String>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TestRun {
    /// New run in CREATED
    #[must_use]
    pub fn new(run_id: impl Into<String>, inputs: Vec<FileInput>) -> Self {
        Self {
            run_id: run_id.into(),
            inputs,
            state: RunState::Created,
            outcomes: Vec::new(),
            requirement_hash: None,
            pass: None,
            annotation: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Run identifier
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Submitted files in submission order
    #[must_use]
    pub fn inputs(&self) -> &[FileInput] {
        &self.inputs
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Per-file outcomes in submission order
    #[must_use]
    pub fn outcomes(&self) -> &[FileOutcome] {
        &self.outcomes
    }

    /// Hash of the requirement set, fixed when processing began
    #[must_use]
    pub fn requirement_hash(&self) -> Option<&str> {
        self.requirement_hash.as_deref()
    }

    /// Run-level verdict; only set on COMPLETED runs
    #[must_use]
    pub fn pass(&self) -> Option<bool> {
        self.pass
    }

    /// Diagnostic annotation (cancellation, storage failure)
    #[must_use]
    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    /// Creation timestamp
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time the run reached a terminal state
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Validate an event against the current state without applying it
    ///
    /// # Errors
    ///
    /// See [`transition`].
    pub fn check(&self, event: RunEvent) -> Result<RunState> {
        transition(self.state, event)
    }

    /// CREATED → PROCESSING, pinning the requirement hash
    pub(crate) fn begin(&mut self, requirement_hash: String) -> Result<()> {
        self.state = transition(self.state, RunEvent::Begin)?;
        self.requirement_hash = Some(requirement_hash);
        Ok(())
    }

    /// PROCESSING → terminal, attaching every outcome in one step
    pub(crate) fn resolve(&mut self, resolution: Resolution) -> Result<()> {
        let next = transition(self.state, resolution.event)?;
        self.state = next;
        self.outcomes = resolution.outcomes;
        self.pass = resolution.pass;
        self.annotation = resolution.annotation;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Everything applied to a run at its terminal transition
#[derive(Debug, Clone)]
pub(crate) struct Resolution {
    pub(crate) event: RunEvent,
    pub(crate) outcomes: Vec<FileOutcome>,
    pub(crate) pass: Option<bool>,
    pub(crate) annotation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EVENTS: [RunEvent; 5] = [
        RunEvent::Begin,
        RunEvent::Resolve { evaluated_files: 0 },
        RunEvent::Resolve { evaluated_files: 2 },
        RunEvent::Cancel,
        RunEvent::InfrastructureFailure,
    ];

    #[test]
    fn test_happy_path() {
        let s = transition(RunState::Created, RunEvent::Begin).unwrap();
        assert_eq!(s, RunState::Processing);
        let s = transition(s, RunEvent::Resolve { evaluated_files: 1 }).unwrap();
        assert_eq!(s, RunState::Completed);
    }

    #[test]
    fn test_total_load_failure_fails_run() {
        let s = transition(RunState::Processing, RunEvent::Resolve { evaluated_files: 0 });
        assert_eq!(s.unwrap(), RunState::Failed);
    }

    #[test]
    fn test_cancel_and_infrastructure_fail_run() {
        assert_eq!(
            transition(RunState::Processing, RunEvent::Cancel).unwrap(),
            RunState::Failed
        );
        assert_eq!(
            transition(RunState::Processing, RunEvent::InfrastructureFailure).unwrap(),
            RunState::Failed
        );
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        for state in [RunState::Completed, RunState::Failed] {
            for event in ALL_EVENTS {
                let err = transition(state, event).unwrap_err();
                assert!(matches!(err, Error::ImmutableState { .. }));
            }
        }
    }

    #[test]
    fn test_out_of_order_events_rejected() {
        assert!(matches!(
            transition(RunState::Created, RunEvent::Resolve { evaluated_files: 1 }),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(matches!(
            transition(RunState::Processing, RunEvent::Begin),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_run_resolve_attaches_outcomes_once() {
        let mut run = TestRun::new("run-1", Vec::new());
        assert_eq!(run.state(), RunState::Created);
        run.begin("hash".to_string()).unwrap();
        assert_eq!(run.requirement_hash(), Some("hash"));

        run.resolve(Resolution {
            event: RunEvent::Cancel,
            outcomes: Vec::new(),
            pass: None,
            annotation: Some(INCOMPLETE_CANCELLED.to_string()),
        })
        .unwrap();
        assert_eq!(run.state(), RunState::Failed);
        assert!(run.finished_at().is_some());

        let again = run.resolve(Resolution {
            event: RunEvent::Resolve { evaluated_files: 1 },
            outcomes: Vec::new(),
            pass: Some(true),
            annotation: None,
        });
        assert!(matches!(again, Err(Error::ImmutableState { .. })));
        assert_eq!(run.pass(), None);
        assert_eq!(run.annotation(), Some(INCOMPLETE_CANCELLED));
    }

    #[test]
    fn test_state_serde() {
        assert_eq!(
            serde_json::to_string(&RunState::Processing).unwrap(),
            "\"processing\""
        );
    }
}
