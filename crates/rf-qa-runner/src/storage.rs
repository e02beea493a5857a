//! Storage port for test runs
//!
//! The orchestrator only talks to storage through [`RunStorage`]. The
//! in-memory implementation doubles as the test backend and as an embedded
//! store: written verdicts stay staged until the run's state turns terminal,
//! so readers never observe a half-resolved run.

use crate::pipeline::RunVerdict;
use crate::state::RunState;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No file behind the locator
    #[error("File not found: {0}")]
    NotFound(String),

    /// Compare-and-set on run state lost
    #[error("State conflict for run {run_id}: expected {expected}, found {actual}")]
    Conflict {
        /// Run identifier
        run_id: String,
        /// State the caller expected
        expected: RunState,
        /// State actually stored
        actual: RunState,
    },

    /// Backend refused or failed the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Operations the orchestrator needs from persistent storage
pub trait RunStorage: Send + Sync {
    /// Raw bytes of an uploaded file
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown locators, `Unavailable` on backend failure.
    fn read_file(&self, locator: &str) -> StorageResult<Vec<u8>>;

    /// Record the verdict of a run
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn write_result(&self, run_id: &str, verdict: &RunVerdict) -> StorageResult<()>;

    /// Move a run from `from` to `to`; fails with `Conflict` if the stored
    /// state is not `from`
    ///
    /// # Errors
    ///
    /// `Conflict` on state mismatch, `Unavailable` on backend failure.
    fn transition_run_state(&self, run_id: &str, from: RunState, to: RunState)
    -> StorageResult<()>;
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, Vec<u8>>,
    states: HashMap<String, RunState>,
    staged: HashMap<String, RunVerdict>,
    committed: HashMap<String, Vec<RunVerdict>>,
}

/// In-memory [`RunStorage`]
///
/// Runs absent from the store are treated as CREATED. Every terminal commit
/// is appended to the run's history, so re-evaluations keep their records.
/// A staged verdict is committed only by a transition to the state it was
/// written for.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
    fail_writes: bool,
    fail_reads: bool,
}

impl InMemoryStorage {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `write_result` fail with `Unavailable`
    #[must_use]
    pub fn with_write_failure(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Make every `read_file` fail with `Unavailable`
    #[must_use]
    pub fn with_read_failure(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Store file bytes under `locator`
    ///
    /// # Errors
    ///
    /// `Unavailable` if the store lock is poisoned.
    pub fn put_file(&self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) -> StorageResult<()> {
        self.lock()?.files.insert(locator.into(), bytes.into());
        Ok(())
    }

    /// Stored state of a run, if it was ever transitioned
    #[must_use]
    pub fn run_state(&self, run_id: &str) -> Option<RunState> {
        self.lock().ok()?.states.get(run_id).copied()
    }

    /// Most recent committed verdict of a run
    #[must_use]
    pub fn committed(&self, run_id: &str) -> Option<RunVerdict> {
        self.lock().ok()?.committed.get(run_id)?.last().cloned()
    }

    /// Every committed verdict of a run, oldest first
    #[must_use]
    pub fn history(&self, run_id: &str) -> Vec<RunVerdict> {
        self.lock()
            .ok()
            .and_then(|inner| inner.committed.get(run_id).cloned())
            .unwrap_or_default()
    }

    /// Forget the stored state of a run so it can be evaluated again
    ///
    /// Committed history is kept.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the store lock is poisoned.
    pub fn reset_run(&self, run_id: &str) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner.states.remove(run_id);
        inner.staged.remove(run_id);
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }
}

impl RunStorage for InMemoryStorage {
    fn read_file(&self, locator: &str) -> StorageResult<Vec<u8>> {
        if self.fail_reads {
            return Err(StorageError::Unavailable(format!("read of {locator} refused")));
        }
        self.lock()?
            .files
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }

    fn write_result(&self, run_id: &str, verdict: &RunVerdict) -> StorageResult<()> {
        if self.fail_writes {
            return Err(StorageError::Unavailable(format!(
                "write of run {run_id} refused"
            )));
        }
        self.lock()?
            .staged
            .insert(run_id.to_string(), verdict.clone());
        Ok(())
    }

    fn transition_run_state(
        &self,
        run_id: &str,
        from: RunState,
        to: RunState,
    ) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let actual = inner
            .states
            .get(run_id)
            .copied()
            .unwrap_or(RunState::Created);
        if actual != from {
            return Err(StorageError::Conflict {
                run_id: run_id.to_string(),
                expected: from,
                actual,
            });
        }
        inner.states.insert(run_id.to_string(), to);
        if to.is_terminal() {
            // A verdict staged for a different terminal state is stale
            match inner.staged.remove(run_id) {
                Some(verdict) if verdict.state == to => inner
                    .committed
                    .entry(run_id.to_string())
                    .or_default()
                    .push(verdict),
                Some(verdict) => warn!(
                    run_id,
                    staged = %verdict.state,
                    actual = %to,
                    "discarding staged verdict"
                ),
                None => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(run_id: &str) -> RunVerdict {
        RunVerdict {
            run_id: run_id.to_string(),
            state: RunState::Completed,
            requirement_hash: "abc".to_string(),
            outcomes: Vec::new(),
            pass: Some(true),
            annotation: None,
        }
    }

    #[test]
    fn test_read_file_roundtrip() {
        let storage = InMemoryStorage::new();
        storage.put_file("a.s2p", b"# GHZ S MA R 50".to_vec()).unwrap();
        assert_eq!(storage.read_file("a.s2p").unwrap(), b"# GHZ S MA R 50");
    }

    #[test]
    fn test_read_missing_file() {
        let storage = InMemoryStorage::new();
        assert_eq!(
            storage.read_file("nope"),
            Err(StorageError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_transition_conflict() {
        let storage = InMemoryStorage::new();
        storage
            .transition_run_state("r1", RunState::Created, RunState::Processing)
            .unwrap();
        let err = storage
            .transition_run_state("r1", RunState::Created, RunState::Processing)
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Conflict {
                actual: RunState::Processing,
                ..
            }
        ));
    }

    #[test]
    fn test_result_staged_until_terminal() {
        let storage = InMemoryStorage::new();
        storage
            .transition_run_state("r1", RunState::Created, RunState::Processing)
            .unwrap();
        storage.write_result("r1", &verdict("r1")).unwrap();
        assert!(storage.committed("r1").is_none());

        storage
            .transition_run_state("r1", RunState::Processing, RunState::Completed)
            .unwrap();
        let committed = storage.committed("r1").unwrap();
        assert_eq!(committed.requirement_hash, "abc");
        assert_eq!(storage.run_state("r1"), Some(RunState::Completed));
    }

    #[test]
    fn test_forced_failure_discards_stale_completed_verdict() {
        let storage = InMemoryStorage::new();
        storage
            .transition_run_state("r1", RunState::Created, RunState::Processing)
            .unwrap();
        storage.write_result("r1", &verdict("r1")).unwrap();
        storage
            .transition_run_state("r1", RunState::Processing, RunState::Failed)
            .unwrap();
        assert_eq!(storage.run_state("r1"), Some(RunState::Failed));
        assert!(storage.committed("r1").is_none());
    }

    #[test]
    fn test_restaged_failure_verdict_is_committed() {
        let storage = InMemoryStorage::new();
        storage
            .transition_run_state("r1", RunState::Created, RunState::Processing)
            .unwrap();
        storage.write_result("r1", &verdict("r1")).unwrap();
        let failed = RunVerdict {
            state: RunState::Failed,
            pass: None,
            annotation: Some("storage failure: x".to_string()),
            ..verdict("r1")
        };
        storage.write_result("r1", &failed).unwrap();
        storage
            .transition_run_state("r1", RunState::Processing, RunState::Failed)
            .unwrap();
        assert_eq!(storage.committed("r1").unwrap(), failed);
    }

    #[test]
    fn test_reset_keeps_history() {
        let storage = InMemoryStorage::new();
        for _ in 0..2 {
            storage
                .transition_run_state("r1", RunState::Created, RunState::Processing)
                .unwrap();
            storage.write_result("r1", &verdict("r1")).unwrap();
            storage
                .transition_run_state("r1", RunState::Processing, RunState::Completed)
                .unwrap();
            storage.reset_run("r1").unwrap();
        }
        assert_eq!(storage.history("r1").len(), 2);
        assert_eq!(storage.run_state("r1"), None);
    }

    #[test]
    fn test_injected_failures() {
        let storage = InMemoryStorage::new().with_write_failure().with_read_failure();
        assert!(matches!(
            storage.write_result("r1", &verdict("r1")),
            Err(StorageError::Unavailable(_))
        ));
        assert!(matches!(
            storage.read_file("a"),
            Err(StorageError::Unavailable(_))
        ));
    }
}
