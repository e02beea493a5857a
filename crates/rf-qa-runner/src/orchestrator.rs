//! Pipeline orchestrator
//!
//! Sequences a [`TestRun`] through its lifecycle:
//!
//! 1. validate the requirement set and pin its content hash
//! 2. CREATED → PROCESSING, mirrored to storage
//! 3. per-file sub-pipelines in parallel
//! 4. reassemble outcomes in submission order, derive the terminal state
//! 5. commit: `write_result`, then `transition_run_state`
//!
//! A storage backend failure while reading inputs or during commit forces
//! the run to FAILED: a failure verdict replaces whatever was staged, and the
//! [`StorageError`] propagates to the caller.

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::parallel::{CancellationToken, ParallelExecutor};
use crate::pipeline::{FileInput, FileOutcome, RunVerdict, process_file};
use crate::state::{INCOMPLETE_CANCELLED, Resolution, RunEvent, RunState, TestRun, transition};
use crate::storage::{RunStorage, StorageError, StorageResult};
use rf_qa_core::{FileVerdict, RequirementSet, compliance};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn};

/// Drives test runs against a storage backend
#[derive(Debug)]
pub struct Orchestrator<S: RunStorage> {
    storage: Arc<S>,
    config: RunnerConfig,
    executor: ParallelExecutor,
}

impl<S: RunStorage> Orchestrator<S> {
    /// Create an orchestrator
    ///
    /// # Errors
    ///
    /// Invalid configuration.
    pub fn new(storage: Arc<S>, config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        let executor = ParallelExecutor::new(config.num_workers)?;
        Ok(Self {
            storage,
            config,
            executor,
        })
    }

    /// Storage backend
    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// New run in CREATED
    #[must_use]
    pub fn create_run(&self, run_id: impl Into<String>, inputs: Vec<FileInput>) -> TestRun {
        TestRun::new(run_id, inputs)
    }

    /// Execute a run to completion
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::execute_with_cancel`].
    pub fn execute(&self, run: &mut TestRun, requirements: &RequirementSet) -> Result<RunVerdict> {
        self.execute_with_cancel(run, requirements, &CancellationToken::new())
    }

    /// Execute a run, stopping early if `cancel` fires or the configured
    /// deadline passes
    ///
    /// A cancelled run ends FAILED with the outcomes of the files that did
    /// finish.
    ///
    /// # Errors
    ///
    /// - `ImmutableState` / `InvalidTransition` if the run is not CREATED
    /// - `Core` if the requirement set fails validation
    /// - `Storage` if storage rejects a transition or the result, or a file
    ///   read fails for any reason other than the file being absent
    pub fn execute_with_cancel(
        &self,
        run: &mut TestRun,
        requirements: &RequirementSet,
        cancel: &CancellationToken,
    ) -> Result<RunVerdict> {
        let span = info_span!("run", run_id = %run.run_id());
        let _guard = span.enter();

        run.check(RunEvent::Begin)?;
        requirements.validate()?;
        let requirement_hash = requirements.content_hash()?;

        self.storage
            .transition_run_state(run.run_id(), RunState::Created, RunState::Processing)?;
        run.begin(requirement_hash.clone())?;
        info!(
            files = run.inputs().len(),
            requirements = %requirements.name,
            hash = %requirement_hash,
            "run processing"
        );

        let deadline = self.config.deadline().map(|d| Instant::now() + d);
        let storage = self.storage.as_ref();
        let result = self
            .executor
            .execute(run.inputs(), cancel, deadline, |_, input| {
                process_file(storage, input, requirements, &requirement_hash)
            });

        let interrupted = !result.is_complete() || cancel.is_cancelled();
        let deadline_exceeded = result.deadline_exceeded;
        let duration_ms = result.duration_ms;
        let mut outcomes = Vec::with_capacity(run.inputs().len());
        let mut read_error = None;
        for slot in result.into_completed() {
            match slot {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    read_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = read_error {
            error!(error = %e, "storage failed while reading inputs");
            return Err(self.fail_run(run, requirement_hash, outcomes, e));
        }

        let resolution = resolve(outcomes, requirements, interrupted, deadline_exceeded);
        let next = transition(run.state(), resolution.event)?;

        let verdict = RunVerdict {
            run_id: run.run_id().to_string(),
            state: next,
            requirement_hash: requirement_hash.clone(),
            outcomes: resolution.outcomes.clone(),
            pass: resolution.pass,
            annotation: resolution.annotation.clone(),
        };

        if let Err(e) = self.commit(&verdict) {
            error!(error = %e, "commit failed; forcing run to failed");
            return Err(self.fail_run(run, requirement_hash, resolution.outcomes, e));
        }

        run.resolve(resolution)?;
        info!(
            state = %run.state(),
            pass = ?run.pass(),
            evaluated = verdict.evaluated_count(),
            load_failed = verdict.load_failed_count(),
            duration_ms,
            "run resolved"
        );
        Ok(verdict)
    }

    /// Resolve `run` as FAILED after an infrastructure error and record that
    /// in storage as far as storage still allows
    fn fail_run(
        &self,
        run: &mut TestRun,
        requirement_hash: String,
        outcomes: Vec<FileOutcome>,
        cause: StorageError,
    ) -> Error {
        let annotation = format!("storage failure: {cause}");
        let verdict = RunVerdict {
            run_id: run.run_id().to_string(),
            state: RunState::Failed,
            requirement_hash,
            outcomes,
            pass: None,
            annotation: Some(annotation),
        };
        if let Err(e) = self.storage.write_result(run.run_id(), &verdict) {
            warn!(error = %e, "could not stage failure verdict");
        }
        if let Err(e) =
            self.storage
                .transition_run_state(run.run_id(), RunState::Processing, RunState::Failed)
        {
            warn!(error = %e, "could not record failed state");
        }
        let resolved = run.resolve(Resolution {
            event: RunEvent::InfrastructureFailure,
            outcomes: verdict.outcomes,
            pass: None,
            annotation: verdict.annotation,
        });
        match resolved {
            Ok(()) => Error::Storage(cause),
            Err(e) => e,
        }
    }

    fn commit(&self, verdict: &RunVerdict) -> StorageResult<()> {
        self.storage.write_result(&verdict.run_id, verdict)?;
        self.storage
            .transition_run_state(&verdict.run_id, RunState::Processing, verdict.state)
    }
}

fn resolve(
    outcomes: Vec<FileOutcome>,
    requirements: &RequirementSet,
    interrupted: bool,
    deadline_exceeded: bool,
) -> Resolution {
    if interrupted {
        let annotation = if deadline_exceeded {
            format!("{INCOMPLETE_CANCELLED} (deadline exceeded)")
        } else {
            INCOMPLETE_CANCELLED.to_string()
        };
        warn!(completed = outcomes.len(), %annotation, "run interrupted");
        return Resolution {
            event: RunEvent::Cancel,
            outcomes,
            pass: None,
            annotation: Some(annotation),
        };
    }

    let verdicts: Vec<FileVerdict> = outcomes.iter().filter_map(FileOutcome::file_verdict).collect();
    if verdicts.is_empty() {
        return Resolution {
            event: RunEvent::Resolve { evaluated_files: 0 },
            outcomes,
            pass: None,
            annotation: Some("no file could be loaded".to_string()),
        };
    }
    let pass = compliance::rollup(&requirements.pass_policy, &verdicts);
    Resolution {
        event: RunEvent::Resolve {
            evaluated_files: verdicts.len(),
        },
        outcomes,
        pass: Some(pass),
        annotation: None,
    }
}
