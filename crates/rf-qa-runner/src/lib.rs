//! RF QA Runner
//!
//! Test-run orchestration for S-parameter compliance checks.
//! Per-file sub-pipelines run in parallel; the run itself moves through an
//! immutable-once-terminal state machine and is committed through a storage
//! port.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow common patterns
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::cast_possible_truncation))]
#![cfg_attr(test, allow(clippy::redundant_clone))]

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod parallel;
pub mod pipeline;
pub mod state;
pub mod storage;

pub use config::RunnerConfig;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use orchestrator::Orchestrator;
pub use parallel::{CancellationToken, ParallelExecutor, ParallelResult};
pub use pipeline::{EvaluatedFile, FileInput, FileOutcome, LoadFailure, RunVerdict, process_file};
pub use state::{INCOMPLETE_CANCELLED, RunEvent, RunState, TestRun, transition};
pub use storage::{InMemoryStorage, RunStorage, StorageError, StorageResult};
