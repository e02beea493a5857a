//! rf-qa
//!
//! Scattering-parameter compliance evaluation for RF test runs.
//!
//! ```no_run
//! use rf_qa::core::RequirementSet;
//! use rf_qa::runner::{FileInput, InMemoryStorage, Orchestrator, RunnerConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(InMemoryStorage::new());
//! storage.put_file("SN0042_PRI_L123456_AMB_20240115.s2p", std::fs::read("meas.s2p")?)?;
//!
//! let requirements = RequirementSet::from_yaml(&std::fs::read_to_string("reqs.yaml")?)?;
//! let orchestrator = Orchestrator::new(storage, RunnerConfig::default())?;
//! let mut run = orchestrator.create_run(
//!     "run-1",
//!     vec![FileInput::new("SN0042_PRI_L123456_AMB_20240115.s2p")],
//! );
//! let verdict = orchestrator.execute(&mut run, &requirements)?;
//! println!("{:?} pass={:?}", verdict.state, verdict.pass);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use rf_qa_core as core;
pub use rf_qa_runner as runner;

pub use rf_qa_core::{ComplianceResult, Network, RequirementSet, parse_filename};
pub use rf_qa_runner::{FileInput, FileOutcome, Orchestrator, RunState, RunVerdict, TestRun};
