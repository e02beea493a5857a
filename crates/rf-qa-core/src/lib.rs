//! RF QA Core
//!
//! Scattering-parameter measurement analysis:
//!
//! - [`metadata`]: filename token extraction (serial, path, lot, condition, date)
//! - [`touchstone`]: Touchstone text to [`Network`]
//! - [`metrics`]: gain, VSWR, return loss and flatness series
//! - [`requirements`]: metric limits, pass policy, canonical content hash
//! - [`compliance`]: band aggregation, limit comparison, run-level rollup
//!
//! Everything here is pure apart from tracing output.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Allow common patterns
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod compliance;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod network;
pub mod requirements;
pub mod touchstone;

pub use compliance::{
    ComplianceResult, FileVerdict, LimitVerdict, NO_DATA_IN_BAND, SeriesSet, compute_series,
    evaluate, evaluate_file, evaluate_network, rollup,
};
pub use error::{Error, Result};
pub use metadata::{
    Condition, EffectiveMetadata, MetadataOverrides, ParsedMetadata, PathLabel, parse_filename,
};
pub use metrics::{FrequencyBand, MetricKind, MetricSeries};
pub use network::{Network, SParam};
pub use requirements::{
    Aggregation, MetricLimit, Operator, PassPolicy, RequirementSet, ValidationWarning,
};
