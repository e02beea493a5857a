//! Band aggregation and compliance evaluation
//!
//! Every limit of a requirement set is evaluated, in declared order, with
//! no short-circuit, so a failing file reports its complete set of
//! violations. An empty band slice is a failing verdict ("no data points in
//! band"), never an error.

use crate::error::Error;
use crate::metadata::PathLabel;
use crate::metrics::{self, MetricKind, MetricSeries};
use crate::network::{Network, SParam};
use crate::requirements::{Aggregation, MetricLimit, PassPolicy, RequirementSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Reason prefix for limits whose band selects no samples
pub const NO_DATA_IN_BAND: &str = "no data points in band";

/// Computed series keyed by `(metric, parameter)`; failures keep their error
pub type SeriesSet = BTreeMap<(MetricKind, SParam), Result<MetricSeries, Error>>;

/// Outcome of one limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitVerdict {
    /// The limit evaluated
    pub limit: MetricLimit,
    /// Aggregate over the band; `None` when nothing could be aggregated
    pub aggregate: Option<f64>,
    /// Whether the limit holds
    pub pass: bool,
    /// Human-readable explanation
    pub reason: String,
}

impl LimitVerdict {
    fn failed(limit: &MetricLimit, reason: String) -> Self {
        Self {
            limit: limit.clone(),
            aggregate: None,
            pass: false,
            reason,
        }
    }
}

/// Compliance of one file against one requirement set
///
/// Each evaluation creates a new record with its own id; records are never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    /// Unique record id
    pub id: Uuid,
    /// Content hash of the requirement set used
    pub requirement_hash: String,
    /// Evaluation timestamp
    pub evaluated_at: DateTime<Utc>,
    /// Per-limit verdicts in declared order
    pub verdicts: Vec<LimitVerdict>,
    /// AND of all verdicts
    pub pass: bool,
}

impl ComplianceResult {
    /// Verdicts that failed
    #[must_use]
    pub fn failures(&self) -> Vec<&LimitVerdict> {
        self.verdicts.iter().filter(|v| !v.pass).collect()
    }

    /// Failure reasons in declared order
    #[must_use]
    pub fn failure_reasons(&self) -> Vec<&str> {
        self.verdicts
            .iter()
            .filter(|v| !v.pass)
            .map(|v| v.reason.as_str())
            .collect()
    }
}

/// Reduce a non-empty slice
#[must_use]
pub fn aggregate(values: &[f64], mode: Aggregation) -> f64 {
    match mode {
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Avg => values.iter().sum::<f64>() / values.len() as f64,
        Aggregation::PeakToPeak => metrics::peak_to_peak(values),
    }
}

/// Evaluate one series against one limit
#[must_use]
pub fn evaluate(series: &MetricSeries, limit: &MetricLimit) -> LimitVerdict {
    let band = &limit.band;
    if limit.metric == MetricKind::FlatnessSource && limit.aggregation != Aggregation::PeakToPeak {
        return LimitVerdict::failed(
            limit,
            format!(
                "{} requires pkpk aggregation, got {}",
                limit.metric, limit.aggregation
            ),
        );
    }
    let aggregated = if limit.metric == MetricKind::FlatnessSource {
        match metrics::flatness(series, band) {
            Ok(v) => Some(v),
            Err(Error::EmptyBand { .. }) => None,
            Err(e) => return LimitVerdict::failed(limit, e.to_string()),
        }
    } else {
        let values = series.slice(band);
        (!values.is_empty()).then(|| aggregate(&values, limit.aggregation))
    };

    let Some(value) = aggregated else {
        return LimitVerdict::failed(limit, format!("{NO_DATA_IN_BAND} {band}"));
    };

    let pass = limit.operator.holds(value, limit.value);
    let verb = if pass { "satisfies" } else { "violates" };
    let reason = format!(
        "{} {} = {value:.3} {verb} {} {} over band {band}",
        limit.metric, limit.aggregation, limit.operator, limit.value
    );
    LimitVerdict {
        limit: limit.clone(),
        aggregate: Some(value),
        pass,
        reason,
    }
}

/// Compute every series referenced by `requirements`
///
/// Failures (e.g. a parameter outside the network's ports) are kept per key
/// so they surface as failing verdicts instead of aborting the file.
#[must_use]
pub fn compute_series(network: &Network, requirements: &RequirementSet) -> SeriesSet {
    requirements
        .referenced_series()
        .into_iter()
        .map(|(kind, param)| {
            ((kind, param), metrics::compute(kind, network, param))
        })
        .collect()
}

/// Evaluate all limits of `requirements` against precomputed series
#[must_use]
pub fn evaluate_file(
    series: &SeriesSet,
    requirements: &RequirementSet,
    requirement_hash: &str,
) -> ComplianceResult {
    let verdicts: Vec<LimitVerdict> = requirements
        .limits
        .iter()
        .map(|limit| match series.get(&(limit.metric, limit.parameter)) {
            Some(Ok(s)) => evaluate(s, limit),
            Some(Err(e)) => {
                LimitVerdict::failed(limit, format!("metric computation failed: {e}"))
            }
            None => LimitVerdict::failed(
                limit,
                format!("{}({}) was not computed", limit.metric, limit.parameter),
            ),
        })
        .collect();
    let pass = verdicts.iter().all(|v| v.pass);
    ComplianceResult {
        id: Uuid::new_v4(),
        requirement_hash: requirement_hash.to_string(),
        evaluated_at: Utc::now(),
        verdicts,
        pass,
    }
}

/// Compute and evaluate in one step
#[must_use]
pub fn evaluate_network(
    network: &Network,
    requirements: &RequirementSet,
    requirement_hash: &str,
) -> ComplianceResult {
    evaluate_file(
        &compute_series(network, requirements),
        requirements,
        requirement_hash,
    )
}

/// File-level verdict as seen by the pass policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVerdict {
    /// Effective path label, if any
    pub path: Option<PathLabel>,
    /// File-level pass
    pub pass: bool,
}

/// Run-level verdict under `policy`
///
/// With `all_files_must_pass`, every file must pass. Otherwise each required
/// label needs at least one passing file carrying it; unlabeled files and
/// labels outside the required set are ignored.
#[must_use]
pub fn rollup(policy: &PassPolicy, files: &[FileVerdict]) -> bool {
    if policy.all_files_must_pass {
        return files.iter().all(|f| f.pass);
    }
    policy
        .required_path_labels
        .iter()
        .all(|label| files.iter().any(|f| f.pass && f.path == Some(*label)))
}
