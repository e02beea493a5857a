//! Requirement sets: metric limits and pass policy
//!
//! Requirement sets are authored in YAML or JSON. Their identity is a
//! SHA-256 over a canonical JSON form (fixed field order, sorted path
//! labels, free-text descriptions excluded) so the same limits always hash
//! to the same value.

use crate::error::{Error, Result};
use crate::metadata::PathLabel;
use crate::metrics::{FrequencyBand, MetricKind};
use crate::network::SParam;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Highest port index any supported network can have
pub const MAX_PORT: usize = 4;

/// How a band slice is reduced to one number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Arithmetic mean
    Avg,
    /// max − min
    #[serde(rename = "pkpk", alias = "peak_to_peak")]
    PeakToPeak,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::PeakToPeak => "pkpk",
        })
    }
}

/// Comparison between aggregate and limit
///
/// `Le`/`Ge` are closed bounds (equality passes); `Lt`/`Gt` are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// aggregate <= limit
    #[serde(rename = "<=", alias = "le")]
    Le,
    /// aggregate >= limit
    #[serde(rename = ">=", alias = "ge")]
    Ge,
    /// aggregate < limit
    #[serde(rename = "<", alias = "lt")]
    Lt,
    /// aggregate > limit
    #[serde(rename = ">", alias = "gt")]
    Gt,
}

impl Operator {
    /// Apply the comparison; NaN never satisfies any operator
    #[must_use]
    pub fn holds(&self, value: f64, limit: f64) -> bool {
        match self {
            Self::Le => value <= limit,
            Self::Ge => value >= limit,
            Self::Lt => value < limit,
            Self::Gt => value > limit,
        }
    }

    /// Symbol form
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One pass/fail requirement on a metric over a band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLimit {
    /// Metric to evaluate; `gain_flatness` evaluates gain peak-to-peak
    pub metric: MetricKind,
    /// Source S-parameter
    pub parameter: SParam,
    /// Reduction over the band
    pub aggregation: Aggregation,
    /// Comparison operator
    pub operator: Operator,
    /// Limit value
    pub value: f64,
    /// Evaluation band
    pub band: FrequencyBand,
    /// Free-text description, not part of the content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetricLimit {
    /// Create a limit without description
    #[must_use]
    pub const fn new(
        metric: MetricKind,
        parameter: SParam,
        aggregation: Aggregation,
        operator: Operator,
        value: f64,
        band: FrequencyBand,
    ) -> Self {
        Self {
            metric,
            parameter,
            aggregation,
            operator,
            value,
            band,
            description: None,
        }
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Display name: description if present, else `metric(param)`
    #[must_use]
    pub fn name(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{}({})", self.metric, self.parameter))
    }

    fn validate(&self, idx: usize, errors: &mut Vec<String>) {
        let at = format!("limit #{} ({})", idx + 1, self.name());
        let FrequencyBand { start_hz, end_hz } = self.band;
        if !start_hz.is_finite() || !end_hz.is_finite() {
            errors.push(format!("{at}: band bounds must be finite"));
        } else if start_hz < 0.0 {
            errors.push(format!("{at}: band start must not be negative"));
        } else if start_hz > end_hz {
            errors.push(format!("{at}: band start {start_hz} Hz exceeds end {end_hz} Hz"));
        }
        if !self.value.is_finite() {
            errors.push(format!("{at}: limit value must be finite"));
        }
        if self.parameter.i > MAX_PORT || self.parameter.j > MAX_PORT {
            errors.push(format!(
                "{at}: parameter {} exceeds {MAX_PORT} ports",
                self.parameter
            ));
        }
        match self.metric {
            MetricKind::Vswr | MetricKind::ReturnLoss if !self.parameter.is_reflection() => {
                errors.push(format!(
                    "{at}: {} requires a reflection parameter, got {}",
                    self.metric, self.parameter
                ));
            }
            MetricKind::FlatnessSource if self.aggregation != Aggregation::PeakToPeak => {
                errors.push(format!("{at}: gain_flatness requires pkpk aggregation"));
            }
            _ => {}
        }
    }
}

/// Rule deciding the run-level verdict from per-file verdicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassPolicy {
    /// Every evaluated file must pass
    #[serde(default = "default_true")]
    pub all_files_must_pass: bool,
    /// Paths that need at least one passing file when `all_files_must_pass` is false
    #[serde(default)]
    pub required_path_labels: BTreeSet<PathLabel>,
}

const fn default_true() -> bool {
    true
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self {
            all_files_must_pass: true,
            required_path_labels: BTreeSet::new(),
        }
    }
}

impl PassPolicy {
    /// Policy requiring a passing file on each listed path
    #[must_use]
    pub fn per_path(labels: impl IntoIterator<Item = PathLabel>) -> Self {
        Self {
            all_files_must_pass: false,
            required_path_labels: labels.into_iter().collect(),
        }
    }
}

/// Non-fatal authoring issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Human-readable message
    pub message: String,
}

/// Ordered metric limits plus pass policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    /// Name
    pub name: String,
    /// Test type the set applies to
    #[serde(default = "default_test_type")]
    pub test_type: String,
    /// Limits, evaluated in this order
    #[serde(default)]
    pub limits: Vec<MetricLimit>,
    /// Run-level rollup rule
    #[serde(default)]
    pub pass_policy: PassPolicy,
}

fn default_test_type() -> String {
    "s_parameter".to_string()
}

#[derive(Serialize)]
struct CanonicalLimit {
    metric: MetricKind,
    parameter: SParam,
    aggregation: Aggregation,
    operator: Operator,
    value: f64,
    start_hz: f64,
    end_hz: f64,
}

#[derive(Serialize)]
struct CanonicalSet<'a> {
    name: &'a str,
    test_type: &'a str,
    limits: Vec<CanonicalLimit>,
    all_files_must_pass: bool,
    required_path_labels: &'a BTreeSet<PathLabel>,
}

/// Fold `-0.0` into `0.0` so equal limits serialize identically
fn canonical_f64(v: f64) -> f64 {
    v + 0.0
}

impl RequirementSet {
    /// Create an empty set with the default policy
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test_type: default_test_type(),
            limits: Vec::new(),
            pass_policy: PassPolicy::default(),
        }
    }

    /// Append a limit
    #[must_use]
    pub fn with_limit(mut self, limit: MetricLimit) -> Self {
        self.limits.push(limit);
        self
    }

    /// Replace the pass policy
    #[must_use]
    pub fn with_policy(mut self, policy: PassPolicy) -> Self {
        self.pass_policy = policy;
        self
    }

    /// Canonical JSON used for hashing
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a numeric field is not representable.
    pub fn canonical_json(&self) -> Result<String> {
        let canonical = CanonicalSet {
            name: &self.name,
            test_type: &self.test_type,
            limits: self
                .limits
                .iter()
                .map(|l| CanonicalLimit {
                    metric: l.metric,
                    parameter: l.parameter,
                    aggregation: l.aggregation,
                    operator: l.operator,
                    value: canonical_f64(l.value),
                    start_hz: canonical_f64(l.band.start_hz),
                    end_hz: canonical_f64(l.band.end_hz),
                })
                .collect(),
            all_files_must_pass: self.pass_policy.all_files_must_pass,
            required_path_labels: &self.pass_policy.required_path_labels,
        };
        Ok(serde_json::to_string(&canonical)?)
    }

    /// SHA-256 hex digest of [`Self::canonical_json`]
    ///
    /// # Errors
    ///
    /// Propagates canonical serialization errors.
    pub fn content_hash(&self) -> Result<String> {
        let json = self.canonical_json()?;
        let digest = Sha256::digest(json.as_bytes());
        Ok(format!("{digest:x}"))
    }

    /// Distinct `(metric, parameter)` pairs referenced by the limits, in first-use order
    #[must_use]
    pub fn referenced_series(&self) -> Vec<(MetricKind, SParam)> {
        let mut seen = Vec::new();
        for limit in &self.limits {
            let key = (limit.metric, limit.parameter);
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }

    /// Check the set for authoring errors and return non-fatal warnings
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every structural problem found.
    pub fn validate(&self) -> Result<Vec<ValidationWarning>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        for (idx, limit) in self.limits.iter().enumerate() {
            limit.validate(idx, &mut errors);
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors.join("; ")));
        }

        let mut warnings = Vec::new();
        if self.limits.is_empty() {
            warnings.push(ValidationWarning {
                message: "requirement set has no limits; every file passes".to_string(),
            });
        }
        let policy = &self.pass_policy;
        if !policy.all_files_must_pass && policy.required_path_labels.is_empty() {
            warnings.push(ValidationWarning {
                message: "all_files_must_pass is false and no path labels are required; \
                          the run-level verdict always passes"
                    .to_string(),
            });
        }
        for w in &warnings {
            tracing::warn!(requirement_set = %self.name, "{}", w.message);
        }
        Ok(warnings)
    }

    /// Parse from YAML
    ///
    /// # Errors
    ///
    /// Returns a YAML error for malformed input.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns a YAML error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse from JSON
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns a serialization error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
