//! Per-file sub-pipeline
//!
//! read bytes → parse filename → merge overrides → load network →
//! compute referenced series → evaluate limits.
//!
//! A missing file, undecodable bytes or a malformed network end the file as
//! [`FileOutcome::LoadFailed`] without aborting the run. A storage backend
//! failure is not a property of the file and is returned as an error.

use crate::state::RunState;
use crate::storage::{RunStorage, StorageError, StorageResult};
use rf_qa_core::{
    ComplianceResult, EffectiveMetadata, FileVerdict, MetadataOverrides, MetricSeries, Network,
    ParsedMetadata, RequirementSet, compliance, parse_filename, touchstone,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One submitted measurement file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    /// Original filename; drives metadata parsing and the port count
    pub filename: String,
    /// Storage locator for the raw bytes
    pub locator: String,
    /// Caller-supplied metadata corrections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<MetadataOverrides>,
}

impl FileInput {
    /// Input whose locator is its filename
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            locator: filename.clone(),
            filename,
            overrides: None,
        }
    }

    /// Use a distinct storage locator
    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = locator.into();
        self
    }

    /// Attach metadata overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: MetadataOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// A file that reached evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedFile {
    /// Filename
    pub filename: String,
    /// Metadata as parsed from the filename
    pub parsed: ParsedMetadata,
    /// Metadata after overrides
    pub metadata: EffectiveMetadata,
    /// Port count of the loaded network
    pub ports: usize,
    /// Number of frequency points
    pub points: usize,
    /// Successfully computed series, ordered by kind then parameter
    pub series: Vec<MetricSeries>,
    /// Per-limit verdicts
    pub compliance: ComplianceResult,
}

/// A file that could not be read or loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Filename
    pub filename: String,
    /// Metadata as parsed from the filename
    pub parsed: ParsedMetadata,
    /// Human-readable cause
    pub error: String,
}

/// Result of one per-file sub-pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Network loaded and evaluated
    Evaluated(EvaluatedFile),
    /// Read or load failed; excluded from the run-level verdict
    LoadFailed(LoadFailure),
}

impl FileOutcome {
    /// Filename of the underlying input
    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            Self::Evaluated(f) => &f.filename,
            Self::LoadFailed(f) => &f.filename,
        }
    }

    /// True for [`FileOutcome::Evaluated`]
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Evaluated(_))
    }

    /// Compliance result, if evaluated
    #[must_use]
    pub fn compliance(&self) -> Option<&ComplianceResult> {
        match self {
            Self::Evaluated(f) => Some(&f.compliance),
            Self::LoadFailed(_) => None,
        }
    }

    /// Load error message, if the file failed
    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        match self {
            Self::Evaluated(_) => None,
            Self::LoadFailed(f) => Some(&f.error),
        }
    }

    /// Verdict seen by the pass policy; `None` for load failures
    #[must_use]
    pub fn file_verdict(&self) -> Option<FileVerdict> {
        match self {
            Self::Evaluated(f) => Some(FileVerdict {
                path: f.metadata.path,
                pass: f.compliance.pass,
            }),
            Self::LoadFailed(_) => None,
        }
    }
}

/// What gets written to storage when a run resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunVerdict {
    /// Run identifier
    pub run_id: String,
    /// Terminal state the verdict is committed with
    pub state: RunState,
    /// Hash of the requirement set used for every file
    pub requirement_hash: String,
    /// Per-file outcomes in submission order
    pub outcomes: Vec<FileOutcome>,
    /// Run-level pass over evaluated files; `None` unless COMPLETED
    pub pass: Option<bool>,
    /// Diagnostic annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl RunVerdict {
    /// Number of evaluated files
    #[must_use]
    pub fn evaluated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_evaluated()).count()
    }

    /// Number of files that failed to load
    #[must_use]
    pub fn load_failed_count(&self) -> usize {
        self.outcomes.len() - self.evaluated_count()
    }
}

/// Run one file through the sub-pipeline
///
/// # Errors
///
/// Any storage failure other than `NotFound`; the file itself was never seen.
pub fn process_file<S: RunStorage + ?Sized>(
    storage: &S,
    input: &FileInput,
    requirements: &RequirementSet,
    requirement_hash: &str,
) -> StorageResult<FileOutcome> {
    let parsed = parse_filename(&input.filename);
    let metadata = EffectiveMetadata::resolve(&parsed, input.overrides.as_ref());

    let network = match load_network(storage, input)? {
        Ok(network) => network,
        Err(error) => {
            warn!(file = %input.filename, %error, "load failed");
            return Ok(FileOutcome::LoadFailed(LoadFailure {
                filename: input.filename.clone(),
                parsed,
                error,
            }));
        }
    };

    let series_set = compliance::compute_series(&network, requirements);
    let result = compliance::evaluate_file(&series_set, requirements, requirement_hash);
    debug!(
        file = %input.filename,
        ports = network.nports(),
        points = network.nfreq(),
        pass = result.pass,
        "file evaluated"
    );

    Ok(FileOutcome::Evaluated(EvaluatedFile {
        filename: input.filename.clone(),
        parsed,
        metadata,
        ports: network.nports(),
        points: network.nfreq(),
        series: series_set.into_values().filter_map(Result::ok).collect(),
        compliance: result,
    }))
}

/// Outer error: storage infrastructure. Inner error: the file's own fault.
fn load_network<S: RunStorage + ?Sized>(
    storage: &S,
    input: &FileInput,
) -> StorageResult<Result<Network, String>> {
    let bytes = match storage.read_file(&input.locator) {
        Ok(bytes) => bytes,
        Err(e @ StorageError::NotFound(_)) => return Ok(Err(format!("read failed: {e}"))),
        Err(e) => return Err(e),
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Ok(Err(format!("not valid UTF-8 text: {e}"))),
    };
    Ok(touchstone::load_named(&input.filename, &text).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use rf_qa_core::{
        Aggregation, FrequencyBand, MetricKind, MetricLimit, Operator, PathLabel, SParam,
    };

    const THRU_S2P: &str = "! thru\n# GHZ S MA R 50\n\
        1.0 0.0 0 1.0 0 1.0 0 0.0 0\n\
        2.0 0.0 0 1.0 0 1.0 0 0.0 0\n";

    fn gain_requirements() -> RequirementSet {
        RequirementSet::new("gain").with_limit(MetricLimit::new(
            MetricKind::Gain,
            SParam::new(2, 1),
            Aggregation::Min,
            Operator::Ge,
            -1.0,
            FrequencyBand::new(1e9, 2e9),
        ))
    }

    #[test]
    fn test_process_file_evaluates() {
        let storage = InMemoryStorage::new();
        storage.put_file("SN0001_PRI.s2p", THRU_S2P).unwrap();
        let outcome = process_file(
            &storage,
            &FileInput::new("SN0001_PRI.s2p"),
            &gain_requirements(),
            "hash",
        )
        .unwrap();
        let FileOutcome::Evaluated(file) = outcome else {
            panic!("expected evaluated outcome");
        };
        assert_eq!(file.ports, 2);
        assert_eq!(file.points, 2);
        assert_eq!(file.metadata.path, Some(PathLabel::Primary));
        assert_eq!(file.series.len(), 1);
        assert!(file.compliance.pass);
        assert_eq!(file.compliance.requirement_hash, "hash");
    }

    #[test]
    fn test_series_ordered_by_kind_then_parameter() {
        let storage = InMemoryStorage::new();
        storage.put_file("a.s2p", THRU_S2P).unwrap();
        let band = FrequencyBand::new(1e9, 2e9);
        let reqs = RequirementSet::new("mixed")
            .with_limit(MetricLimit::new(
                MetricKind::ReturnLoss,
                SParam::reflection(2),
                Aggregation::Min,
                Operator::Ge,
                0.0,
                band,
            ))
            .with_limit(MetricLimit::new(
                MetricKind::ReturnLoss,
                SParam::reflection(1),
                Aggregation::Min,
                Operator::Ge,
                0.0,
                band,
            ))
            .with_limit(MetricLimit::new(
                MetricKind::Gain,
                SParam::new(2, 1),
                Aggregation::Min,
                Operator::Ge,
                -1.0,
                band,
            ));
        let outcome = process_file(&storage, &FileInput::new("a.s2p"), &reqs, "hash").unwrap();
        let FileOutcome::Evaluated(file) = outcome else {
            panic!("expected evaluated outcome");
        };
        let keys: Vec<(MetricKind, SParam)> =
            file.series.iter().map(|s| (s.kind, s.param)).collect();
        assert_eq!(
            keys,
            vec![
                (MetricKind::Gain, SParam::new(2, 1)),
                (MetricKind::ReturnLoss, SParam::reflection(1)),
                (MetricKind::ReturnLoss, SParam::reflection(2)),
            ]
        );
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let storage = InMemoryStorage::new();
        let outcome = process_file(
            &storage,
            &FileInput::new("absent.s2p"),
            &gain_requirements(),
            "hash",
        )
        .unwrap();
        assert!(outcome.load_error().unwrap().contains("not found"));
        assert!(outcome.file_verdict().is_none());
    }

    #[test]
    fn test_non_utf8_is_load_failure() {
        let storage = InMemoryStorage::new();
        storage.put_file("bin.s2p", vec![0xff, 0xfe, 0x00]).unwrap();
        let outcome = process_file(
            &storage,
            &FileInput::new("bin.s2p"),
            &gain_requirements(),
            "hash",
        )
        .unwrap();
        assert!(outcome.load_error().unwrap().contains("UTF-8"));
    }

    #[test]
    fn test_unavailable_storage_is_an_error_not_an_outcome() {
        let storage = InMemoryStorage::new().with_read_failure();
        storage.put_file("SN0001_PRI.s2p", THRU_S2P).unwrap();
        let err = process_file(
            &storage,
            &FileInput::new("SN0001_PRI.s2p"),
            &gain_requirements(),
            "hash",
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[test]
    fn test_overrides_drive_file_verdict() {
        let storage = InMemoryStorage::new();
        storage.put_file("blob", THRU_S2P).unwrap();
        let input = FileInput::new("SN0001_PRI.s2p")
            .with_locator("blob")
            .with_overrides(MetadataOverrides {
                path: Some(PathLabel::Redundant),
                ..Default::default()
            });
        let outcome = process_file(&storage, &input, &gain_requirements(), "hash").unwrap();
        assert_eq!(outcome.filename(), "SN0001_PRI.s2p");
        assert_eq!(
            outcome.file_verdict().unwrap().path,
            Some(PathLabel::Redundant)
        );
    }

    #[test]
    fn test_out_of_range_parameter_fails_limit_not_file() {
        let storage = InMemoryStorage::new();
        storage.put_file("a.s2p", THRU_S2P).unwrap();
        let reqs = RequirementSet::new("s31").with_limit(MetricLimit::new(
            MetricKind::Gain,
            SParam::new(3, 1),
            Aggregation::Min,
            Operator::Ge,
            -1.0,
            FrequencyBand::new(1e9, 2e9),
        ));
        let outcome = process_file(&storage, &FileInput::new("a.s2p"), &reqs, "hash").unwrap();
        let result = outcome.compliance().unwrap();
        assert!(!result.pass);
        assert!(result.verdicts[0].reason.contains("metric computation failed"));
    }

    #[test]
    fn test_outcome_serde_tag() {
        let outcome = FileOutcome::LoadFailed(LoadFailure {
            filename: "x.s2p".to_string(),
            parsed: ParsedMetadata::default(),
            error: "bad".to_string(),
        });
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"load_failed\""));
    }
}
