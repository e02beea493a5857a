//! Error types for rf-qa-core

use thiserror::Error;

/// Result type alias for rf-qa-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading networks, computing metrics or handling requirements
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed network file (header, port count, frequencies or row layout)
    #[error("File format error: {0}")]
    FileFormat(String),

    /// Port index selection outside the network's port range
    #[error("Parameter {param} out of range for {ports}-port network")]
    ParameterOutOfRange {
        /// Parameter label (e.g., "S31")
        param: String,
        /// Port count of the network
        ports: usize,
    },

    /// Metric cannot be computed because the band selects no samples
    #[error("No frequency points in band {start_hz}-{end_hz} Hz")]
    EmptyBand {
        /// Band start in Hz
        start_hz: f64,
        /// Band end in Hz
        end_hz: f64,
    },

    /// Unparsable S-parameter label
    #[error("Invalid S-parameter: {0}")]
    InvalidParameter(String),

    /// Requirement set failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a file format error
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::FileFormat(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FileFormat("bad option line".to_string());
        assert_eq!(err.to_string(), "File format error: bad option line");
    }

    #[test]
    fn test_parameter_out_of_range_display() {
        let err = Error::ParameterOutOfRange {
            param: "S31".to_string(),
            ports: 2,
        };
        assert!(err.to_string().contains("S31"));
        assert!(err.to_string().contains("2-port"));
    }

    #[test]
    fn test_empty_band_display() {
        let err = Error::EmptyBand {
            start_hz: 1.0e9,
            end_hz: 2.0e9,
        };
        assert!(err.to_string().contains("No frequency points in band"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_from_serde_yaml() {
        let yaml_err: serde_yaml::Error = serde_yaml::from_str::<i32>("not: [yaml").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::YamlError(_)));
    }
}
