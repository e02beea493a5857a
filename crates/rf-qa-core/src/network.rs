//! Multi-port network representation

use crate::error::{Error, Result};
use ndarray::{Array3, ArrayView1};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported port counts
pub const SUPPORTED_PORTS: [usize; 3] = [2, 3, 4];

/// An N-port network measured over a frequency sweep
#[derive(Debug, Clone)]
pub struct Network {
    frequencies: Vec<f64>,
    s: Array3<Complex64>,
    z0: f64,
    comments: Vec<String>,
}

impl Network {
    /// Build a network, checking shape and frequency ordering
    ///
    /// # Errors
    ///
    /// Returns `FileFormat` if the matrix shape disagrees with the frequency
    /// count, the port count is unsupported, or frequencies are not strictly
    /// increasing.
    pub fn new(frequencies: Vec<f64>, s: Array3<Complex64>, z0: f64) -> Result<Self> {
        let (nfreq, rows, cols) = s.dim();
        if nfreq != frequencies.len() {
            return Err(Error::format(format!(
                "{} frequencies but {nfreq} matrices",
                frequencies.len()
            )));
        }
        if rows != cols || !SUPPORTED_PORTS.contains(&rows) {
            return Err(Error::format(format!(
                "unsupported matrix shape {rows}x{cols}"
            )));
        }
        if let Some(w) = frequencies.windows(2).find(|w| w[1] <= w[0]) {
            return Err(Error::format(format!(
                "frequencies not strictly increasing at {} Hz -> {} Hz",
                w[0], w[1]
            )));
        }
        Ok(Self {
            frequencies,
            s,
            z0,
            comments: Vec::new(),
        })
    }

    /// Attach comment lines recovered from the source file
    #[must_use]
    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }

    /// Number of ports
    #[must_use]
    pub fn nports(&self) -> usize {
        self.s.dim().1
    }

    /// Number of frequency points
    #[must_use]
    pub fn nfreq(&self) -> usize {
        self.frequencies.len()
    }

    /// Frequencies in Hz
    #[must_use]
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Full S-parameter array, shaped `[nfreq, nports, nports]`
    #[must_use]
    pub fn s(&self) -> &Array3<Complex64> {
        &self.s
    }

    /// Reference impedance in ohms
    #[must_use]
    pub fn z0(&self) -> f64 {
        self.z0
    }

    /// Comment lines from the source file
    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// One S-parameter trace across all frequencies
    ///
    /// # Errors
    ///
    /// Returns `ParameterOutOfRange` if either port index falls outside `[1, N]`.
    pub fn trace(&self, param: SParam) -> Result<ArrayView1<'_, Complex64>> {
        let n = self.nports();
        if param.i == 0 || param.j == 0 || param.i > n || param.j > n {
            return Err(Error::ParameterOutOfRange {
                param: param.to_string(),
                ports: n,
            });
        }
        Ok(self.s.slice(ndarray::s![.., param.i - 1, param.j - 1]))
    }
}

/// S-parameter selector `S{i}{j}` with 1-based port indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SParam {
    /// Receiving port
    pub i: usize,
    /// Incident port
    pub j: usize,
}

impl SParam {
    /// Create a selector
    #[must_use]
    pub const fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    /// Reflection coefficient at a single port
    #[must_use]
    pub const fn reflection(port: usize) -> Self {
        Self { i: port, j: port }
    }

    /// True for diagonal (reflection) parameters
    #[must_use]
    pub const fn is_reflection(&self) -> bool {
        self.i == self.j
    }
}

impl fmt::Display for SParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}{}", self.i, self.j)
    }
}

impl FromStr for SParam {
    type Err = Error;

    /// Accepts `S21` style labels with single-digit ports
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidParameter(s.to_string());
        let digits = s
            .strip_prefix('S')
            .or_else(|| s.strip_prefix('s'))
            .ok_or_else(bad)?;
        let mut chars = digits.chars();
        let (Some(a), Some(b), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(bad());
        };
        let i = a.to_digit(10).ok_or_else(bad)? as usize;
        let j = b.to_digit(10).ok_or_else(bad)? as usize;
        if i == 0 || j == 0 {
            return Err(bad());
        }
        Ok(Self { i, j })
    }
}

impl Serialize for SParam {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SParam {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
