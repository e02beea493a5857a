//! RF metric computation
//!
//! Pure functions from a [`Network`] and an S-parameter selector to a
//! per-frequency series. Infinities are propagated untouched: a zero
//! transmission magnitude gives `-inf` gain, a unit reflection magnitude
//! gives `+inf` VSWR.

use crate::error::{Error, Result};
use crate::network::{Network, SParam};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of per-frequency series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// 20·log10|Sij| in dB
    Gain,
    /// (1+|Sii|)/(1−|Sii|)
    Vswr,
    /// −20·log10|Sii| in dB
    ReturnLoss,
    /// Gain series kept as the input of a flatness evaluation
    #[serde(rename = "gain_flatness", alias = "flatness_source")]
    FlatnessSource,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gain => "gain",
            Self::Vswr => "vswr",
            Self::ReturnLoss => "return_loss",
            Self::FlatnessSource => "gain_flatness",
        })
    }
}

/// Inclusive frequency interval in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Lower bound, inclusive
    pub start_hz: f64,
    /// Upper bound, inclusive
    pub end_hz: f64,
}

impl FrequencyBand {
    /// Create a band
    #[must_use]
    pub const fn new(start_hz: f64, end_hz: f64) -> Self {
        Self { start_hz, end_hz }
    }

    /// Inclusive membership test
    #[must_use]
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.start_hz && freq_hz <= self.end_hz
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} Hz, {} Hz]", self.start_hz, self.end_hz)
    }
}

/// A metric sampled at each network frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// What the values measure
    pub kind: MetricKind,
    /// Source S-parameter
    pub param: SParam,
    /// `(frequency_hz, value)` pairs in network order
    pub points: Vec<(f64, f64)>,
}

impl MetricSeries {
    /// Values whose frequency lies inside `band`
    #[must_use]
    pub fn slice(&self, band: &FrequencyBand) -> Vec<f64> {
        self.points
            .iter()
            .filter(|(f, _)| band.contains(*f))
            .map(|(_, v)| *v)
            .collect()
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the series has no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn magnitude_series(
    network: &Network,
    param: SParam,
    kind: MetricKind,
    f: impl Fn(f64) -> f64,
) -> Result<MetricSeries> {
    let trace = network.trace(param)?;
    let points = network
        .frequencies()
        .iter()
        .zip(trace.iter())
        .map(|(&freq, s)| (freq, f(s.norm())))
        .collect();
    Ok(MetricSeries {
        kind,
        param,
        points,
    })
}

/// Gain in dB: 20·log10|Sij|
///
/// # Errors
///
/// Returns `ParameterOutOfRange` if `sij` addresses a missing port.
pub fn gain_db(network: &Network, sij: SParam) -> Result<MetricSeries> {
    magnitude_series(network, sij, MetricKind::Gain, |m| 20.0 * m.log10())
}

/// Voltage standing wave ratio: (1+|Sii|)/(1−|Sii|)
///
/// # Errors
///
/// Returns `ParameterOutOfRange` if `sii` addresses a missing port.
pub fn vswr(network: &Network, sii: SParam) -> Result<MetricSeries> {
    magnitude_series(network, sii, MetricKind::Vswr, |m| (1.0 + m) / (1.0 - m))
}

/// Return loss in dB: −20·log10|Sii|
///
/// # Errors
///
/// Returns `ParameterOutOfRange` if `sii` addresses a missing port.
pub fn return_loss_db(network: &Network, sii: SParam) -> Result<MetricSeries> {
    magnitude_series(network, sii, MetricKind::ReturnLoss, |m| -20.0 * m.log10())
}

/// Peak-to-peak gain variation over `band`
///
/// # Errors
///
/// Returns `EmptyBand` if no sample of `gain` lies inside `band`.
pub fn flatness(gain: &MetricSeries, band: &FrequencyBand) -> Result<f64> {
    let values = gain.slice(band);
    if values.is_empty() {
        return Err(Error::EmptyBand {
            start_hz: band.start_hz,
            end_hz: band.end_hz,
        });
    }
    Ok(peak_to_peak(&values))
}

/// max − min of a non-empty slice
pub(crate) fn peak_to_peak(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

/// Compute any metric kind
///
/// # Errors
///
/// Returns `ParameterOutOfRange` if `param` addresses a missing port.
pub fn compute(kind: MetricKind, network: &Network, param: SParam) -> Result<MetricSeries> {
    match kind {
        MetricKind::Gain => gain_db(network, param),
        MetricKind::Vswr => vswr(network, param),
        MetricKind::ReturnLoss => return_loss_db(network, param),
        MetricKind::FlatnessSource => {
            let mut series = gain_db(network, param)?;
            series.kind = MetricKind::FlatnessSource;
            Ok(series)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use num_complex::Complex64;

    /// Two-port network with the given |S11| and |S21| at 1, 2, 3 GHz
    fn network(s11: [f64; 3], s21: [f64; 3]) -> Network {
        let mut s = Array3::<Complex64>::zeros((3, 2, 2));
        for k in 0..3 {
            s[[k, 0, 0]] = Complex64::new(s11[k], 0.0);
            s[[k, 1, 0]] = Complex64::new(0.0, s21[k]);
        }
        Network::new(vec![1.0e9, 2.0e9, 3.0e9], s, 50.0).unwrap()
    }

    #[test]
    fn test_gain_half_magnitude() {
        let net = network([0.1; 3], [0.5, 1.0, 2.0]);
        let gain = gain_db(&net, SParam::new(2, 1)).unwrap();
        assert_eq!(gain.kind, MetricKind::Gain);
        assert!((gain.points[0].1 - (-6.0206)).abs() < 0.01);
        assert!(gain.points[1].1.abs() < 1e-12);
        assert!((gain.points[2].1 - 6.0206).abs() < 0.01);
        assert_eq!(gain.points[0].0, 1.0e9);
    }

    #[test]
    fn test_gain_zero_magnitude_is_negative_infinity() {
        let net = network([0.1; 3], [0.0, 1.0, 1.0]);
        let gain = gain_db(&net, SParam::new(2, 1)).unwrap();
        assert_eq!(gain.points[0].1, f64::NEG_INFINITY);
    }

    #[test]
    fn test_vswr_matched_is_exactly_one() {
        let net = network([0.0, 0.5, 1.0], [1.0; 3]);
        let v = vswr(&net, SParam::reflection(1)).unwrap();
        assert_eq!(v.points[0].1, 1.0);
        assert!((v.points[1].1 - 3.0).abs() < 1e-12);
        assert_eq!(v.points[2].1, f64::INFINITY);
    }

    #[test]
    fn test_return_loss() {
        let net = network([1.0, 0.1, 0.0], [1.0; 3]);
        let rl = return_loss_db(&net, SParam::reflection(1)).unwrap();
        assert!(rl.points[0].1.abs() < 0.001);
        assert!((rl.points[1].1 - 20.0).abs() < 1e-9);
        assert_eq!(rl.points[2].1, f64::INFINITY);
    }

    #[test]
    fn test_out_of_range_parameter() {
        let net = network([0.1; 3], [1.0; 3]);
        for kind in [
            MetricKind::Gain,
            MetricKind::Vswr,
            MetricKind::ReturnLoss,
            MetricKind::FlatnessSource,
        ] {
            let err = compute(kind, &net, SParam::new(3, 1)).unwrap_err();
            assert!(matches!(err, Error::ParameterOutOfRange { ports: 2, .. }));
        }
    }

    #[test]
    fn test_flatness_inclusive_bounds() {
        let net = network([0.1; 3], [0.5, 1.0, 2.0]);
        let gain = gain_db(&net, SParam::new(2, 1)).unwrap();
        let full = flatness(&gain, &FrequencyBand::new(1.0e9, 3.0e9)).unwrap();
        assert!((full - 12.0412).abs() < 0.01);
        let upper = flatness(&gain, &FrequencyBand::new(2.0e9, 3.0e9)).unwrap();
        assert!((upper - 6.0206).abs() < 0.01);
        let single = flatness(&gain, &FrequencyBand::new(2.0e9, 2.0e9)).unwrap();
        assert_eq!(single, 0.0);
    }

    #[test]
    fn test_flatness_empty_band_is_error() {
        let net = network([0.1; 3], [1.0; 3]);
        let gain = gain_db(&net, SParam::new(2, 1)).unwrap();
        let err = flatness(&gain, &FrequencyBand::new(5.0e9, 6.0e9)).unwrap_err();
        assert!(matches!(err, Error::EmptyBand { .. }));
    }

    #[test]
    fn test_flatness_source_tagging() {
        let net = network([0.1; 3], [1.0; 3]);
        let series = compute(MetricKind::FlatnessSource, &net, SParam::new(2, 1)).unwrap();
        assert_eq!(series.kind, MetricKind::FlatnessSource);
        assert_eq!(series.len(), 3);
    }
}
