//! Touchstone network file loader
//!
//! Line-oriented text:
//!
//! ```text
//! ! comment
//! # GHz S MA R 50
//! 1.0  0.1 -20  0.9 45  0.01 10  0.2 -35
//! ```
//!
//! The option line declares the frequency unit, parameter type (only `S` is
//! accepted), value format (`RI`, `MA`, `DB`) and reference impedance.
//! A line with an odd number of values starts a record (frequency followed by
//! value pairs); even-count lines continue it. A record holds `2 * N * N`
//! values. Two-port entries are ordered `S11 S21 S12 S22`; larger networks
//! are row-major.
//!
//! Touchstone 2 files (`[Version] 2.x`) declare the port count up front, so
//! their `[Network Data]` is read as one value stream cut into fixed-size
//! records. `[Two-Port Data Order]`, `[Matrix Format]` and `[Number of
//! Frequencies]` are honoured; `[Reference]` must give every port the same
//! impedance. Noise data and `[Begin Information]` blocks are skipped.

use crate::error::{Error, Result};
use crate::network::{Network, SUPPORTED_PORTS};
use ndarray::Array3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frequency unit declared on the option line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrequencyUnit {
    /// Hertz
    Hz,
    /// Kilohertz
    KHz,
    /// Megahertz
    MHz,
    /// Gigahertz (Touchstone default)
    #[default]
    GHz,
}

impl FrequencyUnit {
    /// Multiplier to Hz
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Hz => 1.0,
            Self::KHz => 1.0e3,
            Self::MHz => 1.0e6,
            Self::GHz => 1.0e9,
        }
    }
}

/// Complex value representation declared on the option line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueFormat {
    /// Real / imaginary pair
    RealImag,
    /// Linear magnitude / angle in degrees (Touchstone default)
    #[default]
    MagAngle,
    /// Magnitude in dB / angle in degrees
    DbAngle,
}

impl ValueFormat {
    /// Convert a raw value pair into a linear complex number
    #[must_use]
    pub fn to_complex(&self, a: f64, b: f64) -> Complex64 {
        match self {
            Self::RealImag => Complex64::new(a, b),
            Self::MagAngle => Complex64::from_polar(a, b.to_radians()),
            Self::DbAngle => Complex64::from_polar(10f64.powf(a / 20.0), b.to_radians()),
        }
    }
}

/// Parsed option line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionLine {
    /// Frequency unit
    pub unit: FrequencyUnit,
    /// Value format
    pub format: ValueFormat,
    /// Reference impedance in ohms
    pub z0: f64,
}

impl Default for OptionLine {
    fn default() -> Self {
        Self {
            unit: FrequencyUnit::GHz,
            format: ValueFormat::MagAngle,
            z0: 50.0,
        }
    }
}

impl OptionLine {
    /// Parse the text after `#`
    ///
    /// # Errors
    ///
    /// Returns `FileFormat` on unknown tokens, non-S parameter types, or a
    /// missing/invalid reference impedance.
    pub fn parse(text: &str) -> Result<Self> {
        let mut opts = Self::default();
        let mut tokens = text.split_whitespace();
        while let Some(token) = tokens.next() {
            match token.to_ascii_uppercase().as_str() {
                "HZ" => opts.unit = FrequencyUnit::Hz,
                "KHZ" => opts.unit = FrequencyUnit::KHz,
                "MHZ" => opts.unit = FrequencyUnit::MHz,
                "GHZ" => opts.unit = FrequencyUnit::GHz,
                "RI" => opts.format = ValueFormat::RealImag,
                "MA" => opts.format = ValueFormat::MagAngle,
                "DB" => opts.format = ValueFormat::DbAngle,
                "S" => {}
                "Y" | "Z" | "H" | "G" => {
                    return Err(Error::format(format!(
                        "unsupported parameter type '{token}' (only S is accepted)"
                    )));
                }
                "R" => {
                    let value = tokens
                        .next()
                        .ok_or_else(|| Error::format("option line: R without impedance"))?;
                    opts.z0 = value
                        .parse::<f64>()
                        .ok()
                        .filter(|z| z.is_finite() && *z > 0.0)
                        .ok_or_else(|| {
                            Error::format(format!("option line: invalid impedance '{value}'"))
                        })?;
                }
                _ => {
                    return Err(Error::format(format!(
                        "option line: unrecognized token '{token}'"
                    )));
                }
            }
        }
        Ok(opts)
    }
}

/// Load a network, inferring the port count from the data layout
///
/// # Errors
///
/// Returns `FileFormat` for any malformed header, data row, or frequency sequence.
pub fn load(raw_text: &str) -> Result<Network> {
    parse(raw_text, None)
}

/// Load a network whose port count is declared by the caller
///
/// # Errors
///
/// Returns `FileFormat` if the observed port count differs from `declared_ports`,
/// in addition to the conditions of [`load`].
pub fn load_with_ports(raw_text: &str, declared_ports: usize) -> Result<Network> {
    parse(raw_text, Some(declared_ports))
}

/// Load a network, taking the declared port count from a `.sNp` extension
///
/// Filenames without a `.sNp` extension fall back to [`load`].
///
/// # Errors
///
/// Same as [`load_with_ports`].
pub fn load_named(filename: &str, raw_text: &str) -> Result<Network> {
    parse(raw_text, ports_from_extension(filename))
}

/// Port count encoded in a `.sNp` extension
#[must_use]
pub fn ports_from_extension(filename: &str) -> Option<usize> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let digits = ext.strip_prefix('s')?.strip_suffix('p')?;
    digits.parse().ok()
}

/// Order of the four two-port entries in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TwoPortOrder {
    /// `S11 S21 S12 S22`, the only order Touchstone 1 knows
    #[default]
    N21_12,
    /// `S11 S12 S21 S22`
    N12_21,
}

/// Which part of the matrix a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MatrixFormat {
    #[default]
    Full,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Section {
    #[default]
    Header,
    NetworkData,
    NoiseData,
    Information,
    Ended,
}

/// Keyword state of a Touchstone 2 file
#[derive(Debug, Default)]
struct Keywords {
    version2: bool,
    ports: Option<usize>,
    two_port_order: TwoPortOrder,
    frequencies: Option<usize>,
    matrix: MatrixFormat,
    reference: Option<Vec<f64>>,
}

impl Keywords {
    /// Apply one `[Keyword] value` line
    fn apply(&mut self, content: &str, line_no: usize, section: &mut Section) -> Result<()> {
        let (name, value) = match content.find(']') {
            Some(end) => (&content[..=end], content[end + 1..].trim()),
            None => {
                return Err(Error::format(format!(
                    "line {line_no}: unterminated keyword '{content}'"
                )));
            }
        };
        let bad = |what: &str| Error::format(format!("line {line_no}: invalid {what} '{value}'"));
        match name.to_ascii_lowercase().as_str() {
            "[version]" => {
                if !value.starts_with('2') {
                    return Err(bad("[Version]"));
                }
                self.version2 = true;
            }
            "[number of ports]" => {
                let n = value.parse().map_err(|_| bad("[Number of Ports]"))?;
                self.ports = Some(n);
            }
            "[two-port data order]" => {
                self.two_port_order = match value {
                    "12_21" => TwoPortOrder::N12_21,
                    "21_12" => TwoPortOrder::N21_12,
                    _ => return Err(bad("[Two-Port Data Order]")),
                };
            }
            "[number of frequencies]" => {
                let k = value.parse().map_err(|_| bad("[Number of Frequencies]"))?;
                self.frequencies = Some(k);
            }
            "[number of noise frequencies]" => {}
            "[matrix format]" => {
                self.matrix = match value.to_ascii_lowercase().as_str() {
                    "full" => MatrixFormat::Full,
                    "lower" => MatrixFormat::Lower,
                    "upper" => MatrixFormat::Upper,
                    _ => return Err(bad("[Matrix Format]")),
                };
            }
            "[reference]" => {
                self.reference = Some(Vec::new());
                self.push_reference(value, line_no)?;
            }
            "[network data]" => *section = Section::NetworkData,
            "[noise data]" => *section = Section::NoiseData,
            "[begin information]" => *section = Section::Information,
            "[end]" => *section = Section::Ended,
            _ => {
                return Err(Error::format(format!(
                    "line {line_no}: unsupported keyword '{content}'"
                )));
            }
        }
        Ok(())
    }

    /// Reference impedances may wrap onto following lines until one per port is read
    fn reference_pending(&self) -> bool {
        match (&self.reference, self.ports) {
            (Some(values), Some(n)) => values.len() < n,
            (Some(values), None) => values.is_empty(),
            (None, _) => false,
        }
    }

    fn push_reference(&mut self, text: &str, line_no: usize) -> Result<()> {
        let values = parse_values(text, line_no)?;
        if let Some(reference) = self.reference.as_mut() {
            reference.extend(values);
        }
        Ok(())
    }

    /// Single reference impedance shared by every port
    fn reference_z0(&self, nports: usize) -> Result<Option<f64>> {
        let Some(values) = &self.reference else {
            return Ok(None);
        };
        if values.len() != nports {
            return Err(Error::format(format!(
                "[Reference] lists {} impedances for {nports} ports",
                values.len()
            )));
        }
        let z0 = values[0];
        if !z0.is_finite() || z0 <= 0.0 {
            return Err(Error::format(format!("[Reference] invalid impedance {z0}")));
        }
        if values.iter().any(|z| (z - z0).abs() > f64::EPSILON * z0) {
            return Err(Error::format(
                "[Reference] per-port impedances differ; a single reference impedance is required",
            ));
        }
        Ok(Some(z0))
    }
}

fn parse_values(text: &str, line_no: usize) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| Error::format(format!("line {line_no}: non-numeric value '{tok}'")))
        })
        .collect()
}

fn parse(raw_text: &str, declared: Option<usize>) -> Result<Network> {
    let mut options: Option<OptionLine> = None;
    let mut keywords = Keywords::default();
    let mut section = Section::Header;
    let mut comments = Vec::new();
    let mut rows: Vec<(usize, Vec<f64>)> = Vec::new();

    for (idx, raw_line) in raw_text.lines().enumerate() {
        let line_no = idx + 1;
        let (content, comment) = match raw_line.split_once('!') {
            Some((before, after)) => (before, Some(after.trim())),
            None => (raw_line, None),
        };
        if let Some(c) = comment.filter(|c| !c.is_empty()) {
            comments.push(c.to_string());
        }
        let content = content.trim();
        if content.is_empty() || section == Section::Ended {
            continue;
        }
        if section == Section::Information {
            if content.to_ascii_lowercase().starts_with("[end information]") {
                section = Section::Header;
            }
            continue;
        }

        if let Some(rest) = content.strip_prefix('#') {
            if options.is_some() {
                tracing::debug!(line = line_no, "ignoring repeated option line");
                continue;
            }
            options = Some(OptionLine::parse(rest)?);
            continue;
        }

        if content.starts_with('[') {
            keywords.apply(content, line_no, &mut section)?;
            continue;
        }

        if keywords.reference_pending() {
            keywords.push_reference(content, line_no)?;
            continue;
        }
        match section {
            Section::NoiseData => continue,
            Section::Header if keywords.version2 => {
                return Err(Error::format(format!(
                    "line {line_no}: data before [Network Data]"
                )));
            }
            _ => {}
        }
        rows.push((line_no, parse_values(content, line_no)?));
    }

    let nports = match (keywords.ports, declared) {
        (Some(k), Some(d)) if k != d => {
            return Err(Error::format(format!(
                "[Number of Ports] {k} contradicts declared port count {d}"
            )));
        }
        (Some(k), _) => Some(k),
        (None, _) if keywords.version2 => {
            return Err(Error::format("Touchstone 2 file without [Number of Ports]"));
        }
        (None, d) => d,
    };

    let (records, nports) = if keywords.version2 {
        // Declared port count: values form one stream cut into fixed-size records
        let n = nports.unwrap_or_default();
        if !SUPPORTED_PORTS.contains(&n) {
            return Err(Error::format(format!("unsupported port count {n}")));
        }
        let per_record = 1 + 2 * layout(n, keywords.matrix, keywords.two_port_order).len();
        let values: Vec<f64> = rows.into_iter().flat_map(|(_, v)| v).collect();
        if values.len() % per_record != 0 {
            return Err(Error::format(format!(
                "{} network data values do not divide into records of {per_record}",
                values.len()
            )));
        }
        let records: Vec<Vec<f64>> = values.chunks(per_record).map(<[f64]>::to_vec).collect();
        (records, n)
    } else {
        let records = group_records(rows)?;
        let first = records
            .first()
            .ok_or_else(|| Error::format("no data rows"))?;
        let observed = observed_ports(first.len() - 1)
            .ok_or_else(|| Error::format(format!("first record has {} values", first.len())))?;
        if let Some(d) = nports {
            if d != observed {
                return Err(Error::format(format!(
                    "declared {d} ports but data rows describe {observed}"
                )));
            }
        }
        (records, observed)
    };

    if records.is_empty() {
        return Err(Error::format("no data rows"));
    }
    if let Some(k) = keywords.frequencies {
        if k != records.len() {
            return Err(Error::format(format!(
                "[Number of Frequencies] is {k} but the file holds {}",
                records.len()
            )));
        }
    }

    let mut options = options.unwrap_or_default();
    if let Some(z0) = keywords.reference_z0(nports)? {
        options.z0 = z0;
    }

    let positions = layout(nports, keywords.matrix, keywords.two_port_order);
    let expected = 1 + 2 * positions.len();
    let mut frequencies = Vec::with_capacity(records.len());
    let mut s = Array3::<Complex64>::zeros((records.len(), nports, nports));

    for (f_idx, record) in records.iter().enumerate() {
        if record.len() != expected {
            return Err(Error::format(format!(
                "record {} has {} values, expected {expected}",
                f_idx + 1,
                record.len()
            )));
        }
        let freq = record[0] * options.unit.multiplier();
        if !freq.is_finite() || freq < 0.0 {
            return Err(Error::format(format!("invalid frequency {}", record[0])));
        }
        frequencies.push(freq);

        for (&(row, col), pair) in positions.iter().zip(record[1..].chunks_exact(2)) {
            let value = options.format.to_complex(pair[0], pair[1]);
            s[[f_idx, row, col]] = value;
            if keywords.matrix != MatrixFormat::Full {
                s[[f_idx, col, row]] = value;
            }
        }
    }

    let network = Network::new(frequencies, s, options.z0)?.with_comments(comments);
    tracing::debug!(
        ports = network.nports(),
        points = network.nfreq(),
        version2 = keywords.version2,
        "loaded touchstone network"
    );
    Ok(network)
}

/// Touchstone 1 records: an odd-count line starts a record, even-count lines continue it
fn group_records(rows: Vec<(usize, Vec<f64>)>) -> Result<Vec<Vec<f64>>> {
    let mut records: Vec<Vec<f64>> = Vec::new();
    for (line_no, values) in rows {
        if values.len() % 2 == 1 {
            records.push(values);
        } else if let Some(current) = records.last_mut() {
            current.extend(values);
        } else {
            return Err(Error::format(format!(
                "line {line_no}: continuation row before any frequency row"
            )));
        }
    }
    Ok(records)
}

/// Port count implied by the number of values after the frequency
fn observed_ports(values: usize) -> Option<usize> {
    SUPPORTED_PORTS
        .iter()
        .copied()
        .find(|n| 2 * n * n == values)
}

/// Matrix positions of the entries of a record, in file order
fn layout(nports: usize, matrix: MatrixFormat, order: TwoPortOrder) -> Vec<(usize, usize)> {
    match matrix {
        MatrixFormat::Full if nports == 2 && order == TwoPortOrder::N21_12 => {
            vec![(0, 0), (1, 0), (0, 1), (1, 1)]
        }
        MatrixFormat::Full => (0..nports)
            .flat_map(|r| (0..nports).map(move |c| (r, c)))
            .collect(),
        MatrixFormat::Lower => (0..nports)
            .flat_map(|r| (0..=r).map(move |c| (r, c)))
            .collect(),
        MatrixFormat::Upper => (0..nports)
            .flat_map(|r| (r..nports).map(move |c| (r, c)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SParam;

    const TWO_PORT_RI: &str = "\
! two-port amplifier
# MHz S RI R 50
100 0.1 0.0 2.0 0.0 0.01 0.0 0.2 0.0
200 0.1 0.1 1.9 0.0 0.01 0.0 0.2 0.0 ! trailing
";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_load_two_port_ri() {
        let net = load(TWO_PORT_RI).unwrap();
        assert_eq!(net.nports(), 2);
        assert_eq!(net.frequencies(), &[100.0e6, 200.0e6]);
        let s21 = net.trace(SParam::new(2, 1)).unwrap();
        assert!(close(s21[0].re, 2.0));
        let s12 = net.trace(SParam::new(1, 2)).unwrap();
        assert!(close(s12[0].re, 0.01));
        assert_eq!(net.comments(), &["two-port amplifier".to_string(), "trailing".to_string()]);
    }

    #[test]
    fn test_ma_and_db_formats() {
        let ma = load("# Hz S MA R 50\n1 1.0 90 0.5 0 0.5 0 1.0 180\n").unwrap();
        let s11 = ma.trace(SParam::new(1, 1)).unwrap()[0];
        assert!(close(s11.re, 0.0) && close(s11.im, 1.0));

        let db = load("# GHz S DB R 50\n1 -20 0 -6.0206 0 -6.0206 0 0 0\n").unwrap();
        assert_eq!(db.frequencies(), &[1.0e9]);
        let s11 = db.trace(SParam::new(1, 1)).unwrap()[0];
        assert!(close(s11.norm(), 0.1));
        let s21 = db.trace(SParam::new(2, 1)).unwrap()[0];
        assert!((s21.norm() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_defaults_without_option_line() {
        let net = load("1 0.5 0 0.5 0 0.5 0 0.5 0\n").unwrap();
        assert_eq!(net.frequencies(), &[1.0e9]);
        assert!(close(net.z0(), 50.0));
    }

    #[test]
    fn test_three_port_row_major_wrapped() {
        let text = "\
# GHz S RI R 50
1.0 0.11 0 0.12 0 0.13 0
    0.21 0 0.22 0 0.23 0
    0.31 0 0.32 0 0.33 0
2.0 0.11 0 0.12 0 0.13 0
    0.21 0 0.22 0 0.23 0
    0.31 0 0.32 0 0.33 0
";
        let net = load_named("dut.s3p", text).unwrap();
        assert_eq!(net.nports(), 3);
        assert!(close(net.trace(SParam::new(1, 2)).unwrap()[0].re, 0.12));
        assert!(close(net.trace(SParam::new(3, 1)).unwrap()[1].re, 0.31));
    }

    #[test]
    fn test_four_port() {
        let row: String = (0..4).map(|_| " 0.5 0").collect();
        let mut text = String::from("# MHz S MA R 50\n");
        for f in [10, 20] {
            text.push_str(&format!("{f}{row}\n"));
            for _ in 0..3 {
                text.push_str(&format!("{row}\n"));
            }
        }
        let net = load(&text).unwrap();
        assert_eq!(net.nports(), 4);
        assert_eq!(net.nfreq(), 2);
    }

    #[test]
    fn test_declared_vs_observed_ports() {
        let err = load_named("dut.s3p", TWO_PORT_RI).unwrap_err();
        assert!(err.to_string().contains("declared 3 ports"));
        let err = load_with_ports(TWO_PORT_RI, 4).unwrap_err();
        assert!(matches!(err, Error::FileFormat(_)));
        assert!(load_with_ports(TWO_PORT_RI, 2).is_ok());
    }

    const V2_TWO_PORT: &str = "\
! Touchstone 2 amplifier
[Version] 2.0
# GHz S RI R 50
[Number of Ports] 2
[Two-Port Data Order] 12_21
[Number of Frequencies] 2
[Reference] 50 50
[Network Data]
1.0 0.1 0.0 0.01 0.0
    2.0 0.0 0.2 0.0
2.0 0.1 0.0 0.01 0.0 1.9 0.0 0.2 0.0
[End]
";

    #[test]
    fn test_touchstone2_two_port() {
        let net = load_named("amp.s2p", V2_TWO_PORT).unwrap();
        assert_eq!(net.nports(), 2);
        assert_eq!(net.frequencies(), &[1.0e9, 2.0e9]);
        // 12_21: S12 precedes S21
        assert!(close(net.trace(SParam::new(1, 2)).unwrap()[0].re, 0.01));
        assert!(close(net.trace(SParam::new(2, 1)).unwrap()[0].re, 2.0));
        assert!(close(net.trace(SParam::new(2, 1)).unwrap()[1].re, 1.9));
        assert!(close(net.z0(), 50.0));
    }

    #[test]
    fn test_touchstone2_21_12_matches_v1_order() {
        let v2 = V2_TWO_PORT.replace("12_21", "21_12");
        let net = load(&v2).unwrap();
        assert!(close(net.trace(SParam::new(2, 1)).unwrap()[0].re, 0.01));
        assert!(close(net.trace(SParam::new(1, 2)).unwrap()[0].re, 2.0));
    }

    #[test]
    fn test_touchstone2_frequency_count_checked() {
        let text = V2_TWO_PORT.replace("[Number of Frequencies] 2", "[Number of Frequencies] 3");
        let err = load(&text).unwrap_err();
        assert!(err.to_string().contains("[Number of Frequencies] is 3"));
    }

    #[test]
    fn test_touchstone2_reference_and_noise() {
        let text = "\
[Version] 2.0
# MHz S MA
[Number of Ports] 2
[Two-Port Data Order] 21_12
[Number of Frequencies] 1
[Number of Noise Frequencies] 1
[Reference]
75
75
[Begin Information]
free text [that] is skipped
[End Information]
[Network Data]
100 0.5 0 0.5 0 0.5 0 0.5 0
[Noise Data]
100 1.5 0.3 20 0.4
[End]
";
        let net = load(text).unwrap();
        assert!(close(net.z0(), 75.0));
        assert_eq!(net.nfreq(), 1);

        let mixed = text.replace("75\n75", "50\n75");
        assert!(load(&mixed).unwrap_err().to_string().contains("per-port"));
    }

    #[test]
    fn test_touchstone2_lower_matrix_is_symmetric() {
        let text = "\
[Version] 2.0
# GHz S RI R 50
[Number of Ports] 3
[Matrix Format] Lower
[Network Data]
1.0 0.11 0
    0.21 0 0.22 0
    0.31 0 0.32 0 0.33 0
[End]
";
        let net = load(text).unwrap();
        assert_eq!(net.nports(), 3);
        assert!(close(net.trace(SParam::new(1, 3)).unwrap()[0].re, 0.31));
        assert!(close(net.trace(SParam::new(3, 1)).unwrap()[0].re, 0.31));
        assert!(close(net.trace(SParam::new(2, 3)).unwrap()[0].re, 0.32));
    }

    #[test]
    fn test_touchstone2_keyword_errors() {
        let no_ports = "[Version] 2.0\n# GHz S RI R 50\n[Network Data]\n1 0 0 0 0 0 0 0 0\n";
        assert!(load(no_ports).unwrap_err().to_string().contains("[Number of Ports]"));

        let early = "[Version] 2.0\n# GHz S RI R 50\n[Number of Ports] 2\n1 0 0 0 0 0 0 0 0\n";
        assert!(load(early).unwrap_err().to_string().contains("before [Network Data]"));

        let contradicts = V2_TWO_PORT.replace("[Number of Ports] 2", "[Number of Ports] 3");
        let err = load_named("amp.s2p", &contradicts).unwrap_err();
        assert!(err.to_string().contains("contradicts declared port count 2"));

        let bad_order = V2_TWO_PORT.replace("12_21", "11_22");
        assert!(load(&bad_order).unwrap_err().to_string().contains("[Two-Port Data Order]"));

        let mixed_mode = V2_TWO_PORT.replace("[Reference] 50 50", "[Mixed-Mode Order] D2,1 C2,1");
        assert!(load(&mixed_mode).unwrap_err().to_string().contains("unsupported keyword"));
    }

    #[test]
    fn test_corrupt_option_line() {
        let err = load("# GHz S XX R 50\n1 0 0 0 0 0 0 0 0\n").unwrap_err();
        assert!(err.to_string().contains("unrecognized token"));
        assert!(load("# GHz Z RI R 50\n1 0 0 0 0 0 0 0 0\n").is_err());
        assert!(load("# GHz S RI R\n1 0 0 0 0 0 0 0 0\n").is_err());
    }

    #[test]
    fn test_non_monotonic_frequencies() {
        let text = "# GHz S RI R 50\n2 0 0 0 0 0 0 0 0\n1 0 0 0 0 0 0 0 0\n";
        assert!(load(text).is_err());
        let dup = "# GHz S RI R 50\n1 0 0 0 0 0 0 0 0\n1 0 0 0 0 0 0 0 0\n";
        assert!(load(dup).is_err());
    }

    #[test]
    fn test_row_length_mismatch() {
        let text = "# GHz S RI R 50\n1 0 0 0 0 0 0 0 0\n2 0 0 0 0 0 0 0 0 0 0\n";
        let err = load(text).unwrap_err();
        assert!(err.to_string().contains("record 2"));
    }

    #[test]
    fn test_non_numeric_and_empty() {
        assert!(load("# GHz S RI R 50\n1 a 0 0 0 0 0 0 0\n").is_err());
        assert!(load("! only comments\n# GHz S RI R 50\n").is_err());
        assert!(load("0.1 0.2\n").is_err());
    }

    #[test]
    fn test_ports_from_extension() {
        assert_eq!(ports_from_extension("a.s2p"), Some(2));
        assert_eq!(ports_from_extension("A.S4P"), Some(4));
        assert_eq!(ports_from_extension("a.txt"), None);
        assert_eq!(ports_from_extension("noext"), None);
    }
}
