//! Generic genomic features and BED-style parsing.
//!
//! Feature lists exist here only to feed the generic
//! [`FeatureCache`](crate::interval::FeatureCache); rich annotation-format
//! support is out of scope. Malformed lines are recorded as typed per-line
//! errors and counted, never aborting the batch.

use crate::interval::{Feature, Interval};

/// A minimal chromosome-anchored feature.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomicFeature {
    /// Chromosome name
    pub chr: String,
    /// 0-based start
    pub start: i64,
    /// Exclusive end
    pub end: i64,
    /// Optional feature name (BED column 4)
    pub name: Option<String>,
    /// Optional score (BED column 5)
    pub score: Option<f64>,
}

impl Interval for GenomicFeature {
    fn start(&self) -> i64 {
        self.start
    }
    fn end(&self) -> i64 {
        self.end
    }
}

impl Feature for GenomicFeature {
    fn chrom(&self) -> &str {
        &self.chr
    }
}

/// A malformed feature line, attached to its line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureParseError {
    /// 1-based line number
    pub line: usize,
    /// What was wrong
    pub message: String,
}

impl std::fmt::Display for FeatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for FeatureParseError {}

/// Parse one BED-style line.
///
/// Returns `Ok(None)` for blank lines, comments and `track`/`browser`
/// headers; `Err` for lines with missing or unparsable coordinate fields.
pub fn parse_bed_line(line: &str, line_number: usize)
    -> std::result::Result<Option<GenomicFeature>, FeatureParseError> {
    let trimmed = line.trim_end();
    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("track")
        || trimmed.starts_with("browser")
    {
        return Ok(None);
    }

    let error = |message: String| FeatureParseError { line: line_number, message };
    let mut fields = trimmed.split('\t');

    let chr = fields.next().ok_or_else(|| error("missing chrom field".to_string()))?;
    let start_field =
        fields.next().ok_or_else(|| error("missing start field".to_string()))?;
    let end_field = fields.next().ok_or_else(|| error("missing end field".to_string()))?;

    let start: i64 = start_field
        .parse()
        .map_err(|_| error(format!("unparsable start '{start_field}'")))?;
    let end: i64 =
        end_field.parse().map_err(|_| error(format!("unparsable end '{end_field}'")))?;
    if end < start {
        return Err(error(format!("end {end} precedes start {start}")));
    }

    let name = fields.next().filter(|s| !s.is_empty() && *s != ".").map(str::to_string);
    let score = fields.next().and_then(|s| s.parse().ok());

    Ok(Some(GenomicFeature { chr: chr.to_string(), start, end, name, score }))
}

/// Parse a whole BED-style text, collecting features and per-line errors
/// side by side. Logs the error count when nonzero.
#[must_use]
pub fn parse_bed(text: &str) -> (Vec<GenomicFeature>, Vec<FeatureParseError>) {
    let mut features = Vec::new();
    let mut errors = Vec::new();

    for (i, line) in text.lines().enumerate() {
        match parse_bed_line(line, i + 1) {
            Ok(Some(feature)) => features.push(feature),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        log::warn!("skipped {} malformed feature line(s)", errors.len());
    }
    (features, errors)
}
