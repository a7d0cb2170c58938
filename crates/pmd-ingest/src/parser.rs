//! Product master data feed parser
//!
//! Each feed line is a 7-field CSV row:
//!
//! ```text
//! material_number,description,weight,length,width,height,serial
//! PMD-TEST-003,PMD Test Product 003,0.5,20,25,20,N
//! ```
//!
//! Weight defaults to 0.0 when blank. Volume is `length * width * height /
//! 1_000_000` when all three dimensions are present, otherwise 0.0. The serial
//! flag maps `Y`/`y` to serial tracking and anything else to no tracking.

use pmd_common::{PmdError, Result};
use tracing::trace;

use crate::models::{NormalizedRecord, Tracking};

/// Number of fields in a feed row
pub const FIELD_COUNT: usize = 7;

/// Dimensions are given in units whose cube is a millionth of the volume unit
const VOLUME_SCALE: f64 = 1_000_000.0;

/// One feed row split into its raw fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub material_number: &'a str,
    pub description: &'a str,
    pub weight: &'a str,
    pub length: &'a str,
    pub width: &'a str,
    pub height: &'a str,
    pub serial: &'a str,
}

impl<'a> RawRecord<'a> {
    /// Split a CSV record into raw fields, checking the arity
    pub fn from_fields(fields: &'a csv::StringRecord, line: &str) -> Result<Self> {
        if fields.len() != FIELD_COUNT {
            return Err(PmdError::parse(
                line,
                format!("expected {} fields, got {}", FIELD_COUNT, fields.len()),
            ));
        }

        Ok(Self {
            material_number: &fields[0],
            description: &fields[1],
            weight: &fields[2],
            length: &fields[3],
            width: &fields[4],
            height: &fields[5],
            serial: &fields[6],
        })
    }

    /// Apply the normalization rules
    pub fn normalize(&self, line: &str) -> Result<NormalizedRecord> {
        let weight = parse_decimal(self.weight, "weight", line)?.unwrap_or(0.0);

        let volume = match (
            parse_decimal(self.length, "length", line)?,
            parse_decimal(self.width, "width", line)?,
            parse_decimal(self.height, "height", line)?,
        ) {
            (Some(length), Some(width), Some(height)) => length * width * height / VOLUME_SCALE,
            _ => 0.0,
        };

        NormalizedRecord::new(
            self.material_number,
            self.description,
            weight,
            volume,
            Tracking::from_indicator(self.serial),
        )
        .ok_or_else(|| {
            PmdError::parse(line, "material number must be non-empty and measurements non-negative")
        })
    }
}

/// Parse a blank-or-decimal measurement, which must be finite and non-negative
fn parse_decimal(value: &str, field: &str, line: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let parsed: f64 = value
        .parse()
        .map_err(|_| PmdError::parse(line, format!("invalid {} '{}'", field, value)))?;

    if !parsed.is_finite() || parsed < 0.0 {
        return Err(PmdError::parse(line, format!("invalid {} '{}'", field, value)));
    }

    Ok(Some(parsed))
}

/// Parse one feed line into a normalized record
pub fn parse_line(line: &str) -> Result<NormalizedRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut fields = csv::StringRecord::new();
    let found = reader
        .read_record(&mut fields)
        .map_err(|e| PmdError::parse(line, e.to_string()))?;
    if !found {
        return Err(PmdError::parse(line, "empty row"));
    }

    let record = RawRecord::from_fields(&fields, line)?.normalize(line)?;
    trace!(key = record.key(), "Parsed feed row");
    Ok(record)
}

/// Single-pass producer of normalized records
///
/// Wraps a stream of raw lines and parses each one as it is pulled. It
/// cannot be restarted or cloned: a caller that needs to retry must rebuild
/// it from the raw source.
#[derive(Debug)]
pub struct FeedRecords<I> {
    lines: I,
}

impl<I> FeedRecords<I>
where
    I: Iterator<Item = Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self { lines }
    }
}

impl<I> Iterator for FeedRecords<I>
where
    I: Iterator<Item = Result<String>>,
{
    type Item = Result<NormalizedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines
            .next()
            .map(|line| line.and_then(|line| parse_line(&line)))
    }
}

/// Parse in-memory lines, mainly for callers that already hold the text
pub fn parse_lines<'a, L>(lines: L) -> impl Iterator<Item = Result<NormalizedRecord>> + 'a
where
    L: IntoIterator<Item = &'a str>,
    L::IntoIter: 'a,
{
    FeedRecords::new(lines.into_iter().map(|line| Ok(line.to_string())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_parse_full_row() {
        let record = parse_line("PMD-TEST-003,PMD Test Product 003,0.5,20,25,20,N").unwrap();
        assert_eq!(record.key(), "PMD-TEST-003");
        assert_eq!(record.description(), "PMD Test Product 003");
        assert!(approx(record.weight(), 0.5));
        assert!(approx(record.volume(), 0.01));
        assert_eq!(record.tracking(), Tracking::None);
    }

    #[test]
    fn test_defaults_for_blank_fields() {
        let record = parse_line("PMD-TEST-004,PMD Test Product 004,,,,,").unwrap();
        assert_eq!(record.weight(), 0.0);
        assert_eq!(record.volume(), 0.0);
        assert_eq!(record.tracking(), Tracking::None);
    }

    #[test]
    fn test_volume_from_dimensions() {
        let record = parse_line("K,Desc,,2,5,50,y").unwrap();
        assert!(approx(record.volume(), 0.0005));
        assert_eq!(record.tracking(), Tracking::Serial);
    }

    #[test]
    fn test_missing_dimension_gives_zero_volume() {
        for line in ["K,Desc,1,,5,50,N", "K,Desc,1,2,,50,N", "K,Desc,1,2,5,,N"] {
            let record = parse_line(line).unwrap();
            assert_eq!(record.volume(), 0.0, "line {}", line);
            assert!(approx(record.weight(), 1.0));
        }
    }

    #[test]
    fn test_quoted_description_with_comma() {
        let record = parse_line("K,\"Bolt, M8\",0.01,,,,Y").unwrap();
        assert_eq!(record.description(), "Bolt, M8");
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let err = parse_line("K,Desc,1,2,5").unwrap_err();
        match err {
            PmdError::Parse { line, message } => {
                assert_eq!(line, "K,Desc,1,2,5");
                assert!(message.contains("expected 7 fields, got 5"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_weight_is_rejected() {
        let err = parse_line("K,Desc,heavy,,,,N").unwrap_err();
        assert!(err.to_string().contains("invalid weight 'heavy'"));
    }

    #[test]
    fn test_non_numeric_dimension_is_rejected() {
        assert!(parse_line("K,Desc,1,2,wide,3,N").is_err());
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(parse_line(",Desc,1,,,,N").is_err());
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        assert!(parse_line("K,Desc,-1,,,,N").is_err());
    }

    #[test]
    fn test_negative_dimensions_are_rejected() {
        // The product of two negatives would be a valid volume
        let err = parse_line("K,Desc,1,-2,-5,50,N").unwrap_err();
        match err {
            PmdError::Parse { line, message } => {
                assert_eq!(line, "K,Desc,1,-2,-5,50,N");
                assert!(message.contains("invalid length '-2'"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse_line("K,Desc,1,2,5,-50,N").is_err());
    }

    #[test]
    fn test_key_is_kept_verbatim() {
        let record = parse_line(" PMD-1 ,Desc,,,,,N").unwrap();
        assert_eq!(record.key(), " PMD-1 ");
        assert!(parse_line("   ,Desc,,,,,N").is_err());
    }

    #[test]
    fn test_feed_records_propagates_line_errors() {
        let lines = vec![
            Ok("A,One,,,,,Y".to_string()),
            Err(PmdError::Decode("bad bytes".to_string())),
        ];
        let mut records = FeedRecords::new(lines.into_iter());
        assert_eq!(records.next().unwrap().unwrap().key(), "A");
        assert!(matches!(records.next().unwrap(), Err(PmdError::Decode(_))));
        assert!(records.next().is_none());
    }

    #[test]
    fn test_parse_lines_is_lazy() {
        let mut records = parse_lines(["A,One,,,,,Y", "broken"]);
        assert!(records.next().unwrap().is_ok());
        assert!(records.next().unwrap().is_err());
    }
}
