use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::data::plasma::{PlasmaDataError, PlasmaSample, TimeActivityCurve};
use crate::KineticError;

const PREALLOCATED_SAMPLES: usize = 1024;

/// Read an input function from disk
///
/// Files ending in `.csv` are read as CSV with (case-insensitive) `time`,
/// `plasma` and optional `blood` columns; `#` starts a comment line.
/// Anything else is read as the whitespace format: the number of samples,
/// followed by that many `time plasma blood` triples.
///
/// # Example
///
/// ```rust,no_run
/// use petkin::data::parser::read_plasma_data;
///
/// let curve = read_plasma_data("blood_file.txt").unwrap();
/// println!("{} samples", curve.len());
/// ```
pub fn read_plasma_data(path: impl AsRef<Path>) -> Result<TimeActivityCurve, KineticError> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let curve = if is_csv {
        let reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| KineticError::FileNotFound {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        plasma_from_csv(reader)?
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| KineticError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        parse_plasma_text(&text)?
    };

    debug!(path = %path.display(), samples = curve.len(), "read plasma data");
    Ok(curve)
}

/// Parse the whitespace plasma format from a string
pub fn parse_plasma_text(text: &str) -> Result<TimeActivityCurve, PlasmaDataError> {
    let mut tokens = text.split_whitespace();

    let count: usize = tokens
        .next()
        .ok_or(PlasmaDataError::Empty)?
        .parse()
        .map_err(|_| PlasmaDataError::Malformed("first entry must be the number of samples".into()))?;

    let mut next_number = |index: usize, column: &str| -> Result<f64, PlasmaDataError> {
        let token = tokens.next().ok_or_else(|| {
            PlasmaDataError::Malformed(format!(
                "expected {} samples, data ends in sample {}",
                count,
                index + 1
            ))
        })?;
        token.parse().map_err(|_| {
            PlasmaDataError::Malformed(format!(
                "sample {}: cannot read {} value '{}'",
                index + 1,
                column,
                token
            ))
        })
    };

    // The header count is only checked as samples are read
    let mut samples = Vec::with_capacity(count.min(PREALLOCATED_SAMPLES));
    for index in 0..count {
        let time = next_number(index, "time")?;
        let plasma = next_number(index, "plasma")?;
        let blood = next_number(index, "blood")?;
        samples.push(PlasmaSample::new(time, plasma).with_blood(blood));
    }

    TimeActivityCurve::new(samples)
}

#[derive(Debug, Deserialize)]
struct PlasmaRow {
    time: f64,
    plasma: f64,
    #[serde(default)]
    blood: Option<f64>,
}

/// Read CSV plasma data from any reader
pub fn plasma_from_csv<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> Result<TimeActivityCurve, KineticError> {
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect::<Vec<_>>();
    reader.set_headers(csv::StringRecord::from(headers));

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let row: PlasmaRow = row?;
        let sample = PlasmaSample::new(row.time, row.plasma);
        samples.push(match row.blood {
            Some(blood) => sample.with_blood(blood),
            None => sample,
        });
    }

    Ok(TimeActivityCurve::new(samples)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_sample_count_is_malformed() {
        let err = parse_plasma_text("18446744073709551615 0 1 1").unwrap_err();
        match err {
            PlasmaDataError::Malformed(message) => {
                assert!(message.contains("data ends in sample 2"), "{message}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn whitespace_format() {
        let curve = parse_plasma_text("3\n0 0 0\n60 12.5 10\n120 8.0 7.5\n").unwrap();
        assert_eq!(curve.times(), &[0.0, 60.0, 120.0]);
        assert_eq!(curve.values(), &[0.0, 12.5, 8.0]);
        assert_eq!(curve.blood_curve().unwrap().values(), &[0.0, 10.0, 7.5]);
    }

    #[test]
    fn whitespace_format_truncated() {
        let err = parse_plasma_text("3\n0 0 0\n60 12.5").unwrap_err();
        assert!(matches!(err, PlasmaDataError::Malformed(_)), "{err:?}");
    }

    #[test]
    fn whitespace_format_bad_count() {
        assert!(matches!(
            parse_plasma_text("three 0 0 0"),
            Err(PlasmaDataError::Malformed(_))
        ));
        assert_eq!(parse_plasma_text("  ").unwrap_err(), PlasmaDataError::Empty);
    }

    #[test]
    fn csv_with_optional_blood_column() {
        let data = "# input function\nTIME,Plasma\n0,0\n30,5\n60,4\n";
        let reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .from_reader(data.as_bytes());
        let curve = plasma_from_csv(reader).unwrap();
        assert_eq!(curve.len(), 3);
        assert_eq!(curve.values(), &[0.0, 5.0, 4.0]);
        assert!(curve.blood_curve().is_none());
    }

    #[test]
    fn csv_with_unsorted_times() {
        let data = "time,plasma\n0,0\n30,5\n20,4\n";
        let reader = csv::Reader::from_reader(data.as_bytes());
        let err = plasma_from_csv(reader).unwrap_err();
        assert!(matches!(
            err,
            KineticError::InvalidPlasmaData(PlasmaDataError::UnsortedTimes { index: 2, .. })
        ));
    }
}
