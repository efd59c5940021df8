//! Reflectivity data files.
//!
//! Column files `Q R dR [dQ]`, comma- or whitespace-separated. Lines starting
//! with `#` are comments and a leading non-numeric row is taken as a header.
//! The same layout is written back with a `q,r,dr[,dq]` header.

use std::fs::{self, File};
use std::path::Path;

use crate::domain::{DataPoint, Dataset};
use crate::error::AppError;

/// Load a dataset from a column file.
pub fn read_dataset(path: &Path) -> Result<Dataset, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(3, format!("Failed to open data file '{}': {e}", path.display())))?;
    parse_dataset(&text).map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

/// Parse column text (see module docs).
pub fn parse_dataset(text: &str) -> Result<Dataset, AppError> {
    let comma = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .is_some_and(|l| l.contains(','));
    let normalized;
    let (body, delimiter) = if comma {
        (text, b',')
    } else {
        normalized = text.replace('\t', " ");
        (normalized.as_str(), b' ')
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut points = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AppError::new(3, format!("CSV parse error: {e}")))?;
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }

        let values: Result<Vec<f64>, _> = fields.iter().map(|f| f.parse::<f64>()).collect();
        let values = match values {
            Ok(v) => v,
            Err(_) if points.is_empty() && idx == 0 => continue,
            Err(e) => return Err(AppError::new(3, format!("line {line}: {e}"))),
        };
        let point = match values.as_slice() {
            [q, r, dr] => DataPoint {
                q: *q,
                r: *r,
                dr: *dr,
                dq: None,
            },
            [q, r, dr, dq, ..] => DataPoint {
                q: *q,
                r: *r,
                dr: *dr,
                dq: Some(*dq),
            },
            _ => {
                return Err(AppError::new(
                    3,
                    format!("line {line}: expected at least 3 columns (Q R dR), found {}", values.len()),
                ));
            }
        };
        points.push(point);
    }

    Ok(Dataset::new(points)?)
}

/// Write a dataset as comma-separated columns.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create data file '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write data file: {e}"));

    let has_dq = dataset.points()[0].dq.is_some();
    if has_dq {
        writer.write_record(["q", "r", "dr", "dq"]).map_err(write_err)?;
    } else {
        writer.write_record(["q", "r", "dr"]).map_err(write_err)?;
    }
    for p in dataset.points() {
        let mut row = vec![format!("{:e}", p.q), format!("{:e}", p.r), format!("{:e}", p.dr)];
        if let Some(dq) = p.dq {
            row.push(format!("{dq:e}"));
        }
        writer.write_record(&row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write data file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitespace_columns_with_comments() {
        let text = "# reduced data\n# Q R dR\n0.01   0.98\t0.01\n0.02 0.5 0.02  \n\n0.03 0.1 0.005\n";
        let data = parse_dataset(text).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.points()[1].r, 0.5);
        assert!(data.dq().is_none());
    }

    #[test]
    fn parses_csv_with_header_and_dq() {
        let text = "Q,R,dR,dQ\n0.01,1.0,0.01,0.0005\n0.02,0.4,0.01,0.001\n";
        let data = parse_dataset(text).unwrap();
        assert_eq!(data.dq(), Some(vec![0.0005, 0.001]));
    }

    #[test]
    fn bad_rows_report_their_line() {
        let err = parse_dataset("0.01 1.0 0.01\n0.02 oops 0.01\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("line 2"), "{err}");

        let err = parse_dataset("0.01 1.0\n").unwrap_err();
        assert!(err.to_string().contains("3 columns"));
    }

    #[test]
    fn invariant_violations_are_data_errors() {
        let err = parse_dataset("0.02 1.0 0.01\n0.01 1.0 0.01\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("increasing"));
    }

    #[test]
    fn written_files_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.csv");
        let data = Dataset::from_columns(&[0.01, 0.05], &[0.9, 1.5e-4], &[0.01, 1e-5], Some(&[5e-4, 2.5e-3])).unwrap();
        write_dataset(&path, &data).unwrap();
        assert_eq!(read_dataset(&path).unwrap(), data);
    }
}
