//! Decoding of the receivers' `-format` output.
//!
//! Receivers print a comma-separated, row-labeled table: one row per trial
//! (labeled with the run number) followed by a row labeled `Average`. The
//! header line is optional. When present it either names every column or
//! omits the label column, so both `Time (ms),Speed (MB/s)` and
//! `Run,Time (ms),Speed (MB/s)` are accepted over rows of three fields.

use crate::{BenchError, Result, TrialBatchOutcome, TrialResult};

/// Label of the aggregate row.
pub const AVERAGE_LABEL: &str = "Average";
/// Metric column holding elapsed transfer time.
pub const TIME_COLUMN: &str = "Time (ms)";
/// Metric column holding throughput.
pub const SPEED_COLUMN: &str = "Speed (MB/s)";

/// Column layout expected from a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    /// Metric column names assumed when the output carries no header line
    pub default_columns: Vec<String>,
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self {
            default_columns: vec![TIME_COLUMN.to_string(), SPEED_COLUMN.to_string()],
        }
    }
}

struct Row<'a> {
    line_no: usize,
    label: &'a str,
    values: Vec<f64>,
}

/// Parses captured receiver output into a [`TrialBatchOutcome`].
///
/// # Examples
///
/// ```rust
/// use lossbench_core::output::{parse_trial_table, OutputSchema};
///
/// let raw = b"Time (ms),Speed (MB/s)\n0,10.0,5.0\n1,20.0,5.0\nAverage,15.0,5.0\n";
/// let outcome = parse_trial_table(raw, &OutputSchema::default()).unwrap();
/// assert_eq!(outcome.trials.len(), 2);
/// assert_eq!(outcome.average.time_ms, 15.0);
/// ```
pub fn parse_trial_table(raw: &[u8], schema: &OutputSchema) -> Result<TrialBatchOutcome> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| BenchError::parse(format!("receiver output is not UTF-8: {e}")))?;

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .peekable();

    let first = match lines.peek() {
        Some(&(_, line)) => line,
        None => return Err(BenchError::parse("receiver produced no output")),
    };

    let header: Option<Vec<&str>> = if is_header(first) {
        lines.next();
        Some(first.split(',').map(str::trim).collect())
    } else {
        None
    };

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let mut fields = line.split(',').map(str::trim);
        let label = fields.next().unwrap_or_default();
        if label.is_empty() {
            return Err(BenchError::parse(format!("line {line_no}: missing row label")));
        }
        let values = fields
            .map(|field| parse_metric(field, line_no))
            .collect::<Result<Vec<_>>>()?;
        rows.push(Row {
            line_no,
            label,
            values,
        });
    }

    let width = match rows.first() {
        Some(row) => row.values.len(),
        None => return Err(BenchError::parse("receiver output contains no data rows")),
    };
    if let Some(row) = rows.iter().find(|row| row.values.len() != width) {
        return Err(BenchError::parse(format!(
            "line {}: expected {} metric columns, found {}",
            row.line_no,
            width,
            row.values.len()
        )));
    }

    let columns: Vec<&str> = match &header {
        Some(names) if names.len() == width => names.clone(),
        Some(names) if names.len() == width + 1 => names[1..].to_vec(),
        Some(names) => {
            return Err(BenchError::parse(format!(
                "header has {} columns but rows carry {} metrics",
                names.len(),
                width
            )))
        }
        None if schema.default_columns.len() == width => {
            schema.default_columns.iter().map(String::as_str).collect()
        }
        None => {
            return Err(BenchError::parse(format!(
                "headerless output has {} metric columns, expected {}",
                width,
                schema.default_columns.len()
            )))
        }
    };

    let time_idx = column_index(&columns, TIME_COLUMN)?;
    let speed_idx = column_index(&columns, SPEED_COLUMN)?;

    let mut trials = Vec::with_capacity(rows.len().saturating_sub(1));
    let mut average = None;
    for row in &rows {
        let result = TrialResult::new(row.values[time_idx], row.values[speed_idx]);
        if row.label == AVERAGE_LABEL {
            if average.replace(result).is_some() {
                return Err(BenchError::parse(format!(
                    "line {}: duplicate {AVERAGE_LABEL} row",
                    row.line_no
                )));
            }
        } else {
            trials.push(result);
        }
    }

    let average = average
        .ok_or_else(|| BenchError::parse(format!("no row labeled {AVERAGE_LABEL}")))?;
    Ok(TrialBatchOutcome { trials, average })
}

/// A line is a header when any of its metric fields is not numeric.
fn is_header(line: &str) -> bool {
    line.split(',')
        .skip(1)
        .any(|field| field.trim().parse::<f64>().is_err())
        || line.split(',').count() == 1
}

fn parse_metric(field: &str, line_no: usize) -> Result<f64> {
    let value: f64 = field
        .parse()
        .map_err(|_| BenchError::parse(format!("line {line_no}: `{field}` is not a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(BenchError::parse(format!(
            "line {line_no}: metric `{field}` must be finite and non-negative"
        )));
    }
    Ok(value)
}

fn column_index(columns: &[&str], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| *c == name)
        .ok_or_else(|| BenchError::parse(format!("missing column `{name}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(raw: &str) -> Result<TrialBatchOutcome> {
        parse_trial_table(raw.as_bytes(), &OutputSchema::default())
    }

    #[test]
    fn test_header_without_label_column() {
        let outcome = parse(
            "Time (ms),Speed (MB/s)\n0,10.5,4.0\n1,20.5,6.0\n2,30.5,5.0\nAverage,20.5,5.0\n",
        )
        .unwrap();
        assert_eq!(outcome.trials.len(), 3);
        assert_eq!(outcome.trials[0], TrialResult::new(10.5, 4.0));
        assert_eq!(outcome.average, TrialResult::new(20.5, 5.0));
    }

    #[test]
    fn test_header_with_label_column() {
        let outcome = parse("Run,Speed (MB/s),Time (ms)\n0,4.0,10.0\nAverage,4.0,10.0\n").unwrap();
        assert_eq!(outcome.trials, vec![TrialResult::new(10.0, 4.0)]);
    }

    #[test]
    fn test_headerless_output_uses_default_columns() {
        let outcome = parse("0,12.0,3.0\r\n1,14.0,5.0\r\n\r\nAverage,13.0,4.0\r\n").unwrap();
        assert_eq!(outcome.trials.len(), 2);
        assert_eq!(outcome.average.speed_mbps, 4.0);
    }

    #[test]
    fn test_missing_average_row() {
        let err = parse("Time (ms),Speed (MB/s)\n0,10,5\n1,20,5\n2,30,5\n").unwrap_err();
        assert!(matches!(err, BenchError::Parse { .. }));
        assert!(err.to_string().contains("Average"));
    }

    #[test]
    fn test_duplicate_average_row() {
        let err = parse("0,10,5\nAverage,10,5\nAverage,10,5\n").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_inconsistent_column_count() {
        let err = parse("Time (ms),Speed (MB/s)\n0,10,5\n1,20\nAverage,15,5\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_non_numeric_and_negative_metrics() {
        assert!(parse("Time (ms),Speed (MB/s)\n0,abc,5\nAverage,1,1\n").is_err());
        assert!(parse("Time (ms),Speed (MB/s)\n0,-1,5\nAverage,1,1\n").is_err());
        assert!(parse("Time (ms),Speed (MB/s)\n0,NaN,5\nAverage,1,1\n").is_err());
    }

    #[test]
    fn test_infinite_speed_is_distinct_from_garbage() {
        // A zero-duration transfer makes the receiver print `inf`.
        let err = parse("0,0.000000,inf\nAverage,0.000000,inf\n").unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("must be finite"));

        let err = parse("0,1.000000,2.000000\n1,1.000000,fast\nAverage,1.000000,2.000000\n")
            .unwrap_err();
        assert!(err.to_string().contains("is not a number"));
    }

    #[test]
    fn test_missing_required_column() {
        let err = parse("Time (ms),Bytes\n0,10,5\nAverage,10,5\n").unwrap_err();
        assert!(err.to_string().contains(SPEED_COLUMN));
    }

    #[test]
    fn test_empty_and_invalid_utf8() {
        assert!(parse("").is_err());
        assert!(parse("\n\n").is_err());
        assert!(parse("Time (ms),Speed (MB/s)\n").is_err());
        let err = parse_trial_table(&[0xff, 0xfe, b'\n'], &OutputSchema::default()).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    proptest! {
        #[test]
        fn prop_trial_rows_survive_parsing(
            times in proptest::collection::vec(1.0f64..10_000.0, 1..40),
        ) {
            let mut raw = String::from("Time (ms),Speed (MB/s)\n");
            for (i, t) in times.iter().enumerate() {
                raw.push_str(&format!("{},{:.6},{:.6}\n", i, t, 1000.0 / t));
            }
            let avg = times.iter().sum::<f64>() / times.len() as f64;
            raw.push_str(&format!("Average,{avg:.6},1.0\n"));

            let outcome = parse(&raw).unwrap();
            prop_assert_eq!(outcome.trials.len(), times.len());
            prop_assert!(outcome.ensure_complete(times.len()).is_ok());
            prop_assert!(outcome.average_is_consistent(1e-5));
        }
    }
}
