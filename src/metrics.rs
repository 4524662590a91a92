//! Row-to-sample mapping and the Prometheus text exposition format.
//!
//! Every run emits three gauge families named after the metric prefix
//! (`<db>_<table>`):
//!
//! - `<prefix>_value{id="..."}`: the value column, one sample per non-NULL value
//! - `<prefix>_updatedon{id="..."}`: the timestamp column as Unix seconds,
//!   one sample per non-NULL timestamp
//! - `<prefix>_total_rows`: the row count, always present
//!
//! The `id` label comes from the id column, sanitized to `[A-Za-z0-9_]`.
//! A NULL id is labelled `None`. Two rows with the same sanitized id would
//! push the same series twice, so mapping rejects them.
//! Static labels follow `id` on the per-row samples and are appended to
//! `total_rows` as well.

use crate::backend::{CellValue, QueryResult, Row};
use crate::config::{ColumnMapping, SourceConfig, sanitize};
use crate::error::DbpushError;
use std::collections::HashSet;

/// `id` label value for a NULL id cell.
pub const NULL_ID: &str = "None";

/// One exposition line: name, ordered labels, value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// A gauge family with its HELP text and samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub samples: Vec<Sample>,
}

/// The complete body of one push.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    families: Vec<MetricFamily>,
}

impl Payload {
    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn sample_count(&self) -> usize {
        self.families.iter().map(|f| f.samples.len()).sum()
    }

    /// Render as text exposition format 0.0.4, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for family in &self.families {
            out.push_str(&format!("# HELP {} {}\n", family.name, escape_help(&family.help)));
            out.push_str(&format!("# TYPE {} gauge\n", family.name));
            for sample in &family.samples {
                out.push_str(&render_sample(sample));
                out.push('\n');
            }
        }
        out
    }
}

fn render_sample(sample: &Sample) -> String {
    if sample.labels.is_empty() {
        return format!("{} {}", sample.name, format_value(sample.value));
    }
    let labels = sample
        .labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{}{{{}}} {}", sample.name, labels, format_value(sample.value))
}

/// Escape `\`, `"` and newlines in a label value.
pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Shortest float form; non-finite values use the Prometheus spellings.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", value)
    }
}

/// Text used for the `id` label, before sanitizing.
fn label_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => format_value(*n),
        CellValue::Timestamp(ts) => ts.to_rfc3339(),
        CellValue::Null => NULL_ID.to_string(),
    }
}

fn value_of(cell: &CellValue, column: &str) -> Result<Option<f64>, DbpushError> {
    match cell {
        CellValue::Null => Ok(None),
        CellValue::Number(n) => Ok(Some(*n)),
        CellValue::Timestamp(ts) => Ok(Some(ts.timestamp() as f64)),
        CellValue::Text(s) => s.trim().parse::<f64>().map(Some).map_err(|_| DbpushError::Query {
            message: format!("value column '{}' holds non-numeric text '{}'", column, s),
        }),
    }
}

fn timestamp_of(cell: &CellValue, column: &str) -> Result<Option<f64>, DbpushError> {
    match cell {
        CellValue::Null => Ok(None),
        CellValue::Timestamp(ts) => Ok(Some(ts.timestamp() as f64)),
        // Numeric columns are taken as epoch seconds already.
        CellValue::Number(n) => Ok(Some(n.trunc())),
        CellValue::Text(_) => Err(DbpushError::Query {
            message: format!("timestamp column '{}' holds text, expected a timestamp", column),
        }),
    }
}

fn cell<'r>(row: &'r Row, column: &str) -> Result<&'r CellValue, DbpushError> {
    row.get(column).ok_or_else(|| DbpushError::Query {
        message: format!("query result has no column '{}'", column),
    })
}

fn check_columns(result: &QueryResult, columns: &ColumnMapping) -> Result<(), DbpushError> {
    // Every row of one result shares a shape; the first one stands for all.
    let Some(first) = result.rows.first() else {
        return Ok(());
    };
    let present = |column: &str| {
        if result.columns.is_empty() {
            first.get(column).is_some()
        } else {
            result.has_column(column)
        }
    };
    for column in [&columns.id, &columns.value, &columns.updatedon] {
        if !present(column) {
            return Err(DbpushError::Query {
                message: format!("query result has no column '{}'", column),
            });
        }
    }
    Ok(())
}

/// Map every row of one query result into the payload for one push.
///
/// Either the whole result maps or the call fails; no partial payload is returned.
pub fn build_payload(
    result: &QueryResult,
    source: &SourceConfig,
    static_labels: &[(String, String)],
) -> Result<Payload, DbpushError> {
    let columns = &source.columns;
    check_columns(result, columns)?;

    let prefix = &source.metric_prefix;
    let table = &source.table;

    let mut value = MetricFamily {
        name: format!("{prefix}_value"),
        help: format!("Value from {table}"),
        samples: Vec::new(),
    };
    let mut updatedon = MetricFamily {
        name: format!("{prefix}_updatedon"),
        help: format!("Last update timestamp from {table}"),
        samples: Vec::new(),
    };
    let total_rows = MetricFamily {
        name: format!("{prefix}_total_rows"),
        help: format!("Total number of rows in {table}"),
        samples: vec![Sample {
            name: format!("{prefix}_total_rows"),
            labels: static_labels.to_vec(),
            value: result.rows.len() as f64,
        }],
    };

    let mut seen: HashSet<String> = HashSet::with_capacity(result.rows.len());
    for row in &result.rows {
        let raw_id = label_text(cell(row, &columns.id)?);
        let id = sanitize(&raw_id);
        if !seen.insert(id.clone()) {
            return Err(DbpushError::Query {
                message: format!(
                    "id '{}' (from '{}') maps to more than one row; ids must be unique after sanitizing",
                    id, raw_id
                ),
            });
        }
        let mut labels = Vec::with_capacity(1 + static_labels.len());
        labels.push(("id".to_string(), id));
        labels.extend_from_slice(static_labels);

        if let Some(v) = value_of(cell(row, &columns.value)?, &columns.value)? {
            value.samples.push(Sample {
                name: value.name.clone(),
                labels: labels.clone(),
                value: v,
            });
        }

        if let Some(ts) = timestamp_of(cell(row, &columns.updatedon)?, &columns.updatedon)? {
            updatedon.samples.push(Sample {
                name: updatedon.name.clone(),
                labels,
                value: ts,
            });
        }
    }

    Ok(Payload {
        families: vec![value, updatedon, total_rows],
    })
}
