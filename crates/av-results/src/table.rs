//! Table readers for run files.
//!
//! Two layouts are accepted:
//! - JSON Lines: one row object per line
//! - columnar JSON: an object of equal-length arrays, or an array of row objects

use serde_json::{Map, Value};

use crate::{ResultsError, ResultsResult};

/// One row: column name to cell value.
pub type Row = Map<String, Value>;

/// Ordered rows of one run file.
pub type Table = Vec<Row>;

/// Parses `content` according to the extension of `file`.
pub fn parse_table(file: &str, content: &str) -> ResultsResult<Table> {
    let ext = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jsonl" | "ndjson" => parse_json_lines(file, content),
        "json" => parse_json_document(file, content),
        _ => Err(ResultsError::UnsupportedFormat {
            file: file.to_string(),
        }),
    }
}

pub fn parse_json_lines(file: &str, content: &str) -> ResultsResult<Table> {
    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line)? {
            Value::Object(row) => rows.push(row),
            _ => {
                return Err(ResultsError::MalformedTable {
                    file: file.to_string(),
                    message: format!("line {} is not an object", line_no + 1),
                });
            }
        }
    }
    Ok(rows)
}

pub fn parse_json_document(file: &str, content: &str) -> ResultsResult<Table> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                _ => Err(ResultsError::MalformedTable {
                    file: file.to_string(),
                    message: format!("element {} is not an object", i),
                }),
            })
            .collect(),
        Value::Object(columns) => transpose_columns(file, columns),
        _ => Err(ResultsError::MalformedTable {
            file: file.to_string(),
            message: "expected an array of rows or an object of columns".to_string(),
        }),
    }
}

fn transpose_columns(file: &str, columns: Map<String, Value>) -> ResultsResult<Table> {
    let mut arrays = Vec::with_capacity(columns.len());
    let mut len: Option<usize> = None;
    for (name, column) in columns {
        let Value::Array(values) = column else {
            return Err(ResultsError::MalformedTable {
                file: file.to_string(),
                message: format!("column {} is not an array", name),
            });
        };
        match len {
            None => len = Some(values.len()),
            Some(n) if n != values.len() => {
                return Err(ResultsError::MalformedTable {
                    file: file.to_string(),
                    message: format!(
                        "column {} has {} values, expected {}",
                        name,
                        values.len(),
                        n
                    ),
                });
            }
            Some(_) => {}
        }
        arrays.push((name, values));
    }

    let mut rows: Table = vec![Row::new(); len.unwrap_or(0)];
    for (name, values) in arrays {
        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(name.clone(), value);
        }
    }
    Ok(rows)
}
