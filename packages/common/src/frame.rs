use std::collections::HashSet;

use serde_json::{Map, Value};

/// One row of a tabular snapshot: column name to cell value.
pub type Row = Map<String, Value>;

/// An ordered tabular snapshot of a dataset slice.
///
/// This is the currency between the dataset resolver and the scoring engine:
/// enough of a table to count rows, project columns, run a keyed join, and
/// pull the most recent row. Rows are JSON objects; within a row, keys
/// iterate in sorted order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    rows: Vec<Row>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("expected a JSON object, an array of objects, or a column map")]
    UnsupportedShape,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Parse a frame out of JSON. Accepts three shapes:
    /// an array of objects (one per row), a single object (one row), or a
    /// column-oriented map `{"col": {"label": value, ...}, ...}`.
    pub fn from_json(value: &Value) -> Result<Self, FrameError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(map) => rows.push(map.clone()),
                        _ => return Err(FrameError::UnsupportedShape),
                    }
                }
                Ok(Self { rows })
            }
            Value::Object(map) => {
                if !map.is_empty() && map.values().all(Value::is_object) {
                    Ok(Self::from_column_map(map))
                } else {
                    Ok(Self {
                        rows: vec![map.clone()],
                    })
                }
            }
            _ => Err(FrameError::UnsupportedShape),
        }
    }

    /// Build from `{"col": {"label": value}}`, the default serialization of
    /// dataframe-style clients. Row labels are ordered numerically when they
    /// parse as integers, lexicographically otherwise.
    fn from_column_map(map: &Map<String, Value>) -> Self {
        let mut labels: Vec<&String> = map
            .values()
            .filter_map(Value::as_object)
            .flat_map(|cells| cells.keys())
            .collect();
        labels.sort_by(|a, b| match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });
        labels.dedup();

        let rows = labels
            .into_iter()
            .map(|label| {
                let mut row = Row::new();
                for (column, cells) in map {
                    if let Some(cell) = cells.as_object().and_then(|c| c.get(label)) {
                        row.insert(column.clone(), cell.clone());
                    }
                }
                row
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The most recent row of the snapshot.
    pub fn last_row(&self) -> Option<&Row> {
        self.rows.last()
    }

    /// Column names across all rows, sorted.
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }
        columns.sort();
        columns
    }

    /// Project onto the named columns; absent cells are dropped per row.
    pub fn select(&self, columns: &[String]) -> Frame {
        let keep: HashSet<&str> = columns.iter().map(String::as_str).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(k, _)| keep.contains(k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .collect();
        Frame { rows }
    }

    /// Keep rows whose `key` cell stringifies to a member of `keep`.
    pub fn filter_key_in(&self, key: &str, keep: &HashSet<String>) -> Frame {
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row.get(key)
                    .map(|v| keep.contains(&scalar_key(v)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Frame { rows }
    }

    /// Distinct stringified values of the `key` column.
    pub fn key_values(&self, key: &str) -> HashSet<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(key))
            .map(scalar_key)
            .collect()
    }

    pub fn to_records(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }
}

/// Stable string form of a scalar used for join comparisons.
pub fn scalar_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
