use std::fmt;

use crate::{
    error::{BenchError, Result},
    schema::Schema,
};

/// A single cell. Struct values keep their fields in schema order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Struct(Vec<Value>),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::List(_) | Value::Struct(_) => self.to_json().to_string(),
        }
    }

    /// JSON rendering without field names; struct values become arrays.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::Bool(b) => serde_json::Value::from(*b),
            Value::List(items) | Value::Struct(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Immutable column-oriented snapshot of rows conforming to a [`Schema`].
///
/// Every edit returns a new table; row count and column types never change
/// after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    columns: Vec<Vec<Value>>,
    num_rows: usize,
}

impl Table {
    pub fn try_new(schema: Schema, columns: Vec<Vec<Value>>) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(BenchError::Invariant(format!(
                "{} column(s) supplied for a schema of {}",
                columns.len(),
                schema.len()
            )));
        }
        let num_rows = columns.first().map(Vec::len).unwrap_or(0);
        if let Some((idx, _)) = columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != num_rows)
        {
            return Err(BenchError::Invariant(format!(
                "column '{}' has a different row count than '{}'",
                schema.columns[idx].name, schema.columns[0].name
            )));
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn columns(&self) -> &[Vec<Value>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.schema
            .column_index(name)
            .map(|idx| self.columns[idx].as_slice())
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.columns[column][row]
    }

    /// Copies `len` rows starting at `offset`. Out-of-range requests are clamped.
    pub fn slice(&self, offset: usize, len: usize) -> Table {
        let start = offset.min(self.num_rows);
        let end = start.saturating_add(len).min(self.num_rows);
        Table {
            schema: self.schema.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| column[start..end].to_vec())
                .collect(),
            num_rows: end - start,
        }
    }

    pub fn concat(pieces: &[Table]) -> Result<Table> {
        let first = pieces
            .first()
            .ok_or_else(|| BenchError::Invariant("cannot concatenate zero tables".into()))?;
        let mut columns = vec![Vec::new(); first.schema.len()];
        for piece in pieces {
            if piece.schema != first.schema {
                return Err(BenchError::Invariant(
                    "cannot concatenate tables with different schemas".into(),
                ));
            }
            for (target, source) in columns.iter_mut().zip(&piece.columns) {
                target.extend_from_slice(source);
            }
        }
        Table::try_new(first.schema.clone(), columns)
    }

    /// Returns a copy whose cells at `rows` x `column` come from `replacement`
    /// (which is read sequentially, row by row).
    pub(crate) fn with_replaced_cells(
        &self,
        column: usize,
        rows: &[usize],
        replacement: &[Value],
    ) -> Result<Table> {
        if rows.len() != replacement.len() {
            return Err(BenchError::Invariant(format!(
                "{} replacement value(s) for {} row(s)",
                replacement.len(),
                rows.len()
            )));
        }
        let mut columns = self.columns.clone();
        for (&row, value) in rows.iter().zip(replacement) {
            let cell = columns[column].get_mut(row).ok_or_else(|| {
                BenchError::Invariant(format!("row {row} is outside the table"))
            })?;
            *cell = value.clone();
        }
        Table::try_new(self.schema.clone(), columns)
    }
}
