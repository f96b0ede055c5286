//! Seeded synthetic tables and their deterministic edit variants.
//!
//! Every random draw goes through the single [`StdRng`] held by a
//! [`Generator`], so the same seed, schema and edit plan reproduce identical
//! tables. Differences measured between formats are then attributable to the
//! format alone.
//!
//! Edit clusters follow one rule for every edit kind: with `N` base rows and
//! edit point `p`, the boundary is `b = round(p * N)` and the cluster covers
//! rows `[b - edit_size, b)`. Deletes drop the cluster, updates overwrite it
//! and inserts splice fresh rows in at `b`. The implicit final boundary (`1.0`)
//! is never edited.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Table, Value},
    error::{BenchError, Result},
    schema::{DataType, Schema},
};

const MAX_VALUE: i64 = 1_000_000;
const STR_LEN: std::ops::Range<usize> = 10..100;
const LARGE_STR_LEN: std::ops::Range<usize> = 100..1000;
const LIST_LEN: std::ops::Range<usize> = 0..5;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ";

pub const ORIGINAL: &str = "original";
pub const DELETED: &str = "deleted";
pub const INSERTED: &str = "inserted";
pub const APPENDED: &str = "appended";
pub const UPDATED: &str = "updated";

pub fn updated_column_variant(column: &str) -> String {
    format!("{UPDATED}_{column}")
}

/// Where and how much a base table is edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    /// Fractional positions in `[0, 1)`, strictly increasing.
    pub edit_points: Vec<f64>,
    pub edit_size: usize,
    pub append_ratio: f64,
}

impl EditPlan {
    pub fn new(edit_points: Vec<f64>, edit_size: usize, append_ratio: f64) -> Self {
        Self {
            edit_points,
            edit_size,
            append_ratio,
        }
    }

    /// Spreads `num_edits` points over `[0.5/k, 1 - 0.5/k]`.
    pub fn evenly_spaced(num_edits: usize, edit_size: usize, append_ratio: f64) -> Self {
        let edit_points = match num_edits {
            0 => Vec::new(),
            1 => vec![0.5],
            k => {
                let first = 0.5 / k as f64;
                let last = 1.0 - first;
                let step = (last - first) / (k - 1) as f64;
                (0..k).map(|i| first + step * i as f64).collect()
            }
        };
        Self::new(edit_points, edit_size, append_ratio)
    }

    /// Maps edit points onto absolute row boundaries for a table of
    /// `num_rows`, rejecting plans whose clusters overlap or fall outside the
    /// table.
    pub fn boundaries(&self, num_rows: usize) -> Result<Vec<usize>> {
        if !self.append_ratio.is_finite() || self.append_ratio < 0.0 {
            return Err(BenchError::EditPlan(format!(
                "append ratio must be a non-negative number, got {}",
                self.append_ratio
            )));
        }
        if self.edit_points.is_empty() {
            return Ok(Vec::new());
        }
        if self.edit_size == 0 {
            return Err(BenchError::EditPlan("edit size must be at least 1".into()));
        }
        let touched = self.edit_size.saturating_mul(self.edit_points.len());
        if touched >= num_rows {
            return Err(BenchError::EditPlan(format!(
                "{} edit(s) of {} row(s) do not fit in {num_rows} row(s)",
                self.edit_points.len(),
                self.edit_size
            )));
        }

        let mut boundaries = Vec::with_capacity(self.edit_points.len());
        let mut previous: Option<(f64, usize)> = None;
        for &point in &self.edit_points {
            if !(0.0..1.0).contains(&point) {
                return Err(BenchError::EditPlan(format!(
                    "edit point {point} is outside [0, 1)"
                )));
            }
            let boundary = (point * num_rows as f64).round() as usize;
            let floor = match previous {
                Some((prev_point, _)) if point <= prev_point => {
                    return Err(BenchError::EditPlan(format!(
                        "edit points must be strictly increasing ({prev_point} then {point})"
                    )));
                }
                Some((_, prev_boundary)) => prev_boundary,
                None => 0,
            };
            if boundary < floor + self.edit_size {
                return Err(BenchError::EditPlan(format!(
                    "edit cluster ending at row {boundary} overlaps rows before {floor}"
                )));
            }
            boundaries.push(boundary);
            previous = Some((point, boundary));
        }
        Ok(boundaries)
    }

    fn edited_rows(&self, boundaries: &[usize]) -> Vec<usize> {
        boundaries
            .iter()
            .flat_map(|&b| b - self.edit_size..b)
            .collect()
    }
}

/// Schema-driven random table source.
pub struct Generator {
    schema: Schema,
    rng: StdRng,
}

impl Generator {
    pub fn new(schema: Schema, seed: u64) -> Self {
        Self {
            schema,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn generate_table(&mut self, num_rows: usize) -> Result<Table> {
        let layout = self.schema.columns.clone();
        let columns = layout
            .iter()
            .map(|column| self.generate_values(&column.datatype, num_rows))
            .collect();
        Table::try_new(self.schema.clone(), columns)
    }

    fn generate_values(&mut self, datatype: &DataType, n: usize) -> Vec<Value> {
        match datatype {
            DataType::Int => (0..n)
                .map(|_| Value::Int(self.rng.random_range(0..MAX_VALUE)))
                .collect(),
            DataType::Float => (0..n)
                .map(|_| {
                    let count = self.rng.random_range(0..MAX_VALUE * 1000);
                    Value::Float(thousandths(count))
                })
                .collect(),
            DataType::Str => (0..n).map(|_| self.random_string(STR_LEN)).collect(),
            DataType::LargeStr => (0..n).map(|_| self.random_string(LARGE_STR_LEN)).collect(),
            DataType::Bool => (0..n)
                .map(|_| Value::Bool(self.rng.random_bool(0.5)))
                .collect(),
            DataType::List(item) => {
                let lengths = (0..n)
                    .map(|_| self.rng.random_range(LIST_LEN))
                    .collect::<Vec<_>>();
                let total = lengths.iter().sum();
                let mut items = self.generate_values(item, total).into_iter();
                lengths
                    .into_iter()
                    .map(|len| Value::List(items.by_ref().take(len).collect()))
                    .collect()
            }
            DataType::Struct(fields) => {
                let mut children = fields
                    .iter()
                    .map(|field| self.generate_values(&field.datatype, n).into_iter())
                    .collect::<Vec<_>>();
                (0..n)
                    .map(|_| {
                        Value::Struct(
                            children
                                .iter_mut()
                                .map(|child| child.next().unwrap_or(Value::Null))
                                .collect(),
                        )
                    })
                    .collect()
            }
        }
    }

    fn random_string(&mut self, len: std::ops::Range<usize>) -> Value {
        let len = self.rng.random_range(len);
        let text = (0..len)
            .map(|_| ALPHABET[self.rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Value::Str(text)
    }

    /// Splices `edit_size` fresh rows in at every edit boundary.
    pub fn insert_rows(&mut self, table: &Table, plan: &EditPlan) -> Result<Table> {
        let boundaries = plan.boundaries(table.num_rows())?;
        let mut pieces = Vec::with_capacity(boundaries.len() * 2 + 1);
        let mut start = 0;
        for boundary in boundaries {
            pieces.push(table.slice(start, boundary - start));
            pieces.push(self.generate_table(plan.edit_size)?);
            start = boundary;
        }
        pieces.push(table.slice(start, table.num_rows() - start));
        Table::concat(&pieces)
    }

    /// Adds `floor(ratio * len)` fresh rows at the end.
    pub fn append_rows(&mut self, table: &Table, ratio: f64) -> Result<Table> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(BenchError::EditPlan(format!(
                "append ratio must be a non-negative number, got {ratio}"
            )));
        }
        let extra = (ratio * table.num_rows() as f64).floor() as usize;
        let tail = self.generate_table(extra)?;
        Table::concat(&[table.clone(), tail])
    }

    /// Overwrites every edit cluster in the selected columns (all columns when
    /// `columns` is `None`) with fresh values.
    pub fn update_rows(
        &mut self,
        table: &Table,
        plan: &EditPlan,
        columns: Option<&[String]>,
    ) -> Result<Table> {
        let boundaries = plan.boundaries(table.num_rows())?;
        let targets = match columns {
            None => (0..table.schema().len()).collect::<Vec<_>>(),
            Some(names) => names
                .iter()
                .map(|name| {
                    table.schema().column_index(name).ok_or_else(|| {
                        BenchError::Schema(format!("column '{name}' is not part of the schema"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let rows = plan.edited_rows(&boundaries);
        let mut updated = table.clone();
        for idx in targets {
            let datatype = table.schema().columns[idx].datatype.clone();
            let replacement = self.generate_values(&datatype, rows.len());
            updated = updated.with_replaced_cells(idx, &rows, &replacement)?;
        }
        Ok(updated)
    }

    /// Generates the base table plus the `deleted`, `inserted`, `appended`,
    /// `updated` and one `updated_<column>` variant per entry of
    /// `update_columns`.
    pub fn generate_synthetic_tables(
        &mut self,
        size: usize,
        plan: &EditPlan,
        update_columns: &[String],
    ) -> Result<(Table, BTreeMap<String, Table>)> {
        plan.boundaries(size)?;
        for column in update_columns {
            if self.schema.column_index(column).is_none() {
                return Err(BenchError::Schema(format!(
                    "column '{column}' is not part of the schema"
                )));
            }
        }

        let original = self.generate_table(size)?;
        debug!("Generated base table with {size} row(s)");
        let edited = plan.edit_size * plan.edit_points.len();
        let appended = (plan.append_ratio * size as f64).floor() as usize;

        let mut variants = BTreeMap::new();
        variants.insert(DELETED.to_string(), delete_rows(&original, plan)?);
        variants.insert(INSERTED.to_string(), self.insert_rows(&original, plan)?);
        variants.insert(
            APPENDED.to_string(),
            self.append_rows(&original, plan.append_ratio)?,
        );
        variants.insert(UPDATED.to_string(), self.update_rows(&original, plan, None)?);
        for column in update_columns {
            let table = self.update_rows(&original, plan, Some(std::slice::from_ref(column)))?;
            variants.insert(updated_column_variant(column), table);
        }

        let expected = |name: &str| match name {
            DELETED => size - edited,
            INSERTED => size + edited,
            APPENDED => size + appended,
            _ => size,
        };
        for (name, table) in &variants {
            if table.num_rows() != expected(name) {
                return Err(BenchError::Invariant(format!(
                    "variant '{name}' has {} row(s), expected {}",
                    table.num_rows(),
                    expected(name)
                )));
            }
            if table.schema() != original.schema() {
                return Err(BenchError::Invariant(format!(
                    "variant '{name}' changed the schema"
                )));
            }
        }
        info!(
            "Generated {} variant(s) of a {size}-row table",
            variants.len()
        );
        Ok((original, variants))
    }
}

/// Floats carry three decimals; drawing whole thousandths keeps them inside
/// `[0, MAX_VALUE)` where rounding a continuous draw could reach the bound.
fn thousandths(count: i64) -> f64 {
    count as f64 / 1000.0
}

/// Drops the `edit_size` rows that precede every edit boundary.
pub fn delete_rows(table: &Table, plan: &EditPlan) -> Result<Table> {
    let boundaries = plan.boundaries(table.num_rows())?;
    let mut pieces = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for boundary in boundaries {
        let end = boundary - plan.edit_size;
        pieces.push(table.slice(start, end - start));
        start = boundary;
    }
    pieces.push(table.slice(start, table.num_rows() - start));
    Table::concat(&pieces)
}
