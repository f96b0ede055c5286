//! Content-defined row grouping for columnar writers.
//!
//! A columnar file dedups well across versions only when unchanged rows land
//! in identical, independently encoded pages. [`RowChunker`] decides, row by
//! row, where a row group should end, using nothing but the row's content and
//! the bytes accumulated since the previous cut. After an edit the cut points
//! resynchronise within a chunk or two.

use std::fmt;

use arrow::{
    record_batch::RecordBatch,
    row::{RowConverter, SortField},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BenchError, Result};

pub const DEFAULT_MIN_CHUNK_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;
const MAX_NORM_LEVEL: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CdcParams {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub norm_level: i32,
}

impl Default for CdcParams {
    fn default() -> Self {
        Self {
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            norm_level: 0,
        }
    }
}

impl CdcParams {
    pub fn new(min_chunk_size: usize, max_chunk_size: usize, norm_level: i32) -> Self {
        Self {
            min_chunk_size,
            max_chunk_size,
            norm_level,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_chunk_size == 0 || self.max_chunk_size <= self.min_chunk_size {
            return Err(BenchError::Config(format!(
                "CDC chunk sizes must satisfy 0 < min < max (got {} and {})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        if self.norm_level.abs() > MAX_NORM_LEVEL {
            return Err(BenchError::Config(format!(
                "CDC norm level must be within -{MAX_NORM_LEVEL}..={MAX_NORM_LEVEL}, got {}",
                self.norm_level
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CdcParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cdc{}-{}-{}",
            self.min_chunk_size, self.max_chunk_size, self.norm_level
        )
    }
}

/// `false`, `true` (chunker defaults) or explicit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CdcSetting {
    Toggle(bool),
    Params(CdcParams),
}

impl Default for CdcSetting {
    fn default() -> Self {
        CdcSetting::Toggle(false)
    }
}

impl From<bool> for CdcSetting {
    fn from(value: bool) -> Self {
        CdcSetting::Toggle(value)
    }
}

impl From<CdcParams> for CdcSetting {
    fn from(value: CdcParams) -> Self {
        CdcSetting::Params(value)
    }
}

impl CdcSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CdcSetting::Toggle(false))
    }

    /// Effective parameters, or `None` when chunking is off.
    pub fn params(&self) -> Option<CdcParams> {
        match self {
            CdcSetting::Toggle(false) => None,
            CdcSetting::Toggle(true) => Some(CdcParams::default()),
            CdcSetting::Params(params) => Some(*params),
        }
    }

    /// Filename token: `cdc` for defaults, the full parameter triple otherwise.
    pub fn token(&self) -> Option<String> {
        match self {
            CdcSetting::Toggle(false) => None,
            CdcSetting::Toggle(true) => Some("cdc".to_string()),
            CdcSetting::Params(params) => Some(params.to_string()),
        }
    }
}

/// Streaming row-boundary detector. State survives across calls so a table
/// fed in several batches is cut at the same rows as when fed whole.
#[derive(Debug, Clone)]
pub struct RowChunker {
    params: CdcParams,
    /// Probability scale: a row of `n` bytes cuts with chance `n / spread`.
    spread: u128,
    midpoint: usize,
    accumulated: usize,
}

impl RowChunker {
    pub fn new(params: CdcParams) -> Result<Self> {
        params.validate()?;
        let spread = ((params.max_chunk_size - params.min_chunk_size) / 2).max(1) as u128;
        Ok(Self {
            params,
            spread,
            midpoint: params.min_chunk_size + (params.max_chunk_size - params.min_chunk_size) / 2,
            accumulated: 0,
        })
    }

    pub fn params(&self) -> &CdcParams {
        &self.params
    }

    /// Feeds one encoded row; returns `true` when a chunk ends after it.
    pub fn push_row(&mut self, row: &[u8]) -> bool {
        self.accumulated += row.len();
        if self.accumulated >= self.params.max_chunk_size {
            self.accumulated = 0;
            return true;
        }
        if self.accumulated < self.params.min_chunk_size {
            return false;
        }
        let digest = Sha256::digest(row);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let fingerprint = u64::from_be_bytes(prefix) as u128;

        let base = (u64::MAX as u128 / self.spread) * row.len() as u128;
        let shift = self.params.norm_level.unsigned_abs();
        let stricter = self.accumulated < self.midpoint;
        let threshold = if (self.params.norm_level >= 0) == stricter {
            base >> shift
        } else {
            base << shift
        };
        if fingerprint < threshold {
            self.accumulated = 0;
            true
        } else {
            false
        }
    }

    /// Row indices (exclusive ends, relative to `batch`) after which a chunk
    /// closes. A trailing partial chunk is left open for the next call.
    ///
    /// Rows are fingerprinted in Arrow's row format, so any column type the
    /// row converter understands can be chunked.
    pub fn boundaries(&mut self, batch: &RecordBatch) -> Result<Vec<usize>> {
        let fields = batch
            .schema()
            .fields()
            .iter()
            .map(|field| SortField::new(field.data_type().clone()))
            .collect();
        let rows = RowConverter::new(fields)?.convert_columns(batch.columns())?;
        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| self.push_row(row.as_ref()).then_some(idx + 1))
            .collect())
    }
}
