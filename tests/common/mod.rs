#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, DictionaryArray, Int32Array, Int64Array, TimestampMillisecondArray,
};
use arrow::datatypes::Int32Type;
use arrow::record_batch::RecordBatch;
use dedup_bench::{
    data::Table,
    estimate::{ChunkEstimator, ChunkSizes, Estimator},
    formats::{FileFormat, Source, WriteOptions},
    pipeline::ComparisonPipeline,
    schema::Schema,
    synthetic::Generator,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Writes an executable `sh` script under the workspace.
    #[cfg(unix)]
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write(name, format!("#!/bin/sh\n{body}\n").as_bytes());
        let mut permissions = fs::metadata(&path).expect("script metadata").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).expect("make script executable");
        path
    }

    /// Writes `table` as an uncompressed Parquet file named `{name}.parquet`.
    pub fn parquet(&self, name: &str, table: Table) -> PathBuf {
        FileFormat::parquet(Default::default(), false)
            .write(
                name,
                &Source::from(table),
                self.path(),
                &WriteOptions::default(),
            )
            .expect("write parquet fixture")
    }

    /// Writes `batch` as-is with the stock Arrow writer, keeping column types
    /// the synthetic schema model has no counterpart for.
    pub fn arrow_parquet(&self, name: &str, batch: &RecordBatch) -> PathBuf {
        let path = self.path().join(format!("{name}.parquet"));
        let file = File::create(&path).expect("create parquet fixture");
        let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), None)
            .expect("open parquet writer");
        writer.write(batch).expect("write batch");
        writer.close().expect("close parquet writer");
        path
    }
}

/// A corpus-like batch: `Int32` ids, `Int64` values, millisecond timestamps,
/// binary payloads and a dictionary-encoded tag, with a few nulls.
pub fn corpus_batch(rows: usize, offset: i32) -> RecordBatch {
    let ids: ArrayRef = Arc::new((0..rows as i32).map(|i| i + offset).collect::<Int32Array>());
    let values: ArrayRef = Arc::new(
        (0..rows as i64)
            .map(|i| (i % 7 != 3).then_some(i * 2_654_435_761 % 1_000_003))
            .collect::<Int64Array>(),
    );
    let at: ArrayRef = Arc::new(
        (0..rows as i64)
            .map(|i| Some(1_700_000_000_000 + i * 1_000))
            .collect::<TimestampMillisecondArray>(),
    );
    let payload: ArrayRef = Arc::new(
        (0..rows)
            .map(|i| Some(vec![(i % 251) as u8; i % 5]))
            .collect::<BinaryArray>(),
    );
    let tag: ArrayRef = Arc::new(
        (0..rows)
            .map(|i| ["alpha", "beta", "gamma"][i % 3])
            .collect::<DictionaryArray<Int32Type>>(),
    );
    RecordBatch::try_from_iter([
        ("id", ids),
        ("v", values),
        ("at", at),
        ("payload", payload),
        ("tag", tag),
    ])
    .expect("corpus batch")
}

pub fn schema(json: &str) -> Schema {
    Schema::parse_json(json).expect("valid schema")
}

pub fn table(json: &str, rows: usize, seed: u64) -> Table {
    Generator::new(schema(json), seed)
        .generate_table(rows)
        .expect("generate table")
}

/// Chunk sizes small enough for tables of a few thousand rows.
pub fn small_chunks() -> ChunkSizes {
    ChunkSizes {
        min: 256,
        avg: 1024,
        max: 4096,
    }
}

pub fn chunk_estimator() -> ChunkEstimator {
    ChunkEstimator::new(small_chunks()).expect("valid chunk sizes")
}

pub fn pipeline() -> ComparisonPipeline {
    let estimators: Vec<Box<dyn Estimator>> = vec![Box::new(chunk_estimator())];
    ComparisonPipeline::new(estimators).with_max_workers(Some(4))
}
