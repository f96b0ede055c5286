//! File format policies.
//!
//! A [`FileFormat`] is a plain value: its name, suffix and parameter stem
//! fully determine the output path, and [`FileFormat::write`] materializes a
//! [`Source`] (an in-memory table or an existing Parquet file) under that
//! path. Every option that changes output bytes also appears in the parameter
//! stem, so two configurations never collide on disk.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use arrow::{
    array::{Array, ArrayRef, AsArray},
    compute::{CastOptions, cast_with_options},
    datatypes::{
        DataType as ArrowDataType, Field, Float64Type, Int64Type, Schema as ArrowSchema, SchemaRef,
    },
    json::{WriterBuilder, writer::LineDelimited},
    record_batch::RecordBatch,
    util::display::{ArrayFormatter, FormatOptions},
};
use itertools::Itertools;
use log::debug;
use parquet::{
    arrow::{
        ArrowWriter,
        arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder},
    },
    basic::{Compression as ParquetCompression, GzipLevel, ZstdLevel},
    file::properties::WriterProperties,
};
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use serde::{Deserialize, Serialize};

use crate::{
    cdc::{CdcSetting, RowChunker},
    columnar::to_record_batch,
    data::Table,
    error::{BenchError, Result},
};

pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
pub const SQLITE_TABLE: &str = "table";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
    Snappy,
    Lz4,
    Gzip,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zstd => "zstd",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Gzip => "gzip",
        }
    }

    fn token(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            other => Some(other.as_str()),
        }
    }

    fn to_parquet(self) -> ParquetCompression {
        match self {
            Compression::None => ParquetCompression::UNCOMPRESSED,
            Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
            Compression::Snappy => ParquetCompression::SNAPPY,
            Compression::Lz4 => ParquetCompression::LZ4_RAW,
            Compression::Gzip => ParquetCompression::GZIP(GzipLevel::default()),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = BenchError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Compression::None),
            "zstd" => Ok(Compression::Zstd),
            "snappy" => Ok(Compression::Snappy),
            "lz4" => Ok(Compression::Lz4),
            "gzip" => Ok(Compression::Gzip),
            other => Err(BenchError::Config(format!("Unknown compression '{other}'"))),
        }
    }
}

/// Options of the fully configurable Parquet writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetOptions {
    pub compression: Compression,
    pub use_dictionary: bool,
    pub data_page_size: Option<usize>,
    pub row_group_size: Option<usize>,
    pub cdc: CdcSetting,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            use_dictionary: true,
            data_page_size: None,
            row_group_size: None,
            cdc: CdcSetting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FileFormat {
    Parquet(ParquetOptions),
    /// Parquet with library defaults; only an on/off chunking switch.
    ParquetBasic {
        #[serde(default)]
        compression: Compression,
        #[serde(default)]
        cdc: CdcSetting,
    },
    #[serde(rename = "jsonlines")]
    JsonLines {
        #[serde(default)]
        compression: Compression,
    },
    Sqlite {
        #[serde(default)]
        compression: Compression,
    },
}

/// Input of a write: a logical table or an existing Parquet file to rewrite.
#[derive(Debug, Clone)]
pub enum Source {
    Table(Arc<Table>),
    File(PathBuf),
}

impl From<Table> for Source {
    fn from(table: Table) -> Self {
        Source::Table(Arc::new(table))
    }
}

impl From<Arc<Table>> for Source {
    fn from(table: Arc<Table>) -> Self {
        Source::Table(table)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::File(path)
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub prefix: Option<String>,
    pub sanity_check: bool,
    /// Rows per batch when rewriting an existing file.
    pub block_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            sanity_check: true,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl WriteOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_sanity_check(mut self, sanity_check: bool) -> Self {
        self.sanity_check = sanity_check;
        self
    }
}

impl FileFormat {
    pub fn parquet(compression: Compression, cdc: impl Into<CdcSetting>) -> Self {
        FileFormat::Parquet(ParquetOptions {
            compression,
            cdc: cdc.into(),
            ..ParquetOptions::default()
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Parquet(_) => "parquet",
            FileFormat::ParquetBasic { .. } => "parquet-basic",
            FileFormat::JsonLines { .. } => "jsonlines",
            FileFormat::Sqlite { .. } => "sqlite",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            FileFormat::Parquet(_) | FileFormat::ParquetBasic { .. } => "parquet",
            FileFormat::JsonLines { .. } => "jsonlines",
            FileFormat::Sqlite { .. } => "sqlite",
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            FileFormat::Parquet(options) => options.compression,
            FileFormat::ParquetBasic { compression, .. }
            | FileFormat::JsonLines { compression }
            | FileFormat::Sqlite { compression } => *compression,
        }
    }

    pub fn cdc(&self) -> CdcSetting {
        match self {
            FileFormat::Parquet(options) => options.cdc,
            FileFormat::ParquetBasic { cdc, .. } => *cdc,
            _ => CdcSetting::default(),
        }
    }

    /// Non-default parameter tokens joined by `-`; empty for a default format.
    pub fn paramstem(&self) -> String {
        let mut tokens: Vec<String> = Vec::new();
        tokens.extend(self.compression().token().map(str::to_string));
        if let FileFormat::Parquet(options) = self {
            if !options.use_dictionary {
                tokens.push("nodict".to_string());
            }
            if let Some(size) = options.data_page_size {
                tokens.push(format!("page{size}"));
            }
            if let Some(size) = options.row_group_size {
                tokens.push(format!("rg{size}"));
            }
        }
        tokens.extend(self.cdc().token());
        tokens.into_iter().join("-")
    }

    /// Name plus parameter stem, e.g. `parquet-zstd-cdc`.
    pub fn label(&self) -> String {
        let stem = self.paramstem();
        if stem.is_empty() {
            self.name().to_string()
        } else {
            format!("{}-{stem}", self.name())
        }
    }

    pub fn derive_path(&self, name: &str, directory: &Path, prefix: Option<&str>) -> PathBuf {
        let mut stem = match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{name}"),
            _ => name.to_string(),
        };
        let params = self.paramstem();
        if !params.is_empty() {
            stem.push('-');
            stem.push_str(&params);
        }
        directory.join(format!("{stem}.{}", self.suffix()))
    }

    /// Rejects option combinations this format cannot honour.
    pub fn validate(&self) -> Result<()> {
        match self {
            FileFormat::Parquet(options) => {
                if options.data_page_size == Some(0) || options.row_group_size == Some(0) {
                    return Err(BenchError::Config(
                        "Parquet page and row group sizes must be positive".into(),
                    ));
                }
                match options.cdc.params() {
                    Some(params) => params.validate(),
                    None => Ok(()),
                }
            }
            FileFormat::ParquetBasic { cdc, .. } => match cdc {
                CdcSetting::Params(_) => Err(BenchError::Config(
                    "CDC parameters are not supported by the parquet-basic format".into(),
                )),
                CdcSetting::Toggle(_) => Ok(()),
            },
            FileFormat::JsonLines { compression } => match compression {
                Compression::None | Compression::Zstd => Ok(()),
                other => Err(BenchError::Config(format!(
                    "JSON Lines output supports zstd compression only, got {other}"
                ))),
            },
            FileFormat::Sqlite { compression } => match compression {
                Compression::None => Ok(()),
                other => Err(BenchError::Config(format!(
                    "SQLite output cannot be compressed, got {other}"
                ))),
            },
        }
    }

    /// Writes `source` to the derived path and returns it. Failures, including
    /// unsupported options, surface as [`BenchError::Write`] or
    /// [`BenchError::SanityCheck`] for that one artifact.
    pub fn write(
        &self,
        name: &str,
        source: &Source,
        directory: &Path,
        options: &WriteOptions,
    ) -> Result<PathBuf> {
        let dest = self.derive_path(name, directory, options.prefix.as_deref());
        let wrap = |err: BenchError| match err {
            BenchError::SanityCheck { .. } => err,
            other => BenchError::Write {
                path: dest.clone(),
                message: other.to_string(),
            },
        };
        self.validate().map_err(wrap)?;
        std::fs::create_dir_all(directory).map_err(|err| wrap(err.into()))?;

        let expected = match self {
            FileFormat::Parquet(_) | FileFormat::ParquetBasic { .. } => {
                write_parquet(&dest, self.writer_properties(), self.cdc(), source, options)
            }
            FileFormat::JsonLines { compression } => {
                write_jsonlines(&dest, *compression, source, options)
            }
            FileFormat::Sqlite { .. } => write_sqlite(&dest, source, options),
        }
        .map_err(wrap)?;
        debug!("Wrote {} row(s) to {dest:?}", expected.rows);

        if options.sanity_check {
            let verdict = match self {
                FileFormat::Parquet(_) | FileFormat::ParquetBasic { .. } => {
                    check_parquet(&dest, &expected)
                }
                FileFormat::JsonLines { compression } => {
                    check_jsonlines(&dest, *compression, &expected)
                }
                FileFormat::Sqlite { .. } => check_sqlite(&dest, &expected),
            };
            verdict.map_err(|err| match err {
                BenchError::SanityCheck { .. } => err,
                other => BenchError::SanityCheck {
                    path: dest.clone(),
                    message: other.to_string(),
                },
            })?;
        }
        Ok(dest)
    }

    fn writer_properties(&self) -> WriterProperties {
        let builder = WriterProperties::builder().set_compression(self.compression().to_parquet());
        match self {
            FileFormat::Parquet(options) => {
                let mut builder = builder.set_dictionary_enabled(options.use_dictionary);
                if let Some(size) = options.data_page_size {
                    builder = builder.set_data_page_size_limit(size);
                }
                if let Some(size) = options.row_group_size {
                    builder = builder.set_max_row_group_size(size);
                }
                builder.build()
            }
            _ => builder.build(),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// What the written artifact must contain.
struct Expected {
    rows: usize,
    arrow_schema: SchemaRef,
}

impl Expected {
    fn column_names(&self) -> Vec<&str> {
        self.arrow_schema
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }
}

/// Yields a source as record batches without loading a file wholesale.
enum BatchStream<'a> {
    Whole(Option<&'a Table>),
    Batches(ParquetRecordBatchReader),
}

impl<'a> BatchStream<'a> {
    fn open(source: &'a Source, block_size: usize) -> Result<(Self, SchemaRef)> {
        match source {
            Source::Table(table) => {
                let schema = Arc::new(table.schema().to_arrow());
                Ok((BatchStream::Whole(Some(table.as_ref())), schema))
            }
            Source::File(path) => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
                let schema = builder.schema().clone();
                let reader = builder.with_batch_size(block_size.max(1)).build()?;
                Ok((BatchStream::Batches(reader), schema))
            }
        }
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        match self {
            BatchStream::Whole(table) => table.take().map(to_record_batch).transpose(),
            BatchStream::Batches(reader) => Ok(reader.next().transpose()?),
        }
    }
}

fn write_parquet(
    dest: &Path,
    props: WriterProperties,
    cdc: CdcSetting,
    source: &Source,
    options: &WriteOptions,
) -> Result<Expected> {
    let (mut stream, arrow_schema) = BatchStream::open(source, options.block_size)?;
    let mut chunker = cdc.params().map(RowChunker::new).transpose()?;
    let mut writer = ArrowWriter::try_new(
        BufWriter::new(File::create(dest)?),
        arrow_schema.clone(),
        Some(props),
    )?;
    let mut rows = 0;
    while let Some(batch) = stream.next_batch()? {
        rows += batch.num_rows();
        match chunker.as_mut() {
            Some(chunker) => {
                let mut start = 0;
                for cut in chunker.boundaries(&batch)? {
                    writer.write(&batch.slice(start, cut - start))?;
                    writer.flush()?;
                    start = cut;
                }
                if start < batch.num_rows() {
                    writer.write(&batch.slice(start, batch.num_rows() - start))?;
                }
            }
            None => writer.write(&batch)?,
        }
    }
    writer.close()?;
    Ok(Expected { rows, arrow_schema })
}

fn check_parquet(dest: &Path, expected: &Expected) -> Result<()> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(dest)?)?;
    let rows = builder.metadata().file_metadata().num_rows();
    if rows != expected.rows as i64 {
        return Err(sanity(dest, format!("expected {} row(s), found {rows}", expected.rows)));
    }
    if builder.schema().fields() != expected.arrow_schema.fields() {
        return Err(sanity(
            dest,
            format!(
                "schema changed from {:?} to {:?}",
                expected.arrow_schema.fields(),
                builder.schema().fields()
            ),
        ));
    }
    Ok(())
}

fn write_jsonlines(
    dest: &Path,
    compression: Compression,
    source: &Source,
    options: &WriteOptions,
) -> Result<Expected> {
    let mut file = BufWriter::new(File::create(dest)?);
    match compression {
        Compression::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(file, 0)?;
            let expected = write_json_rows(&mut encoder, source, options)?;
            encoder.finish()?.flush()?;
            Ok(expected)
        }
        _ => {
            let expected = write_json_rows(&mut file, source, options)?;
            file.flush()?;
            Ok(expected)
        }
    }
}

/// One JSON object per row; null cells are written as explicit `null`s so
/// every line carries every column.
fn write_json_rows<W: Write>(
    out: W,
    source: &Source,
    options: &WriteOptions,
) -> Result<Expected> {
    let (mut stream, arrow_schema) = BatchStream::open(source, options.block_size)?;
    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, LineDelimited>(out);
    let mut rows = 0;
    while let Some(batch) = stream.next_batch()? {
        writer.write(&batch)?;
        rows += batch.num_rows();
    }
    writer.finish()?;
    Ok(Expected { rows, arrow_schema })
}

fn check_jsonlines(dest: &Path, compression: Compression, expected: &Expected) -> Result<()> {
    let file = File::open(dest)?;
    let reader: Box<dyn BufRead> = match compression {
        Compression::Zstd => Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)),
        _ => Box::new(BufReader::new(file)),
    };
    let mut names = expected.column_names();
    names.sort_unstable();

    let mut rows = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let record: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&line)?;
        let mut keys = record.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        if keys != names {
            return Err(sanity(
                dest,
                format!("line {} has keys {keys:?}, expected {names:?}", idx + 1),
            ));
        }
        rows += 1;
    }
    if rows != expected.rows {
        return Err(sanity(dest, format!("expected {} line(s), found {rows}", expected.rows)));
    }
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite storage class an Arrow column is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlColumn {
    Integer,
    Real,
    Blob,
    Text,
    /// Nested values, stored as JSON text.
    Json,
}

impl SqlColumn {
    fn of(datatype: &ArrowDataType) -> Self {
        match datatype {
            ArrowDataType::Boolean
            | ArrowDataType::Int8
            | ArrowDataType::Int16
            | ArrowDataType::Int32
            | ArrowDataType::Int64
            | ArrowDataType::UInt8
            | ArrowDataType::UInt16
            | ArrowDataType::UInt32
            | ArrowDataType::UInt64 => SqlColumn::Integer,
            ArrowDataType::Float16 | ArrowDataType::Float32 | ArrowDataType::Float64 => {
                SqlColumn::Real
            }
            ArrowDataType::Binary
            | ArrowDataType::LargeBinary
            | ArrowDataType::BinaryView
            | ArrowDataType::FixedSizeBinary(_) => SqlColumn::Blob,
            ArrowDataType::List(_)
            | ArrowDataType::LargeList(_)
            | ArrowDataType::FixedSizeList(_, _)
            | ArrowDataType::Struct(_)
            | ArrowDataType::Map(_, _) => SqlColumn::Json,
            ArrowDataType::Dictionary(_, values) => SqlColumn::of(values),
            _ => SqlColumn::Text,
        }
    }

    fn declared(self) -> &'static str {
        match self {
            SqlColumn::Integer => "INTEGER",
            SqlColumn::Real => "REAL",
            SqlColumn::Blob => "BLOB",
            SqlColumn::Text | SqlColumn::Json => "TEXT",
        }
    }

    /// Converts a column to SQLite values. Numeric casts are checked, so a
    /// `UInt64` beyond `i64::MAX` fails the write instead of turning null.
    /// Nested columns become JSON text; everything else without a native
    /// storage class is stored in its display form (timestamps as ISO 8601).
    fn values(self, array: &ArrayRef) -> Result<Vec<SqlValue>> {
        let checked = CastOptions {
            safe: false,
            ..CastOptions::default()
        };
        let values = match self {
            SqlColumn::Integer => cast_with_options(array, &ArrowDataType::Int64, &checked)?
                .as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Integer))
                .collect(),
            SqlColumn::Real => cast_with_options(array, &ArrowDataType::Float64, &checked)?
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Real))
                .collect(),
            SqlColumn::Blob => cast_with_options(array, &ArrowDataType::LargeBinary, &checked)?
                .as_binary::<i64>()
                .iter()
                .map(|v| v.map_or(SqlValue::Null, |bytes| SqlValue::Blob(bytes.to_vec())))
                .collect(),
            SqlColumn::Text => {
                let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
                (0..array.len())
                    .map(|idx| {
                        if array.is_null(idx) {
                            SqlValue::Null
                        } else {
                            SqlValue::Text(formatter.value(idx).to_string())
                        }
                    })
                    .collect()
            }
            SqlColumn::Json => json_cells(array)?,
        };
        Ok(values)
    }
}

/// Renders each cell of a nested column as a JSON document.
fn json_cells(array: &ArrayRef) -> Result<Vec<SqlValue>> {
    let field = Field::new("v", array.data_type().clone(), true);
    let batch = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![field])),
        vec![Arc::clone(array)],
    )?;
    let mut lines = Vec::new();
    {
        let mut writer = WriterBuilder::new()
            .with_explicit_nulls(true)
            .build::<_, LineDelimited>(&mut lines);
        writer.write(&batch)?;
        writer.finish()?;
    }
    lines
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| -> Result<SqlValue> {
            let mut record: serde_json::Map<String, serde_json::Value> =
                serde_json::from_slice(line)?;
            Ok(match record.remove("v") {
                None | Some(serde_json::Value::Null) => SqlValue::Null,
                Some(value) => SqlValue::Text(value.to_string()),
            })
        })
        .collect()
}

fn write_sqlite(dest: &Path, source: &Source, options: &WriteOptions) -> Result<Expected> {
    if dest.exists() {
        std::fs::remove_file(dest)?;
    }
    let (mut stream, arrow_schema) = BatchStream::open(source, options.block_size)?;
    let kinds = arrow_schema
        .fields()
        .iter()
        .map(|field| SqlColumn::of(field.data_type()))
        .collect::<Vec<_>>();

    let mut conn = Connection::open(dest)?;
    let columns = arrow_schema
        .fields()
        .iter()
        .zip(&kinds)
        .map(|(field, kind)| format!("{} {}", quote_ident(field.name()), kind.declared()))
        .join(", ");
    conn.execute(
        &format!("CREATE TABLE {} ({columns})", quote_ident(SQLITE_TABLE)),
        [],
    )?;

    let placeholders = (1..=kinds.len()).map(|idx| format!("?{idx}")).join(", ");
    let insert = format!(
        "INSERT INTO {} VALUES ({placeholders})",
        quote_ident(SQLITE_TABLE)
    );
    let tx = conn.transaction()?;
    let mut rows = 0;
    {
        let mut statement = tx.prepare(&insert)?;
        while let Some(batch) = stream.next_batch()? {
            let mut cells = batch
                .columns()
                .iter()
                .zip(&kinds)
                .map(|(array, kind)| kind.values(array).map(Vec::into_iter))
                .collect::<Result<Vec<_>>>()?;
            for _ in 0..batch.num_rows() {
                let values = cells
                    .iter_mut()
                    .map(|column| column.next().unwrap_or(SqlValue::Null))
                    .collect::<Vec<_>>();
                statement.execute(params_from_iter(values))?;
            }
            rows += batch.num_rows();
        }
    }
    tx.commit()?;
    Ok(Expected { rows, arrow_schema })
}

fn check_sqlite(dest: &Path, expected: &Expected) -> Result<()> {
    let conn = Connection::open(dest)?;
    let rows: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(SQLITE_TABLE)),
        [],
        |row| row.get(0),
    )?;
    if rows != expected.rows as i64 {
        return Err(sanity(dest, format!("expected {} row(s), found {rows}", expected.rows)));
    }
    let mut statement = conn.prepare(&format!(
        "PRAGMA table_info({})",
        quote_ident(SQLITE_TABLE)
    ))?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let wanted = expected.column_names();
    if names != wanted {
        return Err(sanity(dest, format!("columns {names:?}, expected {wanted:?}")));
    }
    Ok(())
}

fn sanity(path: &Path, message: String) -> BenchError {
    BenchError::SanityCheck {
        path: path.to_path_buf(),
        message,
    }
}
