//! Deduplication estimators and the result records built from them.

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::Command,
    sync::LazyLock,
};

use log::debug;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{BenchError, Result},
    formats::FileFormat,
};

pub type Metrics = BTreeMap<String, u64>;

static LABELLED_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)transmitted\D*?(\d[\d,_]*)").expect("labelled count pattern compiles")
});
static ANY_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,_]*").expect("count pattern compiles"));

pub const TOTAL_LEN: &str = "total_len";
pub const CHUNK_BYTES: &str = "chunk_bytes";
pub const COMPRESSED_CHUNK_BYTES: &str = "compressed_chunk_bytes";
pub const TRANSMITTED_BYTES: &str = "transmitted_bytes";

pub const DEFAULT_TOKEN_VAR: &str = "XTOOL_TOKEN";

const MIN_BOUNDS: (u32, u32) = (64, 1_048_576);
const AVG_BOUNDS: (u32, u32) = (256, 4_194_304);
const MAX_BOUNDS: (u32, u32) = (1024, 16_777_216);

/// Maps an ordered set of artifacts onto named byte counts.
pub trait Estimator: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(&self, paths: &[PathBuf]) -> Result<Metrics>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSizes {
    pub min: u32,
    pub avg: u32,
    pub max: u32,
}

impl Default for ChunkSizes {
    fn default() -> Self {
        Self {
            min: 8 * 1024,
            avg: 16 * 1024,
            max: 64 * 1024,
        }
    }
}

impl ChunkSizes {
    pub fn validate(&self) -> Result<()> {
        let check = |label: &str, value: u32, (low, high): (u32, u32)| {
            if (low..=high).contains(&value) {
                Ok(())
            } else {
                Err(BenchError::Config(format!(
                    "estimator {label} chunk size {value} must be within {low}..={high}"
                )))
            }
        };
        check("min", self.min, MIN_BOUNDS)?;
        check("avg", self.avg, AVG_BOUNDS)?;
        check("max", self.max, MAX_BOUNDS)?;
        if !(self.min <= self.avg && self.avg <= self.max) {
            return Err(BenchError::Config(format!(
                "estimator chunk sizes must satisfy min <= avg <= max (got {}/{}/{})",
                self.min, self.avg, self.max
            )));
        }
        Ok(())
    }
}

/// Content-defined chunking over the raw bytes of every artifact. Chunks are
/// identified by their SHA-256 digest; each unique chunk counts once.
#[derive(Debug, Clone)]
pub struct ChunkEstimator {
    sizes: ChunkSizes,
}

impl ChunkEstimator {
    pub fn new(sizes: ChunkSizes) -> Result<Self> {
        sizes.validate()?;
        Ok(Self { sizes })
    }

    pub fn sizes(&self) -> ChunkSizes {
        self.sizes
    }

    fn chunk_file(&self, path: &Path) -> Result<FileChunks> {
        let reader = BufReader::new(File::open(path)?);
        let chunker = fastcdc::v2020::StreamCDC::new(
            reader,
            self.sizes.min,
            self.sizes.avg,
            self.sizes.max,
        );
        let mut chunks = FileChunks::default();
        for chunk in chunker {
            let chunk = chunk.map_err(|err| {
                BenchError::Estimation(format!("chunking {path:?} failed: {err:?}"))
            })?;
            chunks.total += chunk.length as u64;
            let digest: [u8; 32] = Sha256::digest(&chunk.data).into();
            if chunks.unique.contains_key(&digest) {
                continue;
            }
            let compressed = zstd::bulk::compress(&chunk.data, 0)?;
            chunks
                .unique
                .insert(digest, (chunk.length as u64, compressed.len() as u64));
        }
        Ok(chunks)
    }
}

impl Default for ChunkEstimator {
    fn default() -> Self {
        Self {
            sizes: ChunkSizes::default(),
        }
    }
}

#[derive(Default)]
struct FileChunks {
    total: u64,
    unique: HashMap<[u8; 32], (u64, u64)>,
}

impl Estimator for ChunkEstimator {
    fn name(&self) -> &str {
        "chunks"
    }

    fn estimate(&self, paths: &[PathBuf]) -> Result<Metrics> {
        let per_file = paths
            .par_iter()
            .map(|path| self.chunk_file(path))
            .collect::<Result<Vec<_>>>()?;

        let mut total = 0;
        let mut seen: HashMap<[u8; 32], (u64, u64)> = HashMap::new();
        for file in per_file {
            total += file.total;
            for (digest, sizes) in file.unique {
                seen.entry(digest).or_insert(sizes);
            }
        }
        let chunk_bytes = seen.values().map(|(len, _)| len).sum();
        let compressed = seen.values().map(|(_, len)| len).sum();
        debug!(
            "Chunked {} file(s): {} unique chunk(s), {chunk_bytes} of {total} byte(s)",
            paths.len(),
            seen.len()
        );
        Ok(Metrics::from([
            (TOTAL_LEN.to_string(), total),
            (CHUNK_BYTES.to_string(), chunk_bytes),
            (COMPRESSED_CHUNK_BYTES.to_string(), compressed),
        ]))
    }
}

/// How to reach the external dedup-aware transfer tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalToolConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Never read from or written to config files.
    #[serde(skip)]
    pub token: Option<String>,
    #[serde(default = "default_token_var")]
    pub token_var: String,
}

fn default_token_var() -> String {
    DEFAULT_TOKEN_VAR.to_string()
}

impl ExternalToolConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            token: None,
            token_var: default_token_var(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Runs `program args.. paths..` with the token exported, and reads the
/// transmitted byte count from the final line of its output.
#[derive(Debug, Clone)]
pub struct ExternalDedupEstimator {
    config: ExternalToolConfig,
}

impl ExternalDedupEstimator {
    pub fn new(config: ExternalToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExternalToolConfig {
        &self.config
    }
}

impl Estimator for ExternalDedupEstimator {
    fn name(&self) -> &str {
        "external"
    }

    fn estimate(&self, paths: &[PathBuf]) -> Result<Metrics> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                BenchError::Estimation(format!(
                    "no token configured for {:?} (expected in {})",
                    self.config.program, self.config.token_var
                ))
            })?;
        let output = Command::new(&self.config.program)
            .args(&self.config.args)
            .args(paths)
            .env(&self.config.token_var, token)
            .output()
            .map_err(|err| {
                BenchError::Estimation(format!(
                    "failed to launch {:?}: {err}",
                    self.config.program
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BenchError::Estimation(format!(
                "{:?} exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let last = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| {
                BenchError::Estimation(format!("{:?} printed nothing", self.config.program))
            })?;
        let transmitted = parse_transmitted(last).ok_or_else(|| {
            BenchError::Estimation(format!("no byte count in status line '{last}'"))
        })?;
        Ok(Metrics::from([(TRANSMITTED_BYTES.to_string(), transmitted)]))
    }
}

/// Integer following "transmitted" in `line`, or else its last integer.
/// Digit groups may be separated with `,` or `_`.
pub fn parse_transmitted(line: &str) -> Option<u64> {
    let digits = match LABELLED_COUNT.captures(line).and_then(|caps| caps.get(1)) {
        Some(found) => found.as_str(),
        None => ANY_COUNT.find_iter(line).last()?.as_str(),
    };
    digits
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()
}

/// Merged estimator output for one bucket, with ratios derived from
/// `total_len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub group: String,
    pub format: String,
    pub params: String,
    pub numfiles: usize,
    pub total_len: u64,
    pub chunk_bytes: u64,
    pub compressed_chunk_bytes: u64,
    pub dedup_ratio: f64,
    pub compressed_dedup_ratio: f64,
    pub external_dedup_bytes: Option<u64>,
    pub external_dedup_ratio: Option<f64>,
    /// Artifacts the estimate covers, in entry order.
    #[serde(skip)]
    pub paths: Vec<PathBuf>,
}

impl EstimationResult {
    pub fn from_metrics(
        group: impl Into<String>,
        format: Option<&FileFormat>,
        numfiles: usize,
        metrics: &Metrics,
    ) -> Result<Self> {
        let require = |key: &str| {
            metrics.get(key).copied().ok_or_else(|| {
                BenchError::Estimation(format!("estimators did not report '{key}'"))
            })
        };
        let total_len = require(TOTAL_LEN)?;
        if total_len == 0 {
            return Err(BenchError::Estimation(
                "estimated artifacts are empty (total_len is 0)".into(),
            ));
        }
        let chunk_bytes = require(CHUNK_BYTES)?;
        let compressed_chunk_bytes = require(COMPRESSED_CHUNK_BYTES)?;
        let external = metrics.get(TRANSMITTED_BYTES).copied();
        let ratio = |bytes: u64| bytes as f64 / total_len as f64;
        Ok(Self {
            group: group.into(),
            format: format.map(|f| f.name().to_string()).unwrap_or_default(),
            params: format.map(FileFormat::paramstem).unwrap_or_default(),
            numfiles,
            total_len,
            chunk_bytes,
            compressed_chunk_bytes,
            dedup_ratio: ratio(chunk_bytes),
            compressed_dedup_ratio: ratio(compressed_chunk_bytes),
            external_dedup_bytes: external,
            external_dedup_ratio: external.map(ratio),
            paths: Vec::new(),
        })
    }

    pub fn label(&self) -> String {
        if self.params.is_empty() {
            self.format.clone()
        } else {
            format!("{}-{}", self.format, self.params)
        }
    }
}

/// Runs every estimator in order over `paths` and merges their metrics.
pub fn run_estimators(estimators: &[Box<dyn Estimator>], paths: &[PathBuf]) -> Result<Metrics> {
    let mut merged = Metrics::new();
    for estimator in estimators {
        let metrics = estimator.estimate(paths)?;
        debug!("{} estimator reported {metrics:?}", estimator.name());
        merged.extend(metrics);
    }
    Ok(merged)
}
