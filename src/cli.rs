use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

pub const DEFAULT_SCHEMA: &str = r#"{"a": "int", "b": "str", "c": ["int"]}"#;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Measure how well file formats deduplicate across edits",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a synthetic table plus edited variants and compare formats on them
    Synthetic(SyntheticArgs),
    /// Rewrite the Parquet files under a directory in every format and compare
    Rewrite(RewriteArgs),
    /// Estimate the deduplication ratio of a set of files
    Dedup(DedupArgs),
    /// Sweep a Parquet writer parameter and measure its effect on deduplication
    ParamImpact(ParamImpactArgs),
}

/// Flags shared by every command that runs estimators.
#[derive(Debug, Clone, Args)]
pub struct EstimatorArgs {
    /// YAML benchmark configuration; flags given here take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Upper bound on concurrent write/estimate tasks (defaults to all cores)
    #[arg(short = 'p', long)]
    pub max_workers: Option<usize>,
    /// Skip re-reading every written artifact
    #[arg(long)]
    pub no_sanity_check: bool,
    /// External dedup-aware transfer tool to run over each file set
    #[arg(long)]
    pub xtool_program: Option<PathBuf>,
    /// Argument passed to the external tool before the file list (repeatable)
    #[arg(long = "xtool-arg", action = clap::ArgAction::Append, allow_hyphen_values = true)]
    pub xtool_args: Vec<String>,
    /// Environment variable holding the external tool's token
    #[arg(long)]
    pub xtool_token_var: Option<String>,
    /// Minimum chunk size of the internal estimator in bytes
    #[arg(long)]
    pub estimator_min: Option<u32>,
    /// Average chunk size of the internal estimator in bytes
    #[arg(long)]
    pub estimator_avg: Option<u32>,
    /// Maximum chunk size of the internal estimator in bytes
    #[arg(long)]
    pub estimator_max: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Also write the result records to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Also write the result records to this JSON file
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct CdcArgs {
    /// Minimum CDC chunk size in KiB
    #[arg(long, default_value_t = 256)]
    pub cdc_min_size: usize,
    /// Maximum CDC chunk size in KiB
    #[arg(long, default_value_t = 1024)]
    pub cdc_max_size: usize,
    /// CDC normalization level
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub cdc_norm_level: i32,
}

#[derive(Debug, Args)]
pub struct SyntheticArgs {
    /// Column layout as JSON, e.g. '{"a": "int", "c": ["str"]}'
    #[arg(default_value = DEFAULT_SCHEMA)]
    pub schema: String,
    /// Directory to store the generated files in
    #[arg(short = 'd', long, default_value = "synthetic")]
    pub target_dir: PathBuf,
    /// Number of Mi-rows (2^20) to generate
    #[arg(short, long, default_value_t = 1)]
    pub size: usize,
    /// Exact number of rows to generate (overrides --size)
    #[arg(long)]
    pub rows: Option<usize>,
    /// Number of evenly spaced edit locations
    #[arg(short = 'e', long, default_value_t = 10)]
    pub num_edits: usize,
    /// Number of rows touched by each edit
    #[arg(long, default_value_t = 10)]
    pub edit_size: usize,
    /// Fraction of the base row count appended by the `appended` variant
    #[arg(long, default_value_t = 0.05)]
    pub append_ratio: f64,
    /// Seed of the random generator
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Also compare JSON Lines
    #[arg(long)]
    pub with_json: bool,
    /// Also compare SQLite
    #[arg(long)]
    pub with_sqlite: bool,
    /// Enable Parquet dictionary encoding
    #[arg(long)]
    pub use_dictionary: bool,
    #[command(flatten)]
    pub cdc: CdcArgs,
    #[command(flatten)]
    pub estimator: EstimatorArgs,
    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Directory searched recursively for *.parquet files
    pub directory: PathBuf,
    /// Directory to store the rewritten files in
    #[arg(short = 'd', long, default_value = "rewrites")]
    pub target_dir: PathBuf,
    /// Also compare JSON Lines
    #[arg(long)]
    pub with_json: bool,
    /// Also compare SQLite
    #[arg(long)]
    pub with_sqlite: bool,
    /// Skip the ZSTD-compressed Parquet rewrites
    #[arg(long)]
    pub skip_zstd: bool,
    /// Skip the Snappy-compressed Parquet rewrites
    #[arg(long)]
    pub skip_snappy: bool,
    /// Disable Parquet dictionary encoding
    #[arg(long)]
    pub disable_dictionary: bool,
    /// Parquet data page size in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    pub data_page_size: usize,
    /// Rows per record batch when streaming the source files
    #[arg(long, default_value_t = crate::formats::DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
    #[command(flatten)]
    pub cdc: CdcArgs,
    #[command(flatten)]
    pub estimator: EstimatorArgs,
    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Files to estimate together
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[command(flatten)]
    pub estimator: EstimatorArgs,
    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("param")
        .required(true)
        .args(["row_group_size", "data_page_size"])
))]
pub struct ParamImpactArgs {
    /// Parquet file to rewrite
    pub file: PathBuf,
    /// Directory to store the rewritten files in
    pub directory: PathBuf,
    /// Sweep the row group size (2^10..2^21 rows)
    #[arg(long)]
    pub row_group_size: bool,
    /// Sweep the data page size (2^15..2^22 bytes)
    #[arg(long)]
    pub data_page_size: bool,
    /// Explicit values to probe instead of the default sweep
    #[arg(long = "value", value_delimiter = ',')]
    pub values: Vec<usize>,
    #[command(flatten)]
    pub estimator: EstimatorArgs,
    #[command(flatten)]
    pub export: ExportArgs,
}
