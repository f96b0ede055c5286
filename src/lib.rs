pub mod cdc;
pub mod cli;
pub mod columnar;
pub mod config;
pub mod data;
pub mod error;
pub mod estimate;
pub mod formats;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod synthetic;

use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cdc::{CdcParams, CdcSetting},
    cli::{CdcArgs, Cli, Commands, EstimatorArgs, ExportArgs},
    config::BenchConfig,
    estimate::{
        ChunkEstimator, EstimationResult, Estimator, ExternalDedupEstimator, ExternalToolConfig,
        run_estimators,
    },
    formats::{Compression, FileFormat, ParquetOptions, Source},
    pipeline::{ComparisonPipeline, ComparisonReport, Groups, SweepParam},
    schema::Schema,
    synthetic::{EditPlan, Generator, ORIGINAL},
};

const COMBINED: &str = "combined";
const FILES: &str = "files";

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dedup_bench", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Synthetic(args) => handle_synthetic(&args),
        Commands::Rewrite(args) => handle_rewrite(&args),
        Commands::Dedup(args) => handle_dedup(&args),
        Commands::ParamImpact(args) => handle_param_impact(&args),
    }
}

fn handle_synthetic(args: &cli::SyntheticArgs) -> Result<()> {
    let config = load_config(&args.estimator)?;
    let schema = Schema::parse_json(&args.schema)
        .with_context(|| format!("Parsing schema '{}'", args.schema))?;
    let rows = args.rows.unwrap_or(args.size << 20);
    let plan = EditPlan::evenly_spaced(args.num_edits, args.edit_size, args.append_ratio);
    let update_columns = schema.names();
    info!(
        "Generating {rows} row(s) over {} column(s) with {} edit(s) of {} row(s)",
        schema.len(),
        args.num_edits,
        args.edit_size
    );

    let mut generator = Generator::new(schema, args.seed);
    let (original, variants) = generator
        .generate_synthetic_tables(rows, &plan, &update_columns)
        .context("Generating synthetic tables")?;
    let original = Arc::new(original);
    let groups: Groups = variants
        .into_iter()
        .map(|(name, table)| {
            let entries = BTreeMap::from([
                (ORIGINAL.to_string(), Source::Table(Arc::clone(&original))),
                (name.clone(), Source::from(table)),
            ]);
            (name, entries)
        })
        .collect();

    let formats = if config.formats.is_empty() {
        let mut formats = parquet_matrix(
            &[Compression::None, Compression::Zstd, Compression::Snappy],
            args.use_dictionary,
            None,
            cdc_params(&args.cdc),
        );
        extend_with_text_formats(&mut formats, args.with_json, args.with_sqlite);
        formats
    } else {
        config.formats.clone()
    };

    let report = build_pipeline(&config)?
        .compare_formats_tables(&formats, &groups, &args.target_dir)
        .with_context(|| format!("Comparing formats under {:?}", args.target_dir))?;
    finish(report, &args.export)
}

fn handle_rewrite(args: &cli::RewriteArgs) -> Result<()> {
    let config = load_config(&args.estimator)?;
    let files = collect_parquet_files(&args.directory, &args.target_dir)
        .with_context(|| format!("Listing Parquet files under {:?}", args.directory))?;
    if files.is_empty() {
        return Err(anyhow!(
            "No Parquet files found under {:?}",
            args.directory
        ));
    }
    info!("Rewriting {} Parquet file(s)", files.len());
    let entries = rewrite_entries(&args.directory, files)?;
    let groups = Groups::from([(COMBINED.to_string(), entries)]);

    let formats = if config.formats.is_empty() {
        let compressions = [
            (!args.skip_zstd).then_some(Compression::Zstd),
            (!args.skip_snappy).then_some(Compression::Snappy),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        let mut formats = parquet_matrix(
            &compressions,
            !args.disable_dictionary,
            Some(args.data_page_size),
            cdc_params(&args.cdc),
        );
        extend_with_text_formats(&mut formats, args.with_json, args.with_sqlite);
        formats
    } else {
        config.formats.clone()
    };
    if formats.is_empty() {
        return Err(anyhow!("Every format was skipped; nothing to compare"));
    }

    let report = build_pipeline(&config)?
        .with_block_size(args.block_size)
        .compare_formats_tables(&formats, &groups, &args.target_dir)
        .with_context(|| format!("Rewriting files into {:?}", args.target_dir))?;
    finish(report, &args.export)
}

fn handle_dedup(args: &cli::DedupArgs) -> Result<()> {
    let config = load_config(&args.estimator)?;
    if let Some(missing) = args.files.iter().find(|path| !path.is_file()) {
        return Err(anyhow!("File {missing:?} does not exist"));
    }
    let estimators = build_estimators(&config)?;
    let metrics = run_estimators(&estimators, &args.files)
        .with_context(|| format!("Estimating deduplication over {} file(s)", args.files.len()))?;
    let mut result = EstimationResult::from_metrics(FILES, None, args.files.len(), &metrics)
        .context("Deriving dedup ratios")?;
    result.paths = args.files.clone();
    finish(
        ComparisonReport {
            results: vec![result],
            failures: Vec::new(),
        },
        &args.export,
    )
}

fn handle_param_impact(args: &cli::ParamImpactArgs) -> Result<()> {
    let config = load_config(&args.estimator)?;
    if !args.file.is_file() {
        return Err(anyhow!("File {:?} does not exist", args.file));
    }
    let param = if args.row_group_size {
        SweepParam::RowGroupSize
    } else {
        SweepParam::DataPageSize
    };
    let values = if args.values.is_empty() {
        param.sweep_values()
    } else {
        args.values.clone()
    };
    info!("Sweeping {param} over {} value(s)", values.len());
    let base = ParquetOptions {
        cdc: CdcSetting::Toggle(true),
        ..ParquetOptions::default()
    };
    let report = build_pipeline(&config)?
        .param_impact(
            &Source::File(args.file.clone()),
            &args.directory,
            param,
            &values,
            &base,
        )
        .with_context(|| format!("Sweeping {param} for {:?}", args.file))?;
    finish(report, &args.export)
}

/// Loads the optional YAML config and lays the command-line flags over it.
fn load_config(args: &EstimatorArgs) -> Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            BenchConfig::load(path).with_context(|| format!("Loading config from {path:?}"))?
        }
        None => BenchConfig::default(),
    };
    if let Some(min) = args.estimator_min {
        config.estimator.min = min;
    }
    if let Some(avg) = args.estimator_avg {
        config.estimator.avg = avg;
    }
    if let Some(max) = args.estimator_max {
        config.estimator.max = max;
    }
    if args.max_workers.is_some() {
        config.max_workers = args.max_workers;
    }
    if args.no_sanity_check {
        config.sanity_check = Some(false);
    }
    if let Some(program) = &args.xtool_program {
        config.external = Some(ExternalToolConfig::new(program.clone()));
    }
    if let Some(external) = config.external.as_mut() {
        if !args.xtool_args.is_empty() {
            external.args = args.xtool_args.clone();
        }
        if let Some(var) = &args.xtool_token_var {
            external.token_var = var.clone();
        }
    }
    config.validate().context("Validating configuration")?;
    debug!("Effective configuration: {config:?}");
    Ok(config)
}

fn build_estimators(config: &BenchConfig) -> Result<Vec<Box<dyn Estimator>>> {
    let chunks = ChunkEstimator::new(config.estimator).context("Configuring chunk estimator")?;
    let mut estimators: Vec<Box<dyn Estimator>> = vec![Box::new(chunks)];
    if let Some(external) = &config.external {
        let mut external = external.clone();
        match env::var(&external.token_var) {
            Ok(token) => external = external.with_token(token),
            Err(_) => warn!(
                "{} is not set; external estimates for {:?} will fail",
                external.token_var, external.program
            ),
        }
        estimators.push(Box::new(ExternalDedupEstimator::new(external)));
    }
    Ok(estimators)
}

fn build_pipeline(config: &BenchConfig) -> Result<ComparisonPipeline> {
    Ok(ComparisonPipeline::new(build_estimators(config)?)
        .with_max_workers(config.max_workers)
        .with_sanity_check(config.sanity_check.unwrap_or(true)))
}

fn cdc_params(args: &CdcArgs) -> CdcParams {
    CdcParams::new(
        args.cdc_min_size * 1024,
        args.cdc_max_size * 1024,
        args.cdc_norm_level,
    )
}

/// Every compression with chunking off and with the given parameters.
fn parquet_matrix(
    compressions: &[Compression],
    use_dictionary: bool,
    data_page_size: Option<usize>,
    cdc: CdcParams,
) -> Vec<FileFormat> {
    compressions
        .iter()
        .flat_map(|&compression| {
            [CdcSetting::Toggle(false), CdcSetting::Params(cdc)].map(|cdc| {
                FileFormat::Parquet(ParquetOptions {
                    compression,
                    use_dictionary,
                    data_page_size,
                    row_group_size: None,
                    cdc,
                })
            })
        })
        .collect()
}

fn extend_with_text_formats(formats: &mut Vec<FileFormat>, with_json: bool, with_sqlite: bool) {
    if with_json {
        formats.push(FileFormat::JsonLines {
            compression: Compression::None,
        });
    }
    if with_sqlite {
        formats.push(FileFormat::Sqlite {
            compression: Compression::None,
        });
    }
}

/// `*.parquet` files under `directory`, skipping chunked rewrites and anything
/// inside `exclude`.
fn collect_parquet_files(directory: &Path, exclude: &Path) -> Result<Vec<PathBuf>> {
    let exclude = fs::canonicalize(exclude).ok();
    let mut pending = vec![directory.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).with_context(|| format!("Reading directory {dir:?}"))? {
            let path = entry?.path();
            if path.is_dir() {
                let skip = match (&exclude, fs::canonicalize(&path)) {
                    (Some(exclude), Ok(canonical)) => canonical.starts_with(exclude),
                    _ => false,
                };
                if !skip {
                    pending.push(path);
                }
                continue;
            }
            let is_parquet = path.extension().is_some_and(|ext| ext == "parquet");
            let is_chunked = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().contains("cdc"));
            if is_parquet && !is_chunked {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Entry name for a rewritten file: its path below `root`, without the
/// extension, with separators replaced by `_`.
fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("_")
}

/// Names every input file, refusing two files that flatten to the same name.
fn rewrite_entries(root: &Path, files: Vec<PathBuf>) -> Result<BTreeMap<String, Source>> {
    let mut named: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in files {
        let name = entry_name(root, &path);
        if let Some(existing) = named.get(&name) {
            return Err(anyhow!(
                "{existing:?} and {path:?} both map to entry '{name}'; rename one of them"
            ));
        }
        named.insert(name, path);
    }
    Ok(named
        .into_iter()
        .map(|(name, path)| (name, Source::File(path)))
        .collect())
}

fn finish(report: ComparisonReport, export: &ExportArgs) -> Result<()> {
    report::print_results(&report.results);
    if let Some(path) = &export.csv {
        report::write_csv(path, &report.results)
            .with_context(|| format!("Writing CSV report to {path:?}"))?;
        info!("Wrote {} record(s) to {path:?}", report.results.len());
    }
    if let Some(path) = &export.json {
        report::write_json(path, &report.results)
            .with_context(|| format!("Writing JSON report to {path:?}"))?;
        info!("Wrote {} record(s) to {path:?}", report.results.len());
    }
    if report.is_complete() {
        return Ok(());
    }
    for failure in &report.failures {
        eprintln!("failed: {failure}");
    }
    Err(anyhow!(
        "{} task(s) failed; results are incomplete",
        report.failures.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_flatten_relative_paths() {
        let root = Path::new("/data");
        assert_eq!(entry_name(root, Path::new("/data/a.parquet")), "a");
        assert_eq!(
            entry_name(root, Path::new("/data/2024/jan/b.parquet")),
            "2024_jan_b"
        );
    }

    #[test]
    fn parquet_matrix_pairs_each_compression_with_and_without_chunking() {
        let formats = parquet_matrix(
            &[Compression::Zstd, Compression::Snappy],
            true,
            None,
            CdcParams::new(1024, 4096, 0),
        );
        let labels = formats.iter().map(FileFormat::label).collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                "parquet-zstd",
                "parquet-zstd-cdc1024-4096-0",
                "parquet-snappy",
                "parquet-snappy-cdc1024-4096-0",
            ]
        );
    }

    #[test]
    fn collect_skips_chunked_files_and_target_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::create_dir_all(root.join("out")).unwrap();
        for name in ["a.parquet", "a-zstd-cdc.parquet", "nested/b.parquet", "out/c.parquet", "d.csv"] {
            fs::write(root.join(name), b"x").unwrap();
        }
        let files = collect_parquet_files(root, &root.join("out")).unwrap();
        let names = files
            .iter()
            .map(|path| entry_name(root, path))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "nested_b"]);
    }

    #[test]
    fn colliding_entry_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        for name in ["a_b.parquet", "a/b.parquet", "c.parquet"] {
            fs::write(root.join(name), b"x").unwrap();
        }
        let files = collect_parquet_files(root, &root.join("out")).unwrap();
        assert_eq!(files.len(), 3);
        let err = rewrite_entries(root, files).unwrap_err();
        assert!(err.to_string().contains("'a_b'"), "{err}");

        let distinct = vec![root.join("a_b.parquet"), root.join("c.parquet")];
        let entries = rewrite_entries(root, distinct).unwrap();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["a_b", "c"]);
    }
}
