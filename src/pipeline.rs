//! Concurrent write-then-estimate comparison of file formats.
//!
//! Every comparison is lowered to a [`Plan`]: a flat list of write jobs and a
//! list of buckets, each bucket naming the jobs whose artifacts it estimates
//! over. Jobs run on a bounded rayon pool and report back over a channel to a
//! single collector on the calling thread, which owns all bookkeeping. A
//! bucket is estimated once each of its jobs has produced a path; a bucket
//! with a failed job is never estimated and is reported as incomplete.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
    sync::mpsc,
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{BenchError, Result},
    estimate::{EstimationResult, Estimator, Metrics, run_estimators},
    formats::{DEFAULT_BLOCK_SIZE, FileFormat, ParquetOptions, Source, WriteOptions},
};

/// Group name → entry name → input.
pub type Groups = BTreeMap<String, BTreeMap<String, Source>>;

pub const BASELINE: &str = "baseline";
pub const OVERALL: &str = "overall";

/// One isolated failure, keyed by group, format label and (for writes) entry.
#[derive(Debug)]
pub struct TaskFailure {
    pub group: String,
    pub format: String,
    pub entry: Option<String>,
    pub error: BenchError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}/{}/{}: {}", self.group, self.format, entry, self.error),
            None => write!(f, "{}/{}: {}", self.group, self.format, self.error),
        }
    }
}

#[derive(Debug, Default)]
pub struct ComparisonReport {
    pub results: Vec<EstimationResult>,
    pub failures: Vec<TaskFailure>,
}

impl ComparisonReport {
    /// True when every requested bucket produced a result.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepParam {
    RowGroupSize,
    DataPageSize,
}

impl SweepParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepParam::RowGroupSize => "row-group-size",
            SweepParam::DataPageSize => "data-page-size",
        }
    }

    pub fn default_value(&self) -> usize {
        1 << 20
    }

    /// Powers of two probed by a sweep.
    pub fn sweep_values(&self) -> Vec<usize> {
        let exponents = match self {
            SweepParam::RowGroupSize => 10..22,
            SweepParam::DataPageSize => 15..23,
        };
        exponents.map(|exp| 1usize << exp).collect()
    }

    fn apply(&self, options: &ParquetOptions, value: usize) -> ParquetOptions {
        let mut options = options.clone();
        match self {
            SweepParam::RowGroupSize => options.row_group_size = Some(value),
            SweepParam::DataPageSize => options.data_page_size = Some(value),
        }
        options
    }
}

impl fmt::Display for SweepParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct WriteJob<'a> {
    group: String,
    format: &'a FileFormat,
    entry: String,
    source: &'a Source,
    directory: PathBuf,
    options: WriteOptions,
}

struct Bucket<'a> {
    group: String,
    format: &'a FileFormat,
    /// Job indices in entry-name order.
    jobs: Vec<usize>,
    resolved: usize,
    failed: bool,
}

#[derive(Default)]
struct Plan<'a> {
    jobs: Vec<WriteJob<'a>>,
    buckets: Vec<Bucket<'a>>,
}

enum Message {
    Written {
        job: usize,
        outcome: Result<PathBuf>,
    },
    Estimated {
        bucket: usize,
        outcome: Result<Metrics>,
    },
}

pub struct ComparisonPipeline {
    estimators: Vec<Box<dyn Estimator>>,
    max_workers: Option<usize>,
    sanity_check: bool,
    block_size: usize,
}

impl ComparisonPipeline {
    pub fn new(estimators: Vec<Box<dyn Estimator>>) -> Self {
        Self {
            estimators,
            max_workers: None,
            sanity_check: true,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Worker pool size; `None` uses the available parallelism.
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_sanity_check(mut self, sanity_check: bool) -> Self {
        self.sanity_check = sanity_check;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    fn write_options(&self, prefix: Option<&str>) -> WriteOptions {
        WriteOptions {
            prefix: prefix.map(str::to_string),
            sanity_check: self.sanity_check,
            block_size: self.block_size,
        }
    }

    /// Writes every entry of every group in every format and estimates each
    /// `(group, format)` bucket over its entries. Artifacts land in
    /// `{directory}/{group}/{format name}/{group}-{entry}-{paramstem}.{suffix}`.
    pub fn compare_formats_tables(
        &self,
        formats: &[FileFormat],
        groups: &Groups,
        directory: &Path,
    ) -> Result<ComparisonReport> {
        ensure_unique_labels(formats.iter())?;
        if let Some((group, _)) = groups.iter().find(|(_, entries)| entries.is_empty()) {
            return Err(BenchError::Config(format!("group '{group}' has no entries")));
        }

        let mut plan = Plan::default();
        for (group, entries) in groups {
            for format in formats {
                let target = directory.join(group).join(format.name());
                let jobs = entries
                    .iter()
                    .map(|(entry, source)| {
                        plan.jobs.push(WriteJob {
                            group: group.clone(),
                            format,
                            entry: entry.clone(),
                            source,
                            directory: target.clone(),
                            options: self.write_options(Some(group)),
                        });
                        plan.jobs.len() - 1
                    })
                    .collect();
                plan.buckets.push(Bucket {
                    group: group.clone(),
                    format,
                    jobs,
                    resolved: 0,
                    failed: false,
                });
            }
        }
        self.run(plan)
    }

    /// Writes `source` once in `baseline` and once per contender, then
    /// estimates each contender paired with the baseline. Records are grouped
    /// under the contender's name.
    pub fn compare_formats(
        &self,
        baseline: &FileFormat,
        contenders: &BTreeMap<String, FileFormat>,
        source: &Source,
        directory: &Path,
    ) -> Result<ComparisonReport> {
        if contenders.contains_key(BASELINE) {
            return Err(BenchError::Config(format!(
                "contender name '{BASELINE}' is reserved"
            )));
        }
        let mut plan = Plan::default();
        plan.jobs.push(WriteJob {
            group: BASELINE.to_string(),
            format: baseline,
            entry: BASELINE.to_string(),
            source,
            directory: directory.to_path_buf(),
            options: self.write_options(None),
        });
        for (name, format) in contenders {
            plan.jobs.push(WriteJob {
                group: name.clone(),
                format,
                entry: name.clone(),
                source,
                directory: directory.to_path_buf(),
                options: self.write_options(None),
            });
            plan.buckets.push(Bucket {
                group: name.clone(),
                format,
                jobs: vec![0, plan.jobs.len() - 1],
                resolved: 0,
                failed: false,
            });
        }
        self.run(plan)
    }

    /// Sweeps one Parquet parameter: a CDC-enabled baseline at the default
    /// value against one contender per value, plus an `overall` record over
    /// every artifact written.
    pub fn param_impact(
        &self,
        source: &Source,
        directory: &Path,
        param: SweepParam,
        values: &[usize],
        base: &ParquetOptions,
    ) -> Result<ComparisonReport> {
        let baseline = FileFormat::Parquet(param.apply(base, param.default_value()));
        let contenders = values
            .iter()
            .map(|&value| {
                (
                    format!("{param}-{value}"),
                    FileFormat::Parquet(param.apply(base, value)),
                )
            })
            .collect::<BTreeMap<_, _>>();
        let mut report = self.compare_formats(&baseline, &contenders, source, directory)?;

        let paths = report
            .results
            .iter()
            .flat_map(|result| result.paths.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        if paths.is_empty() {
            return Ok(report);
        }
        match run_estimators(&self.estimators, &paths)
            .and_then(|metrics| EstimationResult::from_metrics(OVERALL, None, paths.len(), &metrics))
        {
            Ok(mut overall) => {
                overall.format = param.to_string();
                overall.paths = paths;
                report.results.push(overall);
            }
            Err(error) => report.failures.push(TaskFailure {
                group: OVERALL.to_string(),
                format: param.to_string(),
                entry: None,
                error,
            }),
        }
        Ok(report)
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|idx| format!("dedup-bench-worker-{idx}"));
        if let Some(workers) = self.max_workers {
            if workers == 0 {
                return Err(BenchError::Config("max workers must be at least 1".into()));
            }
            builder = builder.num_threads(workers);
        }
        builder
            .build()
            .map_err(|err| BenchError::Config(format!("cannot start worker pool: {err}")))
    }

    fn run(&self, mut plan: Plan<'_>) -> Result<ComparisonReport> {
        let pool = self.build_pool()?;
        info!(
            "Writing {} artifact(s) for {} bucket(s) on {} worker(s)",
            plan.jobs.len(),
            plan.buckets.len(),
            pool.current_num_threads()
        );

        let mut job_buckets = vec![Vec::new(); plan.jobs.len()];
        for (idx, bucket) in plan.buckets.iter().enumerate() {
            for &job in &bucket.jobs {
                job_buckets[job].push(idx);
            }
        }
        let mut paths: Vec<Option<PathBuf>> = vec![None; plan.jobs.len()];
        let mut report = ComparisonReport::default();
        let jobs = &plan.jobs;
        let buckets = &mut plan.buckets;
        let estimators = &self.estimators;

        let collected: Result<()> = pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<Message>();
            for (idx, job) in jobs.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = guarded(|| {
                        job.format
                            .write(&job.entry, job.source, &job.directory, &job.options)
                    });
                    let _ = tx.send(Message::Written { job: idx, outcome });
                });
            }

            let mut pending = jobs.len();
            while pending > 0 {
                let message = rx.recv().map_err(|_| {
                    BenchError::Invariant("worker channel closed with tasks pending".into())
                })?;
                pending -= 1;
                match message {
                    Message::Written { job, outcome } => {
                        let write = &jobs[job];
                        match outcome {
                            Ok(path) => {
                                debug!("{}/{}: wrote {path:?}", write.group, write.format.label());
                                paths[job] = Some(path);
                            }
                            Err(error) => {
                                log_failure(&error, &write.group, &write.format.label());
                                report.failures.push(TaskFailure {
                                    group: write.group.clone(),
                                    format: write.format.label(),
                                    entry: Some(write.entry.clone()),
                                    error,
                                });
                            }
                        }
                        for &idx in &job_buckets[job] {
                            let bucket = &mut buckets[idx];
                            bucket.resolved += 1;
                            bucket.failed |= paths[job].is_none();
                            if bucket.resolved < bucket.jobs.len() {
                                continue;
                            }
                            if bucket.failed {
                                let missing = bucket
                                    .jobs
                                    .iter()
                                    .filter(|&&j| paths[j].is_none())
                                    .map(|&j| jobs[j].entry.clone())
                                    .collect();
                                report.failures.push(TaskFailure {
                                    group: bucket.group.clone(),
                                    format: bucket.format.label(),
                                    entry: None,
                                    error: BenchError::Aggregation {
                                        group: bucket.group.clone(),
                                        format: bucket.format.label(),
                                        missing,
                                    },
                                });
                                continue;
                            }
                            let bucket_paths = bucket
                                .jobs
                                .iter()
                                .filter_map(|&j| paths[j].clone())
                                .collect::<Vec<_>>();
                            let tx = tx.clone();
                            pending += 1;
                            scope.spawn(move |_| {
                                let outcome = guarded(|| run_estimators(estimators, &bucket_paths));
                                let _ = tx.send(Message::Estimated {
                                    bucket: idx,
                                    outcome,
                                });
                            });
                        }
                    }
                    Message::Estimated { bucket, outcome } => {
                        let bucket = &buckets[bucket];
                        let label = bucket.format.label();
                        let bucket_paths = bucket
                            .jobs
                            .iter()
                            .filter_map(|&j| paths[j].clone())
                            .collect::<Vec<_>>();
                        let record = outcome.and_then(|metrics| {
                            EstimationResult::from_metrics(
                                bucket.group.clone(),
                                Some(bucket.format),
                                bucket.jobs.len(),
                                &metrics,
                            )
                        });
                        match record {
                            Ok(mut record) => {
                                info!(
                                    "{}/{label}: dedup ratio {:.2}% over {} file(s)",
                                    record.group,
                                    record.dedup_ratio * 100.0,
                                    record.numfiles
                                );
                                record.paths = bucket_paths;
                                report.results.push(record);
                            }
                            Err(error) => {
                                log_failure(&error, &bucket.group, &label);
                                report.failures.push(TaskFailure {
                                    group: bucket.group.clone(),
                                    format: label,
                                    entry: None,
                                    error,
                                });
                            }
                        }
                    }
                }
            }
            Ok(())
        });
        collected?;

        report
            .results
            .sort_by(|a, b| (&a.group, a.label()).cmp(&(&b.group, b.label())));
        report.failures.sort_by(|a, b| {
            (&a.group, &a.format, &a.entry).cmp(&(&b.group, &b.format, &b.entry))
        });
        Ok(report)
    }
}

/// Runs a task, turning a panic into an error so the collector always hears
/// back.
fn guarded<T>(task: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(BenchError::Invariant(format!("task panicked: {message}")))
    })
}

fn log_failure(error: &BenchError, group: &str, format: &str) {
    if error.is_fatal() {
        error!("{group}/{format}: {error}");
    } else {
        warn!("{group}/{format}: {error}");
    }
}

fn ensure_unique_labels<'a>(formats: impl Iterator<Item = &'a FileFormat>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for format in formats {
        let label = format.label();
        if !seen.insert(label.clone()) {
            return Err(BenchError::Config(format!(
                "format '{label}' is listed more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Compression;

    #[test]
    fn sweep_values_cover_documented_ranges() {
        let rows = SweepParam::RowGroupSize.sweep_values();
        assert_eq!(rows.first(), Some(&1024));
        assert_eq!(rows.last(), Some(&(1 << 21)));
        assert_eq!(rows.len(), 12);
        let pages = SweepParam::DataPageSize.sweep_values();
        assert_eq!(pages.first(), Some(&(1 << 15)));
        assert_eq!(pages.last(), Some(&(1 << 22)));
    }

    #[test]
    fn duplicate_formats_are_rejected() {
        let formats = [
            FileFormat::parquet(Compression::Zstd, true),
            FileFormat::parquet(Compression::Zstd, true),
        ];
        assert!(matches!(
            ensure_unique_labels(formats.iter()),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn panics_become_errors() {
        let outcome: Result<()> = guarded(|| panic!("boom"));
        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        let pipeline = ComparisonPipeline::new(Vec::new()).with_max_workers(Some(0));
        assert!(matches!(pipeline.build_pool(), Err(BenchError::Config(_))));
    }
}
