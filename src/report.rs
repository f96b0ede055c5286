use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use heck::ToTitleCase;
use serde::Serialize;

use crate::error::Result;
use crate::estimate::EstimationResult;

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Records ordered by group, then by dedup ratio (best first).
pub fn sorted(results: &[EstimationResult]) -> Vec<&EstimationResult> {
    let mut ordered = results.iter().collect::<Vec<_>>();
    ordered.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then(a.dedup_ratio.total_cmp(&b.dedup_ratio))
            .then_with(|| a.label().cmp(&b.label()))
    });
    ordered
}

pub fn results_table(results: &[EstimationResult]) -> String {
    let with_external = results.iter().any(|r| r.external_dedup_bytes.is_some());
    let mut headers = [
        "Group",
        "Format",
        "Params",
        "Files",
        "Total Size",
        "Chunk Size",
        "Compressed Size",
        "Dedup Ratio",
    ]
    .map(String::from)
    .to_vec();
    if with_external {
        headers.push("External Size".to_string());
        headers.push("External Ratio".to_string());
    }

    let rows = sorted(results)
        .into_iter()
        .map(|result| {
            let mut row = vec![
                result.group.to_title_case(),
                result.format.clone(),
                result.params.clone(),
                result.numfiles.to_string(),
                human_size(result.total_len),
                human_size(result.chunk_bytes),
                human_size(result.compressed_chunk_bytes),
                percent(result.dedup_ratio),
            ];
            if with_external {
                row.push(result.external_dedup_bytes.map(human_size).unwrap_or_default());
                row.push(result.external_dedup_ratio.map(percent).unwrap_or_default());
            }
            row
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn print_results(results: &[EstimationResult]) {
    print!("{}", results_table(results));
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate().take(widths.len()) {
        let sanitized = sanitize_cell(value);
        let padding = widths[idx].saturating_sub(display_width(sanitized.as_ref()));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[derive(Serialize)]
struct CsvRecord<'a> {
    date: &'a str,
    group: &'a str,
    format: &'a str,
    params: &'a str,
    numfiles: usize,
    total_len: u64,
    chunk_bytes: u64,
    compressed_chunk_bytes: u64,
    dedup_ratio: f64,
    compressed_dedup_ratio: f64,
    external_dedup_bytes: Option<u64>,
    external_dedup_ratio: Option<f64>,
}

/// Writes one CSV row per record, stamped with the current UTC time.
/// An existing file is replaced.
pub fn write_csv(path: &Path, results: &[EstimationResult]) -> Result<()> {
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut writer = csv::Writer::from_path(path)?;
    for result in sorted(results) {
        writer.serialize(CsvRecord {
            date: &date,
            group: &result.group,
            format: &result.format,
            params: &result.params,
            numfiles: result.numfiles,
            total_len: result.total_len,
            chunk_bytes: result.chunk_bytes,
            compressed_chunk_bytes: result.compressed_chunk_bytes,
            dedup_ratio: result.dedup_ratio,
            compressed_dedup_ratio: result.compressed_dedup_ratio,
            external_dedup_bytes: result.external_dedup_bytes,
            external_dedup_ratio: result.external_dedup_ratio,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json(path: &Path, results: &[EstimationResult]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &sorted(results))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
