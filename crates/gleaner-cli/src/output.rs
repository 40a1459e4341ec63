//! Report writers
//!
//! One JSON report for the whole run plus CSV views per strategy: per-file
//! results, permanent failures, and benchmark mismatches in evaluation mode.
//! Everything lands under one output directory, created on demand.

use crate::error::Result;
use gleaner_domain::FileErrorKind;
use gleaner_runner::RunReport;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write every output file for a finished run
///
/// Returns the paths written, for terminal output.
pub fn write_all(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let report_path = dir.join("report.json");
    let file = fs::File::create(&report_path)?;
    serde_json::to_writer_pretty(file, report)?;
    written.push(report_path);

    for (name, strategy) in &report.strategies {
        written.push(write_results_csv(report, name, dir)?);
        if strategy.failures().next().is_some() {
            written.push(write_errors_csv(report, name, dir)?);
        }
        if strategy
            .comparison
            .as_ref()
            .is_some_and(|c| !c.mismatches.is_empty())
        {
            written.push(write_mismatches_csv(report, name, dir)?);
        }
    }

    info!(dir = %dir.display(), files = written.len(), "reports written");
    Ok(written)
}

/// Per-file results for one strategy
///
/// Field columns are the union of field names seen across results, so
/// strategies with different profiles stay self-describing.
fn write_results_csv(report: &RunReport, strategy: &str, dir: &Path) -> Result<PathBuf> {
    let results = &report.strategies[strategy].results;
    let field_names: BTreeSet<&String> =
        results.values().flat_map(|r| r.fields.keys()).collect();

    let path = dir.join(format!("results_{strategy}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;

    let mut header = vec!["file", "success", "attempts", "tokens_in", "tokens_out"];
    header.extend(field_names.iter().map(|s| s.as_str()));
    writer.write_record(&header)?;

    for result in results.values() {
        let mut record = vec![
            result.path.display().to_string(),
            result.success.to_string(),
            result.attempts.to_string(),
            result.tokens_in.to_string(),
            result.tokens_out.to_string(),
        ];
        for field in &field_names {
            record.push(
                result
                    .fields
                    .get(*field)
                    .and_then(|v| v.clone())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Permanent failures for one strategy, with reason and attempt count
fn write_errors_csv(report: &RunReport, strategy: &str, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("errors_{strategy}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["file", "kind", "detail", "attempts"])?;

    for result in report.strategies[strategy].failures() {
        let (kind, detail) = match &result.error {
            Some(error) => (kind_label(error.kind), error.detail.as_str()),
            None => (kind_label(FileErrorKind::InvalidContent), ""),
        };
        writer.write_record([
            result.path.display().to_string(),
            kind.to_string(),
            detail.to_string(),
            result.attempts.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

/// Benchmark mismatches for one strategy
fn write_mismatches_csv(report: &RunReport, strategy: &str, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("mismatches_{strategy}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["file", "field", "expected", "actual"])?;

    if let Some(comparison) = &report.strategies[strategy].comparison {
        for mismatch in &comparison.mismatches {
            writer.write_record([
                mismatch.file.display().to_string(),
                mismatch.field.clone(),
                mismatch.expected.clone().unwrap_or_default(),
                mismatch.actual.clone().unwrap_or_default(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(path)
}

fn kind_label(kind: FileErrorKind) -> &'static str {
    match kind {
        FileErrorKind::Transport => "transport",
        FileErrorKind::InvalidContent => "invalid_content",
        FileErrorKind::Cancelled => "cancelled",
    }
}
