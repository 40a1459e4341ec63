//! Scoring extraction results against the benchmark index

use crate::index::BenchmarkIndex;
use gleaner_domain::{FileResult, MismatchRecord, NOT_FOUND_SENTINEL};
use serde::Serialize;
use tracing::debug;

/// Aggregate comparison outcome for one run
///
/// Field-level and file-level counts are tracked separately: the total
/// mismatch count measures field accuracy, the files-with-mismatches count
/// measures file accuracy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    /// Every field-level discrepancy found, append-only
    pub mismatches: Vec<MismatchRecord>,

    /// Number of files that had at least one mismatch
    pub files_with_mismatches: usize,

    /// Number of files that were compared against a benchmark row
    pub files_compared: usize,

    /// Number of files the benchmark table does not know
    pub files_skipped: usize,
}

impl ComparisonReport {
    /// Total number of field-level mismatches
    pub fn total_mismatches(&self) -> usize {
        self.mismatches.len()
    }

    /// Fold one file's comparison into the report
    pub fn add_file(&mut self, file_mismatches: Vec<MismatchRecord>, had_row: bool) {
        if !had_row {
            self.files_skipped += 1;
            return;
        }
        self.files_compared += 1;
        if !file_mismatches.is_empty() {
            self.files_with_mismatches += 1;
        }
        self.mismatches.extend(file_mismatches);
    }
}

/// Normalize an extracted value for comparison
///
/// Trim-only: absent, empty, and sentinel values become `None`; everything
/// else keeps its exact trimmed text. No case folding or format coercion.
fn normalize_actual(result: &FileResult, field: &str) -> Option<String> {
    match result.fields.get(field) {
        Some(Some(v)) => {
            let trimmed = v.trim();
            if trimmed.is_empty() || trimmed == NOT_FOUND_SENTINEL {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

/// Compare one file's result against the benchmark
///
/// For every listed field: no benchmark entry means the field is skipped; an
/// entry that differs from the normalized actual value (including an expected
/// value the result lacks) produces a [`MismatchRecord`]. An expectation and
/// an actual that are both absent count as a match.
///
/// Pure with respect to its inputs, so re-running yields identical records.
pub fn compare_file(
    result: &FileResult,
    fields: &[String],
    index: &BenchmarkIndex,
) -> (Vec<MismatchRecord>, bool) {
    let Some(record) = index.find(&result.path) else {
        debug!("no benchmark row for '{}'", result.path.display());
        return (Vec::new(), false);
    };

    let mut mismatches = Vec::new();
    for field in fields {
        let Some(expected) = record.fields.get(field).cloned() else {
            continue;
        };
        let expected = expected.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let actual = normalize_actual(result, field);

        if expected != actual {
            mismatches.push(MismatchRecord {
                file: result.path.clone(),
                field: field.clone(),
                expected,
                actual,
            });
        }
    }
    (mismatches, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BenchmarkRecord;
    use std::path::PathBuf;

    fn index_with(fields: &[(&str, Option<&str>)]) -> BenchmarkIndex {
        BenchmarkIndex::from_records(vec![BenchmarkRecord {
            path: None,
            filename: "inv_001.pdf".into(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(String::from)))
                .collect(),
        }])
    }

    fn result_with(fields: &[(&str, Option<&str>)]) -> FileResult {
        let mut r = FileResult::pending(PathBuf::from("inv_001.pdf"));
        for (k, v) in fields {
            r.fields.insert(k.to_string(), v.map(String::from));
        }
        r
    }

    #[test]
    fn test_matching_values_produce_no_mismatch() {
        let index = index_with(&[("INVOICE_NO", Some("INV-1"))]);
        let result = result_with(&[("INVOICE_NO", Some("INV-1"))]);

        let (mismatches, had_row) = compare_file(&result, &["INVOICE_NO".into()], &index);
        assert!(had_row);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_trimming_only_no_case_folding() {
        // Case difference after trimming is a mismatch: the comparator does
        // not normalize beyond trim.
        let index = index_with(&[("INVOICE_NO", Some("INV-1"))]);
        let result = result_with(&[("INVOICE_NO", Some(" inv-1 "))]);

        let (mismatches, _) = compare_file(&result, &["INVOICE_NO".into()], &index);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].expected.as_deref(), Some("INV-1"));
        assert_eq!(mismatches[0].actual.as_deref(), Some("inv-1"));
    }

    #[test]
    fn test_whitespace_difference_is_not_a_mismatch() {
        let index = index_with(&[("INVOICE_NO", Some("INV-1"))]);
        let result = result_with(&[("INVOICE_NO", Some("  INV-1  "))]);

        let (mismatches, _) = compare_file(&result, &["INVOICE_NO".into()], &index);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_field_unknown_to_benchmark_is_skipped() {
        let index = index_with(&[("INVOICE_NO", Some("INV-1"))]);
        let result = result_with(&[
            ("INVOICE_NO", Some("INV-1")),
            ("TOTAL", Some("999")),
        ]);

        let (mismatches, _) =
            compare_file(&result, &["INVOICE_NO".into(), "TOTAL".into()], &index);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_expected_value_absent_in_result_is_mismatch() {
        let index = index_with(&[("INVOICE_NO", Some("INV-1"))]);
        let result = result_with(&[("INVOICE_NO", Some(NOT_FOUND_SENTINEL))]);

        let (mismatches, _) = compare_file(&result, &["INVOICE_NO".into()], &index);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].actual, None);
    }

    #[test]
    fn test_both_absent_is_match() {
        let index = index_with(&[("NOTES", None)]);
        let result = result_with(&[("NOTES", None)]);

        let (mismatches, _) = compare_file(&result, &["NOTES".into()], &index);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_unknown_file_skips_comparison() {
        let index = index_with(&[("INVOICE_NO", Some("INV-1"))]);
        let mut result = result_with(&[("INVOICE_NO", Some("INV-1"))]);
        result.path = PathBuf::from("unknown.pdf");

        let (mismatches, had_row) = compare_file(&result, &["INVOICE_NO".into()], &index);
        assert!(!had_row);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_comparison_is_idempotent() {
        let index = index_with(&[("INVOICE_NO", Some("INV-1")), ("TOTAL", Some("10"))]);
        let result = result_with(&[("INVOICE_NO", Some("inv-1")), ("TOTAL", Some("10"))]);
        let fields = vec!["INVOICE_NO".to_string(), "TOTAL".to_string()];

        let first = compare_file(&result, &fields, &index);
        let second = compare_file(&result, &fields, &index);
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn test_report_counts_field_and_file_level_separately() {
        let mut report = ComparisonReport::default();
        let mismatch = |field: &str| MismatchRecord {
            file: PathBuf::from("a.pdf"),
            field: field.into(),
            expected: Some("x".into()),
            actual: Some("y".into()),
        };

        report.add_file(vec![mismatch("A"), mismatch("B")], true);
        report.add_file(vec![], true);
        report.add_file(vec![], false);

        assert_eq!(report.total_mismatches(), 2);
        assert_eq!(report.files_with_mismatches, 1);
        assert_eq!(report.files_compared, 2);
        assert_eq!(report.files_skipped, 1);
    }
}
