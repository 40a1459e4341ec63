//! Benchmark ground-truth table loading and lookup

use crate::error::BenchError;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Header names recognized as a full-path column, in priority order
const PATH_HEADERS: &[&str] = &["file_path", "filepath", "path", "full_path"];

/// Header names recognized as a filename column, including legacy spellings
const FILENAME_HEADERS: &[&str] = &["filename", "file_name", "file", "document", "nazwa_pliku"];

/// One row of ground truth
///
/// Immutable after load. Every non-key column becomes an expected field
/// value; empty cells are kept as explicitly-empty expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkRecord {
    /// Full stored path, when the table has a path column
    pub path: Option<String>,

    /// Bare filename key
    pub filename: String,

    /// Expected value per field name; `None` for an explicitly empty cell
    pub fields: BTreeMap<String, Option<String>>,
}

/// Loaded ground-truth table with filename-keyed lookup
///
/// Rows are kept in file order; the substring fallback takes the first match
/// in that order.
#[derive(Debug, Clone)]
pub struct BenchmarkIndex {
    records: Vec<BenchmarkRecord>,
}

impl BenchmarkIndex {
    /// Load a benchmark table from a CSV file
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let path_col = Self::find_column(&headers, PATH_HEADERS);
        let filename_col = Self::find_column(&headers, FILENAME_HEADERS).or(path_col);
        let filename_col = filename_col
            .ok_or_else(|| BenchError::NoFileColumn(headers.join(", ")))?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;

            let stored_path = path_col.and_then(|i| row.get(i)).map(str::to_string);
            let filename_cell = row.get(filename_col).unwrap_or("").trim().to_string();
            // A path cell doubling as the filename key is reduced to its
            // final component.
            let filename = Path::new(&filename_cell)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or(filename_cell);

            let mut fields = BTreeMap::new();
            for (i, header) in headers.iter().enumerate() {
                if Some(i) == path_col || i == filename_col {
                    continue;
                }
                let cell = row.get(i).unwrap_or("").trim();
                let value = if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                };
                fields.insert(header.clone(), value);
            }

            records.push(BenchmarkRecord {
                path: stored_path,
                filename,
                fields,
            });
        }

        if records.is_empty() {
            return Err(BenchError::Empty);
        }

        info!(
            "loaded benchmark table: {} rows, {} columns",
            records.len(),
            headers.len()
        );
        Ok(Self { records })
    }

    /// Build an index directly from records (test construction)
    pub fn from_records(records: Vec<BenchmarkRecord>) -> Self {
        Self { records }
    }

    /// Number of ground-truth rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the row for a result file
    ///
    /// Precedence: exact full-path match, exact filename match, then first
    /// substring containment of a stored filename in the query.
    pub fn find(&self, file: &Path) -> Option<&BenchmarkRecord> {
        let query_path = file.display().to_string();
        let query_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| query_path.clone());

        if let Some(record) = self
            .records
            .iter()
            .find(|r| r.path.as_deref() == Some(query_path.as_str()))
        {
            return Some(record);
        }

        if let Some(record) = self.records.iter().find(|r| r.filename == query_name) {
            return Some(record);
        }

        // Legacy tables sometimes key on partial names; first match in row
        // order wins.
        let fallback = self
            .records
            .iter()
            .find(|r| !r.filename.is_empty() && query_path.contains(&r.filename));
        if fallback.is_some() {
            debug!("substring fallback matched for '{}'", file.display());
        }
        fallback
    }

    /// Look up the expected value of one field for one file
    ///
    /// Outer `None`: the benchmark knows nothing about this file/field (the
    /// field is skipped during comparison). Inner `None`: the benchmark has
    /// the field with an explicitly empty expectation.
    pub fn lookup(&self, file: &Path, field: &str) -> Option<Option<String>> {
        self.find(file)?.fields.get(field).cloned()
    }

    fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|candidate| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(candidate))
        })
    }
}
