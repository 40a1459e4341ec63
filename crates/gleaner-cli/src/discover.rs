//! Input discovery
//!
//! Recursive directory scan filtered by extension. The result is sorted so
//! runs over the same tree always produce the same FileGroup partitioning.

use crate::error::{CliError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions scanned when the user gives none
pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff"];

/// Collect document files under `dir`, recursively
///
/// `extensions` are matched case-insensitively, without the dot. An empty
/// slice falls back to [`DEFAULT_EXTENSIONS`].
pub fn discover_inputs(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CliError::InvalidInput(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let lowered: Vec<String> = if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    };

    let mut files = Vec::new();
    walk(dir, &lowered, &mut files)?;
    files.sort();
    debug!(dir = %dir.display(), files = files.len(), "input discovery finished");
    Ok(files)
}

fn walk(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, extensions, out)?;
        } else if matches_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_discovery_is_recursive_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("a.PDF"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("sub").join("c.png"));

        let files = discover_inputs(dir.path(), &[]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.PDF"),
                PathBuf::from("b.pdf"),
                PathBuf::from("sub/c.png"),
            ]
        );
    }

    #[test]
    fn test_explicit_extensions_accept_leading_dot() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.csv"));
        touch(&dir.path().join("b.pdf"));

        let files = discover_inputs(dir.path(), &[".csv".to_string()]).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(discover_inputs(Path::new("/no/such/dir"), &[]).is_err());
    }
}
