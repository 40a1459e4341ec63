//! Validate command implementation.

use crate::config::ProfileStore;
use crate::error::Result;
use std::path::Path;

/// Execute the validate command: load the store and report what it defines.
///
/// Loading already performs full cross-reference validation, so reaching the
/// summary line means the file is usable.
pub fn execute_validate(path: &Path) -> Result<()> {
    let store = ProfileStore::load(path)?;
    println!(
        "{}: ok ({} strategies, {} combos, {} profiles)",
        path.display(),
        store.strategy.len(),
        store.combo.len(),
        store.profiles().len(),
    );
    Ok(())
}
