//! Combos command implementation.

use crate::config::ProfileStore;
use crate::error::Result;

/// Execute the combos command: list every combo with its strategies.
pub fn execute_combos(store: &ProfileStore) -> Result<()> {
    if store.combo.is_empty() {
        println!("no combos configured");
        return Ok(());
    }

    for combo in store.combos() {
        println!("{}", combo.name);
        for group in &combo.groups {
            match store.strategy.get(group) {
                Some(entry) => println!(
                    "  {group}: {} via {}, groups of {}{}",
                    entry.extraction_method,
                    entry.backend,
                    entry.max_files_per_request,
                    if entry.streaming { ", streaming" } else { "" },
                ),
                None => println!("  {group}: (undefined)"),
            }
        }
    }
    Ok(())
}
