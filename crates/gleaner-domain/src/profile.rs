//! Extraction profiles - named sets of mandatory output fields

use serde::{Deserialize, Serialize};

/// A named set of mandatory output fields
///
/// A file result is valid only when every mandatory field of the active
/// profile is present, non-empty, and not the "Not found" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProfile {
    /// Profile name
    pub name: String,

    /// Field names that must be present for a result to count as valid
    pub mandatory_fields: Vec<String>,
}

impl ExtractionProfile {
    /// Create a profile from a name and field list
    pub fn new(name: impl Into<String>, mandatory_fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            mandatory_fields,
        }
    }

    /// Common invoice profile used as the out-of-the-box default
    pub fn invoice_default() -> Self {
        Self::new(
            "default",
            vec![
                "INVOICE_NO".to_string(),
                "ISSUE_DATE".to_string(),
                "SELLER_NAME".to_string(),
                "TOTAL_GROSS".to_string(),
            ],
        )
    }
}
