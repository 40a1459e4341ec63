//! Gleaner Benchmark Layer
//!
//! Loads a ground-truth table keyed by filename and scores extraction results
//! against it.
//!
//! # Matching policy
//!
//! Ground-truth tables arrive with full paths, bare filenames, or legacy
//! column names, so lookup degrades gracefully:
//!
//! 1. exact match against a full-path column, when present
//! 2. exact match against the filename column
//! 3. substring containment against the filename column, first match wins
//!
//! # Comparison policy
//!
//! Values are compared as trimmed strings only; no semantic normalization.
//! A field the benchmark does not know is skipped, never a mismatch. Ground
//! truth with an explicitly empty cell matches an absent extracted value.

#![warn(missing_docs)]

pub mod compare;
pub mod error;
pub mod index;

pub use compare::{compare_file, ComparisonReport};
pub use error::BenchError;
pub use index::{BenchmarkIndex, BenchmarkRecord};
