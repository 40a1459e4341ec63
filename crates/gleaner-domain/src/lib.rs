//! Gleaner Domain Layer
//!
//! This crate contains the core data model for gleaner's strategy execution
//! engine. It defines the fundamental concepts, value objects, and trait
//! interfaces that all other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Combo**: a named, ordered set of strategy groups run against one file set
//! - **StrategyGroup**: a configuration bundle selecting a text-extraction
//!   method, an LLM backend, and per-request limits
//! - **FileGroup**: a bounded batch of files processed together in one
//!   collaborator call
//! - **FileResult**: the per-file outcome, including extracted fields, token
//!   counts, and attempt history
//! - **ExtractionProfile**: the set of mandatory output fields whose absence
//!   marks a result invalid
//!
//! ## Architecture
//!
//! This crate holds data and trait seams only:
//! - No I/O, no runtime, no concurrency primitives
//! - Collaborator implementations (HTTP backends, extractors) live in
//!   `gleaner-backend`
//! - Scheduling, retry, and statistics live in `gleaner-runner`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file_group;
pub mod profile;
pub mod result;
pub mod stats;
pub mod strategy;
pub mod traits;

// Re-exports for convenience
pub use file_group::FileGroup;
pub use profile::ExtractionProfile;
pub use result::{
    FileError, FileErrorKind, FileResult, MismatchRecord, RetryRecord, NOT_FOUND_SENTINEL,
};
pub use stats::StatsSnapshot;
pub use strategy::{Combo, StrategyError, StrategyGroup};
pub use traits::{
    BackendResponse, CollaboratorError, DocumentPayload, LlmBackend, TextExtractor,
};
