//! Core pipeline orchestration for JobLens.
//!
//! This crate ties link normalization, page fetching, classification and
//! table persistence together into the `analyze` workflow.

pub mod merge;
pub mod pipeline;

pub use merge::{LIST_SEPARATOR, OUTPUT_COLUMNS, RunStamp, merge_row};
pub use pipeline::{
    AnalyzeConfig, AnalyzeResult, Analyzer, ProgressReporter, RowStage, SilentProgress,
    default_output_path, truncate_chars,
};
