//! Shared types, error model, and configuration for JobLens.
//!
//! This crate is the foundation depended on by all other JobLens crates.
//! It provides:
//! - [`JobLensError`]: the unified error type
//! - The classification taxonomy ([`Classification`] and its closed vocabularies)
//! - Configuration ([`AppConfig`] and the runtime configs derived from it)
//! - [`RetryPolicy`]: attempt-bounded retry with backoff

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, ClassifierSection, DefaultsConfig, FetcherConfig,
    FetcherSection, RendererKind, ServerSection, StorageSection, StoreConfig,
    api_key_looks_valid, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key, validate_api_key,
};
pub use error::{JobLensError, Result};
pub use retry::{Backoff, RetryError, RetryPolicy};
pub use types::{
    Classification, Industry, Level, NOT_APPLICABLE, RemoteMode, RunId, SPECIAL_PHRASES,
    STACK_VOCABULARY, SalaryBand, canonical_stack,
};
