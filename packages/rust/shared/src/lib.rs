//! Shared types, error model, and configuration for Hireflow.
//!
//! This crate is the foundation depended on by all other Hireflow crates.
//! It provides:
//! - [`HireflowError`] — the unified error type
//! - Domain types ([`Record`], [`Attachment`], [`Evaluation`], [`RecordFilter`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AttachmentsConfig, DefaultsConfig, FieldPolicy, OpenRouterConfig, PipelineConfig,
    SourceConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_data_dir, validate_api_key,
};
pub use error::{HireflowError, Result};
pub use types::{Attachment, Evaluation, RawRecord, Record, RecordFilter};
