//! Shared types, error model, and configuration for wikireq.
//!
//! This crate is the foundation depended on by all other wikireq crates.
//! It provides:
//! - [`WikiReqError`]: the unified error type
//! - Domain types ([`RawDocument`], [`RequirementRecord`], [`RequirementIndex`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConfluenceConfig, EnrichmentConfig, OutputConfig, RetryConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_token,
};
pub use error::{Result, WikiReqError};
pub use types::{RawDocument, RequirementIndex, RequirementRecord, RequirementStatus};
