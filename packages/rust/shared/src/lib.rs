//! Shared types, error model, and configuration for TransFit enrichment.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`TransfitError`]: the unified error type
//! - Domain types ([`TopicTag`], [`ResearchArticle`], [`Exercise`], [`TipRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OpenAiConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{Result, TransfitError};
pub use types::{
    DEFAULT_CONTEXT, DEFAULT_POPULATION, Exercise, ResearchArticle, StagingMeta, TipRecord,
    TipSheet, TopicSet, TopicTag, format_topics,
};
