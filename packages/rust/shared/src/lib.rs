//! Shared types, error model, and configuration for the Pokédex ingester.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`PokedexError`] — the unified error type
//! - Domain types ([`Record`], [`FieldValue`], [`IngestionBudget`], [`UpsertMode`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BudgetSection, DatabaseConfig, HttpConfig, ReportsConfig, SourcesConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PokedexError, Result};
pub use types::{
    BudgetConfig, FieldValue, IngestionBudget, RawRecord, Record, RecordId, UpsertMode,
};
