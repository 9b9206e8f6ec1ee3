//! Shared types, error model, schema, and configuration for the materials
//! knowledge-base pipeline.
//!
//! This crate is the foundation depended on by all other crates.
//! It provides:
//! - [`MatKbError`]: the unified error type
//! - Domain types ([`MaterialRecord`], [`RawPropertyValue`], [`ResolvedProperty`], [`AuthorRecord`])
//! - The required-field schema ([`REQUIRED_FIELDS`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DataConfig, GenerationConfig, OutputConfig, OutputFormat, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{MatKbError, Result};
pub use schema::{FieldKind, REQUIRED_FIELDS, RequiredField, RequiredFieldSchema, type_name};
pub use types::{
    AuthorRecord, Category, Complexity, Document, MaterialRecord, RawPropertyValue,
    ResolvedProperty, ScalarValue, StructuredValue, slugify,
};
