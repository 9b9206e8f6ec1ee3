//! Frontmatter generation core for the materials knowledge base.
//!
//! This crate ties the resolvers, the Field Ordering Service, the
//! Exception-Handling Normalizer and the output assembler into the
//! `generate` / `generate_batch` workflows.

pub mod assembler;
pub mod defaults;
pub mod modules;
pub mod normalizer;
pub mod ordering;
pub mod pipeline;

/// Generator tag written into every document's `_metadata`.
pub const GENERATOR: &str = concat!("matkb ", env!("CARGO_PKG_VERSION"));

pub use modules::{GenerationModule, ModuleRegistry, ResolverContext};
pub use normalizer::{FallbackLevel, NormalizedDocument, Normalizer, NormalizerStats};
pub use pipeline::{BatchResult, GenerateOptions, Orchestrator, ProgressReporter, SilentProgress};
