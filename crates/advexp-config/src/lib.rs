//! advexp-config - experiment configuration for adversarial attacks
//!
//! Resolves the declarative experiment document into a typed, read-only
//! [`ResolvedConfig`]:
//! - parses YAML (or TOML/JSON) into a tree of mappings
//! - applies `key=value` style overrides in order
//! - validates required fields, enum values, and numeric ranges
//! - selects the dataset profile named by `dataset` and flattens it in
//! - substitutes `${name}` placeholders in the logging templates
//!
//! The resolved value is built once at startup and passed explicitly to
//! whatever consumes it.

pub mod digest;
pub mod document;
pub mod error;
pub mod interpolate;
pub mod obs;
pub mod overrides;
pub mod resolve;
pub mod schema;
pub mod telemetry;
pub mod validation;

pub use document::{Document, DocumentFormat};
pub use error::{ConfigError, Result};
pub use interpolate::{check_references, parse_template, Segment, TokenTable};
pub use obs::{
    emit_config_rejected, emit_config_resolved, emit_device_fallback, emit_document_loaded,
    emit_override_applied, ResolveSpan,
};
pub use overrides::{apply_overrides, Override, OverrideKind};
pub use resolve::{resolve, ConfigLoader, ResolvedConfig, EMBEDDED_SOURCE, INLINE_SOURCE};
pub use schema::{
    Attack, ConfigEnum, Dataset, DatasetProfile, Device, ExperimentConfig, LogHandler, LogLevel,
    LoggingRunSpec, ModelType,
};
pub use telemetry::init_tracing;
pub use validation::{validate_document, ValidatedDocument};

/// The default experiment document shipped with the crate.
pub const DEFAULT_DOCUMENT: &str = include_str!("../conf/attack.yaml");

/// advexp version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
