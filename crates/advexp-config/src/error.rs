//! Error taxonomy for configuration resolution.
//!
//! Every variant is fatal at startup. Each one carries the name of the
//! offending field, token, or override so the message can point at it.

use std::path::PathBuf;

/// Errors produced while loading and resolving an experiment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("schema error at `{field}`: {reason}")]
    Schema { field: String, reason: String },

    #[error("invalid value for `{field}`: `{value}` is not one of [{}]", .expected.join(", "))]
    EnumViolation {
        field: String,
        value: String,
        expected: Vec<&'static str>,
    },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unresolved reference `${{{token}}}` in `{field}`")]
    UnresolvedReference { token: String, field: String },

    #[error("malformed template in `{field}`: unterminated placeholder in {template:?}")]
    MalformedTemplate { field: String, template: String },

    #[error("invalid override `{text}`: {reason}")]
    InvalidOverride { text: String, reason: String },

    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::schema(field, "missing required field")
    }

    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_override(text: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidOverride {
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Name of the field, token, or override this error is about.
    ///
    /// Returns `None` for parse and I/O failures, which concern the whole
    /// document rather than one field.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Schema { field, .. }
            | ConfigError::EnumViolation { field, .. }
            | ConfigError::InvalidValue { field, .. }
            | ConfigError::MalformedTemplate { field, .. } => Some(field),
            ConfigError::UnresolvedReference { token, .. } => Some(token),
            ConfigError::InvalidOverride { text, .. } => Some(text),
            ConfigError::Parse { .. } | ConfigError::Io { .. } => None,
        }
    }

    /// Short machine-friendly name of the error kind, used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Schema { .. } => "schema",
            ConfigError::EnumViolation { .. } => "enum_violation",
            ConfigError::InvalidValue { .. } => "invalid_value",
            ConfigError::UnresolvedReference { .. } => "unresolved_reference",
            ConfigError::MalformedTemplate { .. } => "malformed_template",
            ConfigError::InvalidOverride { .. } => "invalid_override",
            ConfigError::Io { .. } => "io",
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_violation_lists_allowed_values() {
        let err = ConfigError::EnumViolation {
            field: "dataset".to_string(),
            value: "imagenet".to_string(),
            expected: vec!["cifar10", "cifar100", "tiny_imagenet"],
        };
        let msg = err.to_string();
        assert!(msg.contains("`dataset`"));
        assert!(msg.contains("imagenet"));
        assert!(msg.contains("cifar10, cifar100, tiny_imagenet"));
        assert_eq!(err.field(), Some("dataset"));
    }

    #[test]
    fn test_unresolved_reference_names_token() {
        let err = ConfigError::UnresolvedReference {
            token: "attack".to_string(),
            field: "logging.run_dir".to_string(),
        };
        assert_eq!(err.to_string(), "unresolved reference `${attack}` in `logging.run_dir`");
        assert_eq!(err.field(), Some("attack"));
        assert_eq!(err.kind(), "unresolved_reference");
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let err = ConfigError::missing("n_batch_test");
        assert!(matches!(err, ConfigError::Schema { .. }));
        assert!(err.to_string().contains("missing required field"));
        assert_eq!(err.field(), Some("n_batch_test"));
    }

    #[test]
    fn test_io_error_has_no_field() {
        let err = ConfigError::Io {
            path: PathBuf::from("missing.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.field().is_none());
        assert!(err.to_string().contains("missing.yaml"));
    }
}
