//! Schema validation: turn a raw [`Document`] into typed config values.
//!
//! Checks, in order:
//! 1. No unknown keys at the root, in profile blocks, or under `logging`.
//! 2. Required top-level fields are present, well-typed, and in range.
//! 3. Enum fields hold one of their recognized spellings.
//! 4. The profile block named by `dataset` exists and is complete.
//! 5. The `logging` block is present and well-typed.
//!
//! The first failure is returned.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::document::{value_kind, Document};
use crate::error::{ConfigError, Result};
use crate::schema::{
    ConfigEnum, Dataset, DatasetProfile, ExperimentConfig, LogHandler, LogLevel, LoggingRunSpec,
    DEFAULT_IMAGE_CHANNEL, DEFAULT_IMAGE_SIZE, DEFAULT_LOG_DIR,
    DEFAULT_LOG_FILENAME, DEFAULT_PERCENTILE, LOGGING_FIELDS, PROFILE_FIELDS, TOP_LEVEL_FIELDS,
};

/// Typed values extracted from a document, before interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument {
    pub experiment: ExperimentConfig,
    pub profile: DatasetProfile,
    /// `run_dir` and `filename` are still templates here.
    pub logging: LoggingRunSpec,
}

/// Validate `doc` against the experiment schema.
///
/// # Errors
///
/// - `ConfigError::Schema`: a required field is missing, a key is unknown,
///   a value has the wrong type, or the selected profile block is absent.
/// - `ConfigError::EnumViolation`: an enum field holds an unrecognized value.
/// - `ConfigError::InvalidValue`: a numeric field is out of range.
pub fn validate_document(doc: &Document) -> Result<ValidatedDocument> {
    let root = doc.root();
    reject_unknown_root_keys(root)?;

    let fields = Fields::new(root, "");

    let experiment = ExperimentConfig {
        model_type: fields.enumerated("model_type")?,
        dataset: fields.enumerated("dataset")?,
        data_dir: PathBuf::from(fields.non_empty_string("data_dir")?),
        classifier_name: fields.non_empty_string("classifier_name")?,
        mi_units: fields.positive_u32("mi_units")?,
        attack: fields.enumerated("attack")?,
        targeted: fields.boolean("targeted")?,
        sample_likelihood: fields.boolean("sample_likelihood")?,
        n_batch_train: fields.positive_u32("n_batch_train")?,
        n_batch_test: fields.positive_u32("n_batch_test")?,
        seed: fields.integer("seed")?,
        n_gpu: fields.non_negative_u32("n_gpu")?,
        device: fields.enumerated("device")?,
        log_dir: PathBuf::from(fields.optional(
            "log_dir",
            |f, k| f.non_empty_string(k),
            DEFAULT_LOG_DIR.to_string(),
        )?),
        percentile: fields.optional("percentile", Fields::unit_interval, DEFAULT_PERCENTILE)?,
        image_size: fields.optional("image_size", Fields::positive_u32, DEFAULT_IMAGE_SIZE)?,
        image_channel: fields.optional(
            "image_channel",
            Fields::positive_u32,
            DEFAULT_IMAGE_CHANNEL,
        )?,
    };

    let profile = validate_profile(root, experiment.dataset)?;
    let logging = validate_logging(root)?;

    Ok(ValidatedDocument {
        experiment,
        profile,
        logging,
    })
}

fn reject_unknown_root_keys(root: &Map<String, Value>) -> Result<()> {
    for (key, value) in root {
        if TOP_LEVEL_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if Dataset::from_name(key).is_some() {
            let Value::Object(block) = value else {
                return Err(ConfigError::schema(
                    key.as_str(),
                    format!("dataset profile must be a mapping, found {}", value_kind(value)),
                ));
            };
            reject_unknown_keys(block, key, PROFILE_FIELDS)?;
            continue;
        }
        return Err(ConfigError::schema(key.as_str(), "unknown field"));
    }
    Ok(())
}

fn reject_unknown_keys(map: &Map<String, Value>, prefix: &str, allowed: &[&str]) -> Result<()> {
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(ConfigError::schema(format!("{prefix}.{key}"), "unknown field")),
        None => Ok(()),
    }
}

fn validate_profile(root: &Map<String, Value>, dataset: Dataset) -> Result<DatasetProfile> {
    let name = dataset.as_str();
    let block = match root.get(name) {
        Some(Value::Object(block)) => block,
        // Non-mapping blocks were already rejected with the unknown-key pass.
        _ => {
            return Err(ConfigError::schema(
                name,
                format!("no dataset profile for selected dataset `{name}`"),
            ))
        }
    };

    let fields = Fields::new(block, name);
    Ok(DatasetProfile {
        n_classes: fields.positive_u32("n_classes")?,
        rep_size: fields.positive_u32("rep_size")?,
        margin: fields.positive_f64("margin")?,
    })
}

fn validate_logging(root: &Map<String, Value>) -> Result<LoggingRunSpec> {
    let block = match root.get("logging") {
        Some(Value::Object(block)) => block,
        Some(other) => {
            return Err(ConfigError::schema(
                "logging",
                format!("expected mapping, found {}", value_kind(other)),
            ))
        }
        None => return Err(ConfigError::missing("logging")),
    };
    reject_unknown_keys(block, "logging", LOGGING_FIELDS)?;

    let fields = Fields::new(block, "logging");
    Ok(LoggingRunSpec {
        handlers: fields.optional(
            "handlers",
            Fields::handlers,
            vec![LogHandler::Console, LogHandler::File],
        )?,
        level: fields.optional("level", |f, k| f.enumerated(k), LogLevel::Info)?,
        run_dir: fields.non_empty_string("run_dir")?,
        filename: fields.optional(
            "filename",
            |f, k| f.non_empty_string(k),
            DEFAULT_LOG_FILENAME.to_string(),
        )?,
    })
}

/// Typed accessors over one mapping. `prefix` qualifies field names in
/// errors (`cifar10.margin`, `logging.run_dir`).
struct Fields<'a> {
    map: &'a Map<String, Value>,
    prefix: &'a str,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>, prefix: &'a str) -> Self {
        Self { map, prefix }
    }

    fn qualified(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value> {
        match self.map.get(key) {
            Some(Value::Null) | None => Err(ConfigError::missing(self.qualified(key))),
            Some(value) => Ok(value),
        }
    }

    fn type_error(&self, key: &str, expected: &str, found: &Value) -> ConfigError {
        ConfigError::schema(
            self.qualified(key),
            format!("expected {expected}, found {}", value_kind(found)),
        )
    }

    /// Apply `read` when the key is present, else return `default`.
    fn optional<T>(
        &self,
        key: &str,
        read: impl FnOnce(&Self, &str) -> Result<T>,
        default: T,
    ) -> Result<T> {
        match self.map.get(key) {
            Some(Value::Null) | None => Ok(default),
            Some(_) => read(self, key),
        }
    }

    fn enumerated<T: ConfigEnum>(&self, key: &str) -> Result<T> {
        let value = self.required(key)?;
        let Some(name) = value.as_str() else {
            return Err(self.type_error(key, "string", value));
        };
        T::from_name(name).ok_or_else(|| ConfigError::EnumViolation {
            field: self.qualified(key),
            value: name.to_string(),
            expected: T::VARIANTS.to_vec(),
        })
    }

    fn non_empty_string(&self, key: &str) -> Result<String> {
        let value = self.required(key)?;
        match value.as_str() {
            Some("") => Err(ConfigError::invalid_value(self.qualified(key), "must not be empty")),
            Some(s) => Ok(s.to_string()),
            None => Err(self.type_error(key, "string", value)),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool> {
        let value = self.required(key)?;
        value
            .as_bool()
            .ok_or_else(|| self.type_error(key, "boolean", value))
    }

    fn integer(&self, key: &str) -> Result<i64> {
        let value = self.required(key)?;
        match value {
            Value::Number(n) if n.is_i64() => Ok(n.as_i64().unwrap_or_default()),
            Value::Number(n) if n.is_u64() => Err(ConfigError::invalid_value(
                self.qualified(key),
                format!("{n} does not fit in a signed 64-bit integer"),
            )),
            other => Err(self.type_error(key, "integer", other)),
        }
    }

    fn bounded_u32(&self, key: &str, min: i64) -> Result<u32> {
        let n = self.integer(key)?;
        if n < min {
            let bound = if min > 0 { "positive" } else { "non-negative" };
            return Err(ConfigError::invalid_value(
                self.qualified(key),
                format!("must be {bound}, got {n}"),
            ));
        }
        u32::try_from(n).map_err(|_| {
            ConfigError::invalid_value(self.qualified(key), format!("{n} is too large"))
        })
    }

    fn positive_u32(&self, key: &str) -> Result<u32> {
        self.bounded_u32(key, 1)
    }

    fn non_negative_u32(&self, key: &str) -> Result<u32> {
        self.bounded_u32(key, 0)
    }

    fn number(&self, key: &str) -> Result<f64> {
        let value = self.required(key)?;
        match value.as_f64() {
            Some(f) if f.is_finite() => Ok(f),
            Some(_) => Err(ConfigError::invalid_value(self.qualified(key), "must be finite")),
            None => Err(self.type_error(key, "number", value)),
        }
    }

    fn positive_f64(&self, key: &str) -> Result<f64> {
        let f = self.number(key)?;
        if f <= 0.0 {
            return Err(ConfigError::invalid_value(
                self.qualified(key),
                format!("must be positive, got {f}"),
            ));
        }
        Ok(f)
    }

    fn unit_interval(&self, key: &str) -> Result<f64> {
        let f = self.number(key)?;
        if f <= 0.0 || f >= 1.0 {
            return Err(ConfigError::invalid_value(
                self.qualified(key),
                format!("must be strictly between 0 and 1, got {f}"),
            ));
        }
        Ok(f)
    }

    fn handlers(&self, key: &str) -> Result<Vec<LogHandler>> {
        let value = self.required(key)?;
        let Some(items) = value.as_array() else {
            return Err(self.type_error(key, "sequence", value));
        };
        items
            .iter()
            .map(|item| {
                let name = item.as_str().ok_or_else(|| self.type_error(key, "string items", item))?;
                LogHandler::from_name(name).ok_or_else(|| ConfigError::EnumViolation {
                    field: self.qualified(key),
                    value: name.to_string(),
                    expected: LogHandler::VARIANTS.to_vec(),
                })
            })
            .collect()
    }
}
