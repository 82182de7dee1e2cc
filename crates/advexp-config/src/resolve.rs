//! Configuration loader: parse, override, validate, select profile, interpolate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest;
use crate::document::{scalar_to_string, Document, DocumentFormat};
use crate::error::{ConfigError, Result};
use crate::interpolate::{check_references, TokenTable};
use crate::obs::{
    emit_config_rejected, emit_config_resolved, emit_device_fallback, emit_document_loaded,
    ResolveSpan,
};
use crate::overrides::{apply_overrides, Override};
use crate::schema::{ConfigEnum, DatasetProfile, Device, ExperimentConfig, LoggingRunSpec};
use crate::validation::{validate_document, ValidatedDocument};
use crate::DEFAULT_DOCUMENT;

/// Source label of the built-in default document.
pub const EMBEDDED_SOURCE: &str = "<embedded>";

/// Source label of documents passed in as text.
pub const INLINE_SOURCE: &str = "<inline>";

/// Fully resolved experiment configuration.
///
/// Serializes flat: top-level fields and the selected profile's fields share
/// one namespace, with the substituted `logging` block alongside.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedConfig {
    #[serde(flatten)]
    pub experiment: ExperimentConfig,
    #[serde(flatten)]
    pub profile: DatasetProfile,
    pub logging: LoggingRunSpec,
}

impl ResolvedConfig {
    fn from_validated(validated: ValidatedDocument) -> Result<Self> {
        let ValidatedDocument {
            experiment,
            profile,
            logging,
        } = validated;

        let tokens = token_table(&experiment, &profile)?;
        let logging = LoggingRunSpec {
            run_dir: tokens.substitute("logging.run_dir", &logging.run_dir)?,
            filename: tokens.substitute("logging.filename", &logging.filename)?,
            ..logging
        };

        Ok(Self {
            experiment,
            profile,
            logging,
        })
    }

    /// Every resolved field in one flat map; `logging` fields are dotted.
    pub fn to_flat_map(&self) -> Result<BTreeMap<String, Value>> {
        let mut flat = BTreeMap::new();
        if let Value::Object(map) = to_json(self)? {
            for (key, value) in map {
                match value {
                    Value::Object(nested) => {
                        for (k, v) in nested {
                            flat.insert(format!("{key}.{k}"), v);
                        }
                    }
                    other => {
                        flat.insert(key, other);
                    }
                }
            }
        }
        Ok(flat)
    }

    /// SHA-256 of the canonical JSON form. Equal configs have equal fingerprints.
    pub fn fingerprint(&self) -> Result<String> {
        digest::fingerprint(&to_json(self)?)
    }

    pub fn run_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.run_dir)
    }

    pub fn log_file(&self) -> PathBuf {
        self.run_dir().join(&self.logging.filename)
    }

    /// Pretrained checkpoint location, e.g. `logs/SDIM_resnet_cifar10.pth`.
    pub fn checkpoint_path(&self) -> PathBuf {
        let e = &self.experiment;
        e.log_dir.join(format!(
            "{}_{}_{}.pth",
            e.model_type.as_str().to_uppercase(),
            e.classifier_name,
            e.dataset
        ))
    }

    /// Device to run on: CPU whenever no GPUs are configured.
    pub fn effective_device(&self) -> Device {
        if self.experiment.n_gpu == 0 {
            Device::Cpu
        } else {
            self.experiment.device
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ConfigError::invalid_value("<root>", format!("not representable as JSON: {e}")))
}

/// Substitutable names: every top-level scalar plus the selected profile's fields.
fn token_table(experiment: &ExperimentConfig, profile: &DatasetProfile) -> Result<TokenTable> {
    let mut tokens = TokenTable::new();
    for part in [to_json(experiment)?, to_json(profile)?] {
        if let Value::Object(map) = part {
            for (name, value) in &map {
                if let Some(text) = scalar_to_string(value) {
                    tokens.insert(name.as_str(), text);
                }
            }
        }
    }
    Ok(tokens)
}

/// Builder for one resolution.
///
/// ```no_run
/// use advexp_config::ConfigLoader;
///
/// let config = ConfigLoader::from_path("conf/attack.yaml")?
///     .with_overrides(["attack=pgd", "dataset=cifar100"])
///     .resolve()?;
/// assert_eq!(config.logging.run_dir, "attack_logs/pgd/cifar100");
/// # Ok::<(), advexp_config::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source_name: String,
    format: DocumentFormat,
    text: String,
    overrides: Vec<String>,
}

impl ConfigLoader {
    /// Loader over in-memory text.
    pub fn from_text(text: impl Into<String>, format: DocumentFormat) -> Self {
        Self {
            source_name: INLINE_SOURCE.to_string(),
            format,
            text: text.into(),
            overrides: Vec::new(),
        }
    }

    /// Loader over the built-in default experiment document.
    pub fn embedded_default() -> Self {
        Self::from_text(DEFAULT_DOCUMENT, DocumentFormat::Yaml).with_source_name(EMBEDDED_SOURCE)
    }

    /// Read a document from disk; the format follows the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(text, DocumentFormat::from_path(path))
            .with_source_name(path.display().to_string()))
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    /// Force a format regardless of the file extension.
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }

    /// Append one override; later overrides win.
    pub fn with_override(mut self, text: impl Into<String>) -> Self {
        self.overrides.push(text.into());
        self
    }

    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.overrides.extend(overrides.into_iter().map(Into::into));
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Parse the document and apply overrides, without validating.
    pub fn merged_document(&self) -> Result<Document> {
        let mut doc = Document::parse(&self.source_name, &self.text, self.format)?;
        emit_document_loaded(&self.source_name, self.format, doc.root().len());

        let overrides = self
            .overrides
            .iter()
            .map(|text| Override::parse(text))
            .collect::<Result<Vec<_>>>()?;
        apply_overrides(&mut doc, &overrides)?;
        Ok(doc)
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; the first failure aborts resolution.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let _span = ResolveSpan::enter(&self.source_name);
        let result = self.resolve_inner();
        if let Err(err) = &result {
            emit_config_rejected(&self.source_name, err);
        }
        result
    }

    fn resolve_inner(&self) -> Result<ResolvedConfig> {
        let doc = self.merged_document()?;
        check_references(&doc)?;
        let validated = validate_document(&doc)?;
        let resolved = ResolvedConfig::from_validated(validated)?;

        let e = &resolved.experiment;
        if e.device == Device::Cuda && e.n_gpu == 0 {
            emit_device_fallback(e.device.as_str(), e.n_gpu);
        }
        emit_config_resolved(
            e.dataset.as_str(),
            e.attack.as_str(),
            &resolved.logging.run_dir,
            &resolved.fingerprint()?,
        );
        Ok(resolved)
    }
}

/// Resolve `text` with `overrides` applied in order.
pub fn resolve<S: AsRef<str>>(
    text: &str,
    format: DocumentFormat,
    overrides: &[S],
) -> Result<ResolvedConfig> {
    ConfigLoader::from_text(text, format)
        .with_overrides(overrides.iter().map(|s| s.as_ref().to_string()))
        .resolve()
}
