//! Command-line overrides: `path=value`, `+path=value`, `++path=value`, `~path`.
//!
//! Overrides are applied in order, so a later override of the same path
//! wins. Paths are dot-separated and every intermediate segment must
//! already be a mapping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{value_kind, Document};
use crate::error::{ConfigError, Result};

/// What an override does to its target key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// `path=value`: the key must already exist.
    Replace,
    /// `+path=value`: the key must not exist yet.
    Add,
    /// `++path=value`: add or replace.
    Upsert,
    /// `~path`: the key must exist and is removed.
    Delete,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKind::Replace => "replace",
            OverrideKind::Add => "add",
            OverrideKind::Upsert => "upsert",
            OverrideKind::Delete => "delete",
        }
    }
}

/// One parsed override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub kind: OverrideKind,
    /// Path segments, e.g. `["logging", "run_dir"]`.
    pub path: Vec<String>,
    /// New value. `None` only for [`OverrideKind::Delete`].
    pub value: Option<Value>,
    text: String,
}

impl Override {
    /// Parse a single override string.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid_override(text, "override is empty"));
        }

        let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("++") {
            (OverrideKind::Upsert, rest)
        } else if let Some(rest) = trimmed.strip_prefix('+') {
            (OverrideKind::Add, rest)
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            (OverrideKind::Delete, rest)
        } else {
            (OverrideKind::Replace, trimmed)
        };

        let (raw_path, raw_value) = match rest.split_once('=') {
            Some((path, value)) => (path.trim(), Some(value.trim())),
            None => (rest.trim(), None),
        };

        let path = parse_path(text, raw_path)?;

        let value = match (kind, raw_value) {
            (OverrideKind::Delete, None) => None,
            (OverrideKind::Delete, Some(_)) => {
                return Err(ConfigError::invalid_override(text, "delete takes no value"))
            }
            (_, Some(raw)) => Some(parse_value(text, raw)?),
            (_, None) => {
                return Err(ConfigError::invalid_override(
                    text,
                    "expected `key=value`",
                ))
            }
        };

        Ok(Self {
            kind,
            path,
            value,
            text: trimmed.to_string(),
        })
    }

    /// The override as written, used in errors and log events.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Dot-joined target path.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Apply this override to `doc` in place.
    pub fn apply(&self, doc: &mut Document) -> Result<()> {
        let (last, parents) = self
            .path
            .split_last()
            .ok_or_else(|| ConfigError::invalid_override(&self.text, "empty key path"))?;

        let mut current: &mut Map<String, Value> = doc.root_mut();
        for (depth, segment) in parents.iter().enumerate() {
            let prefix = self.path[..=depth].join(".");
            current = match current.get_mut(segment) {
                Some(Value::Object(map)) => map,
                Some(other) => {
                    return Err(ConfigError::invalid_override(
                        &self.text,
                        format!("`{prefix}` is a {}, not a mapping", value_kind(other)),
                    ))
                }
                None => {
                    return Err(ConfigError::invalid_override(
                        &self.text,
                        format!("`{prefix}` does not exist"),
                    ))
                }
            };
        }

        let exists = current.contains_key(last);
        let dotted = self.dotted_path();
        match self.kind {
            OverrideKind::Replace if !exists => Err(ConfigError::invalid_override(
                &self.text,
                format!("key `{dotted}` is not in the config; use `+{dotted}=...` to add it"),
            )),
            OverrideKind::Add if exists => Err(ConfigError::invalid_override(
                &self.text,
                format!("key `{dotted}` already exists; use `{dotted}=...` or `++{dotted}=...`"),
            )),
            OverrideKind::Delete => {
                if current.remove(last).is_none() {
                    return Err(ConfigError::invalid_override(
                        &self.text,
                        format!("cannot delete `{dotted}`: key is not in the config"),
                    ));
                }
                Ok(())
            }
            _ => {
                let value = self.value.clone().unwrap_or(Value::Null);
                current.insert(last.clone(), value);
                Ok(())
            }
        }
    }
}

impl FromStr for Override {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Override::parse(s)
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Apply overrides in order.
pub fn apply_overrides(doc: &mut Document, overrides: &[Override]) -> Result<()> {
    for ov in overrides {
        ov.apply(doc)?;
        crate::obs::emit_override_applied(&ov.dotted_path(), ov.kind);
    }
    Ok(())
}

fn parse_path(text: &str, raw: &str) -> Result<Vec<String>> {
    if raw.is_empty() {
        return Err(ConfigError::invalid_override(text, "missing key"));
    }
    let segments: Vec<String> = raw.split('.').map(|s| s.to_string()).collect();
    for segment in &segments {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::invalid_override(
                text,
                format!("invalid key path `{raw}`"),
            ));
        }
    }
    Ok(segments)
}

/// Parse the right-hand side of an override as a YAML scalar or flow
/// sequence. Mappings are rejected; nested keys are set with dotted paths.
fn parse_value(text: &str, raw: &str) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::String(String::new()));
    }
    let value: Value = serde_yaml::from_str(raw)
        .map_err(|e| ConfigError::invalid_override(text, format!("unparsable value: {e}")))?;
    match value {
        Value::Object(_) => Err(ConfigError::invalid_override(
            text,
            "mapping values are not supported; override nested keys with dotted paths",
        )),
        other => Ok(other),
    }
}
