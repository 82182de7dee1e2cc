//! Raw configuration document: parsing text into a tree of mappings.
//!
//! YAML is the primary format. TOML and JSON documents are accepted too and
//! land in the same tree shape, so everything downstream of parsing is
//! format-agnostic.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{ConfigError, Result};

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from a file extension. Unknown or missing extensions
    /// fall back to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => DocumentFormat::Toml,
            Some("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "yaml",
            DocumentFormat::Toml => "toml",
            DocumentFormat::Json => "json",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "toml" => Ok(DocumentFormat::Toml),
            "json" => Ok(DocumentFormat::Json),
            other => Err(format!("unknown document format: {other} (expected yaml, toml or json)")),
        }
    }
}

/// A value tree in which no mapping repeats a key.
///
/// YAML and JSON parsers keep the last of two equal keys; a document that
/// sets `attack` twice is rejected here instead.
struct UniqueKeys(Value);

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor).map(UniqueKeys)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        UniqueKeys::deserialize(d).map(|UniqueKeys(v)| v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(UniqueKeys(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut out = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if out.contains_key(&key) {
                return Err(de::Error::custom(format_args!("duplicate key `{key}`")));
            }
            let UniqueKeys(value) = map.next_value()?;
            out.insert(key, value);
        }
        Ok(Value::Object(out))
    }
}

/// A parsed, not yet validated, configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    source_name: String,
    format: DocumentFormat,
    root: Map<String, Value>,
}

impl Document {
    /// Parse `text` in the given format.
    ///
    /// `source_name` only labels error messages and log events (a file path,
    /// or `<embedded>` for the built-in default).
    pub fn parse(source_name: &str, text: &str, format: DocumentFormat) -> Result<Self> {
        let parse_err = |message: String| ConfigError::Parse {
            source_name: source_name.to_string(),
            message,
        };

        let UniqueKeys(value) = match format {
            DocumentFormat::Yaml => {
                serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string()))?
            }
            DocumentFormat::Toml => toml::from_str(text).map_err(|e| parse_err(e.to_string()))?,
            DocumentFormat::Json => {
                serde_json::from_str(text).map_err(|e| parse_err(e.to_string()))?
            }
        };

        let root = match value {
            Value::Object(map) => map,
            Value::Null => return Err(parse_err("document is empty".to_string())),
            other => {
                return Err(parse_err(format!(
                    "document root must be a mapping, found {}",
                    value_kind(&other)
                )))
            }
        };

        Ok(Self {
            source_name: source_name.to_string(),
            format,
            root,
        })
    }

    /// Build a document from an already-parsed mapping.
    pub fn from_map(source_name: &str, format: DocumentFormat, root: Map<String, Value>) -> Self {
        Self {
            source_name: source_name.to_string(),
            format,
            root,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    /// Look up a value by dot-separated path (`logging.run_dir`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Human-readable name of a value's type, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// String form of a scalar used for placeholder substitution.
///
/// Returns `None` for null, sequences and mappings, which cannot be
/// substituted into a template.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Some(i.to_string()),
            (None, Some(u), _) => Some(u.to_string()),
            (None, None, Some(f)) => Some(f.to_string()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_yaml_mapping() {
        let doc = Document::parse(
            "inline",
            "dataset: cifar10\nlogging:\n  run_dir: attack_logs/${attack}\n",
            DocumentFormat::Yaml,
        )
        .expect("parse");
        assert_eq!(doc.get_path("dataset"), Some(&Value::from("cifar10")));
        assert_eq!(
            doc.get_path("logging.run_dir"),
            Some(&Value::from("attack_logs/${attack}"))
        );
        assert!(doc.get_path("logging.missing").is_none());
        assert!(doc.get_path("dataset.nested").is_none());
    }

    #[test]
    fn test_parse_toml_and_json() {
        let toml_doc = Document::parse("t", "seed = 7\n[cifar10]\nmargin = 5.0\n", DocumentFormat::Toml)
            .expect("toml");
        assert_eq!(toml_doc.get_path("seed"), Some(&Value::from(7)));
        assert_eq!(toml_doc.get_path("cifar10.margin"), Some(&Value::from(5.0)));

        let json_doc =
            Document::parse("j", r#"{"seed": 7, "cifar10": {"margin": 5}}"#, DocumentFormat::Json)
                .expect("json");
        assert_eq!(json_doc.get_path("seed"), Some(&Value::from(7)));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = Document::parse("bad.yaml", "dataset: [cifar10\n", DocumentFormat::Yaml)
            .unwrap_err();
        match err {
            ConfigError::Parse { source_name, .. } => assert_eq!(source_name, "bad.yaml"),
            other => panic!("Expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_keys_are_parse_errors() {
        let yaml = "attack: fgsm\ndataset: cifar10\nattack: pgd\n";
        let err = Document::parse("dup.yaml", yaml, DocumentFormat::Yaml).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("duplicate key `attack`"), "{err}");

        let json = r#"{"attack": "cw", "logging": {"level": "info", "level": "debug"}}"#;
        let err = Document::parse("dup.json", json, DocumentFormat::Json).unwrap_err();
        assert!(err.to_string().contains("duplicate key `level`"), "{err}");

        let toml = "attack = \"cw\"\nattack = \"pgd\"\n";
        let err = Document::parse("dup.toml", toml, DocumentFormat::Toml).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_nested_values_survive_parsing() {
        let doc = Document::parse(
            "n.yaml",
            "a: {b: [1, -2, 0.5, true, null, x]}\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        assert_eq!(
            doc.root()["a"]["b"],
            serde_json::json!([1, -2, 0.5, true, null, "x"])
        );
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        let err = Document::parse("list", "- a\n- b\n", DocumentFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("root must be a mapping"));

        let err = Document::parse("empty", "", DocumentFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("a.toml")), DocumentFormat::Toml);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("noext")), DocumentFormat::Yaml);
        assert_eq!("YML".parse::<DocumentFormat>(), Ok(DocumentFormat::Yaml));
        assert!("ini".parse::<DocumentFormat>().is_err());
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&Value::from("pgd")), Some("pgd".to_string()));
        assert_eq!(scalar_to_string(&Value::from(128)), Some("128".to_string()));
        assert_eq!(scalar_to_string(&Value::from(-3)), Some("-3".to_string()));
        assert_eq!(scalar_to_string(&Value::from(0.5)), Some("0.5".to_string()));
        assert_eq!(scalar_to_string(&Value::from(false)), Some("false".to_string()));
        assert_eq!(scalar_to_string(&Value::Null), None);
        assert_eq!(scalar_to_string(&serde_json::json!([1, 2])), None);
    }
}
