//! `${name}` placeholder substitution.
//!
//! Substitution is a single left-to-right pass over a closed table of
//! names. Inserted text is never rescanned, and nothing beyond a bare
//! field name is evaluated.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::document::{scalar_to_string, Document};
use crate::error::{ConfigError, Result};
use crate::schema::{
    ConfigEnum, Dataset, DEFAULT_LOG_FILENAME, OPTIONAL_FIELDS, PROFILE_FIELDS, TEMPLATE_FIELDS,
};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^{}]*)\}").expect("placeholder regex is valid"))
}

fn is_token_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Token(&'a str),
}

/// Split `template` into literal text and `${name}` tokens.
///
/// `field` names the template's location for error messages.
pub fn parse_template<'a>(field: &str, template: &'a str) -> Result<Vec<Segment<'a>>> {
    let malformed = || ConfigError::MalformedTemplate {
        field: field.to_string(),
        template: template.to_string(),
    };

    let mut segments = Vec::new();
    let mut cursor = 0;
    for caps in placeholder_re().captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let literal = &template[cursor..whole.start()];
        if literal.contains("${") {
            return Err(malformed());
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        segments.push(Segment::Token(name.as_str()));
        cursor = whole.end();
    }

    let tail = &template[cursor..];
    if tail.contains("${") {
        return Err(malformed());
    }
    if !tail.is_empty() {
        segments.push(Segment::Literal(tail));
    }
    Ok(segments)
}

/// Names referenced by a template, in order of appearance.
pub fn referenced_tokens<'a>(field: &str, template: &'a str) -> Result<Vec<&'a str>> {
    Ok(parse_template(field, template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Token(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Closed table of substitutable names and their string forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    values: BTreeMap<String, String>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitute every `${name}` in `template`.
    pub fn substitute(&self, field: &str, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        for segment in parse_template(field, template)? {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(name) => {
                    let value = is_token_name(name)
                        .then(|| self.get(name))
                        .flatten()
                        .ok_or_else(|| ConfigError::UnresolvedReference {
                            token: name.to_string(),
                            field: field.to_string(),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Check every template in the document's `logging` block against the
/// fields present in the (overridden, not yet validated) document.
///
/// A name resolves if it is a scalar at the document root, an optional
/// field (which falls back to its default), or a scalar in the profile
/// block named by the document's `dataset` value. This runs before schema
/// validation so a removed field still named by a template is reported as
/// an unresolved reference rather than a missing field.
///
/// When `dataset` does not name a known dataset, profile fields are not
/// checked here; validation reports the bad `dataset` value instead.
pub fn check_references(doc: &Document) -> Result<()> {
    let Some(Value::Object(logging)) = doc.root().get("logging") else {
        return Ok(());
    };

    let dataset = doc
        .root()
        .get("dataset")
        .and_then(Value::as_str)
        .and_then(Dataset::from_name);
    let profile = dataset
        .and_then(|d| doc.root().get(d.as_str()))
        .and_then(Value::as_object);

    let resolvable = |name: &str| {
        let is_scalar = |v: &Value| scalar_to_string(v).is_some();
        if !is_token_name(name) {
            return false;
        }
        if OPTIONAL_FIELDS.contains(&name) {
            return true;
        }
        if PROFILE_FIELDS.contains(&name) && dataset.is_none() {
            return true;
        }
        doc.root().get(name).is_some_and(is_scalar)
            || profile.and_then(|p| p.get(name)).is_some_and(is_scalar)
    };

    for &key in TEMPLATE_FIELDS {
        let field = format!("logging.{key}");
        let template = match logging.get(key) {
            Some(Value::String(s)) => s.as_str(),
            Some(_) => continue,
            None if key == "filename" => DEFAULT_LOG_FILENAME,
            None => continue,
        };
        for token in referenced_tokens(&field, template)? {
            if !resolvable(token) {
                return Err(ConfigError::UnresolvedReference {
                    token: token.to_string(),
                    field,
                });
            }
        }
    }
    Ok(())
}
