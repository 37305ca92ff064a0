//! Document parsing: JSON/YAML detection with ordered fallback, followed by
//! all-or-nothing validation into a flat [`ConfigSet`].
//!
//! Under [`FormatMode::Auto`] JSON is tried before YAML, and JSON semantics
//! win for text that is valid in both. Errors from individual attempts are
//! only logged; the caller sees a single [`DocumentError::Unparsable`] naming
//! what was tried.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Which formats the parser may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Auto,
    JsonOnly,
    YamlOnly,
}

impl FormatMode {
    /// Formats to attempt, in order.
    pub fn attempts(self) -> &'static [DocumentFormat] {
        match self {
            FormatMode::Auto => &[DocumentFormat::Json, DocumentFormat::Yaml],
            FormatMode::JsonOnly => &[DocumentFormat::Json],
            FormatMode::YamlOnly => &[DocumentFormat::Yaml],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Json => f.write_str("JSON"),
            DocumentFormat::Yaml => f.write_str("YAML"),
        }
    }
}

/// A scalar value accepted in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    /// Wide enough for both the i64 and u64 ranges.
    Integer(i128),
    Boolean(bool),
}

/// Plain text representation, as written to the store.
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{i}"),
            ConfigValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i.into())
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

/// Validated flat mapping of non-empty keys to scalar values, iterated in key
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigSet {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a ConfigSet {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("contains no valid {}", describe_attempts(.attempted))]
    Unparsable { attempted: Vec<DocumentFormat> },

    #[error("invalid KV file content: should be plain JSON object or YAML associative array with strings, integers or booleans as values")]
    NotAMapping,

    #[error("invalid KV file content: should be plain JSON object or YAML associative array with strings, integers or booleans as values (wrong value type for key '{key}')")]
    InvalidValue { key: String },

    #[error("invalid KV file content: should be plain JSON object or YAML associative array with strings, integers or booleans as values")]
    InvalidKey,

    #[error("invalid KV file content: keys must not be empty")]
    EmptyKey,
}

impl DocumentError {
    /// True for errors raised after the text was parsed successfully.
    pub fn is_validation(&self) -> bool {
        !matches!(self, DocumentError::Unparsable { .. })
    }
}

fn describe_attempts(attempted: &[DocumentFormat]) -> String {
    attempted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" nor ")
}

/// A parsed document before validation, in whichever tree the format produced.
enum ParsedDocument {
    Json(serde_json::Value),
    Yaml(serde_yaml::Value),
}

fn try_format(format: DocumentFormat, text: &str) -> Result<ParsedDocument, String> {
    match format {
        DocumentFormat::Json => serde_json::from_str(text)
            .map(ParsedDocument::Json)
            .map_err(|e| e.to_string()),
        DocumentFormat::Yaml => {
            let mut value = parse_yaml(text).map_err(|e| e.to_string())?;
            value.apply_merge().map_err(|e| e.to_string())?;
            Ok(ParsedDocument::Yaml(value))
        }
    }
}

/// Top-level YAML mapping in which a repeated key keeps its last value.
struct LastWinsMapping(serde_yaml::Mapping);

impl<'de> Deserialize<'de> for LastWinsMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = LastWinsMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a YAML mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut mapping = serde_yaml::Mapping::new();
                while let Some((key, value)) =
                    access.next_entry::<serde_yaml::Value, serde_yaml::Value>()?
                {
                    mapping.insert(key, value);
                }
                Ok(LastWinsMapping(mapping))
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// `serde_yaml` rejects duplicate keys outright; a top-level mapping with
/// repeated keys is re-read keeping the last value, as YAML 1.1 loaders do.
fn parse_yaml(text: &str) -> Result<serde_yaml::Value, serde_yaml::Error> {
    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(value) => Ok(value),
        Err(e) => match serde_yaml::from_str::<LastWinsMapping>(text) {
            Ok(LastWinsMapping(mapping)) => {
                debug!(error = %e, "Repeated YAML keys, keeping the last value");
                Ok(serde_yaml::Value::Mapping(mapping))
            }
            Err(_) => Err(e),
        },
    }
}

/// Parses `text` with the formats allowed by `mode` and validates the result.
pub fn parse(text: &str, mode: FormatMode) -> Result<ConfigSet, DocumentError> {
    let mut parsed = None;
    for &format in mode.attempts() {
        match try_format(format, text) {
            Ok(doc) => {
                debug!(%format, "Document parsed");
                parsed = Some(doc);
                break;
            }
            Err(e) => debug!(%format, error = %e, "Document is not valid in this format"),
        }
    }

    let parsed = parsed.ok_or_else(|| DocumentError::Unparsable {
        attempted: mode.attempts().to_vec(),
    })?;

    let entries = match parsed {
        ParsedDocument::Json(value) => validate_json(value)?,
        ParsedDocument::Yaml(value) => validate_yaml(value)?,
    };
    info!(entries = entries.len(), "Document validated");
    Ok(entries)
}

fn insert_entry(
    entries: &mut BTreeMap<String, ConfigValue>,
    key: String,
    value: Option<ConfigValue>,
) -> Result<(), DocumentError> {
    let value = value.ok_or_else(|| DocumentError::InvalidValue { key: key.clone() })?;
    if key.is_empty() {
        return Err(DocumentError::EmptyKey);
    }
    entries.insert(key, value);
    Ok(())
}

fn validate_json(value: serde_json::Value) -> Result<ConfigSet, DocumentError> {
    let serde_json::Value::Object(map) = value else {
        return Err(DocumentError::NotAMapping);
    };

    let mut entries = BTreeMap::new();
    for (key, value) in map {
        let value = match value {
            serde_json::Value::String(s) => Some(ConfigValue::String(s)),
            serde_json::Value::Bool(b) => Some(ConfigValue::Boolean(b)),
            serde_json::Value::Number(n) => json_integer(&n).map(ConfigValue::Integer),
            _ => None,
        };
        insert_entry(&mut entries, key, value)?;
    }
    Ok(ConfigSet { entries })
}

fn json_integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn validate_yaml(value: serde_yaml::Value) -> Result<ConfigSet, DocumentError> {
    let serde_yaml::Value::Mapping(map) = value else {
        return Err(DocumentError::NotAMapping);
    };

    let mut entries = BTreeMap::new();
    for (key, value) in map {
        let serde_yaml::Value::String(key) = key else {
            return Err(DocumentError::InvalidKey);
        };
        let value = match value {
            serde_yaml::Value::String(s) => Some(ConfigValue::String(s)),
            serde_yaml::Value::Bool(b) => Some(ConfigValue::Boolean(b)),
            serde_yaml::Value::Number(n) => yaml_integer(&n).map(ConfigValue::Integer),
            _ => None,
        };
        insert_entry(&mut entries, key, value)?;
    }
    Ok(ConfigSet { entries })
}

fn yaml_integer(n: &serde_yaml::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}
