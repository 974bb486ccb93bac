//! Frontmatter schema: required keys and per-key rules.

use crate::config::MetadataConfig;
use crate::error::StoreError;
use crate::types::Metadata;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;

/// Expected YAML type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    /// Integer or float
    Number,
    Boolean,
    List,
    Mapping,
    /// `YYYY-MM-DD` string
    Date,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_bool(),
            FieldType::List => value.is_sequence(),
            FieldType::Mapping => value.is_mapping(),
            FieldType::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::List => "list",
            FieldType::Mapping => "mapping",
            FieldType::Date => "date",
        };
        f.write_str(name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Rule for one frontmatter key, as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default)]
    pub required: bool,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Lower bound for numbers, minimum length for strings and lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Regular expression matched at the start of string values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Allowed values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    key: String,
    rule: FieldRule,
    pattern: Option<Regex>,
}

/// Compiled, ready-to-apply schema.
#[derive(Debug, Clone, Default)]
pub struct MetadataSchema {
    required: Vec<String>,
    rules: Vec<CompiledRule>,
}

impl MetadataSchema {
    /// Schema that accepts anything.
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MetadataConfig) -> Result<Self, StoreError> {
        let mut required = config.required.clone();
        let mut rules = Vec::with_capacity(config.rules.len());

        for (key, rule) in &config.rules {
            if rule.required && !required.contains(key) {
                required.push(key.clone());
            }
            let pattern = match &rule.pattern {
                Some(p) => Some(Regex::new(&format!("^(?:{})", p)).map_err(|e| {
                    StoreError::Config(format!("Invalid pattern for metadata field '{}': {}", key, e))
                })?),
                None => None,
            };
            rules.push(CompiledRule {
                key: key.clone(),
                rule: rule.clone(),
                pattern,
            });
        }

        Ok(Self { required, rules })
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Check required keys first, then every rule whose key is present.
    pub fn validate(&self, metadata: &Metadata) -> Result<(), StoreError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|key| !metadata.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::Metadata(format!(
                "Missing required metadata fields: {}",
                missing.join(", ")
            )));
        }

        for compiled in &self.rules {
            if let Some(value) = metadata.get(compiled.key.as_str()) {
                check_rule(compiled, value)?;
            }
        }
        Ok(())
    }
}

fn check_rule(compiled: &CompiledRule, value: &Value) -> Result<(), StoreError> {
    let key = &compiled.key;
    let rule = &compiled.rule;

    if let Some(expected) = rule.field_type {
        if !expected.accepts(value) {
            return Err(StoreError::Metadata(format!(
                "Invalid type for '{}': got {}, expected {}",
                key,
                type_name(value),
                expected
            )));
        }
    }

    if let (Some(pattern), Some(text)) = (&compiled.pattern, value.as_str()) {
        if !pattern.is_match(text) {
            return Err(StoreError::Metadata(format!(
                "Value for '{}' does not match pattern '{}'",
                key,
                rule.pattern.as_deref().unwrap_or_default()
            )));
        }
    }

    if let Some(measure) = measure(value) {
        if let Some(min) = rule.min.filter(|min| measure < *min) {
            return Err(StoreError::Metadata(format!(
                "Value for '{}' is too small: {}. Minimum allowed: {}.",
                key, measure, min
            )));
        }
        if let Some(max) = rule.max.filter(|max| measure > *max) {
            return Err(StoreError::Metadata(format!(
                "Value for '{}' is too large: {}. Maximum allowed: {}.",
                key, measure, max
            )));
        }
    }

    if !rule.choices.is_empty() && !rule.choices.contains(value) {
        let allowed: Vec<String> = rule.choices.iter().map(display_value).collect();
        return Err(StoreError::Metadata(format!(
            "Invalid value for '{}': must be one of {}",
            key,
            allowed.join(", ")
        )));
    }

    Ok(())
}

/// Numeric value, or length of strings and lists.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Sequence(items) => Some(items.len() as f64),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
