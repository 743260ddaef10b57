//! Typed configuration values.

use serde::Serialize;
use std::fmt;

/// A value held by a configuration source.
///
/// Key/value stores usually only hold strings, so string values coerce to
/// integers and booleans on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl ConfigValue {
    /// String rendering; every value has one.
    pub fn as_string(&self) -> String {
        match self {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::Bool(b) => b.to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            ConfigValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            ConfigValue::Int(_) => None,
        }
    }

    /// Convert a scalar TOML value. Arrays and tables have no config value.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::String(s) => Some(ConfigValue::String(s.clone())),
            toml::Value::Integer(i) => Some(ConfigValue::Int(*i)),
            toml::Value::Boolean(b) => Some(ConfigValue::Bool(*b)),
            toml::Value::Float(f) => Some(ConfigValue::String(f.to_string())),
            toml::Value::Datetime(d) => Some(ConfigValue::String(d.to_string())),
            toml::Value::Array(_) | toml::Value::Table(_) => None,
        }
    }

    /// Convert a scalar JSON value. Null, arrays and objects have none.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(ConfigValue::String(s.clone())),
            serde_json::Value::Bool(b) => Some(ConfigValue::Bool(*b)),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map(ConfigValue::Int)
                    .unwrap_or_else(|| ConfigValue::String(n.to_string())),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

/// Types a setting can be bound to.
pub trait FromConfigValue: Clone + Send + Sync + 'static {
    fn from_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for String {
    fn from_value(value: &ConfigValue) -> Option<Self> {
        Some(value.as_string())
    }
}

impl FromConfigValue for i64 {
    fn from_value(value: &ConfigValue) -> Option<Self> {
        value.as_int()
    }
}

impl FromConfigValue for u16 {
    fn from_value(value: &ConfigValue) -> Option<Self> {
        value.as_int().and_then(|i| u16::try_from(i).ok())
    }
}

impl FromConfigValue for bool {
    fn from_value(value: &ConfigValue) -> Option<Self> {
        value.as_bool()
    }
}
