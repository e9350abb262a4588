use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a stored setting value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Json,
}

/// Setting row: the value is stored as TEXT and coerced back per `value_type`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub value_type: SettingType,
    pub updated_at: DateTime<Utc>,
}

/// Setting shape returned by the API, with the value coerced to its type
#[derive(Debug, Serialize)]
pub struct TypedSetting {
    pub key: String,
    pub value: Value,
    pub value_type: SettingType,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    /// Coerce the stored text back into a typed JSON value
    ///
    /// A row that fails coercion indicates a write-path bug; surfaced as None
    /// so the caller can log and skip it rather than 500 the whole listing.
    pub fn coerce(&self) -> Option<Value> {
        coerce_value(&self.value, self.value_type)
    }

    pub fn into_typed(self) -> Option<TypedSetting> {
        let value = self.coerce()?;
        Some(TypedSetting {
            key: self.key,
            value,
            value_type: self.value_type,
            updated_at: self.updated_at,
        })
    }

    /// Validate setting keys: dotted lowercase identifiers like "pomodoro.default_work"
    pub fn validate_key(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= 100
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
            && !key.starts_with('.')
            && !key.ends_with('.')
    }
}

/// Parse a raw text value according to its declared type
pub fn coerce_value(raw: &str, value_type: SettingType) -> Option<Value> {
    match value_type {
        SettingType::String => Some(Value::String(raw.to_string())),
        SettingType::Number => raw.parse::<f64>().ok().and_then(|n| {
            serde_json::Number::from_f64(n).map(Value::Number)
        }),
        SettingType::Boolean => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        SettingType::Json => serde_json::from_str(raw).ok(),
    }
}

/// Render a typed JSON value to its stored text form, rejecting mismatches
pub fn encode_value(value: &Value, value_type: SettingType) -> Option<String> {
    match (value_type, value) {
        (SettingType::String, Value::String(s)) => Some(s.clone()),
        (SettingType::Number, Value::Number(n)) => Some(n.to_string()),
        (SettingType::Boolean, Value::Bool(b)) => Some(b.to_string()),
        (SettingType::Json, v) => Some(v.to_string()),
        _ => None,
    }
}
