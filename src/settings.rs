//! Watchface settings as produced by the configuration page.
//!
//! Settings are kept as loose JSON values (the page hands back booleans,
//! numbers and strings) and converted to an [`AppMessage`] only when they are
//! sent to the watch.
use std::collections::BTreeMap;

use ds::{AppMessage, Value};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ConfigError;

/// Setting identifiers the watch understands.
pub const SETTING_KEYS: &[&str] = &[
    "statusshow",
    "statusvibe",
    "batwarn",
    "dayshow",
    "dayfont",
    "hournumshow",
    "minnumshow",
    "dialfont",
    "outline",
    "colorflip",
    "bgcol",
    "statuscol",
    "hourcol",
    "hourtickcol",
    "mincol",
    "mintickcol",
    "centercol",
    "seccol",
    "seccentercol",
    "dialnumcol",
    "daycol",
    "weekcol",
    "sundaycol",
    "todaycol",
    "hourbelowmin",
    "hourlen",
    "hourext",
    "hourwidth",
    "minlen",
    "minext",
    "minwidth",
    "centerwidth",
    "showsec",
    "sectimeout",
    "seclen",
    "secext",
    "secwidth",
    "seccenterwidth",
    "hourtickshow",
    "hourticklen",
    "hourtickwidth",
    "mintickshow",
    "minticklen",
    "mintickwidth",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, JsonValue>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build settings from a JSON object.
    ///
    /// Entries may be plain values or `{"value": ...}` wrappers.
    pub fn from_json_object(value: JsonValue) -> Result<Self, ConfigError> {
        let JsonValue::Object(map) = value else {
            return Err(ConfigError::NotAnObject);
        };
        Ok(Self(
            map.into_iter()
                .map(|(key, value)| match value {
                    JsonValue::Object(mut wrapper) if wrapper.contains_key("value") => {
                        (key, wrapper.remove("value").unwrap_or(JsonValue::Null))
                    }
                    other => (key, other),
                })
                .collect(),
        ))
    }

    pub fn insert(&mut self, key: &str, value: impl Into<JsonValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Message for the watch. Unknown keys and unconvertible values are
    /// dropped with a warning.
    pub fn to_app_message(&self) -> AppMessage {
        let mut msg = AppMessage::new();
        for (key, value) in self.iter() {
            if !SETTING_KEYS.contains(&key) {
                warn!("Skipping unknown setting {key:?}");
                continue;
            }
            match to_message_value(value) {
                Some(v) => msg.insert(key, v),
                None => warn!("Skipping setting {key:?} with unsupported value {value}"),
            }
        }
        msg
    }
}

fn to_message_value(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::Bool(b) => Some(Value::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok().map(Value::Int),
            None => n
                .as_f64()
                .map(f64::round)
                .filter(|f| (i32::MIN as f64..=i32::MAX as f64).contains(f))
                .map(|f| Value::Int(f as i32)),
        },
        JsonValue::String(s) => Some(parse_int(s).map_or_else(|| Value::from(s.as_str()), Value::Int)),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Value::Bytes),
        JsonValue::Null | JsonValue::Object(_) => None,
    }
}

/// Decimal or `0x` hexadecimal (colour pickers) integers.
fn parse_int(s: &str) -> Option<i32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(|v| v as i32),
        None => s.parse().ok(),
    }
}
