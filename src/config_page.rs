//! External configuration page: launch URL and response decoding.
use log::debug;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value as JsonValue;
use url::Url;

use crate::{error::ConfigError, settings::Settings};

/// Response sent by the page when the user closes it without saving.
pub const CANCELLED: &str = "CANCELLED";

/// Characters left alone by `encodeURIComponent`, minus the apostrophe which
/// `url` would escape in a query anyway.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResponse {
    Cancelled,
    Updated(Settings),
}

/// Page URL carrying the current settings as `?key=value&...`.
pub fn config_page_url(base: &Url, settings: &Settings) -> Url {
    let query = settings
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, COMPONENT),
                utf8_percent_encode(&query_value(value), COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    let mut url = base.clone();
    url.set_query((!query.is_empty()).then_some(query.as_str()));
    url
}

fn query_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decode what the page returned when it was closed.
pub fn parse_response(raw: &str) -> Result<ConfigResponse, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == CANCELLED {
        return Ok(ConfigResponse::Cancelled);
    }

    let json = match serde_json::from_str::<JsonValue>(raw) {
        Ok(json) => json,
        Err(_) => {
            debug!("Response is not plain JSON, trying URI decoding");
            let decoded = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|e| ConfigError::MalformedResponse(e.to_string()))?;
            if decoded == CANCELLED {
                return Ok(ConfigResponse::Cancelled);
            }
            serde_json::from_str(&decoded)
                .map_err(|e| ConfigError::MalformedResponse(e.to_string()))?
        }
    };
    Ok(ConfigResponse::Updated(Settings::from_json_object(json)?))
}
