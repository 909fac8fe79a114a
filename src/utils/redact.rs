use crate::constants::network::AUTH_QUERY_PARAM;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const INLINE_REDACTION: &str = "***REDACTED***";

static AUTH_PARAM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"([?&]{}=)[^&#\s]*", regex::escape(AUTH_QUERY_PARAM)))
        .expect("auth redaction regex")
});

static SENSITIVE_KEYS: &[&str] = &["chave", "api_key", "apikey", "token", "secret", "password"];

/// Masks the credential query parameter in a URL or any text that embeds one.
pub fn redact_query_param(text: &str) -> String {
    AUTH_PARAM_PATTERN
        .replace_all(text, format!("${{1}}{}", INLINE_REDACTION))
        .into_owned()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lowered == *k)
}

/// Copy of `value` with sensitive keys masked and embedded URLs scrubbed.
pub fn redact_object(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(INLINE_REDACTION.to_string()))
                    } else {
                        (key.clone(), redact_object(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_object).collect()),
        Value::String(text) => Value::String(redact_query_param(text)),
        other => other.clone(),
    }
}
