//! Tracing setup and log hygiene helpers
//!
//! Request and response bodies are logged at debug level only after passing
//! through [`scrub_json`], so credentials and tokens never reach the sink.

use anyhow::Result;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

/// Replacement written in place of sensitive values.
pub const FILTERED: &str = "[FILTERED]";

/// Any JSON key containing one of these substrings (case-insensitive) is masked.
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "csrfmiddlewaretoken",
    "secret",
    "authorization",
    "refresh",
    "access",
];

/// Header names masked entirely.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie"];

/// Paths that are too noisy to log on every hit.
const IGNORED_PATHS: &[&str] = &["/health", "/health/"];

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` is used as the filter.
pub fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", default_level, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(())
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_FIELDS.iter().any(|s| key.contains(s))
}

/// Recursively mask sensitive fields in objects and arrays.
pub fn scrub_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let scrubbed: Map<String, Value> = map
                .iter()
                .map(|(k, v)| {
                    if is_sensitive_key(k) {
                        (k.clone(), Value::String(FILTERED.to_string()))
                    } else {
                        (k.clone(), scrub_json(v))
                    }
                })
                .collect();
            Value::Object(scrubbed)
        }
        Value::Array(items) => Value::Array(items.iter().map(scrub_json).collect()),
        other => other.clone(),
    }
}

/// Mask sensitive headers, keeping the rest verbatim.
pub fn scrub_headers<'a, I>(headers: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                (name.to_string(), FILTERED.to_string())
            } else {
                (name.to_string(), value.to_string())
            }
        })
        .collect()
}

/// Whether request logging should skip this path.
pub fn is_ignored_path(path: &str) -> bool {
    IGNORED_PATHS.contains(&path)
}
