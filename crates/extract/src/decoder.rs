use serde::de::DeserializeOwned;
use serde_json::Value;

const FENCE: &str = "```";
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response is not valid JSON ({source}); starts with: {excerpt}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        excerpt: String,
    },

    #[error("response does not match the expected schema: {source}")]
    Schema {
        #[source]
        source: serde_json::Error,
    },
}

/// Remove an incidental markdown code fence around a completion.
///
/// Takes everything between the first line break and the last fence marker, so a
/// language tag after the opening fence and prose after the closing one are both
/// tolerated. Without a closing fence, everything after the first line break is kept.
pub fn strip_code_fence(text: &str) -> &str {
    let s = text.trim();
    if !s.starts_with(FENCE) {
        return s;
    }

    let Some(first_nl) = s.find('\n') else {
        return s;
    };

    match s.rfind(FENCE) {
        Some(last_fence) if last_fence > first_nl => s[first_nl + 1..last_fence].trim(),
        _ => s[first_nl + 1..].trim(),
    }
}

/// Parse a completion into untyped JSON
pub fn decode_value(text: &str) -> Result<Value, DecodeError> {
    let payload = strip_code_fence(text);
    serde_json::from_str(payload).map_err(|source| DecodeError::Malformed {
        source,
        excerpt: payload.chars().take(EXCERPT_CHARS).collect(),
    })
}

/// Parse a completion into `T`. Invalid JSON and valid JSON of the wrong shape
/// are reported as different errors.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let value = decode_value(text)?;
    serde_json::from_value(value).map_err(|source| DecodeError::Schema { source })
}
