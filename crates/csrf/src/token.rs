//! The anti-forgery token and its masked wire form.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use http::HeaderName;
use rand::RngCore;
use serde::{Serialize, Serializer};
use subtle::ConstantTimeEq;

/// Names under which clients submit the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    /// Header checked first.
    pub header_name: HeaderName,
    /// Query or form parameter checked when the header is absent.
    pub parameter_name: String,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            header_name: HeaderName::from_static("x-csrf-token"),
            parameter_name: "_csrf".into(),
        }
    }
}

impl From<&config::CsrfConfig> for TokenSettings {
    fn from(config: &config::CsrfConfig) -> Self {
        Self {
            header_name: config.header_name.as_ref().clone(),
            parameter_name: config.parameter_name.clone(),
        }
    }
}

/// A CSRF token bound to one session.
///
/// Serializes as `{"header_name": .., "parameter_name": .., "token": ..}` for the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrfToken {
    #[serde(serialize_with = "serialize_header_name")]
    header_name: HeaderName,
    parameter_name: String,
    #[serde(rename = "token")]
    value: String,
}

impl CsrfToken {
    /// Creates a token with the given submission names and value.
    pub fn new(header_name: HeaderName, parameter_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header_name,
            parameter_name: parameter_name.into(),
            value: value.into(),
        }
    }

    /// Creates a token with a fresh random value.
    pub fn generate(settings: &TokenSettings) -> Self {
        Self::new(
            settings.header_name.clone(),
            settings.parameter_name.clone(),
            uuid::Uuid::new_v4().to_string(),
        )
    }

    /// Header the client sends the token in.
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Parameter the client sends the token in when not using the header.
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// The raw token value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns a copy carrying the masked value, suitable for handing to clients.
    ///
    /// Every call uses a new salt, so the exposed value changes on each response while the
    /// underlying token stays the same. This keeps the secret out of compressed responses.
    pub fn masked(&self) -> CsrfToken {
        Self {
            header_name: self.header_name.clone(),
            parameter_name: self.parameter_name.clone(),
            value: mask(&self.value),
        }
    }

    /// Whether the submitted, masked value carries this token.
    pub fn matches_submitted(&self, submitted: &str) -> bool {
        match unmask(submitted) {
            Some(actual) => tokens_match(&self.value, &actual),
            None => false,
        }
    }
}

/// Masks a token value as URL-safe base64 of `salt || (value XOR salt)`.
pub fn mask(value: &str) -> String {
    let token = value.as_bytes();

    let mut salt = vec![0u8; token.len()];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut masked = Vec::with_capacity(token.len() * 2);
    masked.extend_from_slice(&salt);
    masked.extend(token.iter().zip(&salt).map(|(t, s)| t ^ s));

    URL_SAFE.encode(masked)
}

/// Reverses [`mask`]. Returns `None` for anything that is not a well-formed masked value.
pub fn unmask(submitted: &str) -> Option<String> {
    let bytes = URL_SAFE.decode(submitted.trim()).ok()?;

    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }

    let (salt, masked) = bytes.split_at(bytes.len() / 2);
    let token = masked.iter().zip(salt).map(|(m, s)| m ^ s).collect();

    String::from_utf8(token).ok()
}

/// Compares two token values in constant time.
pub fn tokens_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

fn serialize_header_name<S>(name: &HeaderName, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(name.as_str())
}
