//! Header names read from configuration, validated and lowercased on load.

use http::header::HeaderName as HttpHeaderName;
use serde::{Deserialize, Deserializer};
use std::ops::Deref;

/// A header name taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderName(HttpHeaderName);

impl HeaderName {
    /// A header name known at compile time. Must already be lowercase.
    pub fn from_static(s: &'static str) -> Self {
        Self(HttpHeaderName::from_static(s))
    }
}

impl AsRef<HttpHeaderName> for HeaderName {
    fn as_ref(&self) -> &HttpHeaderName {
        &self.0
    }
}

impl Deref for HeaderName {
    type Target = HttpHeaderName;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for HeaderName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HttpHeaderName::try_from(s.as_str())
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("invalid header name '{s}': {e}")))
    }
}
