use std::{fmt, str::FromStr};

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DataUriError {
    #[error("missing `data:` prefix")]
    MissingPrefix,
    #[error("only base64 data URIs are supported")]
    NotBase64,
    #[error("missing mime type")]
    MissingMime,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

/// An inline image as `data:<mime>;base64,<payload>`.
///
/// The payload is kept encoded since it is forwarded to Gemini as-is; use
/// [`DataUri::decode`] when the raw bytes are needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Builds a data URI from an already base64-encoded payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the header.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| DataUriError::Payload(e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("data:").ok_or(DataUriError::MissingPrefix)?;
        let (header, data) = rest.split_once(',').ok_or(DataUriError::NotBase64)?;
        let mime_type = header.strip_suffix(";base64").ok_or(DataUriError::NotBase64)?;
        if mime_type.is_empty() {
            return Err(DataUriError::MissingMime);
        }
        // Validate once here so downstream code can trust the payload.
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| DataUriError::Payload(e.to_string()))?;
        Ok(Self::new(mime_type, data))
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
