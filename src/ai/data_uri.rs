//! `data:<mime>;base64,<payload>` values exchanged with the model.

use super::AiError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;
use std::str::FromStr;

/// A decoded base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build from a base64 payload, validating it decodes.
    pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self, AiError> {
        if !is_mime_type(mime_type) {
            return Err(AiError::InvalidDataUri(format!(
                "malformed MIME type {mime_type:?}"
            )));
        }
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| AiError::InvalidDataUri(format!("bad base64 payload: {e}")))?;
        Ok(Self::from_bytes(mime_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn payload(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// File extension matching the MIME type; `png` when unknown.
    pub fn extension(&self) -> &'static str {
        image::ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png")
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn is_mime_type(s: &str) -> bool {
    match s.split_once('/') {
        Some((kind, sub)) => !kind.is_empty() && !sub.is_empty() && !s.contains([';', ',', ' ']),
        None => false,
    }
}

impl FromStr for DataUri {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| AiError::InvalidDataUri("missing `data:` prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AiError::InvalidDataUri("missing `,` separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AiError::InvalidDataUri("payload is not base64".to_string()))?;
        Self::from_base64(mime_type, payload)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload())
    }
}
