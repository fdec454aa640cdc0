//! Input validation.
//!
//! # Responsibilities
//! - Check presence, type and size bound of `image_base64`
//! - Accept a `data:<mime>;base64,` prefix and keep its mime type
//! - Reject text that is not standard base64
//!
//! # Design Decisions
//! - Pure function; runs before any credential lookup or network I/O
//! - The size bound is checked before decoding so oversized input is cheap
//!   to reject

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::config::InputConfig;
use crate::pipeline::data_uri;
use crate::pipeline::error::RelayError;

/// Name of the inbound JSON field carrying the image.
pub const IMAGE_FIELD: &str = "image_base64";

/// A validated upload, discarded when the invocation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSubmission {
    encoded: String,
    mime_type: String,
}

impl ImageSubmission {
    /// Base64 text without any data URI prefix.
    pub fn encoded_bytes(&self) -> &str {
        &self.encoded
    }

    /// Length of the base64 text.
    pub fn size_bytes(&self) -> usize {
        self.encoded.len()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The image as a self-contained data URI.
    pub fn data_uri(&self) -> String {
        data_uri::wrap(&self.mime_type, &self.encoded)
    }
}

/// Turn raw request fields into an [`ImageSubmission`].
pub fn validate(request: &Value, config: &InputConfig) -> Result<ImageSubmission, RelayError> {
    let raw = match request.get(IMAGE_FIELD) {
        None | Some(Value::Null) => return Err(RelayError::MissingInput),
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(RelayError::InvalidInput(format!(
                "'{}' must be a string, got {}",
                IMAGE_FIELD,
                json_type(other)
            )))
        }
    };

    if raw.is_empty() {
        return Err(RelayError::MissingInput);
    }
    if raw.len() > config.max_encoded_chars {
        return Err(RelayError::InvalidInput(format!(
            "image is {} characters, limit is {}",
            raw.len(),
            config.max_encoded_chars
        )));
    }

    let (mime_type, encoded) = match data_uri::parse(raw) {
        Some(uri) if !uri.mime_type.is_empty() => (uri.mime_type, uri.payload),
        Some(uri) => (config.default_mime.as_str(), uri.payload),
        None => (config.default_mime.as_str(), raw),
    };

    if encoded.is_empty() {
        return Err(RelayError::MissingInput);
    }
    if STANDARD.decode(encoded).is_err() {
        return Err(RelayError::InvalidInput("image is not valid base64".to_string()));
    }

    Ok(ImageSubmission {
        encoded: encoded.to_string(),
        mime_type: mime_type.to_string(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
