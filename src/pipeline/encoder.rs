//! Payload candidates for the upstream call.
//!
//! The upstream has accepted the photo input in two structures across
//! deployments. Both are built for every submission and tried in a fixed
//! order: the typed inline image first, since another deployment answers
//! the file reference with 405.

use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::pipeline::validator::ImageSubmission;

/// Known request structures for the photo input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadShape {
    /// `{"type": "image", "image_url": <data uri>}`
    InlineImage,
    /// `{"type": "file", "file_type", "file_name", "file_url": <data uri>}`
    FileReference,
}

impl PayloadShape {
    /// Every shape, in the order candidates are tried.
    pub const ALL: [PayloadShape; 2] = [PayloadShape::InlineImage, PayloadShape::FileReference];

    pub fn name(&self) -> &'static str {
        match self {
            PayloadShape::InlineImage => "inline-image",
            PayloadShape::FileReference => "file-reference",
        }
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request body in one of the known shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadCandidate {
    pub shape: PayloadShape,
    pub body: Value,
}

/// Builds [`PayloadCandidate`]s from a submission.
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    version: String,
    input_field: String,
}

impl PayloadEncoder {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            version: config.payload_version.clone(),
            input_field: config.input_field.clone(),
        }
    }

    /// All candidates, most likely accepted first.
    pub fn candidates(&self, submission: &ImageSubmission) -> Vec<PayloadCandidate> {
        let data_uri = submission.data_uri();
        vec![
            self.inline_image(&data_uri),
            self.file_reference(submission, &data_uri),
        ]
    }

    fn inline_image(&self, data_uri: &str) -> PayloadCandidate {
        let photo = json!({
            "type": "image",
            "image_url": data_uri,
        });
        PayloadCandidate {
            shape: PayloadShape::InlineImage,
            body: self.envelope(photo),
        }
    }

    fn file_reference(&self, submission: &ImageSubmission, data_uri: &str) -> PayloadCandidate {
        let photo = json!({
            "type": "file",
            "file_type": submission.mime_type(),
            "file_name": format!("upload-{}.{}", Uuid::new_v4(), extension(submission.mime_type())),
            "file_url": data_uri,
        });
        PayloadCandidate {
            shape: PayloadShape::FileReference,
            body: self.envelope(photo),
        }
    }

    fn envelope(&self, photo: Value) -> Value {
        let mut inputs = serde_json::Map::new();
        inputs.insert(self.input_field.clone(), photo);
        json!({
            "version": self.version,
            "inputs": inputs,
        })
    }
}

fn extension(mime_type: &str) -> &str {
    match mime_type.split_once('/').map(|(_, sub)| sub) {
        Some("jpeg") | Some("pjpeg") => "jpg",
        Some("svg+xml") => "svg",
        Some(sub) if !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()) => sub,
        _ => "bin",
    }
}
