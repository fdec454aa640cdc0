//! Upstream response normalization.
//!
//! # Responsibilities
//! - Parse the success body as JSON, or as newline-delimited JSON when the
//!   upstream streams its output
//! - Locate the result via an ordered list of extraction rules
//! - Produce a [`NormalizedResult`] holding exactly one of URL or inline bytes
//!
//! # Design Decisions
//! - Rules are data: `(path, extractor)` pairs evaluated in order, so a new
//!   upstream field is one more entry rather than one more branch
//! - URL rules outrank inline rules, matching the historic upstream behavior
//! - For streamed bodies the latest document holding a match wins
//! - A value that fails its extractor's checks is skipped, not fatal
//! - Inline base64 may be unpadded or line-wrapped; the bytes are decoded
//!   here and re-encoded canonically when the data URI is built

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde_json::Value;

use crate::pipeline::data_uri;

use Segment::{Index, Key};

// Standard alphabet; padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parsed upstream success body.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamBody {
    documents: Vec<Value>,
    raw: String,
}

impl UpstreamBody {
    /// Parse one JSON document, falling back to one document per JSON line.
    pub fn parse(bytes: &[u8]) -> Self {
        let raw = String::from_utf8_lossy(bytes).into_owned();
        let documents = match serde_json::from_str::<Value>(&raw) {
            Ok(document) => vec![document],
            Err(_) => raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .filter_map(|line| serde_json::from_str::<Value>(line).ok())
                .collect(),
        };
        Self { documents, raw }
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Where the transformed image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    Url(String),
    Inline(Vec<u8>),
}

/// Result location plus the mime type upstream declared, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedResult {
    pub source: ResultSource,
    pub mime_type: Option<String>,
}

impl NormalizedResult {
    pub fn result_url(&self) -> Option<&str> {
        match &self.source {
            ResultSource::Url(url) => Some(url),
            ResultSource::Inline(_) => None,
        }
    }

    pub fn inline_data(&self) -> Option<&[u8]> {
        match &self.source {
            ResultSource::Inline(bytes) => Some(bytes),
            ResultSource::Url(_) => None,
        }
    }
}

/// Step in a JSON path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Key(&'static str),
    Index(usize),
}

/// How the value at a rule's path is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Absolute http(s) URL (a base64 data URI is accepted as inline data).
    Url,
    /// Base64 text, optionally data-URI prefixed.
    InlineBase64,
}

/// One `(path, extractor)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRule {
    pub path: &'static [Segment],
    pub extractor: Extractor,
}

impl ExtractionRule {
    pub const fn url(path: &'static [Segment]) -> Self {
        Self { path, extractor: Extractor::Url }
    }

    pub const fn inline(path: &'static [Segment]) -> Self {
        Self { path, extractor: Extractor::InlineBase64 }
    }

    /// Dotted form for logs, e.g. `output[0].url`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for segment in self.path {
            match segment {
                Segment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            }
        }
        out
    }

    /// Apply this rule to one document.
    pub fn apply(&self, document: &Value) -> Option<NormalizedResult> {
        let value = resolve(document, self.path)?.as_str()?.trim();
        if value.is_empty() {
            return None;
        }

        if let Some(uri) = data_uri::parse(value) {
            let bytes = decode(uri.payload)?;
            let mime = Some(uri.mime_type).filter(|m| !m.is_empty()).map(str::to_string);
            return Some(NormalizedResult {
                source: ResultSource::Inline(bytes),
                mime_type: mime.or_else(|| self.sibling_mime(document)),
            });
        }

        let source = match self.extractor {
            Extractor::Url => {
                let url = url::Url::parse(value).ok()?;
                if !matches!(url.scheme(), "http" | "https") {
                    return None;
                }
                ResultSource::Url(value.to_string())
            }
            Extractor::InlineBase64 => ResultSource::Inline(decode(value)?),
        };

        Some(NormalizedResult {
            source,
            mime_type: self.sibling_mime(document),
        })
    }

    // `mime_type` / `content_type` next to the matched field.
    fn sibling_mime(&self, document: &Value) -> Option<String> {
        let parent = match self.path.split_last() {
            Some((_, parent_path)) => resolve(document, parent_path)?,
            None => document,
        };
        ["mime_type", "content_type", "mimeType", "contentType"]
            .iter()
            .find_map(|key| parent.get(*key).and_then(Value::as_str))
            .and_then(data_uri::media_type)
            .map(str::to_string)
    }
}

fn resolve<'a>(document: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(document, |value, segment| match segment {
        Segment::Key(key) => value.get(*key),
        Segment::Index(index) => value.get(*index),
    })
    .filter(|value| !value.is_null())
}

fn decode(encoded: &str) -> Option<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match LENIENT.decode(compact) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping inline candidate that is not base64");
            None
        }
    }
}

/// Known result locations, highest priority first.
pub const DEFAULT_RULES: &[ExtractionRule] = &[
    // direct URL fields
    ExtractionRule::url(&[Key("output_image_url")]),
    ExtractionRule::url(&[Key("image_url")]),
    ExtractionRule::url(&[Key("result_url")]),
    ExtractionRule::url(&[Key("url")]),
    // nested output object
    ExtractionRule::url(&[Key("output"), Key("image_url")]),
    ExtractionRule::url(&[Key("output"), Key("url")]),
    // nested result object
    ExtractionRule::url(&[Key("result"), Key("image_url")]),
    ExtractionRule::url(&[Key("result"), Key("url")]),
    // indexed outputs
    ExtractionRule::url(&[Key("output"), Index(0)]),
    ExtractionRule::url(&[Key("output"), Index(0), Key("url")]),
    ExtractionRule::url(&[Key("output"), Index(0), Key("image_url")]),
    ExtractionRule::url(&[Key("data"), Index(0), Key("url")]),
    // streamed envelopes
    ExtractionRule::url(&[Key("value"), Key("output"), Key("image_url")]),
    ExtractionRule::url(&[Key("value"), Key("outputs"), Key("photo"), Key("image_url")]),
    // inline data, same order
    ExtractionRule::inline(&[Key("output_image_base64")]),
    ExtractionRule::inline(&[Key("image_base64")]),
    ExtractionRule::inline(&[Key("b64_json")]),
    ExtractionRule::inline(&[Key("output"), Key("image_base64")]),
    ExtractionRule::inline(&[Key("result"), Key("image_base64")]),
    ExtractionRule::inline(&[Key("output"), Index(0), Key("b64_json")]),
    ExtractionRule::inline(&[Key("data"), Index(0), Key("b64_json")]),
];

/// No rule matched; carries the raw body for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedShape {
    pub raw: String,
}

/// Evaluates extraction rules against upstream bodies.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<ExtractionRule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl Normalizer {
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        Self { rules }
    }

    /// Insert a rule at `priority` (0 = checked first).
    pub fn with_rule(mut self, priority: usize, rule: ExtractionRule) -> Self {
        let index = priority.min(self.rules.len());
        self.rules.insert(index, rule);
        self
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn normalize(&self, body: &UpstreamBody) -> Result<NormalizedResult, UnrecognizedShape> {
        for document in body.documents().iter().rev() {
            for rule in &self.rules {
                if let Some(result) = rule.apply(document) {
                    tracing::debug!(rule = %rule.describe(), "Upstream result located");
                    return Ok(result);
                }
            }
        }

        Err(UnrecognizedShape {
            raw: body.raw().to_string(),
        })
    }
}
