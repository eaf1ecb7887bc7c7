//! Request shapes and input validation.
//!
//! Validation runs on the raw JSON payload before any browser resource is
//! touched. Every failure here is a client error (400 or 413).

use crate::error::ConvertError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use url::Url;

/// Which endpoint a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    Url,
    Html,
}

impl ConversionMode {
    /// JSON field carrying the conversion target.
    pub fn field(self) -> &'static str {
        match self {
            ConversionMode::Url => "url",
            ConversionMode::Html => "html",
        }
    }

    fn other_field(self) -> &'static str {
        match self {
            ConversionMode::Url => "html",
            ConversionMode::Html => "url",
        }
    }

    pub fn filename_prefix(self) -> &'static str {
        match self {
            ConversionMode::Url => "page",
            ConversionMode::Html => "generated",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            ConversionMode::Url => "URL is required",
            ConversionMode::Html => "HTML content is required",
        }
    }

    /// Attachment filename stamped with `at` in unix milliseconds.
    pub fn filename_at(self, at: DateTime<Utc>) -> String {
        format!("{}-{}.pdf", self.filename_prefix(), at.timestamp_millis())
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Url => write!(f, "url"),
            ConversionMode::Html => write!(f, "html"),
        }
    }
}

/// A validated conversion request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionRequest {
    Url(Url),
    /// Raw, not yet sanitized markup.
    Html(String),
}

impl ConversionRequest {
    pub fn mode(&self) -> ConversionMode {
        match self {
            ConversionRequest::Url(_) => ConversionMode::Url,
            ConversionRequest::Html(_) => ConversionMode::Html,
        }
    }

    /// Short description for logs; never includes the HTML body.
    pub fn target_summary(&self) -> String {
        match self {
            ConversionRequest::Url(url) => url.to_string(),
            ConversionRequest::Html(html) => format!("<inline html, {} bytes>", html.len()),
        }
    }

    /// Parses and validates a request body for the given endpoint mode.
    ///
    /// `max_html_bytes` bounds the JSON-serialized size of `html`.
    pub fn from_body(
        mode: ConversionMode,
        body: &[u8],
        max_html_bytes: usize,
    ) -> Result<Self, ConvertError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| ConvertError::MalformedBody(e.to_string()))?;
        Self::from_payload(mode, &payload, max_html_bytes)
    }

    /// Validates an already-parsed JSON payload.
    pub fn from_payload(
        mode: ConversionMode,
        payload: &Value,
        max_html_bytes: usize,
    ) -> Result<Self, ConvertError> {
        let object = payload
            .as_object()
            .ok_or_else(|| ConvertError::MalformedBody("expected a JSON object".to_string()))?;

        if object.get(mode.other_field()).is_some_and(|v| !v.is_null()) {
            return Err(ConvertError::AmbiguousRequest);
        }

        let value = object
            .get(mode.field())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(ConvertError::MissingField(mode.missing_message()))?;

        match mode {
            ConversionMode::Url => {
                let url = Url::parse(value).map_err(ConvertError::InvalidUrl)?;
                Ok(ConversionRequest::Url(url))
            }
            ConversionMode::Html => {
                let size = serialized_len(value);
                if size > max_html_bytes {
                    return Err(ConvertError::PayloadTooLarge {
                        size,
                        limit: max_html_bytes,
                    });
                }
                Ok(ConversionRequest::Html(value.to_string()))
            }
        }
    }
}

/// Length of `value` once encoded as a JSON string literal.
fn serialized_len(value: &str) -> usize {
    serde_json::to_string(value)
        .map(|s| s.len())
        .unwrap_or(value.len())
}
