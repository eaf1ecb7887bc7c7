//! Error types for the conversion pipeline.
//!
//! [`BrowserError`] describes what went wrong inside the browser engine;
//! [`ConvertError`] is the outward category a caller sees, carrying the
//! HTTP status it maps to.

use crate::config::Stage;
use crate::request::ConversionMode;
use thiserror::Error;

/// Failures raised by a browser session or launcher.
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open page: {0}")]
    Page(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Content load timed out after {0}ms")]
    Timeout(u64),

    #[error("Failed to render PDF: {0}")]
    Render(String),

    #[error("Failed to close browser: {0}")]
    Close(String),
}

impl From<tokio::task::JoinError> for BrowserError {
    fn from(err: tokio::task::JoinError) -> Self {
        BrowserError::Page(format!("browser task aborted: {}", err))
    }
}

/// Outward-facing conversion failure.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Body was not a JSON object.
    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    /// Required field absent, empty or of the wrong type.
    #[error("{0}")]
    MissingField(&'static str),

    /// Both `url` and `html` supplied.
    #[error("Provide either a URL or HTML content, not both")]
    AmbiguousRequest,

    #[error("Invalid URL format. Please provide a valid URL (e.g., https://example.com)")]
    InvalidUrl(#[source] url::ParseError),

    #[error("HTML content is too large ({size} bytes, limit {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Body rejected by the transport limit before it could be inspected.
    #[error("Request body is too large")]
    BodyTooLarge,

    /// The target could not be reached or the navigation was rejected.
    #[error("Target unreachable: {0}")]
    Unreachable(String),

    /// Content failed to settle within the load timeout.
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ConvertError {
    /// HTTP status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ConvertError::MalformedBody(_)
            | ConvertError::MissingField(_)
            | ConvertError::AmbiguousRequest
            | ConvertError::InvalidUrl(_) => 400,
            ConvertError::PayloadTooLarge { .. } | ConvertError::BodyTooLarge => 413,
            ConvertError::Unreachable(_) => 422,
            ConvertError::Timeout(_) => 504,
            ConvertError::Internal(_) => 500,
        }
    }

    /// True for failures detected before any browser was launched.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), 400 | 413)
    }

    /// Message safe to hand back to the caller.
    ///
    /// Client errors always describe the problem. Browser-side failures use
    /// fixed wording per mode, and internal errors only echo the underlying
    /// text when `stage` permits it.
    pub fn public_message(&self, mode: ConversionMode, stage: Stage) -> String {
        match self {
            ConvertError::Unreachable(_) => match mode {
                ConversionMode::Url => {
                    "Failed to access the URL. Please check that it's publicly accessible.".to_string()
                }
                ConversionMode::Html => {
                    "Failed to render the HTML content. Please check that referenced resources are publicly accessible."
                        .to_string()
                }
            },
            ConvertError::Timeout(_) => match mode {
                ConversionMode::Url => {
                    "PDF generation timed out. The page may be too complex or slow to load.".to_string()
                }
                ConversionMode::Html => {
                    "PDF generation timed out. The content may be too complex or reference slow resources."
                        .to_string()
                }
            },
            ConvertError::Internal(raw) if stage.echoes_errors() => {
                format!("Failed to generate PDF: {}", raw)
            }
            ConvertError::Internal(_) => "Failed to generate PDF. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<BrowserError> for ConvertError {
    fn from(err: BrowserError) -> Self {
        let message = err.to_string();
        match err {
            BrowserError::Timeout(_) => ConvertError::Timeout(message),
            _ => classify(&message),
        }
    }
}

/// Maps raw engine failure text onto an outward category.
///
/// Timeouts win over navigation failures: a navigation that timed out is
/// reported as a timeout.
pub fn classify(message: &str) -> ConvertError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("never came") {
        ConvertError::Timeout(message.to_string())
    } else if message.contains("Navigation failed") || message.contains("net::ERR") {
        ConvertError::Unreachable(message.to_string())
    } else {
        ConvertError::Internal(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_timeout() {
        let err = classify("Navigation timeout of 30000 ms exceeded");
        assert_eq!(err.status_code(), 504);

        let err = classify("The event waited for never came");
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn test_classify_unreachable() {
        assert_eq!(classify("net::ERR_NAME_NOT_RESOLVED").status_code(), 422);
        assert_eq!(classify("Navigation failed: net::ERR_CONNECTION_REFUSED").status_code(), 422);
    }

    #[test]
    fn test_classify_internal() {
        assert_eq!(classify("Target closed").status_code(), 500);
    }

    #[test]
    fn test_browser_timeout_maps_to_504() {
        let err: ConvertError = BrowserError::Timeout(30_000).into();
        assert!(matches!(err, ConvertError::Timeout(_)));
    }

    #[test]
    fn test_browser_navigation_maps_to_422() {
        let err: ConvertError = BrowserError::Navigation("net::ERR_CONNECTION_REFUSED".into()).into();
        assert!(matches!(err, ConvertError::Unreachable(_)));
    }

    #[test]
    fn test_launch_failure_is_internal() {
        let err: ConvertError = BrowserError::Launch("no such file".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_internal_message_hidden_in_production() {
        let err = ConvertError::Internal("chrome crashed".into());
        assert_eq!(
            err.public_message(ConversionMode::Url, Stage::Production),
            "Failed to generate PDF. Please try again."
        );
        assert_eq!(
            err.public_message(ConversionMode::Url, Stage::Development),
            "Failed to generate PDF: chrome crashed"
        );
        assert_eq!(
            err.public_message(ConversionMode::Html, Stage::Preview),
            "Failed to generate PDF: chrome crashed"
        );
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(ConvertError::MissingField("URL is required").status_code(), 400);
        assert_eq!(ConvertError::PayloadTooLarge { size: 10, limit: 5 }.status_code(), 413);
        assert!(ConvertError::AmbiguousRequest.is_client_error());
    }
}
