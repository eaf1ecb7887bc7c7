//! WireTuner Page Export Library
//!
//! This library provides the core functionality for the page export service:
//! converting a public URL or an inline HTML document into a PDF with a
//! headless Chrome/Chromium.
//!
//! ## Module Overview
//!
//! - `request`: request shapes and input validation
//! - `sanitize`: best-effort HTML pre-filter (not a security boundary)
//! - `browser`: browser launchers per runtime profile and CDP sessions
//! - `converter`: the conversion pipeline and session lifecycle
//! - `error`: browser failures and their outward classification
//! - `server`: axum routes and response mapping
//! - `job`: per-request conversion record
//! - `telemetry`: OpenTelemetry integration and structured logging
//! - `config`: explicit service configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use page_export::{
//!     browser::launcher_for,
//!     config::ServiceConfig,
//!     converter::PdfConverter,
//!     request::ConversionRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServiceConfig::default();
//!     let launcher = launcher_for(&config).unwrap();
//!     let converter = PdfConverter::from_config(launcher, &config);
//!
//!     let request = ConversionRequest::Url("https://example.com".parse().unwrap());
//!     let pdf = converter.convert(request).await.unwrap();
//!     assert!(pdf.bytes.starts_with(b"%PDF-"));
//! }
//! ```

pub mod browser;
pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod request;
pub mod sanitize;
pub mod server;
pub mod telemetry;
