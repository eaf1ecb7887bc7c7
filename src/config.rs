//! Service configuration.
//!
//! Everything environment-sensitive is collected here once at startup and
//! passed down explicitly; the conversion pipeline never reads process state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 3000;

/// Content-load sub-budget (30 seconds).
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Declared wall-clock budget for a whole request (60 seconds).
pub const DEFAULT_REQUEST_BUDGET_MS: u64 = 60_000;

/// Largest HTML payload accepted, measured as serialized JSON (4 MiB).
pub const MAX_HTML_BYTES: usize = 4 * 1024 * 1024;

/// Transport-level body limit. Larger than [`MAX_HTML_BYTES`] so oversized
/// HTML reaches the validator and gets a proper JSON 413.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Which kind of host the browser is launched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    /// Serverless or otherwise constrained host with a trimmed Chromium build.
    Constrained,
    /// Ordinary host with a full Chrome/Chromium install.
    General,
}

impl RuntimeProfile {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "constrained" | "serverless" => Some(RuntimeProfile::Constrained),
            "general" | "local" => Some(RuntimeProfile::General),
            _ => None,
        }
    }
}

/// Deployment stage; decides whether raw error text reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Production,
    Preview,
    Development,
}

impl Stage {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Stage::Production),
            "preview" | "staging" => Some(Stage::Preview),
            "development" | "dev" => Some(Stage::Development),
            _ => None,
        }
    }

    /// Preview and development echo underlying error messages.
    pub fn echoes_errors(self) -> bool {
        matches!(self, Stage::Preview | Stage::Development)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub profile: RuntimeProfile,
    pub stage: Stage,
    /// Explicit browser binary. Required for the constrained profile.
    pub chrome_path: Option<PathBuf>,
    pub load_timeout: Duration,
    pub request_budget: Duration,
    pub max_body_bytes: usize,
    pub max_html_bytes: usize,
    pub otlp_endpoint: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            profile: RuntimeProfile::General,
            stage: Stage::Production,
            chrome_path: None,
            load_timeout: Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
            request_budget: Duration::from_millis(DEFAULT_REQUEST_BUDGET_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_html_bytes: MAX_HTML_BYTES,
            otlp_endpoint: None,
        }
    }
}

impl ServiceConfig {
    /// Builds configuration from environment variables.
    ///
    /// - `BIND_ADDR`: listen address (default: 0.0.0.0:3000)
    /// - `RUNTIME_PROFILE`: `constrained` or `general`; when unset, a
    ///   serverless marker (`VERCEL`, `AWS_LAMBDA_FUNCTION_NAME`) selects constrained
    /// - `APP_STAGE`: `production`, `preview` or `development`, falling back to `VERCEL_ENV`
    /// - `CHROME_PATH`: browser executable
    /// - `LOAD_TIMEOUT_MS`, `REQUEST_BUDGET_MS`, `MAX_BODY_BYTES`
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables OTLP export when present
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let serverless_marker =
            lookup("VERCEL").is_some() || lookup("AWS_LAMBDA_FUNCTION_NAME").is_some();
        let profile = lookup("RUNTIME_PROFILE")
            .and_then(|v| RuntimeProfile::parse(&v))
            .unwrap_or(if serverless_marker {
                RuntimeProfile::Constrained
            } else {
                RuntimeProfile::General
            });

        let stage = lookup("APP_STAGE")
            .or_else(|| lookup("VERCEL_ENV"))
            .and_then(|v| Stage::parse(&v))
            .unwrap_or(Stage::Production);

        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            bind_addr: lookup("BIND_ADDR")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            profile,
            stage,
            chrome_path: lookup("CHROME_PATH").filter(|v| !v.is_empty()).map(PathBuf::from),
            load_timeout: millis("LOAD_TIMEOUT_MS", defaults.load_timeout),
            request_budget: millis("REQUEST_BUDGET_MS", defaults.request_budget),
            max_body_bytes: lookup("MAX_BODY_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            max_html_bytes: defaults.max_html_bytes,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        }
    }
}
