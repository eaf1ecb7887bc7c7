//! URL/HTML to PDF conversion pipeline.

use crate::browser::{BrowserLauncher, BrowserSession, PdfOptions};
use crate::config::ServiceConfig;
use crate::error::{BrowserError, ConvertError};
use crate::job::ConversionJob;
use crate::request::ConversionRequest;
use crate::sanitize::sanitize_html;
use crate::telemetry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// A finished conversion.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// What actually gets loaded into the page.
enum PageContent<'a> {
    Navigate(&'a Url),
    Document(String),
}

/// Converts validated requests into PDF bytes through a headless browser.
///
/// Every conversion launches its own session and closes it before
/// returning, on both the success and the failure path. Nothing is shared
/// between conversions besides the launcher and settings.
pub struct PdfConverter {
    launcher: Arc<dyn BrowserLauncher>,
    load_timeout: Duration,
    request_budget: Duration,
    options: PdfOptions,
}

impl PdfConverter {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, load_timeout: Duration, request_budget: Duration) -> Self {
        Self {
            launcher,
            load_timeout,
            request_budget,
            options: PdfOptions::A4,
        }
    }

    pub fn from_config(launcher: Arc<dyn BrowserLauncher>, config: &ServiceConfig) -> Self {
        Self::new(launcher, config.load_timeout, config.request_budget)
    }

    /// Renders `request` to PDF.
    ///
    /// HTML is sanitized before any browser is launched. Failures come back
    /// already classified; see [`ConvertError::status_code`].
    pub async fn convert(&self, request: ConversionRequest) -> Result<RenderedPdf, ConvertError> {
        let mut job = ConversionJob::new(&request);
        info!(
            job_id = %job.job_id,
            mode = %job.mode,
            target = %job.target,
            "Starting PDF conversion"
        );

        let content = match &request {
            ConversionRequest::Url(url) => PageContent::Navigate(url),
            ConversionRequest::Html(raw) => {
                let clean = sanitize_html(raw);
                debug!(
                    job_id = %job.job_id,
                    before = raw.len(),
                    after = clean.len(),
                    "HTML sanitized"
                );
                PageContent::Document(clean)
            }
        };

        job.start_rendering();
        let result = self.render(content).await;

        match &result {
            Ok(bytes) => job.mark_complete(bytes.len()),
            Err(e) => job.mark_failed(e.to_string()),
        }
        telemetry::record_conversion_telemetry(&job, self.request_budget);

        let bytes = result?;
        Ok(RenderedPdf {
            bytes,
            filename: request.mode().filename_at(Utc::now()),
        })
    }

    /// Owns the session for exactly one conversion.
    async fn render(&self, content: PageContent<'_>) -> Result<Vec<u8>, ConvertError> {
        let mut session = self.launcher.launch().await?;

        let outcome = self.render_in(session.as_mut(), content).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close browser session");
        }

        Ok(outcome?)
    }

    async fn render_in(
        &self,
        session: &mut dyn BrowserSession,
        content: PageContent<'_>,
    ) -> Result<Vec<u8>, BrowserError> {
        match content {
            PageContent::Navigate(url) => session.navigate(url, self.load_timeout).await?,
            PageContent::Document(html) => session.set_content(&html, self.load_timeout).await?,
        }

        let pdf = session.print_pdf(&self.options).await?;
        if pdf.is_empty() {
            return Err(BrowserError::Render("engine returned an empty document".to_string()));
        }
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockBrowserLauncher, MockBrowserSession};

    const PDF: &[u8] = b"%PDF-1.7\n%fake\n";

    fn launcher_with(session: MockBrowserSession) -> Arc<dyn BrowserLauncher> {
        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_launch()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn BrowserSession>));
        Arc::new(launcher)
    }

    fn converter(launcher: Arc<dyn BrowserLauncher>) -> PdfConverter {
        PdfConverter::new(launcher, Duration::from_secs(30), Duration::from_secs(60))
    }

    fn url_request() -> ConversionRequest {
        ConversionRequest::Url(Url::parse("https://example.com").unwrap())
    }

    #[tokio::test]
    async fn test_url_conversion_closes_session() {
        let mut session = MockBrowserSession::new();
        session
            .expect_navigate()
            .withf(|url, timeout| url.as_str() == "https://example.com/" && *timeout == Duration::from_secs(30))
            .times(1)
            .returning(|_, _| Ok(()));
        session
            .expect_print_pdf()
            .withf(|options| *options == PdfOptions::A4)
            .times(1)
            .returning(|_| Ok(PDF.to_vec()));
        session.expect_close().times(1).returning(|| Ok(()));

        let pdf = converter(launcher_with(session)).convert(url_request()).await.unwrap();

        assert!(pdf.bytes.starts_with(b"%PDF-"));
        assert!(pdf.filename.starts_with("page-"));
        assert!(pdf.filename.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_html_is_sanitized_before_loading() {
        let mut session = MockBrowserSession::new();
        session
            .expect_set_content()
            .withf(|html, _| !html.contains("<script") && html.contains("<p>hi</p>"))
            .times(1)
            .returning(|_, _| Ok(()));
        session.expect_print_pdf().times(1).returning(|_| Ok(PDF.to_vec()));
        session.expect_close().times(1).returning(|| Ok(()));

        let request = ConversionRequest::Html("<script>alert(1)</script><p>hi</p>".to_string());
        let pdf = converter(launcher_with(session)).convert(request).await.unwrap();

        assert!(pdf.filename.starts_with("generated-"));
    }

    #[tokio::test]
    async fn test_navigation_failure_still_closes() {
        let mut session = MockBrowserSession::new();
        session
            .expect_navigate()
            .times(1)
            .returning(|_, _| Err(BrowserError::Navigation("net::ERR_NAME_NOT_RESOLVED".into())));
        session.expect_print_pdf().never();
        session.expect_close().times(1).returning(|| Ok(()));

        let err = converter(launcher_with(session)).convert(url_request()).await.unwrap_err();

        assert!(matches!(err, ConvertError::Unreachable(_)));
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_504() {
        let mut session = MockBrowserSession::new();
        session
            .expect_navigate()
            .times(1)
            .returning(|_, _| Err(BrowserError::Timeout(30_000)));
        session.expect_close().times(1).returning(|| Ok(()));

        let err = converter(launcher_with(session)).convert(url_request()).await.unwrap_err();

        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_render_failure_closes_and_reports_internal() {
        let mut session = MockBrowserSession::new();
        session.expect_navigate().times(1).returning(|_, _| Ok(()));
        session
            .expect_print_pdf()
            .times(1)
            .returning(|_| Err(BrowserError::Render("Printing failed".into())));
        session.expect_close().times(1).returning(|| Ok(()));

        let err = converter(launcher_with(session)).convert(url_request()).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_empty_pdf_is_an_error() {
        let mut session = MockBrowserSession::new();
        session.expect_navigate().times(1).returning(|_, _| Ok(()));
        session.expect_print_pdf().times(1).returning(|_| Ok(Vec::new()));
        session.expect_close().times(1).returning(|| Ok(()));

        let err = converter(launcher_with(session)).convert(url_request()).await.unwrap_err();

        assert!(matches!(err, ConvertError::Internal(_)));
    }

    #[tokio::test]
    async fn test_close_failure_does_not_mask_success() {
        let mut session = MockBrowserSession::new();
        session.expect_navigate().times(1).returning(|_, _| Ok(()));
        session.expect_print_pdf().times(1).returning(|_| Ok(PDF.to_vec()));
        session
            .expect_close()
            .times(1)
            .returning(|| Err(BrowserError::Close("already gone".into())));

        let pdf = converter(launcher_with(session)).convert(url_request()).await.unwrap();

        assert_eq!(pdf.bytes, PDF);
    }

    #[tokio::test]
    async fn test_launch_failure_is_internal() {
        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_launch()
            .times(1)
            .return_once(|| Err(BrowserError::Launch("Could not auto detect a chrome executable".into())));

        let err = converter(Arc::new(launcher)).convert(url_request()).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
    }
}
