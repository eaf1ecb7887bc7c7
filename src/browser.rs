//! Browser session management over the Chrome DevTools Protocol.
//!
//! A [`BrowserLauncher`] turns a runtime profile into a ready
//! [`BrowserSession`]: one browser process with exactly one tab. There are
//! two launchers: [`ConstrainedLauncher`] for serverless hosts running a
//! trimmed Chromium, and [`GeneralLauncher`] for ordinary hosts.
//!
//! `headless_chrome` is blocking, so every CDP call runs on the blocking
//! thread pool.

use crate::config::{RuntimeProfile, ServiceConfig};
use crate::error::BrowserError;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Quiet period after which the network counts as idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Poll interval while waiting for idleness.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Slack given to the blocking load call on top of its own deadline.
const LOAD_GRACE: Duration = Duration::from_secs(2);

/// Resource entries completed so far, or -1 while the document is still loading.
const RESOURCE_PROBE: &str =
    "document.readyState === 'complete' ? performance.getEntriesByType('resource').length : -1";

/// Consecutive probe failures tolerated before the page counts as dead.
const MAX_PROBE_FAILURES: u32 = 3;

/// Viewport used on constrained hosts.
const CONSTRAINED_WINDOW: (u32, u32) = (1920, 1080);

/// Flags for trimmed serverless Chromium builds. `--no-sandbox` is added by
/// the launch options.
const CONSTRAINED_ARGS: &[&str] = &[
    "--disable-gpu",
    "--no-zygote",
    "--single-process",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--hide-scrollbars",
    "--mute-audio",
];

const GENERAL_ARGS: &[&str] = &["--disable-setuid-sandbox"];

/// Fixed print policy handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    /// Uniform margin in CSS pixels.
    pub margin_px: f64,
    pub print_background: bool,
}

impl PdfOptions {
    /// A4, backgrounds on, 20px margins.
    pub const A4: PdfOptions = PdfOptions {
        paper_width_in: 8.27,
        paper_height_in: 11.69,
        margin_px: 20.0,
        print_background: true,
    };

    /// Margin in inches (CSS defines 96px per inch).
    pub fn margin_in(&self) -> f64 {
        self.margin_px / 96.0
    }

    fn to_cdp(self) -> PrintToPdfOptions {
        let margin = self.margin_in();
        PrintToPdfOptions {
            landscape: Some(false),
            display_header_footer: Some(false),
            print_background: Some(self.print_background),
            paper_width: Some(self.paper_width_in),
            paper_height: Some(self.paper_height_in),
            margin_top: Some(margin),
            margin_bottom: Some(margin),
            margin_left: Some(margin),
            margin_right: Some(margin),
            ..Default::default()
        }
    }
}

/// One browser process with a single page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` and waits for network idleness, bounded by `timeout`.
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), BrowserError>;

    /// Replaces the page document with `html` and waits for its sub-resources.
    async fn set_content(&mut self, html: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn print_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError>;

    /// Tears the session down. Called exactly once per session.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Produces ready sessions for one runtime profile.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    fn profile(&self) -> RuntimeProfile;

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Picks the launcher matching `config.profile`.
pub fn launcher_for(config: &ServiceConfig) -> Result<Arc<dyn BrowserLauncher>, BrowserError> {
    let idle_timeout = config.load_timeout + Duration::from_secs(30);
    match config.profile {
        RuntimeProfile::Constrained => {
            let executable = config.chrome_path.clone().ok_or_else(|| {
                BrowserError::Launch("constrained profile requires CHROME_PATH".to_string())
            })?;
            Ok(Arc::new(ConstrainedLauncher::new(executable, idle_timeout)))
        }
        RuntimeProfile::General => Ok(Arc::new(GeneralLauncher::new(
            config.chrome_path.clone(),
            idle_timeout,
        ))),
    }
}

/// Launch parameters shared by both launchers.
#[derive(Debug, Clone)]
struct LaunchSpec {
    executable: Option<PathBuf>,
    args: &'static [&'static str],
    window_size: Option<(u32, u32)>,
    idle_timeout: Duration,
}

impl LaunchSpec {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let spec = self.clone();
        let session = tokio::task::spawn_blocking(move || ChromeSession::start(&spec)).await??;
        Ok(Box::new(session))
    }
}

/// Serverless hosts: explicit trimmed binary, single-process flags.
pub struct ConstrainedLauncher {
    spec: LaunchSpec,
}

impl ConstrainedLauncher {
    pub fn new(executable: PathBuf, idle_timeout: Duration) -> Self {
        Self {
            spec: LaunchSpec {
                executable: Some(executable),
                args: CONSTRAINED_ARGS,
                window_size: Some(CONSTRAINED_WINDOW),
                idle_timeout,
            },
        }
    }
}

#[async_trait]
impl BrowserLauncher for ConstrainedLauncher {
    fn profile(&self) -> RuntimeProfile {
        RuntimeProfile::Constrained
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        info!(
            executable = ?self.spec.executable,
            "Launching constrained Chromium"
        );
        self.spec.launch().await
    }
}

/// Ordinary hosts: installed Chrome, auto-detected unless a path is given.
pub struct GeneralLauncher {
    spec: LaunchSpec,
}

impl GeneralLauncher {
    pub fn new(executable: Option<PathBuf>, idle_timeout: Duration) -> Self {
        Self {
            spec: LaunchSpec {
                executable,
                args: GENERAL_ARGS,
                window_size: None,
                idle_timeout,
            },
        }
    }
}

#[async_trait]
impl BrowserLauncher for GeneralLauncher {
    fn profile(&self) -> RuntimeProfile {
        RuntimeProfile::General
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        info!(executable = ?self.spec.executable, "Launching Chrome");
        self.spec.launch().await
    }
}

/// Live session backed by `headless_chrome`.
///
/// Dropping the [`Browser`] kills the process, so `close` releases it
/// even when closing the tab fails.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn start(spec: &LaunchSpec) -> Result<Self, BrowserError> {
        let args: Vec<&OsStr> = spec.args.iter().map(OsStr::new).collect();
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(spec.executable.clone())
            .window_size(spec.window_size)
            .idle_browser_timeout(spec.idle_timeout)
            .args(args)
            .build()
            .map_err(|e| BrowserError::Launch(format!("invalid launch options: {}", e)))?;

        let browser = Browser::new(options).map_err(|e| BrowserError::Launch(format!("{:#}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::Page(format!("{:#}", e)))?;

        debug!("Browser session started");
        Ok(Self {
            browser: Some(browser),
            tab,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        run_bounded(timeout, move || {
            let deadline = Instant::now() + timeout;
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .map_err(|e| load_error(e, timeout))?
                .wait_until_navigated()
                .map_err(|e| load_error(e, timeout))?;
            wait_for_network_idle(&tab, deadline, timeout)
        })
        .await
    }

    async fn set_content(&mut self, html: &str, timeout: Duration) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);
        let html = html.to_string();
        run_bounded(timeout, move || {
            let deadline = Instant::now() + timeout;
            tab.set_default_timeout(timeout);
            tab.navigate_to("about:blank")
                .map_err(|e| load_error(e, timeout))?
                .wait_until_navigated()
                .map_err(|e| load_error(e, timeout))?;

            let tree = tab
                .call_method(Page::GetFrameTree(None))
                .map_err(|e| BrowserError::Page(format!("{:#}", e)))?;
            tab.call_method(Page::SetDocumentContent {
                frame_id: tree.frame_tree.frame.id,
                html,
            })
            .map_err(|e| BrowserError::Page(format!("{:#}", e)))?;

            wait_for_network_idle(&tab, deadline, timeout)
        })
        .await
    }

    async fn print_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError> {
        let tab = Arc::clone(&self.tab);
        let options = options.to_cdp();
        tokio::task::spawn_blocking(move || {
            tab.print_to_pdf(Some(options))
                .map_err(|e| BrowserError::Render(format!("{:#}", e)))
        })
        .await?
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        let tab = Arc::clone(&self.tab);
        let closed = tokio::task::spawn_blocking(move || {
            let result = tab.close(true).map(|_| ());
            drop(browser);
            result
        })
        .await?;

        closed.map_err(|e| BrowserError::Close(format!("{:#}", e)))
    }
}

/// Runs a blocking load step, giving up shortly after its own deadline.
async fn run_bounded<F>(timeout: Duration, f: F) -> Result<(), BrowserError>
where
    F: FnOnce() -> Result<(), BrowserError> + Send + 'static,
{
    match tokio::time::timeout(timeout + LOAD_GRACE, tokio::task::spawn_blocking(f)).await {
        Ok(joined) => joined?,
        Err(_) => Err(BrowserError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Sorts a CDP load failure into timeout, navigation failure or a broken
/// page. Only failures the engine attributes to the target are navigation
/// failures; a dead connection or crashed tab is an engine fault.
fn load_error(err: anyhow::Error, timeout: Duration) -> BrowserError {
    let message = format!("{:#}", err);
    let lower = message.to_ascii_lowercase();
    if lower.contains("never came") || lower.contains("timeout") || lower.contains("timed out") {
        BrowserError::Timeout(timeout.as_millis() as u64)
    } else if message.contains("net::ERR") || message.contains("Navigate failed") {
        BrowserError::Navigation(message)
    } else {
        BrowserError::Page(message)
    }
}

fn is_connection_lost(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("connection is closed") || lower.contains("target closed")
}

/// Blocks until the document is complete and no resource has finished
/// loading for [`IDLE_WINDOW`], or fails once `deadline` passes.
///
/// Completed resource entries stand in for network activity; a single slow
/// request with nothing else in flight can end the wait early.
fn wait_for_network_idle(tab: &Tab, deadline: Instant, timeout: Duration) -> Result<(), BrowserError> {
    wait_until_idle(deadline, timeout, || {
        let result = tab.evaluate(RESOURCE_PROBE, false)?;
        Ok(result.value.and_then(|v| v.as_i64()).unwrap_or(-1))
    })
}

/// Polls `probe` for a resource count (negative while loading) until it
/// holds still for [`IDLE_WINDOW`].
fn wait_until_idle<F>(deadline: Instant, timeout: Duration, mut probe: F) -> Result<(), BrowserError>
where
    F: FnMut() -> anyhow::Result<i64>,
{
    let mut last_count: Option<i64> = None;
    let mut quiet_since = Instant::now();
    let mut failures = 0;

    loop {
        let count = match probe() {
            Ok(count) => {
                failures = 0;
                count
            }
            Err(e) => {
                let message = format!("{:#}", e);
                failures += 1;
                if is_connection_lost(&message) || failures >= MAX_PROBE_FAILURES {
                    warn!(failures, error = %message, "Page stopped answering");
                    return Err(BrowserError::Page(message));
                }
                -1
            }
        };

        let now = Instant::now();
        if count < 0 || last_count != Some(count) {
            last_count = Some(count);
            quiet_since = now;
        } else if now.duration_since(quiet_since) >= IDLE_WINDOW {
            debug!(resources = count, "Network idle");
            return Ok(());
        }

        if now >= deadline {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Page did not settle before deadline"
            );
            return Err(BrowserError::Timeout(timeout.as_millis() as u64));
        }
        std::thread::sleep(IDLE_POLL_INTERVAL);
    }
}
