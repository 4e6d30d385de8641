//! Browser automation seam.
//!
//! `ListingSource` is the only thing the extractor knows about the browser.
//! `ChromiumLauncher` is the production backend; tests script pages through
//! an in-memory source.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Flags for running Chromium in containers with a small /dev/shm.
const CHROME_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
];

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.4844.51 Safari/537.36";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Protocol(#[from] CdpError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Browser session already closed")]
    Closed,
}

/// What the page looks like right now.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// HTTP status of the last document response, when one was observed.
    pub status: Option<u16>,
    pub title: String,
    pub url: String,
    pub html: String,
}

/// One exclusively owned browser session.
#[async_trait]
pub trait ListingSource: Send {
    /// Navigates to `url` and waits for it to load, bounded by `timeout`.
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), SourceError>;

    async fn snapshot(&mut self) -> Result<PageSnapshot, SourceError>;

    /// Clicks the first element matching `selector`. `Ok(false)` when no
    /// element matches.
    async fn click(&mut self, selector: &str) -> Result<bool, SourceError>;

    /// Releases the session. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), SourceError>;
}

/// Opens browser sessions. Carried in `AppState` as `Arc<dyn SourceLauncher>`.
#[async_trait]
pub trait SourceLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn ListingSource>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub executable: Option<String>,
    pub user_agent: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Launches headless Chromium through the DevTools protocol.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SourceLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn ListingSource>, SourceError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .args(CHROME_ARGS.iter().copied());
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SourceError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {e}");
                    break;
                }
            }
        });
        info!("Browser launched");

        match open_page(&browser, &self.settings.user_agent).await {
            Ok((page, status, status_task)) => Ok(Box::new(ChromiumSource {
                browser: Some(browser),
                page,
                last_status: status,
                tasks: vec![handler_task, status_task],
            })),
            Err(e) => {
                // the browser process is already running; do not leak it
                if let Err(close_err) = browser.close().await {
                    warn!("Failed to close browser after page setup error: {close_err}");
                }
                if let Err(wait_err) = browser.wait().await {
                    warn!("Browser process did not exit cleanly: {wait_err}");
                }
                handler_task.abort();
                Err(e)
            }
        }
    }
}

async fn open_page(
    browser: &Browser,
    user_agent: &str,
) -> Result<(Page, Arc<AtomicU16>, JoinHandle<()>), SourceError> {
    let page = browser.new_page("about:blank").await?;
    page.set_user_agent(SetUserAgentOverrideParams::new(user_agent))
        .await?;

    // Record the status of the top-level document so an empty page can be
    // told apart from a throttled one. Subframes and subresources are ignored.
    let main_frame = page.mainframe().await?;
    let last_status = Arc::new(AtomicU16::new(0));
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let status = Arc::clone(&last_status);
    let status_task = tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            if let Some(code) = main_document_status(
                &event.r#type,
                event.frame_id.as_ref(),
                main_frame.as_ref(),
                event.response.status,
            ) {
                status.store(code, Ordering::Relaxed);
            }
        }
    });

    Ok((page, last_status, status_task))
}

/// Status of a response when it is the main frame's document, `None` for
/// everything else. Without a known main frame any document counts.
fn main_document_status(
    resource_type: &ResourceType,
    frame_id: Option<&FrameId>,
    main_frame: Option<&FrameId>,
    status: i64,
) -> Option<u16> {
    if *resource_type != ResourceType::Document {
        return None;
    }
    if let Some(main) = main_frame {
        if frame_id != Some(main) {
            return None;
        }
    }
    u16::try_from(status).ok()
}

pub struct ChromiumSource {
    browser: Option<Browser>,
    page: Page,
    last_status: Arc<AtomicU16>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChromiumSource {
    fn ensure_open(&self) -> Result<(), SourceError> {
        if self.browser.is_none() {
            return Err(SourceError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ListingSource for ChromiumSource {
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), SourceError> {
        self.ensure_open()?;
        // a new navigation must not report the previous document's status
        self.last_status.store(0, Ordering::Relaxed);
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| SourceError::Timeout(timeout))??;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, SourceError> {
        self.ensure_open()?;
        let title = self.page.get_title().await?.unwrap_or_default();
        let url = self.page.url().await?.unwrap_or_default();
        let html = self.page.content().await?;
        let status = match self.last_status.load(Ordering::Relaxed) {
            0 => None,
            code => Some(code),
        };
        Ok(PageSnapshot {
            status,
            title,
            url,
            html,
        })
    }

    async fn click(&mut self, selector: &str) -> Result<bool, SourceError> {
        self.ensure_open()?;
        let elements = self.page.find_elements(selector).await?;
        match elements.first() {
            Some(element) => {
                element.click().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        info!("Closing browser...");
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("Browser process did not exit cleanly: {e}");
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed?;
        info!("Browser closed");
        Ok(())
    }
}
