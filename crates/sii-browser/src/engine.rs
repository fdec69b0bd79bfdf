use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Browser automation engine owning one Chromium process.
///
/// `close` is the cancellation primitive for everything running against
/// this engine's pages: it is idempotent and safe to call at any time.
pub struct BrowserEngine {
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    fingerprint: FingerprintConfig,
}

impl BrowserEngine {
    /// Launch a headless browser with the standard fingerprint.
    ///
    /// # Errors
    /// Returns error if Chromium cannot be launched.
    pub async fn new() -> Result<Self> {
        Self::with_fingerprint(FingerprintConfig::standard()).await
    }

    /// Launch a headless browser with a specific fingerprint.
    ///
    /// # Errors
    /// Returns error if Chromium cannot be launched.
    pub async fn with_fingerprint(fingerprint: FingerprintConfig) -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .build()
            .map_err(BrowserError::Chromium)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            fingerprint,
        })
    }

    /// Open a new page with the engine's user agent applied.
    ///
    /// # Errors
    /// Returns [`BrowserError::Closed`] after `close`, or a chromium error.
    pub async fn new_page(&self) -> Result<Page> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(self.fingerprint.user_agent.clone())
            .build()
            .map_err(BrowserError::Chromium)?;
        page.execute(user_agent)
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        Ok(page)
    }

    /// All open pages of the browsing context.
    ///
    /// # Errors
    /// Returns [`BrowserError::Closed`] after `close`, or a chromium error.
    pub async fn pages(&self) -> Result<Vec<Page>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;

        browser
            .pages()
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))
    }

    /// Whether the engine still owns a live browser.
    pub async fn is_open(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// Close the browser and release all resources.
    ///
    /// Idempotent: calling it on an already-closed engine is a no-op.
    pub async fn close(&self) {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                tracing::debug!(error = %e, "browser close reported an error");
            }
            let _ = browser.wait().await;
        }

        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
    }

    /// The fingerprint this engine presents.
    #[must_use]
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }
}
