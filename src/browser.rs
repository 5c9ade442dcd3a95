use anyhow::{anyhow, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// How long to let client-side rendering settle after navigation.
const SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// A headless Chrome session shared by the export and share paths.
///
/// Owns the browser process and the CDP event handler task; dropping the
/// session without calling [`BrowserSession::close`] leaves the browser to
/// be reaped by its own process exit handling.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .build()
            .map_err(|e| anyhow!("Failed to create browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    // Only log if it's not a common websocket deserialization error
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Navigate a fresh page to `url` and wait for it to settle.
    pub async fn open(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create new page: {}", e))?;

        page.goto(url)
            .await
            .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow!("Failed to wait for navigation: {}", e))?;

        tokio::time::sleep(SETTLE_DELAY).await;

        Ok(page)
    }

    pub async fn close(mut self) {
        self.browser.close().await.ok();
        self.handler_task.abort();
    }
}
