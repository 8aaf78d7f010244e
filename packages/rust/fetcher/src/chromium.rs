//! Headless Chromium renderer.
//!
//! Every call launches its own browser with a throwaway profile, renders the
//! page, scrolls it to trigger lazy content, reads `innerText` from the body
//! and from every same-origin frame, then tears the session down.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use joblens_shared::{FetcherConfig, JobLensError, Result};
use tracing::{debug, instrument, warn};

use crate::{PageRenderer, guard};

/// Body text followed by the body text of each frame whose document is
/// reachable from this one (cross-origin frames throw and are skipped).
const EXTRACT_TEXT_JS: &str = r#"(() => {
  const parts = [];
  const main = document.body ? document.body.innerText : "";
  if (main && main.trim()) parts.push(main.trim());
  for (const frame of document.querySelectorAll("iframe, frame")) {
    try {
      const doc = frame.contentDocument;
      const text = doc && doc.body ? doc.body.innerText : "";
      if (text && text.trim()) parts.push(text.trim());
    } catch (_) {}
  }
  return parts.join("\n\n");
})()"#;

const SCROLL_JS: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0); true";

pub struct ChromiumRenderer {
    config: FetcherConfig,
}

impl ChromiumRenderer {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, profile: PathBuf) -> Result<BrowserConfig> {
        let (width, height) = self.config.viewport;
        BrowserConfig::builder()
            .window_size(width, height)
            .viewport(None)
            .user_data_dir(profile)
            .request_timeout(self.config.navigation_timeout)
            .arg(format!("--user-agent={}", self.config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(JobLensError::Render)
    }

    async fn scroll_and_extract(&self, page: &Page, url: &str) -> Result<String> {
        page.goto(url)
            .await
            .map_err(|e| JobLensError::Render(format!("{url}: navigation failed: {e}")))?;

        // Redirects happen inside the browser; vet where the page ended up.
        let landed = page
            .url()
            .await
            .map_err(|e| JobLensError::Render(format!("{url}: final URL unavailable: {e}")))?;
        if let Some(landed) = landed.filter(|l| l.as_str() != url) {
            if let Err(reason) = guard::check_target(&landed, self.config.allow_private_hosts) {
                return Err(JobLensError::Render(format!(
                    "{url}: redirected to {landed}: {reason}"
                )));
            }
        }

        for cycle in 1..=self.config.scroll_cycles {
            if let Err(e) = page.evaluate(SCROLL_JS).await {
                debug!(cycle, error = %e, "scroll failed");
                break;
            }
            tokio::time::sleep(self.config.scroll_wait).await;
        }

        page.evaluate(EXTRACT_TEXT_JS)
            .await
            .map_err(|e| JobLensError::Render(format!("{url}: text extraction failed: {e}")))?
            .into_value::<String>()
            .map_err(|e| JobLensError::Render(format!("{url}: unexpected extraction result: {e}")))
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    fn name(&self) -> &'static str {
        "chromium"
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn render_text(&self, url: &str) -> Result<String> {
        let profile = std::env::temp_dir().join(format!("joblens-chromium-{}", uuid::Uuid::now_v7()));
        let config = self.browser_config(profile.clone())?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| JobLensError::Render(format!("failed to launch browser: {e}")))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        // Navigation, scrolling and extraction share one deadline on top of
        // the per-request CDP timeout.
        let deadline = self.config.navigation_timeout
            + self.config.scroll_wait * (self.config.scroll_cycles + 1);

        let outcome = match browser.new_page("about:blank").await {
            Ok(page) => {
                let text = tokio::time::timeout(deadline, self.scroll_and_extract(&page, url))
                    .await
                    .unwrap_or_else(|_| {
                        Err(JobLensError::Render(format!("{url}: timed out after {deadline:?}")))
                    });
                if let Err(e) = page.close().await {
                    debug!(error = %e, "page close failed");
                }
                text
            }
            Err(e) => Err(JobLensError::Render(format!("failed to open page: {e}"))),
        };

        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        let _ = browser.wait().await;
        events.abort();
        let _ = std::fs::remove_dir_all(&profile);

        outcome
    }
}
