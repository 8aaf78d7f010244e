//! Link normalization and rendered-text fetching.
//!
//! This crate provides:
//! - [`LinkNormalizer`]: canonical job links (apply-flow suffixes stripped)
//! - [`PageRenderer`]: "render this URL, give me its visible text"
//! - [`ChromiumRenderer`] / [`HttpRenderer`]: headless-browser and static backends
//! - [`ContentFetcher`]: fail-soft wrapper the pipeline calls

mod chromium;
mod guard;
mod http;
mod normalize;

use std::sync::Arc;

use async_trait::async_trait;
use joblens_shared::{FetcherConfig, RendererKind, Result};
use tracing::{debug, instrument, warn};

pub use chromium::ChromiumRenderer;
pub use http::{HttpRenderer, visible_text};
pub use normalize::LinkNormalizer;

/// Blank line placed between the main document and each frame's text.
pub const FRAME_SEPARATOR: &str = "\n\n";

/// Produces the visible text of a page, frames included.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn render_text(&self, url: &str) -> Result<String>;
}

/// Build the renderer selected in configuration.
pub fn renderer_from_config(config: &FetcherConfig) -> Result<Arc<dyn PageRenderer>> {
    Ok(match config.renderer {
        RendererKind::Chromium => Arc::new(ChromiumRenderer::new(config.clone())),
        RendererKind::Http => Arc::new(HttpRenderer::new(config)?),
    })
}

/// Fail-soft page text source: every failure becomes an empty string.
#[derive(Clone)]
pub struct ContentFetcher {
    renderer: Arc<dyn PageRenderer>,
    allow_private_hosts: bool,
}

impl ContentFetcher {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            renderer,
            allow_private_hosts: false,
        }
    }

    /// Allow loopback/private targets (for tests against local mock servers).
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }

    /// Rendered visible text of `url`, or `""` if anything goes wrong.
    #[instrument(skip_all, fields(url = %url, renderer = self.renderer.name()))]
    pub async fn fetch(&self, url: &str) -> String {
        if let Err(reason) = guard::check_target(url, self.allow_private_hosts) {
            warn!(reason, "refusing to render link");
            return String::new();
        }

        match self.renderer.render_text(url).await {
            Ok(text) => {
                let text = text.trim().to_string();
                debug!(chars = text.chars().count(), "page text fetched");
                text
            }
            Err(e) => {
                warn!(error = %e, "page fetch failed, continuing without content");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use joblens_shared::JobLensError;

    use super::*;

    struct Scripted {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageRenderer for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn render_text(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| JobLensError::Render("navigation timed out".into()))
        }
    }

    fn scripted(reply: Option<&'static str>) -> Arc<Scripted> {
        Arc::new(Scripted {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn fetch_trims_rendered_text() {
        let renderer = scripted(Some("  Senior Rust Engineer\n\nRemote  "));
        let fetcher = ContentFetcher::new(renderer.clone());
        assert_eq!(
            fetcher.fetch("https://jobs.example.com/1").await,
            "Senior Rust Engineer\n\nRemote"
        );
    }

    #[tokio::test]
    async fn render_failure_degrades_to_empty_text() {
        let renderer = scripted(None);
        let fetcher = ContentFetcher::new(renderer.clone());
        assert_eq!(fetcher.fetch("https://jobs.example.com/1").await, "");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsafe_targets_are_not_rendered() {
        let renderer = scripted(Some("secret"));
        let fetcher = ContentFetcher::new(renderer.clone());

        assert_eq!(fetcher.fetch("file:///etc/passwd").await, "");
        assert_eq!(fetcher.fetch("http://192.168.1.1/admin").await, "");
        assert_eq!(fetcher.fetch("not a url").await, "");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn private_hosts_allowed_when_opted_in() {
        let renderer = scripted(Some("local page"));
        let fetcher = ContentFetcher::new(renderer.clone()).allow_private_hosts();
        assert_eq!(fetcher.fetch("http://127.0.0.1:8080/job").await, "local page");
    }
}
