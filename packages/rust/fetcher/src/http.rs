//! Static renderer: plain HTTP GET plus DOM text extraction.
//!
//! No script execution, so client-rendered boards come back thin. Useful
//! where no Chromium binary is available and for server-rendered postings.

use async_trait::async_trait;
use joblens_shared::{FetcherConfig, JobLensError, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::{FRAME_SEPARATOR, PageRenderer, guard};

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe",
];

/// Frames fetched per page at most.
const MAX_FRAMES: usize = 5;

const MAX_REDIRECTS: usize = 5;

pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(guarded_redirects(config.allow_private_hosts))
            .timeout(config.navigation_timeout)
            .build()
            .map_err(|e| JobLensError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn get_html(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| JobLensError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobLensError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| JobLensError::Network(format!("{url}: body read failed: {e}")))
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn render_text(&self, url: &str) -> Result<String> {
        let url = Url::parse(url).map_err(|e| JobLensError::Render(format!("{url}: {e}")))?;

        let html = self.get_html(&url).await?;
        let (text, frames) = parse_page(&html, &url);

        let mut parts = vec![text];
        for frame in frames {
            match self.get_html(&frame).await {
                Ok(frame_html) => parts.push(parse_page(&frame_html, &frame).0),
                Err(e) => debug!(frame = %frame, error = %e, "frame skipped"),
            }
        }

        parts.retain(|p| !p.is_empty());
        Ok(parts.join(FRAME_SEPARATOR))
    }
}

/// Redirect policy that applies the target guard to every hop.
fn guarded_redirects(allow_private_hosts: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let refused = guard::check_target(attempt.url().as_str(), allow_private_hosts)
            .err()
            .map(|reason| format!("redirect to {} refused: {reason}", attempt.url()));
        match refused {
            Some(message) => attempt.error(message),
            None => attempt.follow(),
        }
    })
}

/// Visible text of the page and its same-origin frame URLs.
///
/// Kept synchronous: `Html` is not `Send` and must be dropped before the
/// next await.
fn parse_page(html: &str, base: &Url) -> (String, Vec<Url>) {
    let doc = Html::parse_document(html);
    let text = visible_text_of(&doc);

    let Ok(iframe_sel) = Selector::parse("iframe[src]") else {
        return (text, Vec::new());
    };
    let frames = doc
        .select(&iframe_sel)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| base.join(src.trim()).ok())
        .filter(|frame| frame.origin() == base.origin())
        .take(MAX_FRAMES)
        .collect();

    (text, frames)
}

/// Visible text of an HTML document, one line per text run.
pub fn visible_text(html: &str) -> String {
    visible_text_of(&Html::parse_document(html))
}

fn visible_text_of(doc: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element());

    let mut lines = Vec::new();
    collect_text(body, &mut lines);
    lines.join("\n")
}

fn collect_text(el: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let run = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !run.is_empty() {
                lines.push(run);
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !HIDDEN_ELEMENTS.contains(&child_el.value().name()) {
                collect_text(child_el, lines);
            }
        }
    }
}
