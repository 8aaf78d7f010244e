//! Canonical form of job links.
//!
//! Apply-flow pages (`/apply`, `/apply/step1`, proxy redirect forms) rarely
//! carry the job description, so the canonical link points at the posting
//! itself. Query strings and fragments are dropped so repeated runs fetch the
//! same target.

use joblens_shared::FetcherConfig;
use url::Url;

/// Strips apply-flow suffixes, queries and fragments from job links.
#[derive(Debug, Clone, Default)]
pub struct LinkNormalizer {
    apply_proxy_domains: Vec<String>,
}

impl LinkNormalizer {
    pub fn new(apply_proxy_domains: Vec<String>) -> Self {
        Self {
            apply_proxy_domains: apply_proxy_domains
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Canonicalize `raw`. Anything that is not an absolute http(s) URL is
    /// returned unchanged so the fetch step can fail on it instead.
    pub fn normalize(&self, raw: &str) -> String {
        let Ok(url) = Url::parse(raw.trim()) else {
            return raw.to_string();
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return raw.to_string();
        }

        let path = if self.is_apply_proxy(&url) {
            truncate_at_segment(url.path(), |segment| segment.starts_with("apply"))
        } else {
            truncate_at_segment(url.path(), |segment| segment == "apply")
        };

        format!("{}{}", url.origin().ascii_serialization(), path)
    }

    fn is_apply_proxy(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.apply_proxy_domains
            .iter()
            .any(|domain| host.contains(domain.as_str()))
    }
}

impl From<&FetcherConfig> for LinkNormalizer {
    fn from(config: &FetcherConfig) -> Self {
        Self::new(config.apply_proxy_domains.clone())
    }
}

/// Cut `path` just before the first segment matching `is_apply` (compared lowercase).
fn truncate_at_segment(path: &str, is_apply: impl Fn(&str) -> bool) -> &str {
    for (slash, _) in path.match_indices('/') {
        let segment = path[slash + 1..].split('/').next().unwrap_or_default();
        if is_apply(&segment.to_ascii_lowercase()) {
            return if slash == 0 { "/" } else { &path[..slash] };
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> LinkNormalizer {
        LinkNormalizer::new(vec!["applytojob.com".into(), "click.appcast.io".into()])
    }

    #[test]
    fn apply_proxy_host_drops_apply_form_and_query() {
        assert_eq!(
            normalizer().normalize("https://boards.applytojob.com/company/abc123/apply?ref=x"),
            "https://boards.applytojob.com/company/abc123"
        );
    }

    #[test]
    fn apply_proxy_host_matches_apply_prefixed_segments() {
        assert_eq!(
            normalizer().normalize("https://boards.applytojob.com/company/abc123/applynow"),
            "https://boards.applytojob.com/company/abc123"
        );
    }

    #[test]
    fn apply_segment_truncates_path() {
        assert_eq!(
            normalizer().normalize("https://jobs.example.com/posting/42/apply/step1"),
            "https://jobs.example.com/posting/42"
        );
        assert_eq!(
            normalizer().normalize("https://jobs.example.com/posting/42/Apply"),
            "https://jobs.example.com/posting/42"
        );
    }

    #[test]
    fn query_and_fragment_are_dropped() {
        assert_eq!(
            normalizer().normalize("https://jobs.example.com/posting/42?utm=y"),
            "https://jobs.example.com/posting/42"
        );
        assert_eq!(
            normalizer().normalize("https://jobs.example.com/posting/42#details"),
            "https://jobs.example.com/posting/42"
        );
    }

    #[test]
    fn only_exact_apply_segment_counts_on_regular_hosts() {
        assert_eq!(
            normalizer().normalize("https://jobs.example.com/applications/7"),
            "https://jobs.example.com/applications/7"
        );
    }

    #[test]
    fn port_is_kept() {
        assert_eq!(
            normalizer().normalize("http://localhost:3000/job/9/apply"),
            "http://localhost:3000/job/9"
        );
    }

    #[test]
    fn malformed_links_pass_through() {
        assert_eq!(normalizer().normalize("x.com/job/1"), "x.com/job/1");
        assert_eq!(normalizer().normalize("not a url"), "not a url");
        assert_eq!(
            normalizer().normalize("mailto:jobs@example.com"),
            "mailto:jobs@example.com"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = normalizer();
        for raw in [
            "https://boards.applytojob.com/company/abc123/apply?ref=x",
            "https://jobs.example.com/posting/42/apply/step1",
            "https://jobs.example.com/",
        ] {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once);
        }
    }
}
