//! Application configuration for JobLens.
//!
//! User config lives at `~/.joblens/joblens.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{JobLensError, Result};
use crate::retry::{Backoff, RetryPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "joblens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".joblens";

/// Desktop Chrome identity used for rendering sessions.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Accepted shape of a classification service key.
static API_KEY_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9_\-]{16,}$").expect("valid key regex"));

// ---------------------------------------------------------------------------
// Config structs (matching joblens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Classification service settings.
    #[serde(default)]
    pub classifier: ClassifierSection,

    /// Page rendering settings.
    #[serde(default)]
    pub fetcher: FetcherSection,

    /// Table persistence settings.
    #[serde(default)]
    pub storage: StorageSection,

    /// HTTP trigger settings.
    #[serde(default)]
    pub server: ServerSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory analysis results are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Pause between rows, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Page text budget handed to the classifier.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Persist the table after every N rows (1 = after every row).
    #[serde(default = "default_persist_every")]
    pub persist_every: usize,

    /// Value written to the `Status` column of every analyzed row.
    #[serde(default = "default_status_marker")]
    pub status_marker: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pacing_ms: default_pacing_ms(),
            max_content_chars: default_max_content_chars(),
            persist_every: default_persist_every(),
            status_marker: default_status_marker(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}
fn default_pacing_ms() -> u64 {
    1_000
}
fn default_max_content_chars() -> usize {
    12_000
}
fn default_persist_every() -> usize {
    1
}
fn default_status_marker() -> String {
    "Not Applied".into()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSection {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model ID.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,

    /// Attempt ceiling per row.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles on each subsequent attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_classifier_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_classifier_timeout() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1_000
}

/// Which rendering backend produces page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Headless Chromium via the DevTools protocol.
    Chromium,
    /// Plain HTTP fetch with static HTML text extraction.
    Http,
}

/// `[fetcher]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherSection {
    #[serde(default = "default_renderer")]
    pub renderer: RendererKind,

    /// Navigation budget in seconds. Job boards often render late.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Scroll-and-wait cycles after load.
    #[serde(default = "default_scroll_cycles")]
    pub scroll_cycles: u32,

    /// Wait after each scroll, in milliseconds.
    #[serde(default = "default_scroll_wait_ms")]
    pub scroll_wait_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Hosts that proxy the application flow; matched by substring.
    #[serde(default = "default_apply_proxy_domains")]
    pub apply_proxy_domains: Vec<String>,
}

impl Default for FetcherSection {
    fn default() -> Self {
        Self {
            renderer: default_renderer(),
            navigation_timeout_secs: default_navigation_timeout(),
            scroll_cycles: default_scroll_cycles(),
            scroll_wait_ms: default_scroll_wait_ms(),
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            apply_proxy_domains: default_apply_proxy_domains(),
        }
    }
}

fn default_renderer() -> RendererKind {
    RendererKind::Chromium
}
fn default_navigation_timeout() -> u64 {
    60
}
fn default_scroll_cycles() -> u32 {
    3
}
fn default_scroll_wait_ms() -> u64 {
    1_500
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_viewport_width() -> u32 {
    1366
}
fn default_viewport_height() -> u32 {
    900
}
fn default_apply_proxy_domains() -> Vec<String> {
    vec![
        "applytojob.com".into(),
        "click.appcast.io".into(),
        "jobs.jobvite.com".into(),
    ]
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Save attempts before reporting the output file as busy.
    #[serde(default = "default_save_attempts")]
    pub save_attempts: u32,

    /// Delay step between save attempts; attempt N waits N steps.
    #[serde(default = "default_save_retry_step_ms")]
    pub save_retry_step_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            save_attempts: default_save_attempts(),
            save_retry_step_ms: default_save_retry_step_ms(),
        }
    }
}

fn default_save_attempts() -> u32 {
    5
}
fn default_save_retry_step_ms() -> u64 {
    1_000
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Listen address for `joblens serve`.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory holding one `<company>.csv` link table per company.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            input_dir: default_input_dir(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}
fn default_input_dir() -> String {
    "input".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime rendering configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub renderer: RendererKind,
    pub navigation_timeout: Duration,
    pub scroll_cycles: u32,
    pub scroll_wait: Duration,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub apply_proxy_domains: Vec<String>,
    /// Follow redirects into loopback/private hosts. Off outside tests.
    pub allow_private_hosts: bool,
}

impl From<&AppConfig> for FetcherConfig {
    fn from(config: &AppConfig) -> Self {
        let f = &config.fetcher;
        Self {
            renderer: f.renderer,
            navigation_timeout: Duration::from_secs(f.navigation_timeout_secs),
            scroll_cycles: f.scroll_cycles,
            scroll_wait: Duration::from_millis(f.scroll_wait_ms),
            user_agent: f.user_agent.clone(),
            viewport: (f.viewport_width, f.viewport_height),
            apply_proxy_domains: f.apply_proxy_domains.clone(),
            allow_private_hosts: false,
        }
    }
}

/// Runtime classifier configuration. The key itself is resolved separately.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl From<&AppConfig> for ClassifierConfig {
    fn from(config: &AppConfig) -> Self {
        let c = &config.classifier;
        Self {
            base_url: c.base_url.trim_end_matches('/').to_string(),
            model: c.model.clone(),
            temperature: c.temperature,
            timeout: Duration::from_secs(c.timeout_secs),
            retry: RetryPolicy::new(
                c.max_attempts,
                Backoff::Exponential {
                    base: Duration::from_millis(c.backoff_base_ms),
                },
            ),
        }
    }
}

/// Runtime table store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub retry: RetryPolicy,
}

impl From<&AppConfig> for StoreConfig {
    fn from(config: &AppConfig) -> Self {
        let s = &config.storage;
        Self {
            retry: RetryPolicy::new(
                s.save_attempts,
                Backoff::Linear {
                    step: Duration::from_millis(s.save_retry_step_ms),
                },
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.joblens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| JobLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.joblens/joblens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JobLensError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| JobLensError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JobLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| JobLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JobLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Whether a credential has the shape the classification service accepts.
pub fn api_key_looks_valid(key: &str) -> bool {
    API_KEY_FORMAT.is_match(key.trim())
}

/// Resolve the classification key from the configured env var, if present.
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.classifier.api_key_env)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check that the API key env var is set and well-formed.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.classifier.api_key_env;
    match resolve_api_key(config) {
        Some(key) if api_key_looks_valid(&key) => Ok(key),
        Some(_) => Err(JobLensError::config(format!(
            "the value of {var_name} does not look like an API key (expected an `sk-` prefix)"
        ))),
        None => Err(JobLensError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("applytojob.com"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.persist_every, 1);
        assert_eq!(parsed.classifier.max_attempts, 3);
        assert_eq!(parsed.fetcher.renderer, RendererKind::Chromium);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[fetcher]
renderer = "http"
scroll_cycles = 0

[storage]
save_attempts = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.fetcher.renderer, RendererKind::Http);
        assert_eq!(config.fetcher.scroll_cycles, 0);
        assert_eq!(config.fetcher.navigation_timeout_secs, 60);
        assert_eq!(config.storage.save_attempts, 2);
        assert_eq!(config.defaults.status_marker, "Not Applied");
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();

        let classifier = ClassifierConfig::from(&app);
        assert_eq!(classifier.retry.max_attempts, 3);
        assert_eq!(classifier.retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(classifier.retry.delay_for(2), Duration::from_secs(2));

        let store = StoreConfig::from(&app);
        assert_eq!(store.retry.max_attempts, 5);
        assert_eq!(store.retry.delay_for(3), Duration::from_secs(3));

        let fetcher = FetcherConfig::from(&app);
        assert_eq!(fetcher.viewport, (1366, 900));
        assert!(!fetcher.allow_private_hosts);
    }

    #[test]
    fn api_key_format() {
        assert!(api_key_looks_valid("sk-abcdefghijklmnop1234"));
        assert!(api_key_looks_valid("sk-or-v1-0123456789abcdef"));
        assert!(!api_key_looks_valid(""));
        assert!(!api_key_looks_valid("sk-short"));
        assert!(!api_key_looks_valid("pk-abcdefghijklmnop1234"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.classifier.api_key_env = "JL_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
