//! TOML configuration for the harvester.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! used against the production portal.
//!
//! ```toml
//! [db]
//! path = "./data/harvest.sqlite"
//!
//! [portal]
//! base_url = "https://info.tsinghua.edu.cn"
//! requests_per_second = 3.0
//!
//! [scrape]
//! interval_secs = 900
//! min_interval_secs = 600
//! max_pages = 10
//! mode = "detail"
//!
//! [encoding]
//! candidates = ["utf-8-sig", "gbk", "gb2312", "gb18030", "utf-8"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::Candidate;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_listing_page_path")]
    pub listing_page_path: String,
    #[serde(default = "default_listing_api_path")]
    pub listing_api_path: String,
    #[serde(default = "default_detail_api_path")]
    pub detail_api_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_page_path: default_listing_page_path(),
            listing_api_path: default_listing_api_path(),
            detail_api_path: default_detail_api_path(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl PortalConfig {
    /// Page visited once per session to collect cookies and the CSRF token.
    pub fn listing_page_url(&self) -> String {
        self.join(&self.listing_page_path)
    }

    pub fn listing_api_url(&self) -> String {
        self.join(&self.listing_api_path)
    }

    pub fn detail_api_url(&self) -> String {
        self.join(&self.detail_api_path)
    }

    /// Minimum spacing between two outbound requests.
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn default_base_url() -> String {
    "https://info.tsinghua.edu.cn".to_string()
}
fn default_listing_page_path() -> String {
    "/f/info/xxfb_fg/xnzx/template/more?lmid=all".to_string()
}
fn default_listing_api_path() -> String {
    "/b/info/xxfb_fg/xnzx/template/more".to_string()
}
fn default_detail_api_path() -> String {
    "/b/info/xxfb_fg/xnzx/template/detail".to_string()
}
fn default_user_agent() -> String {
    format!("InfoHarvest/{}", env!("CARGO_PKG_VERSION"))
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_requests_per_second() -> f64 {
    3.0
}

/// Which pipeline a scrape run uses per listed item.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    /// Fetch each detail page and run it through the extractor registry.
    #[default]
    Detail,
    /// Persist listing metadata only, with empty content.
    Listing,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_column_id")]
    pub column_id: String,
    #[serde(default)]
    pub mode: ScrapeMode,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            min_interval_secs: default_min_interval_secs(),
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            column_id: default_column_id(),
            mode: ScrapeMode::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn interval_ms(&self) -> i64 {
        (self.interval_secs as i64) * 1000
    }

    pub fn min_interval_ms(&self) -> i64 {
        (self.min_interval_secs as i64) * 1000
    }
}

fn default_interval_secs() -> u64 {
    15 * 60
}
fn default_min_interval_secs() -> u64 {
    10 * 60
}
fn default_max_pages() -> u32 {
    10
}
fn default_page_size() -> u32 {
    30
}
fn default_column_id() -> String {
    "all".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncodingConfig {
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
        }
    }
}

fn default_candidates() -> Vec<String> {
    ["utf-8-sig", "gbk", "gb2312", "gb18030", "utf-8"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/harvest.sqlite"),
            },
            portal: PortalConfig::default(),
            scrape: ScrapeConfig::default(),
            encoding: EncodingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if !(config.portal.requests_per_second > 0.0) {
        anyhow::bail!("portal.requests_per_second must be > 0");
    }
    if config.portal.timeout_secs == 0 {
        anyhow::bail!("portal.timeout_secs must be > 0");
    }
    if !config.portal.base_url.starts_with("http://")
        && !config.portal.base_url.starts_with("https://")
    {
        anyhow::bail!(
            "portal.base_url must be an http(s) URL, got '{}'",
            config.portal.base_url
        );
    }

    if config.scrape.max_pages == 0 {
        anyhow::bail!("scrape.max_pages must be >= 1");
    }
    if config.scrape.page_size == 0 {
        anyhow::bail!("scrape.page_size must be >= 1");
    }

    if config.encoding.candidates.is_empty() {
        anyhow::bail!("encoding.candidates must list at least one encoding");
    }
    for label in &config.encoding.candidates {
        Candidate::from_label(label)
            .with_context(|| format!("Invalid entry in encoding.candidates: '{}'", label))?;
    }

    Ok(config)
}
