//! Configuration system for paperwatch.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! environment. Configuration is loaded from
//! `~/.config/paperwatch/config.toml` and/or an explicit `--config` path;
//! environment variables use the `PAPERWATCH_` prefix with `__` section
//! separators (e.g. `PAPERWATCH_DOWNLOAD__CONCURRENCY=8`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for one paperwatch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Category prefix allowlist; an entry belongs to the digest when its
    /// primary category starts with any of these.
    pub categories: Vec<String>,
    pub fallback: FallbackMode,
    pub api: ApiConfig,
    pub fetch: FetchConfig,
    pub window: WindowConfig,
    pub download: DownloadConfig,
    pub pdf_scan: PdfScanConfig,
    /// Organization table: name -> match patterns + targeted search terms.
    pub organizations: BTreeMap<String, OrgRules>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            categories: vec!["cs.".to_string()],
            fallback: FallbackMode::default(),
            api: ApiConfig::default(),
            fetch: FetchConfig::default(),
            window: WindowConfig::default(),
            download: DownloadConfig::default(),
            pdf_scan: PdfScanConfig::default(),
            organizations: BTreeMap::new(),
        }
    }
}

/// Per-organization classification and search configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgRules {
    /// Case-insensitive regex patterns matched against entry metadata.
    pub patterns: Vec<String>,
    /// Free-text terms for the targeted fill-in search; an organization
    /// with no terms is never searched.
    #[serde(default)]
    pub search_terms: Vec<String>,
}

/// When to run per-organization targeted searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackMode {
    /// Search only organizations whose baseline bucket came up empty.
    #[default]
    FillMissing,
    /// Search every configured organization and merge with the baseline.
    Always,
    /// Search all organizations only if the baseline produced nothing.
    NoneUnlessEmpty,
}

/// Transport configuration for the upstream search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoints tried in order; the first is the primary.
    pub endpoints: Vec<String>,
    pub user_agent: String,
    /// Retries per endpoint on transient failures (429/5xx, transport).
    pub retry_total: u32,
    /// Exponential backoff base in seconds (`backoff * 2^attempt`).
    pub retry_backoff_secs: f64,
    /// Pause before failing over to the next endpoint.
    pub endpoint_pause_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Explicit proxy URL; takes precedence over environment proxies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// When false and no explicit proxy is set, ambient HTTP(S)_PROXY
    /// variables are ignored.
    pub respect_env_proxies: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://export.arxiv.org/api/query".to_string(),
                "http://export.arxiv.org/api/query".to_string(),
            ],
            user_agent: format!("paperwatch/{}", env!("CARGO_PKG_VERSION")),
            retry_total: 3,
            retry_backoff_secs: 0.5,
            endpoint_pause_ms: 500,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            proxy_url: None,
            respect_env_proxies: true,
        }
    }
}

/// Baseline feed strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// One bounded, paginated query per CS subcategory. Spreads load and
    /// avoids upstream pagination limits.
    #[default]
    Sharded,
    /// One broad category query. Simpler, more prone to rate limiting.
    Single,
}

/// Feed pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub strategy: FetchStrategy,
    /// Subcategories iterated by the sharded strategy.
    pub shards: Vec<String>,
    /// Broad query used by the single strategy and as the category filter
    /// of targeted searches.
    pub category_query: String,
    pub max_pages: usize,
    /// Entries per page; the upstream API caps this at 200.
    pub page_size: usize,
    pub search_max_pages: usize,
    pub search_page_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::Sharded,
            shards: [
                "cs.AI", "cs.CL", "cs.CV", "cs.LG", "cs.CR", "cs.DC", "cs.DB", "cs.IR", "cs.NE",
                "cs.RO", "cs.SE", "cs.SI",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            category_query: "cat:cs.*".to_string(),
            max_pages: 5,
            page_size: 200,
            search_max_pages: 3,
            search_page_size: 200,
        }
    }
}

/// Time-window configuration for the "previous local day" computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// IANA timezone name the digest day is anchored to.
    pub timezone: String,
    /// Hours both window bounds are shifted forward. The upstream system
    /// publishes near its own day boundary, so a naive local-midnight
    /// window clips the batch.
    pub skew_hours: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".to_string(),
            skew_hours: 8,
        }
    }
}

impl WindowConfig {
    /// Resolve the configured timezone name.
    pub fn timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::UnknownTimezone {
                name: self.timezone.clone(),
            })
    }
}

/// PDF retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory; one date-stamped subdirectory is created per run.
    pub out_dir: PathBuf,
    /// Maximum concurrent downloads within one organization's batch.
    pub concurrency: usize,
    /// Optional cap on entries processed per organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_per_org: Option<usize>,
    /// Report intended downloads without any network or filesystem I/O.
    pub dry_run: bool,
    /// Base URL the candidate PDF URLs are templated from.
    pub pdf_base_url: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("papers"),
            concurrency: 4,
            limit_per_org: None,
            dry_run: false,
            pdf_base_url: "https://arxiv.org/pdf".to_string(),
        }
    }
}

/// Affiliation-extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfScanConfig {
    /// Leading pages scanned for the author/affiliation block.
    pub max_pages: usize,
}

impl Default for PdfScanConfig {
    fn default() -> Self {
        Self { max_pages: 2 }
    }
}

impl WatchConfig {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.endpoints.is_empty() {
            return Err(ConfigError::Invalid {
                field: "api.endpoints".into(),
                message: "at least one endpoint is required".into(),
            });
        }
        if self.fetch.page_size == 0 || self.fetch.page_size > 200 {
            return Err(ConfigError::Invalid {
                field: "fetch.page_size".into(),
                message: format!("{} is outside 1..=200", self.fetch.page_size),
            });
        }
        if self.fetch.search_page_size == 0 || self.fetch.search_page_size > 200 {
            return Err(ConfigError::Invalid {
                field: "fetch.search_page_size".into(),
                message: format!("{} is outside 1..=200", self.fetch.search_page_size),
            });
        }
        if self.download.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "download.concurrency".into(),
                message: "concurrency must be at least 1".into(),
            });
        }
        self.window.timezone()?;
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `PAPERWATCH_`)
/// 2. Explicit config file (when given; missing is an error)
/// 3. User config (`~/.config/paperwatch/config.toml`)
/// 4. Built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<WatchConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(WatchConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "paperwatch", "paperwatch") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::Invalid {
                field: "config".into(),
                message: format!("file not found: {}", path.display()),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("PAPERWATCH_").split("__"));

    let config: WatchConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
