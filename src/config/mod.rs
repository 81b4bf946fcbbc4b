use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration. Built once, then passed by
/// reference; nothing reads configuration from globals.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub collect: CollectConfig,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Total attempts per URL.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    #[serde(default = "default_jitter_max")]
    pub jitter_max: f64,

    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

/// Parallel per-record enrichment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_budget_secs")]
    pub budget_secs: f64,

    #[serde(default = "default_enrich_fetch")]
    pub fetch: FetchConfig,
}

/// Where and how results are persisted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_true")]
    pub write_json: bool,
}

/// Target record counts per task
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectConfig {
    #[serde(default = "default_headlines")]
    pub headlines: usize,

    #[serde(default = "default_table_rows")]
    pub indices: usize,

    #[serde(default = "default_table_rows")]
    pub mainboard: usize,

    #[serde(default = "default_universities")]
    pub universities: usize,

    #[serde(default = "default_listings")]
    pub listings: usize,

    /// Search phrase for the listings task
    #[serde(default = "default_listings_query")]
    pub listings_query: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}
fn default_timeout_secs() -> f64 {
    20.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base() -> f64 {
    1.6
}
fn default_jitter_max() -> f64 {
    0.4
}
fn default_retry_statuses() -> Vec<u16> {
    vec![403, 429, 502, 503, 504]
}
fn default_concurrency() -> usize {
    12
}
fn default_budget_secs() -> f64 {
    45.0
}
fn default_enrich_fetch() -> FetchConfig {
    FetchConfig {
        timeout_secs: 2.0,
        max_retries: 1,
        ..FetchConfig::default()
    }
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_true() -> bool {
    true
}
fn default_headlines() -> usize {
    30
}
fn default_table_rows() -> usize {
    500
}
fn default_universities() -> usize {
    50
}
fn default_listings() -> usize {
    20
}
fn default_listings_query() -> String {
    "iphone 15".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            jitter_max: default_jitter_max(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            budget_secs: default_budget_secs(),
            fetch: default_enrich_fetch(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
            write_json: true,
        }
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            headlines: default_headlines(),
            indices: default_table_rows(),
            mainboard: default_table_rows(),
            universities: default_universities(),
            listings: default_listings(),
            listings_query: default_listings_query(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl EnrichConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs_f64(self.budget_secs)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SCRAPE").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize()?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, f) in [("fetch", &self.fetch), ("enrich.fetch", &self.enrich.fetch)] {
            if f.max_retries == 0 {
                bail!("{name}.max_retries must be at least 1");
            }
            if !(f.timeout_secs.is_finite() && f.timeout_secs > 0.0) {
                bail!("{name}.timeout_secs must be a positive number");
            }
            if f.backoff_base < 1.0 || f.jitter_max < 0.0 {
                bail!("{name}: backoff_base must be >= 1 and jitter_max >= 0");
            }
        }
        if self.enrich.concurrency == 0 {
            bail!("enrich.concurrency must be at least 1");
        }
        if !(self.enrich.budget_secs.is_finite() && self.enrich.budget_secs > 0.0) {
            bail!("enrich.budget_secs must be a positive number");
        }
        // per-fetch timeout has to fit inside the budget
        if self.enrich.fetch.timeout_secs >= self.enrich.budget_secs {
            bail!(
                "enrich.fetch.timeout_secs ({}) must be shorter than enrich.budget_secs ({})",
                self.enrich.fetch.timeout_secs,
                self.enrich.budget_secs
            );
        }
        Ok(())
    }
}
