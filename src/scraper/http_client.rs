use crate::config::FetchConfig;
use crate::errors::{FetchError, FetchErrorKind};
use crate::models::RawDocument;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use super::DocumentSource;

pub struct HttpClient {
    inner: reqwest::Client,
    config: FetchConfig,
}

impl HttpClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL, retrying transient failures with exponential backoff.
    pub async fn get_document(&self, url: &str) -> Result<RawDocument, FetchError> {
        with_retries(&self.config, |attempt| self.attempt(url, attempt)).await
    }

    async fn attempt(&self, url: &str, attempt: u32) -> Result<RawDocument, FetchError> {
        debug!("GET {} (attempt {})", url, attempt);

        let tag = |mut e: FetchError| {
            e.attempts = attempt;
            e
        };

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| tag(FetchError::from_reqwest(url, &e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(tag(FetchError::new(
                FetchErrorKind::HttpStatus(status.as_u16()),
                url,
                format!("HTTP {}", status),
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| tag(FetchError::from_reqwest(url, &e)))?;

        Ok(RawDocument::new(url, body))
    }
}

#[async_trait]
impl DocumentSource for HttpClient {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        self.get_document(url).await
    }
}

/// Runs `op` until it succeeds, fails non-transiently, or `max_retries`
/// attempts are spent. `op` receives the 1-based attempt number.
pub async fn with_retries<T, F, Fut>(cfg: &FetchConfig, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let strategy = backoff_schedule(cfg.max_retries, cfg.backoff_base, cfg.jitter_max);

    let mut attempt = 0u32;
    let action = move || {
        attempt += 1;
        op(attempt)
    };
    let retry_if = |e: &FetchError| {
        let transient = e.is_transient(&cfg.retry_statuses);
        if transient && e.attempts < cfg.max_retries {
            warn!("{} (attempt {}/{}), backing off", e, e.attempts, cfg.max_retries);
        }
        transient
    };

    RetryIf::spawn(strategy, action, retry_if).await
}

/// Delay after attempt `i` (0-indexed): `base^i + uniform(0, jitter_max)` seconds.
pub fn backoff_delay(attempt: u32, base: f64, jitter_max: f64) -> Duration {
    let exp = base.powi(attempt as i32);
    let jitter = rand::random::<f64>() * jitter_max;
    Duration::from_secs_f64((exp + jitter).max(0.0))
}

/// One delay per retry; `max_attempts` total attempts means one fewer sleeps.
/// Jitter is drawn lazily, per sleep.
pub fn backoff_schedule(
    max_attempts: u32,
    base: f64,
    jitter_max: f64,
) -> impl Iterator<Item = Duration> {
    (0..max_attempts.saturating_sub(1)).map(move |i| backoff_delay(i, base, jitter_max))
}
