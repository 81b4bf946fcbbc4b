use thiserror::Error;

// ── Fetch ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    HttpStatus(u16),
    Network,
}

/// Raised by the fetcher once its retries are spent (or immediately for a
/// non-transient status).
#[derive(Debug, Clone, Error)]
#[error("fetch {url} failed after {attempts} attempt(s): {last_cause}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub attempts: u32,
    pub last_cause: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, last_cause: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            attempts: 1,
            last_cause: last_cause.into(),
        }
    }

    pub fn from_reqwest(url: &str, e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FetchErrorKind::Timeout
        } else if let Some(status) = e.status() {
            FetchErrorKind::HttpStatus(status.as_u16())
        } else {
            FetchErrorKind::Network
        };
        Self::new(kind, url, e.to_string())
    }

    /// Timeouts and connection failures are always transient; a status is
    /// transient only if it is in `retry_statuses`.
    pub fn is_transient(&self, retry_statuses: &[u16]) -> bool {
        match self.kind {
            FetchErrorKind::Timeout | FetchErrorKind::Network => true,
            FetchErrorKind::HttpStatus(code) => retry_statuses.contains(&code),
        }
    }
}

// ── Selection ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoMatch {
    #[error("no candidate tables on the page")]
    NoCandidates,
    #[error("best candidate scored {best} of {tokens} expected tokens (minimum {min_score})")]
    BelowMinimum {
        best: usize,
        tokens: usize,
        min_score: usize,
    },
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Configuration mistakes detected when a schema is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("derivation '{derivation}' references unknown column '{column}'")]
    UnknownColumn { derivation: String, column: String },
    #[error("derivation '{derivation}' reads '{column}', which is derived at or after it")]
    DerivedTooLate { derivation: String, column: String },
    #[error("column '{0}' is declared twice")]
    DuplicateColumn(String),
    #[error("identity key column '{0}' is not in the schema")]
    UnknownIdentityColumn(String),
}

// ── Collection ────────────────────────────────────────────────────────────────

/// Per-endpoint failure, contained by the collector.
#[derive(Debug, Clone, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url}: {source}")]
    NoMatch { url: String, source: NoMatch },
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("all {endpoints} endpoint(s) failed; last error: {last}")]
    Exhausted { endpoints: usize, last: EndpointError },
    #[error("no endpoints configured")]
    NoEndpoints,
}
