pub mod cleaner;
pub mod http_client;
pub mod parsers;
pub mod selector;

use crate::errors::FetchError;
use crate::models::RawDocument;
use async_trait::async_trait;

pub use self::http_client::HttpClient;
pub use self::parsers::{AnchorSpec, CardField, CardSource, CardSpec, Extractor};
pub use self::selector::TokenSet;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable document source. `HttpClient` is the network implementation;
/// retries live behind this seam, so callers see one result per URL.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError>;
}
