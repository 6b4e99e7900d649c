//! Barcode lookup against a third-party product site.
//!
//! # Architecture
//!
//! ```text
//! barcode → page URL → Fetcher → raw HTML → PageExtractor → LookupResult
//! ```
//!
//! The batch loop only sees the [`Lookup`] trait, so the pattern-based
//! [`PageExtractor`] can be replaced without touching it.

mod config;
mod extractor;

pub use config::{LookupConfig, DEFAULT_BASE_URL};
pub use extractor::{strip_markup, PageExtractor};

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::app::Result;
use crate::domain::LookupResult;
use crate::fetcher::Fetcher;

/// Trait for barcode lookup implementations
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Look up a barcode.
    ///
    /// `Err` means the site could not be reached; a reachable page without a
    /// description is `Ok` with `description: None`.
    async fn lookup(&self, barcode: &str) -> Result<LookupResult>;
}

/// Scrapes the configured lookup site one barcode page at a time.
pub struct BarcodeLookupClient {
    config: LookupConfig,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    extractor: PageExtractor,
}

impl BarcodeLookupClient {
    pub fn new(config: LookupConfig, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Result<Self> {
        let extractor = PageExtractor::from_config(&config)?;
        Ok(Self {
            config,
            fetcher,
            extractor,
        })
    }
}

#[async_trait]
impl Lookup for BarcodeLookupClient {
    async fn lookup(&self, barcode: &str) -> Result<LookupResult> {
        let page_url = self.config.url_for(barcode);
        let body = self.fetcher.fetch(&page_url).await?;
        let html = String::from_utf8_lossy(&body);

        let mut result = self.extractor.extract(&html);
        result.image_url = result
            .image_url
            .map(|image_url| resolve_url(&page_url, &image_url));

        tracing::debug!(
            "Lookup {}: description={}, image={}",
            barcode,
            result.description.is_some(),
            result.image_url.is_some()
        );

        Ok(result)
    }
}

/// Resolve a possibly relative image URL against the page it was found on.
fn resolve_url(page_url: &str, image_url: &str) -> String {
    if Url::parse(image_url).is_ok() {
        return image_url.to_string();
    }

    Url::parse(page_url)
        .and_then(|base| base.join(image_url))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| image_url.to_string())
}
