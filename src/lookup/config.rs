use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fetcher::http_fetcher::DEFAULT_USER_AGENT;

pub const DEFAULT_BASE_URL: &str = "https://www.barcodelookup.com";

/// First product description container on the lookup page.
pub const DEFAULT_DESCRIPTION_PATTERN: &str =
    r#"(?is)<div[^>]*class="[^"]*product-description[^"]*"[^>]*>(.*?)</div>"#;

/// First image inside the large product image container.
pub const DEFAULT_IMAGE_PATTERN: &str =
    r#"(?is)<div[^>]*id="largeProductImage"[^>]*>.*?<img[^>]*src="([^"]+)""#;

/// Configuration for the barcode lookup site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Lookup site root; the barcode is appended as the last path segment
    pub base_url: String,

    /// User agent string sent with every request
    pub user_agent: String,

    /// Regex whose first capture group is the description markup
    pub description_pattern: String,

    /// Regex whose first capture group is the product image URL
    pub image_pattern: String,

    /// Request timeout in seconds (default: none, transport default)
    pub timeout_secs: Option<u64>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            description_pattern: DEFAULT_DESCRIPTION_PATTERN.to_string(),
            image_pattern: DEFAULT_IMAGE_PATTERN.to_string(),
            timeout_secs: None,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Page URL for a barcode. The barcode is embedded as-is, without
    /// percent-encoding.
    pub fn url_for(&self, barcode: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), barcode)
    }
}
