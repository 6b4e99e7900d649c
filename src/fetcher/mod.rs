pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;

#[async_trait]
pub trait Fetcher {
    /// Fetch the raw response body of `url`.
    ///
    /// Transport failures and non-success statuses are both errors.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
