use std::sync::Arc;

use tracing::warn;

use crate::app::Result;
use crate::domain::ProductUpdate;
use crate::media::ImageIngester;
use crate::store::Store;

/// Applies scraped fields to one product.
pub struct CatalogUpdater<S: Store> {
    store: Arc<S>,
    ingester: ImageIngester<S>,
}

impl<S: Store + Send + Sync> CatalogUpdater<S> {
    pub fn new(store: Arc<S>, ingester: ImageIngester<S>) -> Self {
        Self { store, ingester }
    }

    /// Set the description and, when `image_url` is given and ingests
    /// cleanly, the primary image.
    ///
    /// Returns `Ok(false)` without side effects when the product does not
    /// exist. An image failure does not roll back the description.
    pub async fn update(
        &self,
        product_id: i64,
        description: &str,
        image_url: Option<&str>,
    ) -> Result<bool> {
        if self.store.get_product(product_id)?.is_none() {
            return Ok(false);
        }

        let mut update = ProductUpdate {
            description: description.to_string(),
            image_id: None,
        };

        if let Some(image_url) = image_url {
            match self.ingester.ingest(image_url, product_id).await {
                Ok(asset_id) => update.image_id = Some(asset_id),
                Err(e) => warn!(
                    "Image ingest failed for product {} ({}): {}",
                    product_id, image_url, e
                ),
            }
        }

        self.store.update_product(product_id, &update)?;
        Ok(true)
    }
}
