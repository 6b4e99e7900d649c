pub mod sqlite;

use crate::app::Result;
use crate::domain::{MediaAsset, MediaMetadata, Product, ProductUpdate, ScheduledJob};

pub use sqlite::SqliteStore;

pub trait Store {
    // Product operations
    fn add_product(&self, product: &Product) -> Result<i64>;
    fn get_product(&self, id: i64) -> Result<Option<Product>>;
    fn get_all_products(&self) -> Result<Vec<Product>>;
    /// Published products that have a SKU or lack an image.
    fn get_candidates(&self) -> Result<Vec<Product>>;
    fn update_product(&self, id: i64, update: &ProductUpdate) -> Result<()>;

    // Media operations
    fn add_media(&self, asset: &MediaAsset) -> Result<i64>;
    fn get_media(&self, id: i64) -> Result<Option<MediaAsset>>;
    fn find_media(&self, parent_id: i64, file_path: &str) -> Result<Option<MediaAsset>>;
    fn set_media_metadata(&self, id: i64, metadata: &MediaMetadata) -> Result<()>;

    // Scheduled job operations
    fn get_scheduled_job(&self, hook: &str) -> Result<Option<ScheduledJob>>;
    /// Insert or replace the job for its hook.
    fn put_scheduled_job(&self, job: &ScheduledJob) -> Result<()>;
    fn delete_scheduled_job(&self, hook: &str) -> Result<bool>;
}
