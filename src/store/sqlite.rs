use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, SkufillError};
use crate::domain::{
    MediaAsset, MediaMetadata, Product, ProductStatus, ProductUpdate, ScheduledJob,
};
use crate::store::Store;

const PRODUCT_COLUMNS: &str =
    "id, title, sku, description, image_id, status, created_at, updated_at";

const MEDIA_COLUMNS: &str =
    "id, parent_id, file_path, mime_type, title, status, metadata, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| SkufillError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkufillError::Other(format!("Store lock poisoned: {}", e)))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            title: row.get(1)?,
            sku: row.get(2)?,
            description: row.get(3)?,
            image_id: row.get(4)?,
            status: ProductStatus::parse(&row.get::<_, String>(5)?),
            created_at: row
                .get::<_, String>(6)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            updated_at: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| Self::parse_datetime(&s)),
        })
    }

    fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaAsset> {
        Ok(MediaAsset {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            file_path: row.get(2)?,
            mime_type: row.get(3)?,
            title: row.get(4)?,
            status: row.get(5)?,
            // Unreadable metadata is treated as absent rather than failing the row
            metadata: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| serde_json::from_str(&s).ok()),
            created_at: row
                .get::<_, String>(7)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn add_product(&self, product: &Product) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO products (id, title, sku, description, image_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                (product.id > 0).then_some(product.id),
                product.title,
                product.sku,
                product.description,
                product.image_id,
                product.status.as_str(),
                product.created_at.to_rfc3339()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
                params![id],
                Self::product_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_all_products(&self) -> Result<Vec<Product>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY id",
            PRODUCT_COLUMNS
        ))?;

        let products = stmt
            .query_map([], Self::product_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(products)
    }

    fn get_candidates(&self) -> Result<Vec<Product>> {
        let conn = self.lock()?;

        // Has a SKU OR has no image. Products with both a SKU and an image
        // are still selected, so every SKU-bearing product is refreshed.
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products
             WHERE status = 'publish'
               AND ((sku IS NOT NULL AND TRIM(sku) != '') OR image_id IS NULL)
             ORDER BY id",
            PRODUCT_COLUMNS
        ))?;

        let products = stmt
            .query_map([], Self::product_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(products)
    }

    fn update_product(&self, id: i64, update: &ProductUpdate) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE products SET description = ?1, updated_at = ?2 WHERE id = ?3",
            params![update.description, now, id],
        )?;

        if let Some(image_id) = update.image_id {
            conn.execute(
                "UPDATE products SET image_id = ?1 WHERE id = ?2",
                params![image_id, id],
            )?;
        }

        Ok(())
    }

    fn add_media(&self, asset: &MediaAsset) -> Result<i64> {
        let conn = self.lock()?;

        let metadata = asset
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO media_assets (parent_id, file_path, mime_type, title, status, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                asset.parent_id,
                asset.file_path,
                asset.mime_type,
                asset.title,
                asset.status,
                metadata,
                asset.created_at.to_rfc3339()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_media(&self, id: i64) -> Result<Option<MediaAsset>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM media_assets WHERE id = ?1", MEDIA_COLUMNS),
                params![id],
                Self::media_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn find_media(&self, parent_id: i64, file_path: &str) -> Result<Option<MediaAsset>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM media_assets WHERE parent_id = ?1 AND file_path = ?2
                     ORDER BY id DESC LIMIT 1",
                    MEDIA_COLUMNS
                ),
                params![parent_id, file_path],
                Self::media_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn set_media_metadata(&self, id: i64, metadata: &MediaMetadata) -> Result<()> {
        let json = serde_json::to_string(metadata)?;
        let conn = self.lock()?;

        conn.execute(
            "UPDATE media_assets SET metadata = ?1 WHERE id = ?2",
            params![json, id],
        )?;

        Ok(())
    }

    fn get_scheduled_job(&self, hook: &str) -> Result<Option<ScheduledJob>> {
        let conn = self.lock()?;

        let due_at = conn
            .query_row(
                "SELECT due_at FROM scheduled_jobs WHERE hook = ?1",
                params![hook],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match due_at {
            Some(s) => {
                let due_at = Self::parse_datetime(&s).ok_or_else(|| {
                    SkufillError::Other(format!("Invalid due time for {}: {}", hook, s))
                })?;
                Ok(Some(ScheduledJob::new(hook, due_at)))
            }
            None => Ok(None),
        }
    }

    fn put_scheduled_job(&self, job: &ScheduledJob) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO scheduled_jobs (hook, due_at) VALUES (?1, ?2)",
            params![job.hook, job.due_at.to_rfc3339()],
        )?;

        Ok(())
    }

    fn delete_scheduled_job(&self, hook: &str) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM scheduled_jobs WHERE hook = ?1",
            params![hook],
        )?;

        Ok(deleted > 0)
    }
}
