use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Publish,
    Draft,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Publish => "publish",
            ProductStatus::Draft => "draft",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "publish" => ProductStatus::Publish,
            _ => ProductStatus::Draft,
        }
    }
}

/// A catalog record. Only `sku`/`id` are read by the batch loop;
/// `description` and `image_id` are what it writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub sku: Option<String>,
    pub description: String,
    pub image_id: Option<i64>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(title: impl Into<String>, sku: Option<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            sku,
            description: String::new(),
            image_id: None,
            status: ProductStatus::Publish,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// The SKU as a lookup key, or `None` when it is missing or blank.
    pub fn barcode(&self) -> Option<&str> {
        self.sku.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }
}

/// Fields written back to a product. `image_id: None` leaves the current
/// image reference as it is.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub description: String,
    pub image_id: Option<i64>,
}
