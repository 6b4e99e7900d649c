pub mod job;
pub mod log_entry;
pub mod lookup;
pub mod media;
pub mod product;

pub use job::ScheduledJob;
pub use log_entry::LogEntry;
pub use lookup::LookupResult;
pub use media::{DerivedSize, MediaAsset, MediaMetadata};
pub use product::{Product, ProductStatus, ProductUpdate};
