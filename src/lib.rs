//! # skufill
//!
//! A scheduled batch job that fills in missing product descriptions and
//! images by scraping a barcode lookup site with each product's SKU.
//!
//! ## Architecture
//!
//! ```text
//! Store → Lookup → CatalogUpdater (→ ImageIngester) → ScrapeLog → Scheduler
//! ```
//!
//! - [`lookup`]: fetches the lookup page for a barcode and extracts fields
//! - [`media`]: downloads, re-encodes to WebP and registers product images
//! - [`batch`]: the paced loop over candidates that ends by re-arming the job
//! - [`store`]: SQLite persistence layer
//!
//! ## Quick Start
//!
//! ```bash
//! # Seed the catalog
//! skufill add 012345678905 --title "Wireless Mouse"
//!
//! # Run one batch now
//! skufill run
//!
//! # Arm the recurring update and host it
//! skufill install
//! skufill daemon start
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, lookup client, ingester, updater, scheduler and batch runner.
pub mod app;

/// The scrape-update-reschedule batch loop.
pub mod batch;

/// Command-line interface using clap.
///
/// - `run` - Run one batch now
/// - `candidates` - List products the next batch will consider
/// - `add <sku>` / `list` - Seed and inspect the catalog
/// - `install` / `uninstall` - Arm or cancel the recurring update
/// - `daemon start|stop|status` - Host the recurring update
pub mod cli;

/// Configuration loaded from `~/.config/skufill/config.toml`.
pub mod config;

/// Foreground daemon that fires the scheduled update when it comes due.
pub mod daemon;

/// Core domain models.
///
/// - [`Product`](domain::Product): catalog record keyed by id, looked up by SKU
/// - [`MediaAsset`](domain::MediaAsset): registered image file
/// - [`LogEntry`](domain::LogEntry): one scrape log line
/// - [`ScheduledJob`](domain::ScheduledJob): pending one-shot run
pub mod domain;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for byte fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

pub mod lookup;

/// Image ingestion into the uploads directory.
pub mod media;

/// One-shot job scheduling keyed by hook name.
pub mod scheduler;

/// Append-only scrape log with optional size rotation.
pub mod scrape_log;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Writes scraped fields back to a product.
pub mod updater;
