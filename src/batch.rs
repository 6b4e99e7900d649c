//! The scrape-update-reschedule batch loop.
//!
//! ```text
//! candidates → (skip no SKU) → Lookup → CatalogUpdater → ScrapeLog → pause
//!            ... → Scheduler::rearm
//! ```

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::app::{Result, SkufillError};
use crate::daemon::process_exists;
use crate::lookup::Lookup;
use crate::scheduler::Scheduler;
use crate::scrape_log::ScrapeLog;
use crate::store::Store;
use crate::updater::CatalogUpdater;

/// Log message for a lookup that failed or found no description.
pub const NOT_FOUND_MESSAGE: &str = "Description or image not found.";

/// Delay between lookups against the third-party site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Shortest pause after a lookup, in seconds (default: 5)
    pub min_delay_secs: u64,

    /// Longest pause after a lookup, in seconds (default: 15)
    pub max_delay_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 5,
            max_delay_secs: 15,
        }
    }
}

impl PacingConfig {
    /// Random delay in `min_delay_secs..=max_delay_secs`.
    pub fn sample_delay(&self) -> Duration {
        if self.min_delay_secs >= self.max_delay_secs {
            return Duration::from_secs(self.min_delay_secs);
        }
        let secs = rand::rng().random_range(self.min_delay_secs..=self.max_delay_secs);
        Duration::from_secs(secs)
    }
}

/// The rate-limiting wait between candidates.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Waits the full delay before returning.
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub candidates: usize,
    /// Candidates without a SKU
    pub skipped: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed(BatchSummary),
    /// Another run holds the run lock; nothing was done.
    AlreadyRunning,
}

/// An unreadable lock younger than this is assumed to belong to an owner
/// that has not written its PID yet.
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(30);

/// Cross-process exclusive lock on batch execution.
///
/// The lock file holds the owner's PID. A lock left behind by a dead
/// process is reclaimed.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

/// What a lock file looked like when it was inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockState {
    pid: Option<u32>,
    modified: Option<SystemTime>,
}

impl LockState {
    /// `None` when the file is gone.
    fn read(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        let pid = fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());

        Some(Self {
            pid,
            modified: meta.modified().ok(),
        })
    }

    fn is_stale(&self) -> bool {
        match self.pid {
            Some(pid) => !process_exists(pid),
            None => self
                .modified
                .and_then(|m| m.elapsed().ok())
                .is_some_and(|age| age >= UNREADABLE_LOCK_GRACE),
        }
    }
}

impl RunLock {
    /// Take the lock, or `None` if a live process holds it.
    pub fn acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        for _ in 0..3 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    return Ok(Some(Self {
                        path: path.to_path_buf(),
                    }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let Some(observed) = LockState::read(path) else {
                        continue;
                    };
                    if !observed.is_stale() || !Self::take_over(path, &observed)? {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Move a stale lock aside and discard it if it is still the lock that
    /// was judged stale. Returns whether the caller may retry creation.
    fn take_over(path: &Path, observed: &LockState) -> Result<bool> {
        let mut aside = path.as_os_str().to_os_string();
        aside.push(format!(".stale.{}", std::process::id()));
        let aside = PathBuf::from(aside);

        match fs::rename(path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        }

        if LockState::read(&aside).as_ref() == Some(observed) {
            warn!("Removing stale run lock {}", path.display());
            fs::remove_file(&aside)?;
            return Ok(true);
        }

        // A live owner replaced the lock in between; put its file back
        if let Err(e) = fs::hard_link(&aside, path) {
            warn!("Could not restore run lock {}: {}", path.display(), e);
        }
        fs::remove_file(&aside)?;
        Ok(false)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

pub struct BatchRunner<S: Store> {
    store: Arc<S>,
    lookup: Arc<dyn Lookup>,
    updater: CatalogUpdater<S>,
    scheduler: Scheduler<S>,
    log: ScrapeLog,
    pacing: PacingConfig,
    pacer: Arc<dyn Pacer>,
    lock_path: PathBuf,
}

impl<S: Store + Send + Sync> BatchRunner<S> {
    pub fn new(
        store: Arc<S>,
        lookup: Arc<dyn Lookup>,
        updater: CatalogUpdater<S>,
        scheduler: Scheduler<S>,
        log: ScrapeLog,
        pacing: PacingConfig,
        lock_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            lookup,
            updater,
            scheduler,
            log,
            pacing,
            pacer: Arc::new(TokioPacer),
            lock_path: lock_path.into(),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    pub fn log(&self) -> &ScrapeLog {
        &self.log
    }

    /// Process every candidate, then schedule the next run.
    ///
    /// Per-candidate failures are logged and never abort the batch. The
    /// next run is scheduled even if every candidate failed.
    pub async fn run_once(&self) -> Result<BatchOutcome> {
        let lock = match RunLock::acquire(&self.lock_path) {
            Ok(lock) => lock,
            Err(e) => {
                error!("Could not take run lock {}: {}", self.lock_path.display(), e);
                // The next run stays armed
                self.scheduler.install()?;
                return Err(e);
            }
        };
        let Some(_lock) = lock else {
            info!("Batch already running, skipping");
            return Ok(BatchOutcome::AlreadyRunning);
        };

        let summary = self.process_candidates().await;
        info!(
            "Batch complete: {} candidates, {} updated, {} failed, {} without SKU",
            summary.candidates, summary.updated, summary.failed, summary.skipped
        );

        self.scheduler.rearm()?;

        Ok(BatchOutcome::Completed(summary))
    }

    async fn process_candidates(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();

        let candidates = match self.store.get_candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Failed to load candidates: {}", e);
                return summary;
            }
        };
        summary.candidates = candidates.len();

        for product in candidates {
            let Some(barcode) = product.barcode() else {
                summary.skipped += 1;
                continue;
            };

            if self.process(product.id, barcode).await {
                summary.updated += 1;
            } else {
                summary.failed += 1;
            }

            let delay = self.pacing.sample_delay();
            debug!("Pausing {}s before the next lookup", delay.as_secs());
            self.pacer.pause(delay).await;
        }

        summary
    }

    /// Look up and apply one barcode. Writes exactly one log line.
    async fn process(&self, product_id: i64, barcode: &str) -> bool {
        let result = match self.lookup.lookup(barcode).await {
            Ok(result) if result.is_found() => result,
            Ok(_) => {
                debug!("No description for {} (product {})", barcode, product_id);
                self.record(product_id, barcode, false, NOT_FOUND_MESSAGE);
                return false;
            }
            Err(e) => {
                warn!("Lookup failed for {} (product {}): {}", barcode, product_id, e);
                self.record(product_id, barcode, false, NOT_FOUND_MESSAGE);
                return false;
            }
        };

        let description = result.description.as_deref().unwrap_or_default();
        let outcome = self
            .updater
            .update(product_id, description, result.image_url.as_deref())
            .await;

        let (success, message) = match outcome {
            Ok(true) => (true, String::new()),
            Ok(false) => (false, SkufillError::ProductNotFound(product_id).to_string()),
            Err(e) => {
                warn!("Update failed for product {}: {}", product_id, e);
                (false, e.to_string())
            }
        };

        self.record(product_id, barcode, success, &message);
        success
    }

    fn record(&self, product_id: i64, barcode: &str, success: bool, message: &str) {
        if let Err(e) = self.log.record(product_id, barcode, success, message) {
            error!(
                "Failed to write {}: {}",
                self.log.path().display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use image::DynamicImage;
    use mockito::{Server, ServerGuard};
    use tempfile::TempDir;

    use crate::domain::{
        LookupResult, MediaAsset, MediaMetadata, Product, ProductUpdate, ScheduledJob,
    };
    use crate::fetcher::http_fetcher::{HttpFetcher, DEFAULT_USER_AGENT};
    use crate::fetcher::Fetcher;
    use crate::lookup::{BarcodeLookupClient, LookupConfig};
    use crate::media::ImageIngester;
    use crate::scheduler::ScheduleConfig;
    use crate::store::SqliteStore;

    #[derive(Default)]
    struct RecordingPacer {
        pauses: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, delay: Duration) {
            self.pauses.lock().unwrap().push(delay);
        }
    }

    struct Harness {
        server: ServerGuard,
        store: Arc<SqliteStore>,
        dir: TempDir,
        pacer: Arc<RecordingPacer>,
        runner: BatchRunner<SqliteStore>,
    }

    impl Harness {
        async fn new() -> Self {
            let server = Server::new_async().await;
            let store = Arc::new(SqliteStore::in_memory().unwrap());
            let dir = tempfile::tempdir().unwrap();
            let pacer = Arc::new(RecordingPacer::default());

            let fetcher: Arc<dyn Fetcher + Send + Sync> =
                Arc::new(HttpFetcher::new(DEFAULT_USER_AGENT, None).unwrap());
            let lookup_config = LookupConfig {
                base_url: server.url(),
                ..Default::default()
            };
            let lookup = Arc::new(BarcodeLookupClient::new(lookup_config, fetcher.clone()).unwrap());
            let ingester = ImageIngester::new(fetcher, store.clone(), dir.path().join("uploads"));
            let updater = CatalogUpdater::new(store.clone(), ingester);
            let scheduler = Scheduler::new(store.clone(), ScheduleConfig::default());
            let log = ScrapeLog::new(dir.path().join("skufill.log"), None);

            let runner = BatchRunner::new(
                store.clone(),
                lookup,
                updater,
                scheduler,
                log,
                PacingConfig::default(),
                dir.path().join("batch.lock"),
            )
            .with_pacer(pacer.clone());

            Self {
                server,
                store,
                dir,
                pacer,
                runner,
            }
        }

        fn add_product(&self, id: i64, sku: Option<&str>) {
            let mut product = Product::new(format!("Product {}", id), sku.map(String::from));
            product.id = id;
            self.store.add_product(&product).unwrap();
        }

        async fn serve_page(&mut self, barcode: &str, description: Option<&str>, image: Option<&str>) {
            let mut body = String::from("<html><body>");
            if let Some(image) = image {
                body.push_str(&format!(
                    r#"<div id="largeProductImage"><img src="{}"></div>"#,
                    image
                ));
            }
            if let Some(description) = description {
                body.push_str(&format!(
                    r#"<div class="product-description">{}</div>"#,
                    description
                ));
            }
            body.push_str("</body></html>");

            self.server
                .mock("GET", format!("/{}", barcode).as_str())
                .with_status(200)
                .with_body(body)
                .create_async()
                .await;
        }

        async fn serve_bytes(&mut self, path: &str, bytes: Vec<u8>) {
            self.server
                .mock("GET", path)
                .with_status(200)
                .with_body(bytes)
                .create_async()
                .await;
        }

        fn log_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.runner.log().path())
                .map(|s| s.lines().map(String::from).collect())
                .unwrap_or_default()
        }

        fn summary(outcome: BatchOutcome) -> BatchSummary {
            match outcome {
                BatchOutcome::Completed(summary) => summary,
                BatchOutcome::AlreadyRunning => panic!("batch did not run"),
            }
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::new(width, height);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Returns a fixed description and never an image.
    struct StubLookup(Option<&'static str>);

    #[async_trait]
    impl Lookup for StubLookup {
        async fn lookup(&self, _barcode: &str) -> Result<LookupResult> {
            Ok(LookupResult {
                description: self.0.map(String::from),
                image_url: None,
            })
        }
    }

    /// Lists candidates, but every product is gone by the time it is read back.
    struct VanishingProducts(SqliteStore);

    impl Store for VanishingProducts {
        fn add_product(&self, product: &Product) -> Result<i64> {
            self.0.add_product(product)
        }
        fn get_product(&self, _id: i64) -> Result<Option<Product>> {
            Ok(None)
        }
        fn get_all_products(&self) -> Result<Vec<Product>> {
            self.0.get_all_products()
        }
        fn get_candidates(&self) -> Result<Vec<Product>> {
            self.0.get_candidates()
        }
        fn update_product(&self, id: i64, update: &ProductUpdate) -> Result<()> {
            self.0.update_product(id, update)
        }
        fn add_media(&self, asset: &MediaAsset) -> Result<i64> {
            self.0.add_media(asset)
        }
        fn get_media(&self, id: i64) -> Result<Option<MediaAsset>> {
            self.0.get_media(id)
        }
        fn find_media(&self, parent_id: i64, file_path: &str) -> Result<Option<MediaAsset>> {
            self.0.find_media(parent_id, file_path)
        }
        fn set_media_metadata(&self, id: i64, metadata: &MediaMetadata) -> Result<()> {
            self.0.set_media_metadata(id, metadata)
        }
        fn get_scheduled_job(&self, hook: &str) -> Result<Option<ScheduledJob>> {
            self.0.get_scheduled_job(hook)
        }
        fn put_scheduled_job(&self, job: &ScheduledJob) -> Result<()> {
            self.0.put_scheduled_job(job)
        }
        fn delete_scheduled_job(&self, hook: &str) -> Result<bool> {
            self.0.delete_scheduled_job(hook)
        }
    }

    fn build_runner<S: Store + Send + Sync>(
        store: Arc<S>,
        lookup: Arc<dyn Lookup>,
        dir: &std::path::Path,
        lock_path: PathBuf,
    ) -> BatchRunner<S> {
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(DEFAULT_USER_AGENT, None).unwrap());
        let ingester = ImageIngester::new(fetcher, store.clone(), dir.join("uploads"));

        BatchRunner::new(
            store.clone(),
            lookup,
            CatalogUpdater::new(store.clone(), ingester),
            Scheduler::new(store, ScheduleConfig::default()),
            ScrapeLog::new(dir.join("skufill.log"), None),
            PacingConfig::default(),
            lock_path,
        )
        .with_pacer(Arc::new(RecordingPacer::default()))
    }

    #[tokio::test]
    async fn test_end_to_end_description_and_image() {
        let mut h = Harness::new().await;
        h.add_product(42, Some("012345678905"));
        let image_url = format!("{}/mouse.jpg", h.server.url());
        h.serve_page("012345678905", Some("Wireless Mouse"), Some(&image_url))
            .await;
        h.serve_bytes("/mouse.jpg", png_bytes(64, 64)).await;

        let summary = Harness::summary(h.runner.run_once().await.unwrap());
        assert_eq!(summary.updated, 1);

        let product = h.store.get_product(42).unwrap().unwrap();
        assert_eq!(product.description, "Wireless Mouse");

        let asset = h.store.get_media(product.image_id.unwrap()).unwrap().unwrap();
        assert!(asset.file_path.ends_with("mouse.webp"));
        assert_eq!(asset.parent_id, Some(42));

        let lines = h.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0]
            .ends_with("Product ID: 42, Barcode: 012345678905, Success: Yes, Message: "));
    }

    #[tokio::test]
    async fn test_missing_sku_is_skipped_silently() {
        let h = Harness::new().await;
        h.add_product(1, None);
        h.add_product(2, Some("  "));

        let summary = Harness::summary(h.runner.run_once().await.unwrap());

        assert_eq!(summary.candidates, 2);
        assert_eq!(summary.skipped, 2);
        assert!(h.log_lines().is_empty());
        assert!(h.pacer.pauses.lock().unwrap().is_empty());
        for id in [1, 2] {
            let product = h.store.get_product(id).unwrap().unwrap();
            assert!(product.updated_at.is_none());
        }
    }

    #[tokio::test]
    async fn test_no_description_logs_not_found() {
        let mut h = Harness::new().await;
        h.add_product(7, Some("111"));
        h.serve_page("111", None, Some("/only-image.jpg")).await;

        let summary = Harness::summary(h.runner.run_once().await.unwrap());
        assert_eq!(summary.failed, 1);

        let lines = h.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(
            "Product ID: 7, Barcode: 111, Success: No, Message: Description or image not found."
        ));

        let product = h.store.get_product(7).unwrap().unwrap();
        assert_eq!(product.description, "");
        assert_eq!(product.image_id, None);
        assert!(product.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_logs_not_found() {
        let mut h = Harness::new().await;
        h.add_product(42, Some("012345678905"));
        h.server
            .mock("GET", "/012345678905")
            .with_status(503)
            .create_async()
            .await;

        Harness::summary(h.runner.run_once().await.unwrap());

        let lines = h.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Product ID: 42, Barcode: 012345678905, Success: No"));
        assert!(lines[0].ends_with("Message: Description or image not found."));
        assert!(h.store.get_product(42).unwrap().unwrap().updated_at.is_none());
    }

    #[tokio::test]
    async fn test_image_decode_failure_still_updates_description() {
        let mut h = Harness::new().await;
        h.add_product(5, Some("555"));
        let image_url = format!("{}/broken.jpg", h.server.url());
        h.serve_page("555", Some("Keyboard"), Some(&image_url)).await;
        h.serve_bytes("/broken.jpg", b"not an image".to_vec()).await;

        Harness::summary(h.runner.run_once().await.unwrap());

        let product = h.store.get_product(5).unwrap().unwrap();
        assert_eq!(product.description, "Keyboard");
        assert_eq!(product.image_id, None);

        let lines = h.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Success: Yes"));
    }

    #[tokio::test]
    async fn test_description_only_update() {
        let mut h = Harness::new().await;
        h.add_product(3, Some("333"));
        h.serve_page("333", Some("Cable <b>2m</b>"), None).await;

        Harness::summary(h.runner.run_once().await.unwrap());

        let product = h.store.get_product(3).unwrap().unwrap();
        assert_eq!(product.description, "Cable 2m");
        assert_eq!(product.image_id, None);
    }

    #[tokio::test]
    async fn test_second_run_yields_same_state() {
        let mut h = Harness::new().await;
        h.add_product(42, Some("012345678905"));
        let image_url = format!("{}/mouse.jpg", h.server.url());
        h.serve_page("012345678905", Some("Wireless Mouse"), Some(&image_url))
            .await;
        h.serve_bytes("/mouse.jpg", png_bytes(16, 16)).await;

        Harness::summary(h.runner.run_once().await.unwrap());
        let first = h.store.get_product(42).unwrap().unwrap();

        Harness::summary(h.runner.run_once().await.unwrap());
        let second = h.store.get_product(42).unwrap().unwrap();

        assert_eq!(first.description, second.description);
        assert_eq!(first.image_id, second.image_id);
        assert_eq!(h.log_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_pauses_once_per_lookup_within_range() {
        let mut h = Harness::new().await;
        h.add_product(1, Some("1"));
        h.add_product(2, None);
        h.add_product(3, Some("3"));
        h.serve_page("1", Some("One"), None).await;
        h.serve_page("3", None, None).await;

        Harness::summary(h.runner.run_once().await.unwrap());

        let pauses = h.pacer.pauses.lock().unwrap().clone();
        assert_eq!(pauses.len(), 2);
        for pause in pauses {
            assert!((5..=15).contains(&pause.as_secs()));
        }
    }

    #[tokio::test]
    async fn test_run_reschedules_exactly_once() {
        let h = Harness::new().await;
        h.runner.scheduler().install().unwrap();

        Harness::summary(h.runner.run_once().await.unwrap());
        let completed = Utc::now();

        let job = h.runner.scheduler().pending().unwrap().unwrap();
        let offset = (job.due_at - completed).num_seconds();
        assert!((1799..=3600).contains(&offset));
    }

    #[tokio::test]
    async fn test_all_failures_still_reschedule() {
        let mut h = Harness::new().await;
        h.add_product(1, Some("1"));
        h.serve_page("1", None, None).await;

        Harness::summary(h.runner.run_once().await.unwrap());

        assert!(h.runner.scheduler().pending().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_held_lock_skips_run() {
        let h = Harness::new().await;
        h.add_product(1, Some("1"));

        let _held = RunLock::acquire(&h.dir.path().join("batch.lock"))
            .unwrap()
            .unwrap();
        let outcome = h.runner.run_once().await.unwrap();

        assert_eq!(outcome, BatchOutcome::AlreadyRunning);
        assert!(h.log_lines().is_empty());
        assert!(h.runner.scheduler().pending().unwrap().is_none());
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.lock");
        // PIDs are capped well below this on every supported platform
        std::fs::write(&path, "4294967\n").unwrap();

        let lock = RunLock::acquire(&path).unwrap();
        assert!(lock.is_some());

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_pacing_sample_in_range() {
        let pacing = PacingConfig::default();
        for _ in 0..200 {
            let secs = pacing.sample_delay().as_secs();
            assert!((5..=15).contains(&secs));
        }
    }

    #[tokio::test]
    async fn test_lookup_stub_not_found_result() {
        let h = Harness::new().await;
        h.add_product(9, Some("9"));
        let stub_dir = tempfile::tempdir().unwrap();
        let runner = build_runner(
            h.store.clone(),
            Arc::new(StubLookup(None)),
            stub_dir.path(),
            stub_dir.path().join("batch.lock"),
        );

        let summary = Harness::summary(runner.run_once().await.unwrap());
        assert_eq!(summary.failed, 1);
        let content = std::fs::read_to_string(runner.log().path()).unwrap();
        assert!(content.contains(NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_vanished_product_logs_product_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(VanishingProducts(SqliteStore::in_memory().unwrap()));
        let mut product = Product::new("Gone", Some("9".into()));
        product.id = 9;
        store.0.add_product(&product).unwrap();

        let runner = build_runner(
            store.clone(),
            Arc::new(StubLookup(Some("Found"))),
            dir.path(),
            dir.path().join("batch.lock"),
        );

        let summary = Harness::summary(runner.run_once().await.unwrap());
        assert_eq!(summary.failed, 1);

        let content = std::fs::read_to_string(runner.log().path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Product ID: 9, Barcode: 9, Success: No, Message: Product not found: 9"));

        let stored = store.0.get_product(9).unwrap().unwrap();
        assert_eq!(stored.description, "");
        assert!(stored.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_lock_error_keeps_schedule() {
        let h = Harness::new().await;
        let blocker = h.dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let runner = build_runner(
            h.store.clone(),
            Arc::new(StubLookup(None)),
            h.dir.path(),
            blocker.join("batch.lock"),
        );

        let job = runner.scheduler().install().unwrap();
        let due = job.due_at + chrono::Duration::seconds(1);
        assert!(runner.scheduler().take_due(due).unwrap().is_some());

        assert!(runner.run_once().await.is_err());
        assert!(runner.scheduler().pending().unwrap().is_some());
    }

    #[test]
    fn test_fresh_unreadable_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.lock");
        std::fs::write(&path, "").unwrap();

        assert!(RunLock::acquire(&path).unwrap().is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_old_unreadable_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.lock");
        std::fs::write(&path, "").unwrap();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(120))
            .unwrap();
        drop(file);

        let lock = RunLock::acquire(&path).unwrap();
        assert!(lock.is_some());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap().trim(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_take_over_restores_lock_retaken_by_live_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.lock");
        std::fs::write(&path, "4294967\n").unwrap();
        let observed = LockState::read(&path).unwrap();
        assert!(observed.is_stale());

        // Another process reclaimed the stale lock first
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        assert!(!RunLock::take_over(&path, &observed).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap().trim(),
            std::process::id().to_string()
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
