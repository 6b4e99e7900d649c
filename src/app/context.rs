use std::sync::Arc;

use crate::app::error::{Result, SkufillError};
use crate::batch::BatchRunner;
use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::lookup::{BarcodeLookupClient, Lookup};
use crate::media::ImageIngester;
use crate::scheduler::Scheduler;
use crate::scrape_log::ScrapeLog;
use crate::store::sqlite::SqliteStore;
use crate::updater::CatalogUpdater;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub runner: BatchRunner<SqliteStore>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.paths.database();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SkufillError::Config(e.to_string()))?;

        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(
            &config.lookup.user_agent,
            config.lookup.timeout(),
        )?);
        let lookup: Arc<dyn Lookup> = Arc::new(BarcodeLookupClient::new(
            config.lookup.clone(),
            fetcher.clone(),
        )?);

        let ingester = ImageIngester::new(fetcher, store.clone(), config.paths.uploads_dir());
        let updater = CatalogUpdater::new(store.clone(), ingester);
        let scheduler = Scheduler::new(store.clone(), config.schedule.clone());
        let log = ScrapeLog::new(config.paths.log_file(), config.log.max_bytes);

        let runner = BatchRunner::new(
            store.clone(),
            lookup,
            updater,
            scheduler,
            log,
            config.pacing.clone(),
            config.paths.lock_file(),
        );

        Ok(Self {
            config,
            store,
            runner,
        })
    }
}
