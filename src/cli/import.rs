use anyhow::Result;
use tracing::info;

use crate::fetch::Fetcher;
use crate::reconcile::{import_from_source, ImportOptions, ImportSummary};
use crate::store::{CountryStore, MemoryStore};

#[derive(Debug, Clone, Default)]
pub struct ImportConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Source endpoint; defaults to the public REST Countries `all` endpoint.
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub reset: bool,
    /// Import into a throwaway in-memory store instead of Postgres.
    pub memory: bool,
}

pub async fn run(cfg: ImportConfig) -> Result<ImportSummary> {
    let fetcher = Fetcher::new(cfg.api_url.as_deref(), cfg.timeout_secs)?;
    let options = ImportOptions {
        reset: cfg.reset,
        ..ImportOptions::default()
    };
    info!(url = fetcher.url(), reset = cfg.reset, memory = cfg.memory, "starting country import");

    let summary = if cfg.memory {
        let store = MemoryStore::new();
        let summary = import_from_source(&fetcher, &store, &options).await?;
        info!(counts = ?store.counts().await, "in-memory import finished");
        summary
    } else {
        let store = super::connect_pg(cfg.database_url).await?;
        import_from_source(&fetcher, &store as &dyn CountryStore, &options).await?
    };
    Ok(summary)
}
