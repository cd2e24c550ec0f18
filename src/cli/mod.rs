//! Shared plumbing for the `countries` and `api_server` binaries.

pub mod import;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::database_ops::{db::Db, PgStore};
use crate::reconcile::ImportSummary;
use crate::reset::{reset_store, ResetSummary};
use crate::store::{CountryStore, StoreError};
use crate::util::env::{self as env_util, redact_postgres_url};

/// Explicit `--db-url` wins over the environment.
pub fn resolve_database_url(db_url: Option<String>) -> Result<String> {
    if let Some(url) = db_url {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    let env_url = env_util::db_url().context("resolve_database_url: missing database URL")?;
    let trimmed = env_url.trim();
    if trimmed.is_empty() {
        bail!("database URL is empty; set DATABASE_URL or pass --db-url");
    }
    Ok(trimmed.to_string())
}

pub async fn connect_pg(db_url: Option<String>) -> Result<PgStore> {
    let url = resolve_database_url(db_url)?;
    let max_connections = env_util::env_parse("DB_MAX_CONNS", 5u32);
    info!(db = %redact_postgres_url(&url), max_connections, "connecting to database");
    let db = Db::connect(&url, max_connections).await?;
    Ok(PgStore::new(db))
}

pub async fn connect_store(db_url: Option<String>) -> Result<Arc<dyn CountryStore>> {
    Ok(Arc::new(connect_pg(db_url).await?))
}

/// Runs a reset in its own transaction.
pub async fn reset(store: &dyn CountryStore) -> Result<ResetSummary, StoreError> {
    let mut tx = store.begin_import().await?;
    match reset_store(tx.as_mut()).await {
        Ok(summary) => {
            tx.commit().await?;
            Ok(summary)
        }
        Err(err) => {
            let _ = tx.rollback().await;
            Err(err)
        }
    }
}

/// One-line human summary printed on stdout after an import.
pub fn summary_line(summary: &ImportSummary) -> String {
    format!(
        "Imported {} countries ({} created, {} updated, {} skipped, {} failed); {} languages, {} currencies, {} border links",
        summary.imported(),
        summary.created,
        summary.updated,
        summary.skipped,
        summary.failed,
        summary.languages,
        summary.currencies,
        summary.borders,
    )
}
