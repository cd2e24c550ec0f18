//! Country import: normalizes raw REST Countries records into the catalog.
//!
//! One run is one unit of work on the store, in three ordered passes:
//!
//! 1. reference pass: upsert every language and currency, building
//!    code -> entity lookups;
//! 2. country pass: upsert each country by `cca3` and replace all of its
//!    owned collections and reference links;
//! 3. border pass: resolve border codes against the code -> id index built by
//!    the country pass, so forward references resolve regardless of order.
//!
//! A record that cannot be parsed or lacks its identity code is reported in
//! the summary and the run continues. A store error aborts the run and rolls
//! back every write made during it.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::model::{Currency, Language};
use crate::record::{display_name, CountryRecord};
use crate::reset::{reset_store, ResetSummary};
use crate::store::{CountryStore, ImportTx, StoreError};

const DEFAULT_PROGRESS_EVERY: usize = 10;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("import aborted, all writes rolled back: {0}")]
    Store(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Delete every catalog row inside the import transaction before pass 1.
    pub reset: bool,
    pub progress_every: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            reset: false,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Imported { cca3: String, created: bool },
    /// The record has no identity code; nothing was written for it.
    Skipped { name: String, reason: String },
    /// The record has an unexpected shape; nothing was written for it.
    Failed { name: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub languages: usize,
    pub currencies: usize,
    pub borders: usize,
    /// Border codes naming a country absent from this import.
    pub dangling_borders: usize,
    pub reset: Option<ResetSummary>,
    pub outcomes: Vec<RecordOutcome>,
}

impl ImportSummary {
    pub fn imported(&self) -> usize {
        self.created + self.updated
    }

    fn record(&mut self, outcome: RecordOutcome) {
        match &outcome {
            RecordOutcome::Imported { created: true, .. } => self.created += 1,
            RecordOutcome::Imported { created: false, .. } => self.updated += 1,
            RecordOutcome::Skipped { .. } => self.skipped += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// A raw record paired with its parse result.
struct ParsedRecord {
    name: String,
    record: Result<CountryRecord, String>,
}

impl ParsedRecord {
    fn parse(raw: &Value) -> Self {
        Self {
            name: display_name(raw),
            record: CountryRecord::from_value(raw).map_err(|e| e.to_string()),
        }
    }

    fn ok(&self) -> Option<&CountryRecord> {
        self.record.as_ref().ok()
    }
}

/// Code -> entity lookups for languages and currencies, built once per run.
#[derive(Debug, Default)]
pub struct ReferenceTables {
    languages: HashMap<String, Language>,
    currencies: HashMap<String, Currency>,
}

impl ReferenceTables {
    /// Upserts each code once; the first occurrence of a code in the batch
    /// supplies its display fields.
    async fn build(tx: &mut dyn ImportTx, records: &[ParsedRecord]) -> Result<Self, StoreError> {
        let mut tables = Self::default();
        for record in records.iter().filter_map(ParsedRecord::ok) {
            for (code, name) in record.language_pairs() {
                if tables.languages.contains_key(code) {
                    continue;
                }
                let language = tx.upsert_language(code, name).await?;
                debug!(code, name, "language upserted");
                tables.languages.insert(code.to_string(), language);
            }
            for (code, block) in record.currency_entries() {
                if tables.currencies.contains_key(code) {
                    continue;
                }
                let currency = tx
                    .upsert_currency(
                        code,
                        block.name.as_deref().unwrap_or_default(),
                        block.symbol.as_deref().unwrap_or_default(),
                    )
                    .await?;
                debug!(code, "currency upserted");
                tables.currencies.insert(code.to_string(), currency);
            }
        }
        Ok(tables)
    }

    fn language_codes(&self, record: &CountryRecord) -> Vec<String> {
        record
            .language_codes()
            .filter_map(|code| self.languages.get(code))
            .map(|l| l.code.clone())
            .collect()
    }

    fn currency_codes(&self, record: &CountryRecord) -> Vec<String> {
        record
            .currency_codes()
            .filter_map(|code| self.currencies.get(code))
            .map(|c| c.code.clone())
            .collect()
    }
}

/// Fetches the dataset, then reconciles it. A fetch failure returns before
/// any transaction is opened.
pub async fn import_from_source(
    fetcher: &Fetcher,
    store: &dyn CountryStore,
    options: &ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let records = fetcher.fetch_all().await?;
    reconcile(store, &records, options).await
}

/// Imports `records` as a single unit of work: either every write commits or none does.
#[instrument(skip(store, records), fields(records = records.len()))]
pub async fn reconcile(
    store: &dyn CountryStore,
    records: &[Value],
    options: &ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let started = Instant::now();
    let mut tx = store.begin_import().await.map_err(ImportError::Store)?;

    let outcome = run_passes(tx.as_mut(), records, options).await;
    match outcome {
        Ok(summary) => {
            tx.commit().await.map_err(ImportError::Store)?;
            info!(
                imported = summary.imported(),
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                borders = summary.borders,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "country import committed"
            );
            Ok(summary)
        }
        Err(err) => {
            error!(error = %err, "country import failed; rolling back");
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "rollback reported an error");
            }
            Err(ImportError::Store(err))
        }
    }
}

async fn run_passes(
    tx: &mut dyn ImportTx,
    records: &[Value],
    options: &ImportOptions,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    if options.reset {
        summary.reset = Some(reset_store(tx).await?);
    }

    let parsed: Vec<ParsedRecord> = records.iter().map(ParsedRecord::parse).collect();

    info!("processing languages and currencies");
    let refs = ReferenceTables::build(tx, &parsed).await?;
    summary.languages = refs.languages.len();
    summary.currencies = refs.currencies.len();

    info!("processing countries");
    let index = country_pass(tx, &parsed, &refs, options, &mut summary).await?;

    info!("setting up border relationships");
    border_pass(tx, &parsed, &index, &mut summary).await?;

    Ok(summary)
}

async fn country_pass(
    tx: &mut dyn ImportTx,
    parsed: &[ParsedRecord],
    refs: &ReferenceTables,
    options: &ImportOptions,
    summary: &mut ImportSummary,
) -> Result<HashMap<String, i64>, StoreError> {
    let total = parsed.len();
    let every = options.progress_every.max(1);
    let mut index: HashMap<String, i64> = HashMap::with_capacity(total);
    let mut counter = 0usize;

    for p in parsed {
        let record = match &p.record {
            Ok(record) => record,
            Err(reason) => {
                error!(country = %p.name, %reason, "error processing country");
                summary.record(RecordOutcome::Failed {
                    name: p.name.clone(),
                    reason: reason.clone(),
                });
                continue;
            }
        };

        let Some(cca3) = record.cca3() else {
            warn!(country = %p.name, "skipping country without cca3 code");
            summary.record(RecordOutcome::Skipped {
                name: p.name.clone(),
                reason: "missing cca3".into(),
            });
            continue;
        };
        let Some(cca2) = record.cca2() else {
            error!(country = %p.name, %cca3, "error processing country: missing cca2");
            summary.record(RecordOutcome::Failed {
                name: p.name.clone(),
                reason: "missing cca2".into(),
            });
            continue;
        };

        counter += 1;
        if counter % every == 0 || counter == total {
            info!("processing country {counter}/{total}: {}", p.name);
        }

        let upserted = tx
            .upsert_country(&record.country_fields(&cca3, &cca2))
            .await?;
        index.insert(cca3.clone(), upserted.id);

        let id = upserted.id;
        tx.replace_capitals(id, &record.capitals()).await?;
        tx.replace_native_names(id, &record.native_names()).await?;
        tx.replace_alt_spellings(id, &record.alt_spellings())
            .await?;
        tx.replace_languages(id, &refs.language_codes(record))
            .await?;
        tx.replace_currencies(id, &refs.currency_codes(record))
            .await?;
        tx.replace_demonyms(id, &record.demonyms()).await?;
        tx.replace_translations(id, &record.translations()).await?;
        tx.replace_dialing_code(id, record.dialing_code().as_ref())
            .await?;

        summary.record(RecordOutcome::Imported {
            cca3,
            created: upserted.created,
        });
    }

    Ok(index)
}

async fn border_pass(
    tx: &mut dyn ImportTx,
    parsed: &[ParsedRecord],
    index: &HashMap<String, i64>,
    summary: &mut ImportSummary,
) -> Result<(), StoreError> {
    for record in parsed.iter().filter_map(ParsedRecord::ok) {
        let Some(from) = record.cca3().and_then(|code| index.get(&code).copied()) else {
            continue;
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for code in record.border_codes() {
            match index.get(code) {
                Some(&to) => {
                    if seen.insert(to) {
                        targets.push(to);
                    }
                }
                None => {
                    debug!(from = ?record.cca3(), to = code, "dropping unresolved border");
                    summary.dangling_borders += 1;
                }
            }
        }

        tx.replace_borders(from, &targets).await?;
        summary.borders += targets.len();
    }
    Ok(())
}
