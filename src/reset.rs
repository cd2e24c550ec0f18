use tracing::{info, warn};

use crate::store::{ImportTx, StoreError, Table};

/// Deletion order: owned children and association rows, border edges,
/// countries, then the shared reference entities countries point at.
pub const RESET_ORDER: [Table; 12] = [
    Table::DialingCodes,
    Table::Translations,
    Table::Demonyms,
    Table::CountryCurrencies,
    Table::CountryLanguages,
    Table::AltSpellings,
    Table::NativeNames,
    Table::Capitals,
    Table::Borders,
    Table::Countries,
    Table::Currencies,
    Table::Languages,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub deleted: Vec<(Table, u64)>,
}

impl ResetSummary {
    pub fn total(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

/// Deletes every catalog row on `tx` in `RESET_ORDER`.
pub async fn reset_store(tx: &mut dyn ImportTx) -> Result<ResetSummary, StoreError> {
    warn!(target = "reset", "deleting all existing country data");
    let mut summary = ResetSummary::default();
    for table in RESET_ORDER {
        let n = tx.delete_all(table).await?;
        info!(target = "reset", table = table.name(), deleted = n, "table cleared");
        summary.deleted.push((table, n));
    }
    Ok(summary)
}
