// Persistence seam for the catalog: one unit-of-work interface for imports
// and one read/write interface for the REST layer.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    CapitalCity, Country, CountryDetail, CountryFields, CountryFilter, CountrySummary, Currency,
    Demonym, DialingCode, Language, LocalizedName, Page, PageRequest,
};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("duplicate value for {field}: {value}")]
    Conflict { field: &'static str, value: String },
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn country_not_found() -> Self {
        StoreError::NotFound { entity: "country" }
    }
}

/// Tables in the catalog, used by reset to name its deletion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    DialingCodes,
    Translations,
    Demonyms,
    CountryCurrencies,
    CountryLanguages,
    AltSpellings,
    NativeNames,
    Capitals,
    Borders,
    Countries,
    Currencies,
    Languages,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::DialingCodes => "international_dialing_codes",
            Table::Translations => "country_translations",
            Table::Demonyms => "demonyms",
            Table::CountryCurrencies => "country_currencies",
            Table::CountryLanguages => "country_languages",
            Table::AltSpellings => "alternative_spellings",
            Table::NativeNames => "country_names",
            Table::Capitals => "capital_cities",
            Table::Borders => "border_countries",
            Table::Countries => "countries",
            Table::Currencies => "currencies",
            Table::Languages => "languages",
        }
    }
}

/// Result of a country upsert keyed by `cca3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

/// Writes of one import run. Nothing is visible to readers until `commit`;
/// dropping or rolling back discards every write.
#[async_trait]
pub trait ImportTx: Send {
    async fn upsert_language(&mut self, code: &str, name: &str) -> Result<Language, StoreError>;

    async fn upsert_currency(
        &mut self,
        code: &str,
        name: &str,
        symbol: &str,
    ) -> Result<Currency, StoreError>;

    async fn upsert_country(&mut self, fields: &CountryFields) -> Result<Upserted, StoreError>;

    async fn replace_capitals(
        &mut self,
        country_id: i64,
        capitals: &[CapitalCity],
    ) -> Result<(), StoreError>;

    async fn replace_native_names(
        &mut self,
        country_id: i64,
        names: &[LocalizedName],
    ) -> Result<(), StoreError>;

    async fn replace_alt_spellings(
        &mut self,
        country_id: i64,
        spellings: &[String],
    ) -> Result<(), StoreError>;

    /// Codes must already exist in `languages`.
    async fn replace_languages(
        &mut self,
        country_id: i64,
        codes: &[String],
    ) -> Result<(), StoreError>;

    /// Codes must already exist in `currencies`.
    async fn replace_currencies(
        &mut self,
        country_id: i64,
        codes: &[String],
    ) -> Result<(), StoreError>;

    async fn replace_demonyms(
        &mut self,
        country_id: i64,
        demonyms: &[Demonym],
    ) -> Result<(), StoreError>;

    async fn replace_translations(
        &mut self,
        country_id: i64,
        translations: &[LocalizedName],
    ) -> Result<(), StoreError>;

    async fn replace_dialing_code(
        &mut self,
        country_id: i64,
        dialing: Option<&DialingCode>,
    ) -> Result<(), StoreError>;

    /// Replaces every outbound border edge of `from_id`.
    async fn replace_borders(&mut self, from_id: i64, to_ids: &[i64]) -> Result<(), StoreError>;

    /// Deletes every row of `table`, returning the number removed.
    async fn delete_all(&mut self, table: Table) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Opens an import unit of work. Implementations serialize concurrent
    /// imports: a second call waits until the first transaction ends.
    async fn begin_import(&self) -> Result<Box<dyn ImportTx>, StoreError>;

    async fn ping(&self) -> bool;

    async fn list_countries(
        &self,
        filter: &CountryFilter,
        page: PageRequest,
    ) -> Result<Page<CountrySummary>, StoreError>;

    /// Case-insensitive substring match over common and official names,
    /// alternative spellings and translation names.
    async fn search_countries(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<CountrySummary>, StoreError>;

    async fn get_country(&self, id: i64) -> Result<CountryDetail, StoreError>;

    async fn get_country_by_cca3(&self, cca3: &str) -> Result<CountryDetail, StoreError>;

    /// Countries the given country has outbound border edges to.
    async fn border_neighbours(&self, id: i64) -> Result<Vec<Country>, StoreError>;

    async fn create_country(&self, fields: &CountryFields) -> Result<CountryDetail, StoreError>;

    async fn update_country(
        &self,
        id: i64,
        fields: &CountryFields,
    ) -> Result<CountryDetail, StoreError>;

    /// Deletes the country with its children, links and border edges in both directions.
    async fn delete_country(&self, id: i64) -> Result<(), StoreError>;
}
