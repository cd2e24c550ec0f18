//! In-process catalog store.
//!
//! Enforces the same keys and uniqueness rules as the Postgres schema. An
//! import works on a private copy of the state and swaps it in on commit, so
//! a failed run leaves the store untouched.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{CountryStore, ImportTx, StoreError, Table, Upserted};
use crate::model::{
    CapitalCity, Country, CountryDetail, CountryFields, CountryFilter, CountrySummary, Currency,
    Demonym, DialingCode, Language, LocalizedName, Page, PageRequest,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    countries: BTreeMap<i64, Country>,
    languages: BTreeMap<String, Language>,
    currencies: BTreeMap<String, Currency>,
    capitals: Vec<(i64, CapitalCity)>,
    native_names: Vec<(i64, LocalizedName)>,
    alt_spellings: Vec<(i64, String)>,
    country_languages: Vec<(i64, String)>,
    country_currencies: Vec<(i64, String)>,
    demonyms: Vec<(i64, Demonym)>,
    translations: Vec<(i64, LocalizedName)>,
    dialing_codes: BTreeMap<i64, DialingCode>,
    borders: Vec<(i64, i64)>,
}

/// Row counts per table, used by tests to compare store states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub countries: usize,
    pub languages: usize,
    pub currencies: usize,
    pub capitals: usize,
    pub native_names: usize,
    pub alt_spellings: usize,
    pub country_languages: usize,
    pub country_currencies: usize,
    pub demonyms: usize,
    pub translations: usize,
    pub dialing_codes: usize,
    pub borders: usize,
}

impl MemoryState {
    fn counts(&self) -> TableCounts {
        TableCounts {
            countries: self.countries.len(),
            languages: self.languages.len(),
            currencies: self.currencies.len(),
            capitals: self.capitals.len(),
            native_names: self.native_names.len(),
            alt_spellings: self.alt_spellings.len(),
            country_languages: self.country_languages.len(),
            country_currencies: self.country_currencies.len(),
            demonyms: self.demonyms.len(),
            translations: self.translations.len(),
            dialing_codes: self.dialing_codes.len(),
            borders: self.borders.len(),
        }
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_country(&self, id: i64) -> Result<(), StoreError> {
        if self.countries.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "country {id} does not exist"
            )))
        }
    }

    /// `cca2`/`cca3` must not collide with a country other than `own_id`.
    fn check_codes(&self, fields: &CountryFields, own_id: Option<i64>) -> Result<(), StoreError> {
        for c in self.countries.values() {
            if Some(c.id) == own_id {
                continue;
            }
            if c.fields.cca3 == fields.cca3 {
                return Err(StoreError::Conflict {
                    field: "cca3",
                    value: fields.cca3.clone(),
                });
            }
            if c.fields.cca2 == fields.cca2 {
                return Err(StoreError::Conflict {
                    field: "cca2",
                    value: fields.cca2.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert_country(&mut self, fields: &CountryFields) -> Result<i64, StoreError> {
        self.check_codes(fields, None)?;
        let id = self.allocate_id();
        let now = Utc::now();
        self.countries.insert(
            id,
            Country {
                id,
                fields: fields.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn update_country(&mut self, id: i64, fields: &CountryFields) -> Result<(), StoreError> {
        self.check_codes(fields, Some(id))?;
        let country = self
            .countries
            .get_mut(&id)
            .ok_or_else(StoreError::country_not_found)?;
        country.fields = fields.clone();
        country.updated_at = Utc::now();
        Ok(())
    }

    fn delete_country(&mut self, id: i64) -> bool {
        if self.countries.remove(&id).is_none() {
            return false;
        }
        self.capitals.retain(|(c, _)| *c != id);
        self.native_names.retain(|(c, _)| *c != id);
        self.alt_spellings.retain(|(c, _)| *c != id);
        self.country_languages.retain(|(c, _)| *c != id);
        self.country_currencies.retain(|(c, _)| *c != id);
        self.demonyms.retain(|(c, _)| *c != id);
        self.translations.retain(|(c, _)| *c != id);
        self.dialing_codes.remove(&id);
        self.borders.retain(|(from, to)| *from != id && *to != id);
        true
    }

    fn summary(&self, country: &Country) -> CountrySummary {
        CountrySummary {
            country: country.clone(),
            native_names: rows_of(&self.native_names, country.id),
            capitals: rows_of(&self.capitals, country.id)
                .into_iter()
                .map(|c| c.name)
                .collect(),
        }
    }

    fn detail(&self, country: &Country) -> CountryDetail {
        let id = country.id;
        CountryDetail {
            country: country.clone(),
            capitals: rows_of(&self.capitals, id),
            native_names: rows_of(&self.native_names, id),
            alt_spellings: rows_of(&self.alt_spellings, id),
            languages: rows_of(&self.country_languages, id)
                .iter()
                .filter_map(|code| self.languages.get(code).cloned())
                .collect(),
            currencies: rows_of(&self.country_currencies, id)
                .iter()
                .filter_map(|code| self.currencies.get(code).cloned())
                .collect(),
            demonyms: rows_of(&self.demonyms, id),
            translations: rows_of(&self.translations, id),
            dialing_code: self.dialing_codes.get(&id).cloned(),
            borders: self
                .borders
                .iter()
                .filter(|(from, _)| *from == id)
                .filter_map(|(_, to)| self.countries.get(to))
                .map(|c| c.fields.cca3.clone())
                .collect(),
        }
    }

    fn matches_filter(&self, country: &Country, filter: &CountryFilter) -> bool {
        if filter.exclude_id == Some(country.id) {
            return false;
        }
        if let Some(region) = filter.region.as_deref() {
            let same = country
                .fields
                .region
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(region));
            if !same {
                return false;
            }
        }
        if let Some(lang) = filter.language.as_deref() {
            let speaks = self
                .country_languages
                .iter()
                .any(|(c, code)| *c == country.id && code.eq_ignore_ascii_case(lang));
            if !speaks {
                return false;
            }
        }
        true
    }

    fn matches_search(&self, country: &Country, needle: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);
        hit(country.fields.common_name.as_str())
            || hit(country.fields.official_name.as_str())
            || self
                .alt_spellings
                .iter()
                .any(|(c, s)| *c == country.id && hit(s.as_str()))
            || self
                .translations
                .iter()
                .any(|(c, t)| {
                    *c == country.id
                        && (hit(t.common_name.as_str()) || hit(t.official_name.as_str()))
                })
    }

    fn page_of<F>(&self, page: PageRequest, mut keep: F) -> Page<CountrySummary>
    where
        F: FnMut(&Country) -> bool,
    {
        let mut matched: Vec<&Country> = self.countries.values().filter(|c| keep(*c)).collect();
        matched.sort_by(|a, b| {
            a.fields
                .common_name
                .cmp(&b.fields.common_name)
                .then(a.id.cmp(&b.id))
        });
        let results = matched
            .iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .map(|c| self.summary(c))
            .collect();
        Page {
            count: matched.len() as i64,
            page: page.page,
            page_size: page.page_size,
            results,
        }
    }
}

fn rows_of<T: Clone>(rows: &[(i64, T)], country_id: i64) -> Vec<T> {
    rows.iter()
        .filter(|(c, _)| *c == country_id)
        .map(|(_, v)| v.clone())
        .collect()
}

fn ensure_unique<'a, I>(keys: I, field: &'static str) -> Result<(), StoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(StoreError::Conflict {
                field,
                value: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Shared handle; clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    import_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> TableCounts {
        self.state.lock().await.counts()
    }

    /// Every border edge as `(from cca3, to cca3)`, sorted.
    pub async fn border_pairs(&self) -> Vec<(String, String)> {
        let state = self.state.lock().await;
        let code = |id: &i64| {
            state
                .countries
                .get(id)
                .map(|c| c.fields.cca3.clone())
                .unwrap_or_default()
        };
        let mut pairs: Vec<(String, String)> = state
            .borders
            .iter()
            .map(|(from, to)| (code(from), code(to)))
            .collect();
        pairs.sort();
        pairs
    }
}

pub struct MemoryImportTx {
    _guard: OwnedMutexGuard<()>,
    target: Arc<Mutex<MemoryState>>,
    work: MemoryState,
}

#[async_trait]
impl ImportTx for MemoryImportTx {
    async fn upsert_language(&mut self, code: &str, name: &str) -> Result<Language, StoreError> {
        let language = Language {
            code: code.to_string(),
            name: name.to_string(),
        };
        self.work
            .languages
            .insert(language.code.clone(), language.clone());
        Ok(language)
    }

    async fn upsert_currency(
        &mut self,
        code: &str,
        name: &str,
        symbol: &str,
    ) -> Result<Currency, StoreError> {
        let currency = Currency {
            code: code.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        };
        self.work
            .currencies
            .insert(currency.code.clone(), currency.clone());
        Ok(currency)
    }

    async fn upsert_country(&mut self, fields: &CountryFields) -> Result<Upserted, StoreError> {
        let existing = self
            .work
            .countries
            .values()
            .find(|c| c.fields.cca3 == fields.cca3)
            .map(|c| c.id);
        match existing {
            Some(id) => {
                self.work.update_country(id, fields)?;
                Ok(Upserted { id, created: false })
            }
            None => {
                let id = self.work.insert_country(fields)?;
                Ok(Upserted { id, created: true })
            }
        }
    }

    async fn replace_capitals(
        &mut self,
        country_id: i64,
        capitals: &[CapitalCity],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        self.work.capitals.retain(|(c, _)| *c != country_id);
        self.work
            .capitals
            .extend(capitals.iter().map(|cap| (country_id, cap.clone())));
        Ok(())
    }

    async fn replace_native_names(
        &mut self,
        country_id: i64,
        names: &[LocalizedName],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        ensure_unique(
            names.iter().map(|n| n.language_code.as_str()),
            "country_names.language_code",
        )?;
        self.work.native_names.retain(|(c, _)| *c != country_id);
        self.work
            .native_names
            .extend(names.iter().map(|n| (country_id, n.clone())));
        Ok(())
    }

    async fn replace_alt_spellings(
        &mut self,
        country_id: i64,
        spellings: &[String],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        self.work.alt_spellings.retain(|(c, _)| *c != country_id);
        self.work
            .alt_spellings
            .extend(spellings.iter().map(|s| (country_id, s.clone())));
        Ok(())
    }

    async fn replace_languages(
        &mut self,
        country_id: i64,
        codes: &[String],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        ensure_unique(codes.iter().map(String::as_str), "country_languages")?;
        if let Some(missing) = codes.iter().find(|c| !self.work.languages.contains_key(*c)) {
            return Err(StoreError::Constraint(format!(
                "language {missing} does not exist"
            )));
        }
        self.work.country_languages.retain(|(c, _)| *c != country_id);
        self.work
            .country_languages
            .extend(codes.iter().map(|code| (country_id, code.clone())));
        Ok(())
    }

    async fn replace_currencies(
        &mut self,
        country_id: i64,
        codes: &[String],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        ensure_unique(codes.iter().map(String::as_str), "country_currencies")?;
        if let Some(missing) = codes
            .iter()
            .find(|c| !self.work.currencies.contains_key(*c))
        {
            return Err(StoreError::Constraint(format!(
                "currency {missing} does not exist"
            )));
        }
        self.work
            .country_currencies
            .retain(|(c, _)| *c != country_id);
        self.work
            .country_currencies
            .extend(codes.iter().map(|code| (country_id, code.clone())));
        Ok(())
    }

    async fn replace_demonyms(
        &mut self,
        country_id: i64,
        demonyms: &[Demonym],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        ensure_unique(
            demonyms.iter().map(|d| d.language.as_str()),
            "demonyms.language",
        )?;
        self.work.demonyms.retain(|(c, _)| *c != country_id);
        self.work
            .demonyms
            .extend(demonyms.iter().map(|d| (country_id, d.clone())));
        Ok(())
    }

    async fn replace_translations(
        &mut self,
        country_id: i64,
        translations: &[LocalizedName],
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        ensure_unique(
            translations.iter().map(|t| t.language_code.as_str()),
            "country_translations.language_code",
        )?;
        self.work.translations.retain(|(c, _)| *c != country_id);
        self.work
            .translations
            .extend(translations.iter().map(|t| (country_id, t.clone())));
        Ok(())
    }

    async fn replace_dialing_code(
        &mut self,
        country_id: i64,
        dialing: Option<&DialingCode>,
    ) -> Result<(), StoreError> {
        self.work.require_country(country_id)?;
        self.work.dialing_codes.remove(&country_id);
        if let Some(d) = dialing {
            self.work.dialing_codes.insert(country_id, d.clone());
        }
        Ok(())
    }

    async fn replace_borders(&mut self, from_id: i64, to_ids: &[i64]) -> Result<(), StoreError> {
        self.work.require_country(from_id)?;
        let mut seen = HashSet::new();
        for to in to_ids {
            self.work.require_country(*to)?;
            if !seen.insert(*to) {
                return Err(StoreError::Conflict {
                    field: "border_countries",
                    value: format!("{from_id}->{to}"),
                });
            }
        }
        self.work.borders.retain(|(from, _)| *from != from_id);
        self.work
            .borders
            .extend(to_ids.iter().map(|to| (from_id, *to)));
        Ok(())
    }

    async fn delete_all(&mut self, table: Table) -> Result<u64, StoreError> {
        let w = &mut self.work;
        let referenced = match table {
            Table::Countries => {
                !(w.capitals.is_empty()
                    && w.native_names.is_empty()
                    && w.alt_spellings.is_empty()
                    && w.country_languages.is_empty()
                    && w.country_currencies.is_empty()
                    && w.demonyms.is_empty()
                    && w.translations.is_empty()
                    && w.dialing_codes.is_empty()
                    && w.borders.is_empty())
            }
            Table::Languages => !w.country_languages.is_empty(),
            Table::Currencies => !w.country_currencies.is_empty(),
            _ => false,
        };
        if referenced {
            return Err(StoreError::Constraint(format!(
                "rows in {} are still referenced",
                table.name()
            )));
        }
        let removed = match table {
            Table::DialingCodes => std::mem::take(&mut w.dialing_codes).len(),
            Table::Translations => std::mem::take(&mut w.translations).len(),
            Table::Demonyms => std::mem::take(&mut w.demonyms).len(),
            Table::CountryCurrencies => std::mem::take(&mut w.country_currencies).len(),
            Table::CountryLanguages => std::mem::take(&mut w.country_languages).len(),
            Table::AltSpellings => std::mem::take(&mut w.alt_spellings).len(),
            Table::NativeNames => std::mem::take(&mut w.native_names).len(),
            Table::Capitals => std::mem::take(&mut w.capitals).len(),
            Table::Borders => std::mem::take(&mut w.borders).len(),
            Table::Countries => std::mem::take(&mut w.countries).len(),
            Table::Currencies => std::mem::take(&mut w.currencies).len(),
            Table::Languages => std::mem::take(&mut w.languages).len(),
        };
        Ok(removed as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut target = this.target.lock().await;
        *target = this.work;
        debug!("memory import committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!("memory import rolled back");
        Ok(())
    }
}

#[async_trait]
impl CountryStore for MemoryStore {
    async fn begin_import(&self) -> Result<Box<dyn ImportTx>, StoreError> {
        let guard = self.import_lock.clone().lock_owned().await;
        let work = self.state.lock().await.clone();
        Ok(Box::new(MemoryImportTx {
            _guard: guard,
            target: self.state.clone(),
            work,
        }))
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn list_countries(
        &self,
        filter: &CountryFilter,
        page: PageRequest,
    ) -> Result<Page<CountrySummary>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.page_of(page, |c| state.matches_filter(c, filter)))
    }

    async fn search_countries(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<CountrySummary>, StoreError> {
        let needle = query.trim().to_lowercase();
        let state = self.state.lock().await;
        Ok(state.page_of(page, |c| state.matches_search(c, &needle)))
    }

    async fn get_country(&self, id: i64) -> Result<CountryDetail, StoreError> {
        let state = self.state.lock().await;
        state
            .countries
            .get(&id)
            .map(|c| state.detail(c))
            .ok_or_else(StoreError::country_not_found)
    }

    async fn get_country_by_cca3(&self, cca3: &str) -> Result<CountryDetail, StoreError> {
        let state = self.state.lock().await;
        state
            .countries
            .values()
            .find(|c| c.fields.cca3.eq_ignore_ascii_case(cca3))
            .map(|c| state.detail(c))
            .ok_or_else(StoreError::country_not_found)
    }

    async fn border_neighbours(&self, id: i64) -> Result<Vec<Country>, StoreError> {
        let state = self.state.lock().await;
        if !state.countries.contains_key(&id) {
            return Err(StoreError::country_not_found());
        }
        let mut out: Vec<Country> = state
            .borders
            .iter()
            .filter(|(from, _)| *from == id)
            .filter_map(|(_, to)| state.countries.get(to).cloned())
            .collect();
        out.sort_by(|a, b| a.fields.common_name.cmp(&b.fields.common_name));
        Ok(out)
    }

    async fn create_country(&self, fields: &CountryFields) -> Result<CountryDetail, StoreError> {
        let _guard = self.import_lock.lock().await;
        let mut state = self.state.lock().await;
        let id = state.insert_country(fields)?;
        let country = &state.countries[&id];
        Ok(state.detail(country))
    }

    async fn update_country(
        &self,
        id: i64,
        fields: &CountryFields,
    ) -> Result<CountryDetail, StoreError> {
        let _guard = self.import_lock.lock().await;
        let mut state = self.state.lock().await;
        if !state.countries.contains_key(&id) {
            return Err(StoreError::country_not_found());
        }
        state.update_country(id, fields)?;
        let country = &state.countries[&id];
        Ok(state.detail(country))
    }

    async fn delete_country(&self, id: i64) -> Result<(), StoreError> {
        let _guard = self.import_lock.lock().await;
        let mut state = self.state.lock().await;
        if state.delete_country(id) {
            Ok(())
        } else {
            Err(StoreError::country_not_found())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin_import().await.unwrap();
        tx.upsert_language("eng", "English").await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.counts().await.languages, 0);
    }

    #[tokio::test]
    async fn test_cca2_conflict_between_countries() {
        let store = MemoryStore::new();
        let mut tx = store.begin_import().await.unwrap();
        tx.upsert_country(&CountryFields::new("A", "A", "AA", "AAA"))
            .await
            .unwrap();
        let err = tx
            .upsert_country(&CountryFields::new("B", "B", "AA", "BBB"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "cca2", .. }));
    }

    #[tokio::test]
    async fn test_delete_country_removes_incoming_borders() {
        let store = MemoryStore::new();
        let mut tx = store.begin_import().await.unwrap();
        let a = tx
            .upsert_country(&CountryFields::new("A", "A", "AA", "AAA"))
            .await
            .unwrap();
        let b = tx
            .upsert_country(&CountryFields::new("B", "B", "BB", "BBB"))
            .await
            .unwrap();
        tx.replace_borders(a.id, &[b.id]).await.unwrap();
        tx.replace_borders(b.id, &[a.id]).await.unwrap();
        tx.commit().await.unwrap();

        store.delete_country(b.id).await.unwrap();
        assert_eq!(store.counts().await.borders, 0);
        assert!(store.get_country(a.id).await.unwrap().borders.is_empty());
    }

    #[tokio::test]
    async fn test_reference_rows_cannot_be_deleted_while_linked() {
        let store = MemoryStore::new();
        let mut tx = store.begin_import().await.unwrap();
        tx.upsert_language("fra", "French").await.unwrap();
        let c = tx
            .upsert_country(&CountryFields::new("F", "F", "FR", "FRA"))
            .await
            .unwrap();
        tx.replace_languages(c.id, &["fra".to_string()])
            .await
            .unwrap();
        assert!(tx.delete_all(Table::Languages).await.is_err());
    }
}
