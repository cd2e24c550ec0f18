// Postgres implementation of the catalog store.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgDatabaseError, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, instrument};

use crate::database_ops::db::Db;
use crate::model::{
    CapitalCity, Country, CountryDetail, CountryFields, CountryFilter, CountrySummary, Currency,
    Demonym, DialingCode, Language, LocalizedName, Page, PageRequest,
};
use crate::store::{CountryStore, ImportTx, StoreError, Table, Upserted};

/// Advisory lock key held for the life of an import transaction.
const IMPORT_LOCK_KEY: i64 = 0x0063_6f75_6e74_7279;

const FIELD_COLUMNS: [&str; 33] = [
    "common_name",
    "official_name",
    "cca2",
    "cca3",
    "ccn3",
    "cioc",
    "independent",
    "status",
    "un_member",
    "region",
    "subregion",
    "latitude",
    "longitude",
    "landlocked",
    "area",
    "population",
    "tlds",
    "start_of_week",
    "gini",
    "fifa",
    "car_signs",
    "car_side",
    "timezones",
    "continents",
    "google_maps_url",
    "openstreetmap_url",
    "flag_png_url",
    "flag_svg_url",
    "flag_alt",
    "coat_of_arms_png_url",
    "coat_of_arms_svg_url",
    "postal_code_format",
    "postal_code_regex",
];

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// `c.id, c.common_name, ...` for selects aliased on `countries c`.
fn select_columns() -> String {
    let mut cols = vec!["c.id".to_string()];
    cols.extend(FIELD_COLUMNS.iter().map(|col| format!("c.{col}")));
    cols.push("c.created_at".into());
    cols.push("c.updated_at".into());
    cols.join(", ")
}

fn placeholders(start: usize) -> String {
    (start..start + FIELD_COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql() -> String {
    format!(
        "INSERT INTO countries ({}) VALUES ({})",
        FIELD_COLUMNS.join(", "),
        placeholders(1)
    )
}

fn upsert_sql() -> String {
    let updates = FIELD_COLUMNS
        .iter()
        .filter(|col| **col != "cca3")
        .map(|col| format!("{col} = EXCLUDED.{col}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} ON CONFLICT (cca3) DO UPDATE SET {updates}, updated_at = now() \
         RETURNING id, (xmax = 0) AS inserted",
        insert_sql()
    )
}

fn update_sql() -> String {
    let sets = FIELD_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ${}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE countries SET {sets}, updated_at = now() WHERE id = ${} RETURNING id",
        FIELD_COLUMNS.len() + 1
    )
}

/// Binds every scalar field in `FIELD_COLUMNS` order.
fn bind_fields<'q>(q: PgQuery<'q>, f: &'q CountryFields) -> PgQuery<'q> {
    q.bind(&f.common_name)
        .bind(&f.official_name)
        .bind(&f.cca2)
        .bind(&f.cca3)
        .bind(&f.ccn3)
        .bind(&f.cioc)
        .bind(f.independent)
        .bind(&f.status)
        .bind(f.un_member)
        .bind(&f.region)
        .bind(&f.subregion)
        .bind(f.latitude)
        .bind(f.longitude)
        .bind(f.landlocked)
        .bind(f.area)
        .bind(f.population)
        .bind(&f.tlds)
        .bind(&f.start_of_week)
        .bind(Json(&f.gini))
        .bind(&f.fifa)
        .bind(&f.car_signs)
        .bind(&f.car_side)
        .bind(&f.timezones)
        .bind(&f.continents)
        .bind(&f.google_maps_url)
        .bind(&f.openstreetmap_url)
        .bind(&f.flag_png_url)
        .bind(&f.flag_svg_url)
        .bind(&f.flag_alt)
        .bind(&f.coat_of_arms_png_url)
        .bind(&f.coat_of_arms_svg_url)
        .bind(&f.postal_code_format)
        .bind(&f.postal_code_regex)
}

fn country_from_row(row: &PgRow) -> Result<Country, sqlx::Error> {
    let gini: Json<serde_json::Value> = row.try_get("gini")?;
    Ok(Country {
        id: row.try_get("id")?,
        fields: CountryFields {
            common_name: row.try_get("common_name")?,
            official_name: row.try_get("official_name")?,
            cca2: row.try_get("cca2")?,
            cca3: row.try_get("cca3")?,
            ccn3: row.try_get("ccn3")?,
            cioc: row.try_get("cioc")?,
            independent: row.try_get("independent")?,
            status: row.try_get("status")?,
            un_member: row.try_get("un_member")?,
            region: row.try_get("region")?,
            subregion: row.try_get("subregion")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            landlocked: row.try_get("landlocked")?,
            area: row.try_get("area")?,
            population: row.try_get("population")?,
            tlds: row.try_get("tlds")?,
            start_of_week: row.try_get("start_of_week")?,
            gini: gini.0,
            fifa: row.try_get("fifa")?,
            car_signs: row.try_get("car_signs")?,
            car_side: row.try_get("car_side")?,
            timezones: row.try_get("timezones")?,
            continents: row.try_get("continents")?,
            google_maps_url: row.try_get("google_maps_url")?,
            openstreetmap_url: row.try_get("openstreetmap_url")?,
            flag_png_url: row.try_get("flag_png_url")?,
            flag_svg_url: row.try_get("flag_svg_url")?,
            flag_alt: row.try_get("flag_alt")?,
            coat_of_arms_png_url: row.try_get("coat_of_arms_png_url")?,
            coat_of_arms_svg_url: row.try_get("coat_of_arms_svg_url")?,
            postal_code_format: row.try_get("postal_code_format")?,
            postal_code_regex: row.try_get("postal_code_regex")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Unique violations become `Conflict`, foreign key violations `Constraint`.
fn map_db_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("cca2") => "cca2",
                    Some(c) if c.contains("cca3") => "cca3",
                    _ => "unique",
                };
                let value = db_err
                    .try_downcast_ref::<PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .and_then(conflicting_value)
                    .unwrap_or_default();
                return StoreError::Conflict { field, value };
            }
            Some("23503") => return StoreError::Constraint(db_err.message().to_string()),
            _ => {}
        }
    }
    StoreError::Database(err)
}

/// Pulls `BB` out of a unique-violation detail like "Key (cca2)=(BB) already exists."
fn conflicting_value(detail: &str) -> Option<String> {
    let (_, rest) = detail.split_once(")=(")?;
    let (value, _) = rest.rsplit_once(')')?;
    Some(value.to_string())
}

/// Escapes LIKE metacharacters and wraps the needle for substring matching.
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn fetch_country(&self, id: i64) -> Result<Option<Country>, StoreError> {
        let sql = format!("SELECT {} FROM countries c WHERE c.id = $1", select_columns());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        row.as_ref()
            .map(country_from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn load_detail(&self, country: Country) -> Result<CountryDetail, StoreError> {
        let pool = &self.db.pool;
        let id = country.id;

        let capitals = sqlx::query(
            "SELECT name, latitude, longitude FROM capital_cities WHERE country_id = $1 ORDER BY position, id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| -> Result<CapitalCity, sqlx::Error> {
            Ok(CapitalCity {
                name: r.try_get("name")?,
                latitude: r.try_get("latitude")?,
                longitude: r.try_get("longitude")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let native_names = localized_rows(pool, "country_names", id).await?;
        let translations = localized_rows(pool, "country_translations", id).await?;

        let alt_spellings: Vec<String> = sqlx::query_scalar(
            "SELECT spelling FROM alternative_spellings WHERE country_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let languages = sqlx::query(
            "SELECT l.code, l.name FROM country_languages cl \
             JOIN languages l ON l.code = cl.language_code \
             WHERE cl.country_id = $1 ORDER BY cl.id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| -> Result<Language, sqlx::Error> {
            Ok(Language {
                code: r.try_get("code")?,
                name: r.try_get("name")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let currencies = sqlx::query(
            "SELECT cu.code, cu.name, cu.symbol FROM country_currencies cc \
             JOIN currencies cu ON cu.code = cc.currency_code \
             WHERE cc.country_id = $1 ORDER BY cc.id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| -> Result<Currency, sqlx::Error> {
            Ok(Currency {
                code: r.try_get("code")?,
                name: r.try_get("name")?,
                symbol: r.try_get("symbol")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let demonyms = sqlx::query(
            "SELECT language, male, female FROM demonyms WHERE country_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| -> Result<Demonym, sqlx::Error> {
            Ok(Demonym {
                language: r.try_get("language")?,
                male: r.try_get("male")?,
                female: r.try_get("female")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let dialing_code = sqlx::query(
            "SELECT root, suffixes FROM international_dialing_codes WHERE country_id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(|r| -> Result<DialingCode, sqlx::Error> {
            Ok(DialingCode {
                root: r.try_get("root")?,
                suffixes: r.try_get("suffixes")?,
            })
        })
        .transpose()?;

        let borders: Vec<String> = sqlx::query_scalar(
            "SELECT t.cca3 FROM border_countries b \
             JOIN countries t ON t.id = b.to_country_id \
             WHERE b.from_country_id = $1 ORDER BY b.id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(CountryDetail {
            country,
            capitals,
            native_names,
            alt_spellings,
            languages,
            currencies,
            demonyms,
            translations,
            dialing_code,
            borders,
        })
    }

    /// Attaches native names and capital names to a page of countries.
    async fn summarize(&self, countries: Vec<Country>) -> Result<Vec<CountrySummary>, StoreError> {
        let ids: Vec<i64> = countries.iter().map(|c| c.id).collect();

        let mut names: HashMap<i64, Vec<LocalizedName>> = HashMap::new();
        for r in sqlx::query(
            "SELECT country_id, language_code, official_name, common_name \
             FROM country_names WHERE country_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.db.pool)
        .await?
        {
            names
                .entry(r.try_get("country_id")?)
                .or_default()
                .push(LocalizedName {
                    language_code: r.try_get("language_code")?,
                    official_name: r.try_get("official_name")?,
                    common_name: r.try_get("common_name")?,
                });
        }

        let mut capitals: HashMap<i64, Vec<String>> = HashMap::new();
        for r in sqlx::query(
            "SELECT country_id, name FROM capital_cities \
             WHERE country_id = ANY($1) ORDER BY position, id",
        )
        .bind(&ids)
        .fetch_all(&self.db.pool)
        .await?
        {
            capitals
                .entry(r.try_get("country_id")?)
                .or_default()
                .push(r.try_get("name")?);
        }

        Ok(countries
            .into_iter()
            .map(|country| CountrySummary {
                native_names: names.remove(&country.id).unwrap_or_default(),
                capitals: capitals.remove(&country.id).unwrap_or_default(),
                country,
            })
            .collect())
    }
}

async fn localized_rows(
    pool: &sqlx::PgPool,
    table: &str,
    country_id: i64,
) -> Result<Vec<LocalizedName>, sqlx::Error> {
    let sql = format!(
        "SELECT language_code, official_name, common_name FROM {table} \
         WHERE country_id = $1 ORDER BY id"
    );
    sqlx::query(&sql)
        .bind(country_id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| -> Result<LocalizedName, sqlx::Error> {
            Ok(LocalizedName {
                language_code: r.try_get("language_code")?,
                official_name: r.try_get("official_name")?,
                common_name: r.try_get("common_name")?,
            })
        })
        .collect()
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CountryFilter) {
    qb.push(" WHERE TRUE");
    if let Some(region) = &filter.region {
        qb.push(" AND lower(c.region) = lower(")
            .push_bind(region.clone())
            .push(")");
    }
    if let Some(language) = &filter.language {
        qb.push(
            " AND EXISTS (SELECT 1 FROM country_languages cl \
             WHERE cl.country_id = c.id AND lower(cl.language_code) = lower(",
        )
        .push_bind(language.clone())
        .push("))");
    }
    if let Some(exclude) = filter.exclude_id {
        qb.push(" AND c.id <> ").push_bind(exclude);
    }
}

#[async_trait]
impl CountryStore for PgStore {
    async fn begin_import(&self) -> Result<Box<dyn ImportTx>, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(IMPORT_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        debug!("import transaction opened");
        Ok(Box::new(PgImportTx { tx }))
    }

    async fn ping(&self) -> bool {
        self.db.ping().await
    }

    #[instrument(skip(self))]
    async fn list_countries(
        &self,
        filter: &CountryFilter,
        page: PageRequest,
    ) -> Result<Page<CountrySummary>, StoreError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM countries c");
        push_filter(&mut count_qb, filter);
        let count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.db.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM countries c",
            select_columns()
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY c.common_name, c.id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let countries = qb
            .build()
            .fetch_all(&self.db.pool)
            .await?
            .iter()
            .map(country_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            count,
            page: page.page,
            page_size: page.page_size,
            results: self.summarize(countries).await?,
        })
    }

    #[instrument(skip(self))]
    async fn search_countries(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<CountrySummary>, StoreError> {
        const MATCH: &str = "c.common_name ILIKE $1 OR c.official_name ILIKE $1 \
            OR EXISTS (SELECT 1 FROM alternative_spellings a \
                       WHERE a.country_id = c.id AND a.spelling ILIKE $1) \
            OR EXISTS (SELECT 1 FROM country_translations t \
                       WHERE t.country_id = c.id \
                       AND (t.common_name ILIKE $1 OR t.official_name ILIKE $1))";
        let pattern = like_pattern(query);

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM countries c WHERE {MATCH}"))
                .bind(&pattern)
                .fetch_one(&self.db.pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM countries c WHERE {MATCH} \
             ORDER BY c.common_name, c.id LIMIT $2 OFFSET $3",
            select_columns()
        );
        let countries = sqlx::query(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db.pool)
            .await?
            .iter()
            .map(country_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            count,
            page: page.page,
            page_size: page.page_size,
            results: self.summarize(countries).await?,
        })
    }

    async fn get_country(&self, id: i64) -> Result<CountryDetail, StoreError> {
        let country = self
            .fetch_country(id)
            .await?
            .ok_or_else(StoreError::country_not_found)?;
        self.load_detail(country).await
    }

    async fn get_country_by_cca3(&self, cca3: &str) -> Result<CountryDetail, StoreError> {
        let sql = format!(
            "SELECT {} FROM countries c WHERE upper(c.cca3) = upper($1)",
            select_columns()
        );
        let row = sqlx::query(&sql)
            .bind(cca3.trim())
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(StoreError::country_not_found)?;
        self.load_detail(country_from_row(&row)?).await
    }

    async fn border_neighbours(&self, id: i64) -> Result<Vec<Country>, StoreError> {
        if self.fetch_country(id).await?.is_none() {
            return Err(StoreError::country_not_found());
        }
        let sql = format!(
            "SELECT {} FROM border_countries b JOIN countries c ON c.id = b.to_country_id \
             WHERE b.from_country_id = $1 ORDER BY c.common_name, c.id",
            select_columns()
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows
            .iter()
            .map(country_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self, fields), fields(cca3 = %fields.cca3))]
    async fn create_country(&self, fields: &CountryFields) -> Result<CountryDetail, StoreError> {
        let sql = format!("{} RETURNING id", insert_sql());
        let id: i64 = bind_fields(sqlx::query(&sql), fields)
            .fetch_one(&self.db.pool)
            .await
            .map_err(map_db_err)?
            .try_get("id")?;
        self.get_country(id).await
    }

    #[instrument(skip(self, fields), fields(cca3 = %fields.cca3))]
    async fn update_country(
        &self,
        id: i64,
        fields: &CountryFields,
    ) -> Result<CountryDetail, StoreError> {
        let sql = update_sql();
        let updated = bind_fields(sqlx::query(&sql), fields)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(map_db_err)?;
        if updated.is_none() {
            return Err(StoreError::country_not_found());
        }
        self.get_country(id).await
    }

    async fn delete_country(&self, id: i64) -> Result<(), StoreError> {
        // children, links and border edges go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM countries WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await
            .map_err(map_db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::country_not_found());
        }
        Ok(())
    }
}

pub struct PgImportTx {
    tx: Transaction<'static, Postgres>,
}

impl PgImportTx {
    async fn clear_children(&mut self, table: &str, country_id: i64) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {table} WHERE country_id = $1");
        sqlx::query(&sql)
            .bind(country_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn run(&mut self, mut qb: QueryBuilder<'_, Postgres>) -> Result<(), StoreError> {
        qb.build()
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}

#[async_trait]
impl ImportTx for PgImportTx {
    async fn upsert_language(&mut self, code: &str, name: &str) -> Result<Language, StoreError> {
        let row = sqlx::query(
            "INSERT INTO languages (code, name) VALUES ($1, $2) \
             ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name \
             RETURNING code, name",
        )
        .bind(code)
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(Language {
            code: row.try_get("code")?,
            name: row.try_get("name")?,
        })
    }

    async fn upsert_currency(
        &mut self,
        code: &str,
        name: &str,
        symbol: &str,
    ) -> Result<Currency, StoreError> {
        let row = sqlx::query(
            "INSERT INTO currencies (code, name, symbol) VALUES ($1, $2, $3) \
             ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, symbol = EXCLUDED.symbol \
             RETURNING code, name, symbol",
        )
        .bind(code)
        .bind(name)
        .bind(symbol)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(Currency {
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            symbol: row.try_get("symbol")?,
        })
    }

    async fn upsert_country(&mut self, fields: &CountryFields) -> Result<Upserted, StoreError> {
        let sql = upsert_sql();
        let row = bind_fields(sqlx::query(&sql), fields)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(Upserted {
            id: row.try_get("id")?,
            created: row.try_get("inserted")?,
        })
    }

    async fn replace_capitals(
        &mut self,
        country_id: i64,
        capitals: &[CapitalCity],
    ) -> Result<(), StoreError> {
        self.clear_children("capital_cities", country_id).await?;
        if capitals.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO capital_cities (country_id, position, name, latitude, longitude) ",
        );
        qb.push_values(capitals.iter().enumerate(), |mut b, (i, cap)| {
            b.push_bind(country_id)
                .push_bind(i as i32)
                .push_bind(&cap.name)
                .push_bind(cap.latitude)
                .push_bind(cap.longitude);
        });
        self.run(qb).await
    }

    async fn replace_native_names(
        &mut self,
        country_id: i64,
        names: &[LocalizedName],
    ) -> Result<(), StoreError> {
        self.clear_children("country_names", country_id).await?;
        if names.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO country_names (country_id, language_code, official_name, common_name) ",
        );
        qb.push_values(names, |mut b, n| {
            b.push_bind(country_id)
                .push_bind(&n.language_code)
                .push_bind(&n.official_name)
                .push_bind(&n.common_name);
        });
        self.run(qb).await
    }

    async fn replace_alt_spellings(
        &mut self,
        country_id: i64,
        spellings: &[String],
    ) -> Result<(), StoreError> {
        self.clear_children("alternative_spellings", country_id)
            .await?;
        if spellings.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("INSERT INTO alternative_spellings (country_id, spelling) ");
        qb.push_values(spellings, |mut b, s| {
            b.push_bind(country_id).push_bind(s);
        });
        self.run(qb).await
    }

    async fn replace_languages(
        &mut self,
        country_id: i64,
        codes: &[String],
    ) -> Result<(), StoreError> {
        self.clear_children("country_languages", country_id).await?;
        if codes.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("INSERT INTO country_languages (country_id, language_code) ");
        qb.push_values(codes, |mut b, code| {
            b.push_bind(country_id).push_bind(code);
        });
        self.run(qb).await
    }

    async fn replace_currencies(
        &mut self,
        country_id: i64,
        codes: &[String],
    ) -> Result<(), StoreError> {
        self.clear_children("country_currencies", country_id)
            .await?;
        if codes.is_empty() {
            return Ok(());
        }
        let mut qb =
            QueryBuilder::new("INSERT INTO country_currencies (country_id, currency_code) ");
        qb.push_values(codes, |mut b, code| {
            b.push_bind(country_id).push_bind(code);
        });
        self.run(qb).await
    }

    async fn replace_demonyms(
        &mut self,
        country_id: i64,
        demonyms: &[Demonym],
    ) -> Result<(), StoreError> {
        self.clear_children("demonyms", country_id).await?;
        if demonyms.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("INSERT INTO demonyms (country_id, language, male, female) ");
        qb.push_values(demonyms, |mut b, d| {
            b.push_bind(country_id)
                .push_bind(&d.language)
                .push_bind(&d.male)
                .push_bind(&d.female);
        });
        self.run(qb).await
    }

    async fn replace_translations(
        &mut self,
        country_id: i64,
        translations: &[LocalizedName],
    ) -> Result<(), StoreError> {
        self.clear_children("country_translations", country_id)
            .await?;
        if translations.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO country_translations (country_id, language_code, official_name, common_name) ",
        );
        qb.push_values(translations, |mut b, t| {
            b.push_bind(country_id)
                .push_bind(&t.language_code)
                .push_bind(&t.official_name)
                .push_bind(&t.common_name);
        });
        self.run(qb).await
    }

    async fn replace_dialing_code(
        &mut self,
        country_id: i64,
        dialing: Option<&DialingCode>,
    ) -> Result<(), StoreError> {
        self.clear_children("international_dialing_codes", country_id)
            .await?;
        let Some(d) = dialing else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO international_dialing_codes (country_id, root, suffixes) VALUES ($1, $2, $3)",
        )
        .bind(country_id)
        .bind(&d.root)
        .bind(&d.suffixes)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn replace_borders(&mut self, from_id: i64, to_ids: &[i64]) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM border_countries WHERE from_country_id = $1")
            .bind(from_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        if to_ids.is_empty() {
            return Ok(());
        }
        let mut qb =
            QueryBuilder::new("INSERT INTO border_countries (from_country_id, to_country_id) ");
        qb.push_values(to_ids, |mut b, to| {
            b.push_bind(from_id).push_bind(*to);
        });
        self.run(qb).await
    }

    async fn delete_all(&mut self, table: Table) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {}", table.name());
        let res = sqlx::query(&sql)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(res.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("land"), "%land%");
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_upsert_sql_keeps_cca3_as_conflict_key() {
        let sql = upsert_sql();
        assert!(sql.contains("ON CONFLICT (cca3)"));
        assert!(!sql.contains("cca3 = EXCLUDED.cca3"));
        assert!(sql.contains("cca2 = EXCLUDED.cca2"));
        assert!(sql.contains("$33)"));
    }

    #[test]
    fn test_conflicting_value_from_detail() {
        assert_eq!(
            conflicting_value("Key (cca2)=(BB) already exists.").as_deref(),
            Some("BB")
        );
        assert_eq!(conflicting_value("no key here"), None);
    }

    #[test]
    fn test_update_sql_binds_id_last() {
        let sql = update_sql();
        assert!(sql.contains("postal_code_regex = $33"));
        assert!(sql.ends_with("WHERE id = $34 RETURNING id"));
    }
}
