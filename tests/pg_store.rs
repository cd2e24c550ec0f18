//! Runs against a real Postgres only when TEST_DATABASE_URL is set; the
//! database is wiped.

use country_catalog::cli;
use country_catalog::database_ops::{db::Db, PgStore};
use country_catalog::model::{CountryFilter, PageRequest};
use country_catalog::{reconcile, CountryStore, ImportError, ImportOptions, StoreError};
use serde_json::{json, Value};

fn record(cca3: &str, cca2: &str, name: &str, borders: &[&str]) -> Value {
    json!({
        "name": {"common": name, "official": format!("Republic of {name}")},
        "cca2": cca2,
        "cca3": cca3,
        "region": "Europe",
        "languages": {"eng": "English"},
        "currencies": {"EUR": {"name": "Euro", "symbol": "€"}},
        "capital": [format!("{name} City")],
        "capitalInfo": {"latlng": [1.5, 2.5]},
        "idd": {"root": "+3", "suffixes": ["5"]},
        "translations": {"fra": {"official": format!("République {name}"), "common": format!("{name}ie")}},
        "borders": borders
    })
}

async fn store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = Db::connect(&url, 2).await.ok()?;
    Db::run_migrations(&db.pool).await.ok()?;
    Some(PgStore::new(db))
}

#[tokio::test]
async fn test_postgres_import_cycle() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    cli::reset(&store).await.unwrap();

    let records = vec![
        record("AAA", "AA", "Alpha", &["BBB", "ZZZ"]),
        record("BBB", "BB", "Bravo", &["AAA"]),
    ];
    let first = reconcile(&store, &records, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(first.created, 2);
    assert_eq!(first.dangling_borders, 1);

    let second = reconcile(&store, &records, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(second.updated, 2);

    let alpha = store.get_country_by_cca3("aaa").await.unwrap();
    assert_eq!(alpha.borders, vec!["BBB".to_string()]);
    assert_eq!(alpha.capitals.len(), 1);
    assert_eq!(alpha.capitals[0].latitude, Some(1.5));
    assert_eq!(alpha.currencies[0].code, "EUR");
    assert_eq!(alpha.dialing_code.as_ref().map(|d| d.root.as_str()), Some("+3"));

    let hits = store
        .search_countries("bravoie", PageRequest::default())
        .await
        .unwrap();
    assert_eq!(hits.count, 1);

    // duplicate cca2 aborts the whole run
    let mut bad = records.clone();
    bad[0]["name"]["common"] = json!("Renamed");
    bad.push(record("CCC", "BB", "Charlie", &[]));
    let err = reconcile(&store, &bad, &ImportOptions::default())
        .await
        .unwrap_err();
    match err {
        ImportError::Store(StoreError::Conflict { field, value }) => {
            assert_eq!(field, "cca2");
            assert_eq!(value, "BB");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let alpha = store.get_country_by_cca3("AAA").await.unwrap();
    assert_eq!(alpha.country.fields.common_name, "Alpha");

    let all = store
        .list_countries(&CountryFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.count, 2);

    let bravo = store.get_country_by_cca3("BBB").await.unwrap().country.id;
    store.delete_country(bravo).await.unwrap();
    let alpha = store.get_country_by_cca3("AAA").await.unwrap();
    assert!(alpha.borders.is_empty());
}
