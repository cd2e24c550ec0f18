use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use country_catalog::api::routes::configure_routes;
use country_catalog::{reconcile, CountryStore, ImportOptions, MemoryStore};
use serde_json::{json, Value};

fn record(cca3: &str, cca2: &str, name: &str, region: &str, lang: (&str, &str), borders: &[&str]) -> Value {
    json!({
        "name": {
            "common": name,
            "official": format!("Official {name}"),
            "nativeName": {(lang.0): {"official": format!("Native {name}"), "common": name}}
        },
        "cca2": cca2,
        "cca3": cca3,
        "region": region,
        "languages": {(lang.0): lang.1},
        "capital": [format!("{name} City")],
        "altSpellings": [cca2],
        "translations": {"deu": {"official": format!("Amtlich {name}"), "common": format!("{name}land")}},
        "timezones": ["UTC+01:00"],
        "flags": {"png": format!("https://flags.example/{cca2}.png"), "svg": null},
        "borders": borders
    })
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let records = vec![
        record("FRA", "FR", "France", "Europe", ("fra", "French"), &["ESP", "BEL"]),
        record("ESP", "ES", "Spain", "Europe", ("spa", "Spanish"), &["FRA"]),
        record("BEL", "BE", "Belgium", "Europe", ("fra", "French"), &["FRA"]),
        record("PER", "PE", "Peru", "Americas", ("spa", "Spanish"), &[]),
    ];
    reconcile(store.as_ref(), &records, &ImportOptions::default())
        .await
        .unwrap();
    store
}

macro_rules! app {
    ($store:expr) => {{
        let store: Arc<dyn CountryStore> = $store;
        test::init_service(
            App::new()
                .app_data(web::Data::from(store))
                .configure(configure_routes),
        )
        .await
    }};
}

async fn id_of(store: &MemoryStore, cca3: &str) -> i64 {
    store.get_country_by_cca3(cca3).await.unwrap().country.id
}

#[actix_web::test]
async fn test_health() {
    let app = app!(seeded_store().await);
    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/health").to_request(),
    )
    .await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"]["database"], "connected");
}

#[actix_web::test]
async fn test_list_is_paginated_and_uses_list_shape() {
    let app = app!(seeded_store().await);
    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/?page=1&page_size=2")
            .to_request(),
    )
    .await;
    let data = &resp["data"];
    assert_eq!(data["count"], 4);
    assert_eq!(data["page_size"], 2);
    let results = data["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // sorted by common name
    assert_eq!(results[0]["name"]["common"], "Belgium");
    assert_eq!(results[0]["name"]["nativeName"]["fra"]["official"], "Native Belgium");
    assert_eq!(results[0]["capital"], json!(["Belgium City"]));
    assert_eq!(results[0]["flags"]["png"], "https://flags.example/BE.png");
    assert!(results[0].get("cca3").is_none());
}

#[actix_web::test]
async fn test_list_filters_by_region_and_language() {
    let app = app!(seeded_store().await);
    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/?region=europe&language=fra")
            .to_request(),
    )
    .await;
    let names: Vec<&str> = resp["data"]["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"]["common"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Belgium", "France"]);
}

#[actix_web::test]
async fn test_detail_by_id_and_code() {
    let store = seeded_store().await;
    let fra = id_of(&store, "FRA").await;
    let app = app!(store);

    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/countries/{fra}/"))
            .to_request(),
    )
    .await;
    let data = &resp["data"];
    assert_eq!(data["cca3"], "FRA");
    assert_eq!(data["languages"]["fra"], "French");
    assert_eq!(data["flag"], "\u{1F1EB}\u{1F1F7}");
    let mut borders: Vec<String> = data["borders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b.as_str().unwrap().to_string())
        .collect();
    borders.sort();
    assert_eq!(borders, vec!["BEL", "ESP"]);

    let by_code: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/code/fra/")
            .to_request(),
    )
    .await;
    assert_eq!(by_code["data"]["id"], fra);
}

#[actix_web::test]
async fn test_unknown_country_is_404() {
    let app = app!(seeded_store().await);
    for uri in [
        "/api/countries/999999/",
        "/api/countries/code/XXX/",
        "/api/countries/999999/region/",
        "/api/countries/999999/borders/",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn test_same_region_excludes_self() {
    let store = seeded_store().await;
    let spain = id_of(&store, "ESP").await;
    let app = app!(store);
    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/countries/{spain}/region/"))
            .to_request(),
    )
    .await;
    assert_eq!(resp["data"]["count"], 2);
    let ids: Vec<i64> = resp["data"]["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert!(!ids.contains(&spain));
}

#[actix_web::test]
async fn test_borders_endpoint() {
    let store = seeded_store().await;
    let spain = id_of(&store, "ESP").await;
    let app = app!(store);
    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/countries/{spain}/borders/"))
            .to_request(),
    )
    .await;
    assert_eq!(resp["data"], json!([{"id": resp["data"][0]["id"], "cca3": "FRA", "name": "France"}]));
}

#[actix_web::test]
async fn test_by_region_and_language_routes() {
    let app = app!(seeded_store().await);
    let region: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/region/AMERICAS/")
            .to_request(),
    )
    .await;
    assert_eq!(region["data"]["count"], 1);
    assert_eq!(region["data"]["results"][0]["cca2"], "PE");

    let language: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/language/spa/")
            .to_request(),
    )
    .await;
    assert_eq!(language["data"]["count"], 2);
}

#[actix_web::test]
async fn test_search() {
    let app = app!(seeded_store().await);
    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/search/?q=spainl")
            .to_request(),
    )
    .await;
    assert_eq!(resp["data"]["count"], 1);
    assert_eq!(resp["data"]["results"][0]["name"]["common"], "Spain");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/search/")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_create_update_delete() {
    let store = seeded_store().await;
    let app = app!(store.clone());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/countries/")
            .set_json(json!({
                "common_name": "Andorra",
                "official_name": "Principality of Andorra",
                "cca2": "ad",
                "cca3": "and",
                "region": "Europe"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["cca3"], "AND");
    assert_eq!(body["data"]["idd"], json!({"root": "", "suffixes": []}));

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/countries/{id}/"))
            .set_json(json!({
                "common_name": "Andorra",
                "official_name": "Principality of Andorra",
                "cca2": "AD",
                "cca3": "AND",
                "population": 77265
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["population"], 77265);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/countries/{id}/"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(store.get_country(id).await.is_err());

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/countries/{id}/"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_validation_and_duplicate_codes_are_400() {
    let app = app!(seeded_store().await);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/countries/")
            .set_json(json!({
                "common_name": "",
                "official_name": "Nowhere",
                "cca2": "N0",
                "cca3": "NOWHERE",
                "start_of_week": "someday"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["common_name", "cca2", "cca3", "start_of_week"]);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/countries/")
            .set_json(json!({
                "common_name": "Fake France",
                "official_name": "Fake France",
                "cca2": "FX",
                "cca3": "FRA"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["field"], "cca3");
}

#[actix_web::test]
async fn test_update_cannot_change_cca3() {
    let store = seeded_store().await;
    let peru = id_of(&store, "PER").await;
    let app = app!(store.clone());

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/countries/{peru}/"))
            .set_json(json!({
                "common_name": "Peru",
                "official_name": "Official Peru",
                "cca2": "PE",
                "cca3": "XYZ"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"], json!([{"field": "cca3", "message": "is immutable"}]));

    assert_eq!(id_of(&store, "PER").await, peru);
    assert!(store.get_country_by_cca3("XYZ").await.is_err());
}

#[actix_web::test]
async fn test_malformed_body_and_query_use_the_envelope() {
    let app = app!(seeded_store().await);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/countries/")
            .set_json(json!({"official_name": "X", "cca2": "XX", "cca3": "XXX"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["field"], "common_name");
    assert_eq!(body["errors"][0]["message"], "is required");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/countries/")
            .set_json(json!({
                "common_name": "X",
                "official_name": "X",
                "cca2": "XX",
                "cca3": "XXX",
                "population": "many"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["field"], "body");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/countries/?page=abc")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["field"], "query");
}
