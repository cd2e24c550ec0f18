use country_catalog::fetch::{FetchError, Fetcher};
use country_catalog::{import_from_source, ImportError, ImportOptions, MemoryStore};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> serde_json::Value {
    json!([
        {
            "name": {"common": "Peru", "official": "Republic of Peru"},
            "cca2": "PE",
            "cca3": "PER",
            "region": "Americas",
            "languages": {"spa": "Spanish", "que": "Quechua"},
            "currencies": {"PEN": {"name": "Peruvian sol", "symbol": "S/ "}},
            "capital": ["Lima"],
            "borders": ["BOL"]
        },
        {
            "name": {"common": "Bolivia", "official": "Plurinational State of Bolivia"},
            "cca2": "BO",
            "cca3": "BOL",
            "region": "Americas",
            "languages": {"spa": "Spanish"},
            "currencies": {"BOB": {"name": "Bolivian boliviano", "symbol": "Bs."}},
            "borders": ["PER"]
        }
    ])
}

async fn server_with(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3.1/all"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fetch_and_import_end_to_end() {
    let server = server_with(ResponseTemplate::new(200).set_body_json(payload())).await;
    let fetcher = Fetcher::new(Some(&format!("{}/v3.1/all", server.uri())), Some(5)).unwrap();
    let store = MemoryStore::new();

    let summary = import_from_source(&fetcher, &store, &ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.languages, 2);
    assert_eq!(summary.currencies, 2);
    assert_eq!(summary.borders, 2);
    assert_eq!(
        store.border_pairs().await,
        vec![
            ("BOL".to_string(), "PER".to_string()),
            ("PER".to_string(), "BOL".to_string())
        ]
    );
}

#[tokio::test]
async fn test_non_success_status_aborts_before_any_write() {
    let server = server_with(ResponseTemplate::new(503).set_body_string("maintenance")).await;
    let fetcher = Fetcher::new(Some(&format!("{}/v3.1/all", server.uri())), Some(5)).unwrap();
    let store = MemoryStore::new();

    let err = import_from_source(&fetcher, &store, &ImportOptions::default())
        .await
        .unwrap_err();

    match err {
        ImportError::Fetch(FetchError::Status { status, body, .. }) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.counts().await, Default::default());
}

#[tokio::test]
async fn test_non_array_payload_is_rejected() {
    let server =
        server_with(ResponseTemplate::new(200).set_body_json(json!({"status": 404}))).await;
    let fetcher = Fetcher::new(Some(&format!("{}/v3.1/all", server.uri())), Some(5)).unwrap();

    let err = fetcher.fetch_all().await.unwrap_err();
    assert!(matches!(err, FetchError::Payload { .. }));
    assert!(err.to_string().contains("expected a JSON array, got an object"));
}

#[tokio::test]
async fn test_unreachable_source_is_a_transport_error() {
    // nothing listens on port 9 locally
    let fetcher = Fetcher::new(Some("http://127.0.0.1:9/v3.1/all"), Some(2)).unwrap();
    let err = fetcher.fetch_all().await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
}
