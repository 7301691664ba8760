use mgnrega_core::StatsQuery;
use mgnrega_server::{UpstreamClient, UpstreamConfig, UpstreamError};
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESOURCE: &str = "ee03643a-ee4c-48c2-ac30-9f2ff26ab722";

fn client_for(server: &MockServer) -> UpstreamClient {
    UpstreamClient::from_config(&UpstreamConfig {
        base_url: server.uri(),
        resource_id: Some(RESOURCE.into()),
        api_key: Some("test-key".into()),
        timeout_ms: 1_000,
    })
    .unwrap()
}

fn ranchi() -> StatsQuery {
    StatsQuery::new("Jharkhand")
        .with_sub_region("Ranchi")
        .with_fiscal_year("2024-2025")
}

#[tokio::test]
async fn sends_filters_and_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/resource/{RESOURCE}")))
        .and(query_param("api-key", "test-key"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "200"))
        .and(query_param("offset", "0"))
        .and(query_param("filters[state_name]", "Jharkhand"))
        .and(query_param("filters[district_name]", "Ranchi"))
        .and(query_param("filters[fin_year]", "2024-2025"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "records": [{"month": "Apr", "fin_year": "2024-2025", "Total_Exp": "12.5"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server).fetch(&ranchi()).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.total, Some(1));
    assert_eq!(page.records[0].number("Total_Exp"), 12.5);
}

#[tokio::test]
async fn optional_filters_are_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "Bihar"))
        .and(query_param_is_missing("filters[district_name]"))
        .and(query_param_is_missing("filters[fin_year]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"month": "May"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .fetch(&StatsQuery::new("Bihar"))
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.total, None);
}

#[tokio::test]
async fn retries_once_with_upper_cased_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "Jharkhand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "JHARKHAND"))
        .and(query_param("filters[district_name]", "RANCHI"))
        // Fiscal year is not transformed
        .and(query_param("filters[fin_year]", "2024-2025"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": "2",
            "records": [{"month": "Apr"}, {"month": "May"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server).fetch(&ranchi()).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.total, Some(2));
}

#[tokio::test]
async fn resolved_fetch_reports_the_matching_casing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "Jharkhand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "JHARKHAND"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"month": "Apr"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (page, matched) = client.fetch_resolved(&ranchi()).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(matched, ranchi().upper_cased());

    let (_, matched) = client
        .fetch_resolved(&StatsQuery::new("JHARKHAND"))
        .await
        .unwrap();
    assert_eq!(matched, StatsQuery::new("JHARKHAND"));
}

#[tokio::test]
async fn exact_fetch_never_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "Jharkhand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "JHARKHAND"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"month": "Apr"}]
        })))
        .expect(0)
        .mount(&server)
        .await;

    let page = client_for(&server).fetch_exact(&ranchi()).await.unwrap();
    assert!(page.records.is_empty());
}

#[tokio::test]
async fn empty_retry_returns_empty_primary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": [], "total": 0})))
        .expect(2)
        .mount(&server)
        .await;

    let page = client_for(&server).fetch(&ranchi()).await.unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.total, Some(0));
}

#[tokio::test]
async fn failed_retry_returns_empty_primary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "Jharkhand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("filters[state_name]", "JHARKHAND"))
        .respond_with(ResponseTemplate::new(500).set_body_string("retry exploded"))
        .mount(&server)
        .await;

    let page = client_for(&server).fetch(&ranchi()).await.unwrap();
    assert!(page.records.is_empty());
}

#[tokio::test]
async fn non_success_status_carries_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("{\"message\":\"internal\"}"))
        .expect(1)
        .mount(&server)
        .await;

    match client_for(&server).fetch(&ranchi()).await {
        Err(UpstreamError::BadResponse { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "{\"message\":\"internal\"}");
        }
        other => panic!("expected BadResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_success_body_is_a_bad_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch(&ranchi()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::BadResponse { status: 200, .. }));
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = UpstreamClient::from_config(&UpstreamConfig {
        base_url: server.uri(),
        resource_id: Some(RESOURCE.into()),
        api_key: None,
        timeout_ms: 1_000,
    })
    .unwrap();
    assert!(!client.is_configured());

    let err = client.fetch(&ranchi()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Configuration(_)));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn slow_upstream_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"records": [{"month": "Apr"}]}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).fetch(&ranchi()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Unavailable(_)), "{err:?}");
    assert!(!err.to_string().contains("test-key"));
}

#[tokio::test]
async fn unreachable_upstream_is_unavailable() {
    let client = UpstreamClient::from_config(&UpstreamConfig {
        base_url: "http://127.0.0.1:1".into(),
        resource_id: Some(RESOURCE.into()),
        api_key: Some("test-key".into()),
        timeout_ms: 1_000,
    })
    .unwrap();

    let err = client.fetch(&ranchi()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Unavailable(_)));
    assert!(err.is_recoverable());
}
