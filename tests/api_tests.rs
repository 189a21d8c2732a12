/// End-to-end tests of the HTTP surface
/// Runs the real router on an ephemeral port with both providers mocked
use chain_credit_api::config::Config;
use chain_credit_api::fetch_client::{FetchClient, FetchSettings};
use chain_credit_api::handlers::AppState;
use chain_credit_api::router::build_router;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

/// Helper function to create test config pointing at the mock server
fn create_test_config(upstream: &MockServer) -> Config {
    Config {
        etherscan_base_url: format!("{}/v2/api", upstream.uri()),
        etherscan_api_key: "test_key".to_string(),
        debank_base_url: format!("{}/v1", upstream.uri()),
        debank_api_key: "test_access_key".to_string(),
        fetch_timeout_ms: 2_000,
        fetch_retries: 0,
        fetch_backoff_base_ms: 5,
        ..Config::default()
    }
}

/// Serves the app on 127.0.0.1 and returns its base URL.
async fn spawn_app(config: Config) -> String {
    let fetch = FetchClient::new(FetchSettings::from(&config)).unwrap();
    let state = Arc::new(AppState::new(config, fetch));
    let app = build_router(state).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health() {
    let upstream = MockServer::start().await;
    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "chain-credit-api");
}

#[tokio::test]
async fn test_calculate_requires_address() {
    let upstream = MockServer::start().await;
    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!(
        "{}/api/credit-score/calculate?etherscan=true",
        base
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Address parameter is required"}));
}

#[tokio::test]
async fn test_calculate_post_with_etherscan() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/api"))
        .and(query_param("action", "balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1", "message": "OK", "result": "5000000000000000000"
        })))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/api"))
        .and(query_param("action", "txlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "message": "OK",
            "result": [
                {"hash": "0x1", "timeStamp": "1438269988"},
                {"hash": "0x2", "timeStamp": "1500000000"}
            ]
        })))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/api"))
        .and(query_param("action", "tokentx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0", "message": "No transactions found", "result": []
        })))
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/credit-score/calculate", base))
        .json(&json!({
            "address": ADDRESS,
            "selectedApis": {"etherscan": true, "debank": false}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["address"], ADDRESS);
    assert_eq!(body["dataUsed"]["transactionCount"], 2);
    assert_eq!(body["dataUsed"]["tokenTransferCount"], 0);
    assert_eq!(body["dataUsed"]["etherBalanceWei"], "5000000000000000000");
    assert_eq!(body["dataUsed"]["failedSlices"], json!([]));
    assert_eq!(body["creditScore"]["breakdown"]["longevity"], 100);
    assert_eq!(body["creditScore"]["factors"]["totalTransactions"], 2);
    assert!(body["creditScore"]["factors"]["accountAge"].as_u64().unwrap() > 365);

    let score = body["creditScore"]["creditScore"].as_u64().unwrap();
    assert!((300..=850).contains(&score));
    assert!(body["interpretation"]["level"].is_string());
}

#[tokio::test]
async fn test_calculate_get_flags_need_literal_true() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!(
        "{}/api/credit-score/calculate?address={}&etherscan=1&debank=yes",
        base, ADDRESS
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["creditScore"]["creditScore"], 300);
    assert_eq!(body["interpretation"]["level"], "Poor");
    assert_eq!(body["dataUsed"]["etherscan"], false);
    assert_eq!(body["dataUsed"]["debank"], false);
}

#[tokio::test]
async fn test_calculate_all_providers_down() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!(
        "{}/api/credit-score/calculate?address={}&etherscan=true&debank=true",
        base, ADDRESS
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "Failed to calculate blockchain credit score"})
    );
}

#[tokio::test]
async fn test_etherscan_transactions_passthrough() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/api"))
        .and(query_param("action", "txlist"))
        .and(query_param("chainid", "8453"))
        .and(query_param("page", "2"))
        .and(query_param("sort", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "message": "OK",
            "result": [{"hash": "0xbase", "timeStamp": "1700000000"}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!(
        "{}/api/etherscan/transactions?address={}&chainId=8453&page=2&sort=desc",
        base, ADDRESS
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["transactions"][0]["hash"], "0xbase");
    assert_eq!(body["pagination"], json!({"page": 2, "offset": 10, "sort": "desc"}));
    assert_eq!(body["chainId"], 8453);
}

#[tokio::test]
async fn test_etherscan_unsupported_chain() {
    let upstream = MockServer::start().await;
    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!(
        "{}/api/etherscan/balance?address={}&chainId=999999",
        base, ADDRESS
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unsupported chain id: 999999");
}

#[tokio::test]
async fn test_debank_tokens_list_requires_chain() {
    let upstream = MockServer::start().await;
    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!("{}/api/debank/tokens?address={}", base, ADDRESS))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ChainId parameter is required");
}

#[tokio::test]
async fn test_debank_protocols_complex_all() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/user/all_complex_protocol_list"))
        .and(query_param("id", ADDRESS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "uniswap3", "chain": "eth", "name": "Uniswap V3"}
        ])))
        .expect(1)
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!(
        "{}/api/debank/protocols?address={}&type=complex-all",
        base, ADDRESS
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], "complex-all");
    assert_eq!(body["protocols"][0]["name"], "Uniswap V3");
}

#[tokio::test]
async fn test_debank_upstream_failure_is_bad_gateway() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/user/all_nft_list"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;

    let response = reqwest::get(format!("{}/api/debank/nfts?address={}", base, ADDRESS))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "External service error"}));
}

#[tokio::test]
async fn test_clear_cache_refetches() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/user/used_chain_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "eth"}])))
        .expect(2)
        .mount(&upstream)
        .await;

    let base = spawn_app(create_test_config(&upstream)).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/debank/chains?address={}", base, ADDRESS);

    // second call is a cache hit
    for _ in 0..2 {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client
        .delete(format!("{}/api/cache?pattern=used_chain_list", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"cleared": true, "pattern": "used_chain_list"}));

    let response = client.get(&url).send().await.unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["chains"][0]["id"], "eth");
    assert_eq!(body["type"], "used");
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_routes() {
    let upstream = MockServer::start().await;
    let config = Config {
        rate_limit_per_second: 1,
        rate_limit_burst: 2,
        ..create_test_config(&upstream)
    };
    let base = spawn_app(config).await;
    let client = reqwest::Client::new();
    // missing address answers 400 without touching the upstream
    let url = format!("{}/api/credit-score/calculate", base);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(client.get(&url).send().await.unwrap().status());
    }

    assert_eq!(statuses[0], StatusCode::BAD_REQUEST);
    assert_eq!(statuses[1], StatusCode::BAD_REQUEST);
    assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);

    // health is outside the limiter
    let response = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let upstream = MockServer::start().await;
    let config = create_test_config(&upstream);
    let fetch = FetchClient::new(FetchSettings::from(&config)).unwrap();
    let app = build_router(Arc::new(AppState::new(config, fetch))).unwrap();

    let padding = "x".repeat(2 * 1024 * 1024);
    let body = format!(r#"{{"address": "{}", "padding": "{}"}}"#, ADDRESS, padding);
    let request = Request::builder()
        .method("POST")
        .uri("/api/credit-score/calculate")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .header("x-forwarded-for", "10.0.0.1")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
