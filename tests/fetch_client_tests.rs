/// Fetch client behaviour against a mocked upstream
/// Covers caching, request coalescing, retries and timeouts
use chain_credit_api::fetch_client::{FetchClient, FetchError, FetchSettings, RequestOptions};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a client with short delays
fn test_client() -> FetchClient {
    FetchClient::new(FetchSettings {
        timeout: Duration::from_secs(2),
        retries: 2,
        backoff_base: Duration::from_millis(10),
        cache_ttl: Duration::from_secs(30),
        max_entries: None,
    })
    .unwrap()
}

#[tokio::test]
async fn test_second_get_within_ttl_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": "42"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/balance", mock_server.uri());

    let first: Value = client.get(&url, &RequestOptions::default()).await.unwrap();
    let second: Value = client.get(&url, &RequestOptions::default()).await.unwrap();

    assert_eq!(first, json!({"balance": "42"}));
    assert_eq!(first, second);
    assert_eq!(client.cached_entries().await, 1);
}

#[tokio::test]
async fn test_concurrent_gets_share_one_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [1, 2, 3]}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/slow", mock_server.uri());
    let options = RequestOptions::default();

    let (a, b) = tokio::join!(
        client.get::<Value>(&url, &options),
        client.get::<Value>(&url, &options)
    );

    assert_eq!(a.unwrap(), json!({"items": [1, 2, 3]}));
    assert_eq!(b.unwrap(), json!({"items": [1, 2, 3]}));
    assert_eq!(client.in_flight_count().await, 0);
}

#[tokio::test]
async fn test_retry_recovers_after_two_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/flaky", mock_server.uri());

    let body: Value = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/down", mock_server.uri());

    let err = client
        .get::<Value>(&url, &RequestOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert!(err.is_network());
    // failures are not cached
    assert_eq!(client.cached_entries().await, 0);
    assert_eq!(client.in_flight_count().await, 0);
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hang"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/hang", mock_server.uri());
    let options = RequestOptions::default().with_timeout(Duration::from_millis(100));

    let err = client.get::<Value>(&url, &options).await.unwrap_err();

    assert_eq!(err, FetchError::Timeout(Duration::from_millis(100)));
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/html", mock_server.uri());
    let options = RequestOptions::default().with_retries(0);

    let err = client.get::<Value>(&url, &options).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ttl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/ttl", mock_server.uri());
    let options = RequestOptions::default().with_cache_ttl(Duration::from_millis(100));

    let _: Value = client.get(&url, &options).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let _: Value = client.get(&url, &options).await.unwrap();
}

#[tokio::test]
async fn test_uncached_calls_always_hit_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"n": 1})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/live", mock_server.uri());
    let options = RequestOptions::default().without_cache();

    let _: Value = client.get(&url, &options).await.unwrap();
    let _: Value = client.get(&url, &options).await.unwrap();
    assert_eq!(client.cached_entries().await, 0);
}

#[tokio::test]
async fn test_clear_cache_by_pattern() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/token_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/nft_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let tokens = format!("{}/user/token_list", mock_server.uri());
    let nfts = format!("{}/user/nft_list", mock_server.uri());
    let options = RequestOptions::default();

    let _: Value = client.get(&tokens, &options).await.unwrap();
    let _: Value = client.get(&nfts, &options).await.unwrap();

    client.clear_cache(Some("token_list")).await;

    let _: Value = client.get(&tokens, &options).await.unwrap();
    let _: Value = client.get(&nfts, &options).await.unwrap();
}

#[tokio::test]
async fn test_clear_whole_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/a", mock_server.uri());

    let _: Value = client.get(&url, &RequestOptions::default()).await.unwrap();
    client.clear_cache(None).await;
    assert_eq!(client.cached_entries().await, 0);
    let _: Value = client.get(&url, &RequestOptions::default()).await.unwrap();
}

#[tokio::test]
async fn test_sweep_removes_expired_entries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = test_client();
    let short = RequestOptions::default().with_cache_ttl(Duration::from_millis(50));

    let _: Value = client
        .get(&format!("{}/short", mock_server.uri()), &short)
        .await
        .unwrap();
    let _: Value = client
        .get(&format!("{}/long", mock_server.uri()), &RequestOptions::default())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(client.sweep_expired().await, 1);
    assert_eq!(client.cached_entries().await, 1);
}

#[tokio::test]
async fn test_extra_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/used_chain_list"))
        .and(header("AccessKey", "secret-key"))
        .and(header("Accept", "application/json"))
        .and(header("Cache-Control", "max-age=30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/user/used_chain_list", mock_server.uri());
    let options = RequestOptions::default().with_header("AccessKey", "secret-key");

    let chains: Vec<Value> = client.get(&url, &options).await.unwrap();
    assert!(chains.is_empty());
}

#[tokio::test]
async fn test_request_completes_after_caller_is_dropped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/abandoned"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"done": true}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let url = format!("{}/abandoned", mock_server.uri());

    // the caller gives up long before the upstream answers
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        client.get::<Value>(&url, &RequestOptions::default()),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(client.in_flight_count().await, 0);
    assert_eq!(client.cached_entries().await, 1);

    // served from cache, no second upstream call
    let body: Value = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert_eq!(body, json!({"done": true}));
}
