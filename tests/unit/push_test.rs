use dbpush::backend::{CellValue, QueryResult, Row};
use dbpush::cli::RunArgs;
use dbpush::config::{self, AppConfig};
use dbpush::metrics::{build_payload, Payload};
use dbpush::push::{grouping_url, PushClient, EXPOSITION_CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn s(v: &str) -> Option<String> {
    Some(v.to_string())
}

fn config_for(gateway: &str, overrides: impl FnOnce(&mut RunArgs)) -> AppConfig {
    let mut args = RunArgs {
        db_host: s("localhost"),
        db_name: s("shop"),
        db_user: s("u"),
        db_pass: s("p"),
        table_name: s("orders"),
        pushgateway_url: s(gateway),
        ..RunArgs::default()
    };
    overrides(&mut args);
    config::load(&args, false).unwrap()
}

fn payload(config: &AppConfig) -> Payload {
    let result = QueryResult {
        columns: vec![],
        rows: vec![Row::new(vec![
            ("id".to_string(), CellValue::Text("open".to_string())),
            ("value".to_string(), CellValue::Number(12.0)),
            ("updatedon".to_string(), CellValue::Null),
        ])],
    };
    build_payload(&result, &config.source, &config.gateway.static_labels).unwrap()
}

// --- Grouping URL ---

#[test]
fn test_grouping_url_trims_trailing_slashes() {
    let base = Url::parse("http://gw:9091//").unwrap();
    let url = grouping_url(&base, "shop_orders", "shop_orders").unwrap();
    assert_eq!(url.as_str(), "http://gw:9091/metrics/job/shop_orders/instance/shop_orders");
}

#[test]
fn test_grouping_url_keeps_base_path() {
    let base = Url::parse("https://proxy.example/pushgateway/").unwrap();
    let url = grouping_url(&base, "j", "i").unwrap();
    assert_eq!(url.as_str(), "https://proxy.example/pushgateway/metrics/job/j/instance/i");
}

#[test]
fn test_grouping_url_encodes_segments() {
    let base = Url::parse("http://gw:9091").unwrap();
    let url = grouping_url(&base, "a b", "c/d").unwrap();
    assert_eq!(url.as_str(), "http://gw:9091/metrics/job/a%20b/instance/c%2Fd");
}

// --- Push ---

#[tokio::test]
async fn test_push_puts_exposition_body_to_grouping_key() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/metrics/job/shop_orders/instance/shop_orders"))
        .and(header("content-type", EXPOSITION_CONTENT_TYPE))
        .and(body_string_contains("shop_orders_value{id=\"open\"} 12\n"))
        .and(body_string_contains("shop_orders_total_rows 1\n"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server.uri(), |_| {});
    let client = PushClient::new(&config.gateway).unwrap();
    client.push(&payload(&config)).await.unwrap();
}

#[tokio::test]
async fn test_push_uses_configured_job_and_instance() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/metrics/job/nightly/instance/replica_2"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server.uri(), |a| {
        a.job_name = s("nightly");
        a.instance_name = s("replica-2");
    });
    let client = PushClient::new(&config.gateway).unwrap();
    client.push(&payload(&config)).await.unwrap();
}

#[tokio::test]
async fn test_push_sends_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(basic_auth("pusher", "s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server.uri(), |a| {
        a.pushgateway_username = s("pusher");
        a.pushgateway_password = s("s3cret");
    });
    let client = PushClient::new(&config.gateway).unwrap();
    client.push(&payload(&config)).await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_push_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storage unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server.uri(), |_| {});
    let client = PushClient::new(&config.gateway).unwrap();
    let err = client.push(&payload(&config)).await.unwrap_err().to_string();

    assert!(err.starts_with("push:"), "Got: {}", err);
    assert!(err.contains("500"), "Got: {}", err);
    assert!(err.contains("storage unavailable"), "Got: {}", err);
}

#[tokio::test]
async fn test_bad_request_is_push_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_string("text format parsing error"))
        .mount(&server)
        .await;

    let config = config_for(&server.uri(), |_| {});
    let client = PushClient::new(&config.gateway).unwrap();
    let err = client.push(&payload(&config)).await.unwrap_err().to_string();
    assert!(err.contains("HTTP 400"), "Got: {}", err);
}

#[tokio::test]
async fn test_timeout_is_push_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = config_for(&server.uri(), |a| a.push_timeout = s("1"));
    let client = PushClient::new(&config.gateway).unwrap();
    let err = client.push(&payload(&config)).await.unwrap_err().to_string();
    assert!(err.contains("timed out"), "Got: {}", err);
}

#[tokio::test]
async fn test_unreachable_gateway_is_push_error() {
    // Port 9 (discard) is closed on test hosts.
    let config = config_for("http://127.0.0.1:9", |_| {});
    let client = PushClient::new(&config.gateway).unwrap();
    let err = client.push(&payload(&config)).await.unwrap_err().to_string();
    assert!(err.starts_with("push:"), "Got: {}", err);
}

#[test]
fn test_url_password_is_masked_in_display_endpoint() {
    let config = config_for("http://user:topsecret@gw:9091", |_| {});
    let client = PushClient::new(&config.gateway).unwrap();
    assert!(!client.display_endpoint().contains("topsecret"));
    assert!(client.endpoint().as_str().contains("topsecret"));
}
