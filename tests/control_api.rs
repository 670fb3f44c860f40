use harcap_core::config::Config;
use harcap_core::models::{CapturedEntry, HttpMethod};
use harcap_core::runtime::Runtime;
use reqwest::StatusCode;
use serde_json::Value;

async fn start_runtime() -> Runtime {
    let config = Config {
        rest_port: 0,
        disable_capture: true,
        ..Config::default()
    };
    Runtime::start(&config).await.expect("runtime starts")
}

async fn seed(runtime: &Runtime, entries: &[(&str, u16, u16)]) {
    let store = runtime.store().unwrap();
    for (url, port, status) in entries {
        let mut entry = CapturedEntry::new(HttpMethod::Get, *url, *port);
        entry.status_code = Some(*status);
        entry.timing.total_ms = Some(10);
        store.append(entry).await;
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn get(runtime: &Runtime, path_and_query: &str) -> (StatusCode, Value) {
    let url = format!("http://{}{}", runtime.rest_addr(), path_and_query);
    let response = client().get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn port_scoped_entries_end_to_end() {
    let runtime = start_runtime().await;
    seed(
        &runtime,
        &[("http://a.com/x", 8081, 200), ("http://b.com/y", 9090, 200)],
    )
    .await;

    let (status, body) = get(&runtime, "/proxy/8081/har/entries?urlPattern=.*").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["request"]["url"], "http://a.com/x");
    assert_eq!(entries[0]["response"]["status"], 200);

    let (status, body) = get(&runtime, "/proxy/8081/har/entries?urlPattern=b%5C.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    let (status, body) = get(&runtime, "/proxy/8081/har/entries?urlPattern=%28").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_pattern");

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn repeated_queries_return_identical_results() {
    let runtime = start_runtime().await;
    seed(
        &runtime,
        &[
            ("http://a.com/1", 8081, 200),
            ("http://a.com/2", 8081, 500),
            ("http://a.com/3", 8081, 200),
        ],
    )
    .await;

    let (_, first) = get(&runtime, "/entries?urlPattern=%5E.*%24&port=8081").await;
    let (_, second) = get(&runtime, "/entries?urlPattern=%5E.*%24&port=8081").await;
    assert_eq!(first, second);
    let ids: Vec<_> = first
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["_sequenceId"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn error_statuses() {
    let runtime = start_runtime().await;

    let (status, body) = get(&runtime, "/proxy/0/har/entries?urlPattern=.*").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_port");

    let (status, body) = get(&runtime, "/proxy/8081/har/entries").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "missing_parameter");

    let (status, body) = get(&runtime, "/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn store_unavailable_after_teardown() {
    let runtime = start_runtime().await;
    runtime.store_handle().teardown();

    let url = format!("http://{}/proxy/8081/har/entries?urlPattern=.*", runtime.rest_addr());
    let response = client().get(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "1");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "store_unavailable");

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn assertions_and_clear() {
    let runtime = start_runtime().await;
    seed(
        &runtime,
        &[
            ("http://a.com/ok", 8081, 200),
            ("http://a.com/redirect", 8081, 302),
        ],
    )
    .await;

    let (status, body) = get(
        &runtime,
        "/proxy/8081/har/entries/assertStatusSuccess?urlPattern=.*ok",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["passed"], true);
    assert_eq!(body["message"], "1 passed, 1 total");

    let (_, body) = get(&runtime, "/proxy/8081/har/entries/assertStatusEquals?status=200").await;
    assert_eq!(body["failed"], true);
    assert_eq!(body["message"], "1 passed, 2 total");

    let (status, body) = get(
        &runtime,
        "/proxy/8081/har/entries/assertStatusRedirection?urlPattern=",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "1 passed, 2 total");

    let (_, body) = get(
        &runtime,
        "/proxy/8081/har/mostRecentEntry/assertStatusRedirection?urlPattern=",
    )
    .await;
    assert_eq!(body["passed"], true);
    assert_eq!(body["message"], "1 passed, 1 total");

    let url = format!("http://{}/entries", runtime.rest_addr());
    let response = client().delete(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["cleared"], 2);

    let (_, body) = get(&runtime, "/proxy/8081/har/entries?urlPattern=.*").await;
    assert_eq!(body, serde_json::json!([]));

    runtime.stop().await.unwrap();
}
