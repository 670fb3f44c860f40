use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::api::error::{json_response, ApiError};
use crate::api::params::QueryParams;
use crate::models::{AssertionFilter, StatusClass};
use crate::query::{self, EntryAssertion, PortFilter, UrlPattern};
use crate::storage::har::{entries_to_har_log, HarEntry};
use crate::storage::StoreHandle;

/// Default per-request deadline
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period for in-flight requests once shutdown is signalled
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    AllEntries,
    ClearEntries,
    Proxy(u16, ProxyRoute),
}

/// Routes under `/proxy/{port}/har`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyRoute {
    Har,
    Entries,
    MostRecentEntry,
    Assert(Scope, Check),
}

/// Entries an assertion is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Every entry matching `urlPattern`
    Entries,
    /// Only the newest entry matching `urlPattern`
    MostRecent,
}

/// Assertion endpoint, before its parameters are read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    ResponseTime,
    StatusEquals,
    StatusClass(StatusClass),
    ContentContains,
    ContentDoesNotContain,
    ContentMatches,
    ContentLength,
    HeaderContains,
    HeaderDoesNotContain,
    HeaderMatches,
}

impl Check {
    fn from_segment(name: &str) -> Option<Self> {
        Some(match name {
            "assertResponseTimeLessThanOrEqual" => Check::ResponseTime,
            "assertStatusEquals" => Check::StatusEquals,
            "assertContentContains" => Check::ContentContains,
            "assertContentDoesNotContain" => Check::ContentDoesNotContain,
            "assertContentMatches" => Check::ContentMatches,
            "assertContentLengthLessThanOrEqual" => Check::ContentLength,
            "assertResponseHeaderContains" => Check::HeaderContains,
            "assertResponseHeaderDoesNotContain" => Check::HeaderDoesNotContain,
            "assertResponseHeaderMatches" => Check::HeaderMatches,
            other => Check::StatusClass(status_class_route(other)?),
        })
    }

    /// Status checks treat an absent or empty `urlPattern` as "all entries"
    fn url_pattern(self, params: &QueryParams) -> Result<Option<&str>, ApiError> {
        match self {
            Check::StatusEquals | Check::StatusClass(_) => Ok(params.non_empty("urlPattern")),
            _ => params.require("urlPattern").map(Some),
        }
    }

    fn assertion(self, params: &QueryParams) -> Result<EntryAssertion, ApiError> {
        let text = |name: &'static str| params.require_non_empty(name).map(str::to_string);
        Ok(match self {
            Check::ResponseTime => {
                EntryAssertion::ResponseTimeLessThanOrEqual(params.require_u64("milliseconds")?)
            }
            Check::StatusEquals => EntryAssertion::StatusEquals(params.require_status("status")?),
            Check::StatusClass(class) => EntryAssertion::StatusBelongsTo(class),
            Check::ContentContains => EntryAssertion::ContentContains(text("contentText")?),
            Check::ContentDoesNotContain => {
                EntryAssertion::ContentDoesNotContain(text("contentText")?)
            }
            Check::ContentMatches => EntryAssertion::ContentMatches(UrlPattern::compile(
                params.require("contentPattern")?,
            )?),
            Check::ContentLength => {
                EntryAssertion::ContentLengthLessThanOrEqual(params.require_u64("length")?)
            }
            Check::HeaderContains => EntryAssertion::ResponseHeaderContains {
                name: params.non_empty("headerName").map(str::to_string),
                value: text("headerValue")?,
            },
            Check::HeaderDoesNotContain => EntryAssertion::ResponseHeaderDoesNotContain {
                name: params.non_empty("headerName").map(str::to_string),
                value: text("headerValue")?,
            },
            Check::HeaderMatches => EntryAssertion::ResponseHeaderMatches {
                name: params
                    .non_empty("headerNamePattern")
                    .map(UrlPattern::compile)
                    .transpose()?,
                value: UrlPattern::compile(params.require("headerValuePattern")?)?,
            },
        })
    }
}

/// REST surface over the entry store
#[derive(Clone)]
pub struct ControlApi {
    store: StoreHandle,
    query_timeout: Duration,
}

impl ControlApi {
    pub fn new(store: StoreHandle, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let started = Instant::now();

        let response = match self.dispatch(&method, &path, request.uri().query()).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_retryable() {
                    tracing::warn!("{} {} failed: {}", method, path, err);
                } else {
                    tracing::debug!("{} {} rejected: {}", method, path, err);
                }
                err.into_response()
            }
        };

        tracing::debug!(
            "{} {} -> {} in {:?}",
            method,
            path,
            response.status(),
            started.elapsed()
        );
        response
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let route = resolve(method, path)?;
        let params = QueryParams::parse(query);
        let deadline = Some(Instant::now() + self.query_timeout);

        match route {
            Route::AllEntries => {
                let port = params.port("port")?;
                let pattern = UrlPattern::compile(params.require("urlPattern")?)?;
                self.entries(port.into(), &pattern, deadline).await
            }
            Route::ClearEntries => {
                let cleared = self.store.get()?.clear().await;
                Ok(json_response(&serde_json::json!({ "cleared": cleared })))
            }
            Route::Proxy(port, ProxyRoute::Entries) => {
                let pattern = UrlPattern::compile(params.require("urlPattern")?)?;
                self.entries(PortFilter::only(port), &pattern, deadline)
                    .await
            }
            Route::Proxy(port, ProxyRoute::MostRecentEntry) => {
                let pattern = UrlPattern::compile(params.require("urlPattern")?)?;
                let store = self.store.get()?;
                let entry =
                    query::most_recent(&store, PortFilter::only(port), &pattern, deadline).await?;
                Ok(match entry {
                    Some(entry) => json_response(&HarEntry::from(entry.as_ref())),
                    None => json_response(&serde_json::json!({})),
                })
            }
            Route::Proxy(port, ProxyRoute::Assert(scope, check)) => {
                let raw_pattern = check.url_pattern(&params)?;
                let assertion = check.assertion(&params)?;
                self.assert(port, scope, raw_pattern, assertion, deadline)
                    .await
            }
            Route::Proxy(port, ProxyRoute::Har) => {
                let pattern = UrlPattern::compile(".*")?;
                let store = self.store.get()?;
                let entries =
                    query::run_compiled(&store, PortFilter::only(port), &pattern, deadline)
                        .await?;
                Ok(json_response(&entries_to_har_log(
                    entries.iter().map(|entry| entry.as_ref()),
                )))
            }
        }
    }

    async fn entries(
        &self,
        ports: PortFilter,
        pattern: &UrlPattern,
        deadline: Option<Instant>,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let store = self.store.get()?;
        let entries = query::run_compiled(&store, ports, pattern, deadline).await?;
        let body: Vec<HarEntry> = entries
            .iter()
            .map(|entry| HarEntry::from(entry.as_ref()))
            .collect();
        Ok(json_response(&body))
    }

    async fn assert(
        &self,
        port: u16,
        scope: Scope,
        raw_pattern: Option<&str>,
        assertion: EntryAssertion,
        deadline: Option<Instant>,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let pattern = UrlPattern::compile(raw_pattern.unwrap_or(".*"))?;
        let store = self.store.get()?;
        let ports = PortFilter::only(port);
        let entries = match scope {
            Scope::Entries => query::run_compiled(&store, ports, &pattern, deadline).await?,
            Scope::MostRecent => query::most_recent(&store, ports, &pattern, deadline)
                .await?
                .into_iter()
                .collect(),
        };
        let filter = AssertionFilter {
            url_pattern: raw_pattern.map(str::to_string),
            port: Some(port),
        };
        let result = query::assert_entries(&entries, &assertion, filter);
        for failure in result.failed_requests() {
            tracing::debug!(
                "Assertion failed for {}: {}",
                failure.url,
                failure.message.as_deref().unwrap_or_default()
            );
        }
        Ok(json_response(&result))
    }
}

fn resolve(method: &Method, path: &str) -> Result<Route, ApiError> {
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    let not_allowed = || ApiError::MethodNotAllowed {
        method: method.to_string(),
        path: path.to_string(),
    };

    match segments.as_slice() {
        ["entries"] => match *method {
            Method::GET => Ok(Route::AllEntries),
            Method::DELETE => Ok(Route::ClearEntries),
            _ => Err(not_allowed()),
        },
        ["proxy", port, "har", rest @ ..] => {
            let target = match rest {
                [] => Some(ProxyRoute::Har),
                ["entries"] => Some(ProxyRoute::Entries),
                ["mostRecentEntry"] => Some(ProxyRoute::MostRecentEntry),
                ["entries", name] => {
                    Check::from_segment(name).map(|check| ProxyRoute::Assert(Scope::Entries, check))
                }
                ["mostRecentEntry", name] => Check::from_segment(name)
                    .map(|check| ProxyRoute::Assert(Scope::MostRecent, check)),
                _ => None,
            };
            let target = target.ok_or_else(|| ApiError::NotFound(path.to_string()))?;
            if *method != Method::GET {
                return Err(not_allowed());
            }
            Ok(Route::Proxy(query::parse_port(port)?, target))
        }
        _ => Err(ApiError::NotFound(path.to_string())),
    }
}

fn status_class_route(name: &str) -> Option<StatusClass> {
    match name {
        "assertStatusInformational" => Some(StatusClass::Informational),
        "assertStatusSuccess" => Some(StatusClass::Success),
        "assertStatusRedirection" => Some(StatusClass::Redirection),
        "assertStatusClientError" => Some(StatusClass::ClientError),
        "assertStatusServerError" => Some(StatusClass::ServerError),
        _ => None,
    }
}

/// Accept Control API connections until `shutdown` flips to `true`
pub async fn serve(
    listener: TcpListener,
    api: ControlApi,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Control API listening on http://{}", addr);
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!("Control API accept error: {}", e);
                        continue;
                    }
                };
                tracing::debug!("Control API connection from {}", peer_addr);

                let api = api.clone();
                let service = service_fn(move |request| {
                    let api = api.clone();
                    async move { Ok::<_, Infallible>(api.handle(request).await) }
                });
                let connection = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service);
                let connection = graceful.watch(connection);
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::debug!("Control API connection closed: {}", e);
                    }
                });
            }
        }
    }

    tokio::select! {
        _ = graceful.shutdown() => {}
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
            tracing::warn!("Control API shutdown timed out waiting for open connections");
        }
    }
    tracing::info!("Control API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::models::{CapturedEntry, HttpMethod};
    use crate::storage::EntryStore;
    use http::StatusCode;
    use http_body_util::{BodyExt, Empty};
    use serde_json::Value;
    use std::sync::Arc;

    async fn seeded_api() -> (ControlApi, Arc<EntryStore>) {
        let store = Arc::new(EntryStore::unbounded());
        for (url, port, status, total_ms) in [
            ("http://a.com/x", 8081, 200, 20),
            ("http://b.com/y", 9090, 200, 5),
            ("http://a.com/missing", 8081, 404, 700),
        ] {
            let mut entry = CapturedEntry::new(HttpMethod::Get, url, port);
            entry.status_code = Some(status);
            entry.timing.total_ms = Some(total_ms);
            store.append(entry).await;
        }
        let api = ControlApi::new(StoreHandle::with_store(Arc::clone(&store)), DEFAULT_QUERY_TIMEOUT);
        (api, store)
    }

    async fn call(api: &ControlApi, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::<Bytes>::new())
            .unwrap();
        let response = api.handle(request).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn port_scoped_entries() {
        let (api, _) = seeded_api().await;

        let (status, body) = call(&api, Method::GET, "/proxy/8081/har/entries?urlPattern=.*").await;
        assert_eq!(status, StatusCode::OK);
        let urls: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["request"]["url"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(urls, vec!["http://a.com/x", "http://a.com/missing"]);
        assert_eq!(body[0]["_upstreamPort"], 8081);
        assert_eq!(body[0]["_sequenceId"], 1);

        let (status, body) =
            call(&api, Method::GET, "/proxy/8081/har/entries?urlPattern=b%5C.com").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (status, body) = call(&api, Method::GET, "/proxy/8081/har/entries?urlPattern=(").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_pattern");
    }

    #[tokio::test]
    async fn entries_across_ports_with_optional_port_filter() {
        let (api, _) = seeded_api().await;
        let (_, all) = call(&api, Method::GET, "/entries?urlPattern=.*").await;
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, scoped) = call(&api, Method::GET, "/entries?urlPattern=.*&port=9090").await;
        assert_eq!(scoped.as_array().unwrap().len(), 1);
        assert_eq!(scoped[0]["request"]["url"], "http://b.com/y");
    }

    #[tokio::test]
    async fn validation_order_port_then_parameters_then_pattern_then_store() {
        let api = ControlApi::new(StoreHandle::new(), DEFAULT_QUERY_TIMEOUT);

        let (status, body) = call(&api, Method::GET, "/proxy/99999/har/entries?urlPattern=(").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_port");

        let (_, body) = call(&api, Method::GET, "/proxy/8081/har/entries").await;
        assert_eq!(body["error"]["kind"], "missing_parameter");

        let (_, body) = call(&api, Method::GET, "/proxy/8081/har/entries?urlPattern=(").await;
        assert_eq!(body["error"]["kind"], "invalid_pattern");

        let (status, body) = call(&api, Method::GET, "/proxy/8081/har/entries?urlPattern=.*").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["kind"], "store_unavailable");
    }

    #[tokio::test]
    async fn most_recent_entry_or_empty_object() {
        let (api, _) = seeded_api().await;
        let (status, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/mostRecentEntry?urlPattern=.*a%5C.com.*",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request"]["url"], "http://a.com/missing");

        let (status, body) =
            call(&api, Method::GET, "/proxy/7000/har/mostRecentEntry?urlPattern=.*").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));
    }

    #[tokio::test]
    async fn assertion_routes() {
        let (api, _) = seeded_api().await;

        let (status, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/entries/assertResponseTimeLessThanOrEqual?urlPattern=.*&milliseconds=100",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "1 passed, 2 total");
        assert_eq!(body["failed"], true);
        assert_eq!(body["filter"]["urlPattern"], ".*");

        let (_, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/entries/assertStatusEquals?status=200",
        )
        .await;
        assert_eq!(body["passed"], false);
        assert!(body["filter"].get("urlPattern").is_none());

        let (_, body) = call(
            &api,
            Method::GET,
            "/proxy/9090/har/entries/assertStatusSuccess",
        )
        .await;
        assert_eq!(body["passed"], true);
        assert_eq!(body["message"], "1 passed, 1 total");

        let (status, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/entries/assertResponseTimeLessThanOrEqual?urlPattern=.*",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "missing_parameter");
    }

    #[tokio::test]
    async fn har_log_and_clear() {
        let (api, store) = seeded_api().await;

        let (status, body) = call(&api, Method::GET, "/proxy/8081/har").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["log"]["version"], "1.2");
        assert_eq!(body["log"]["entries"].as_array().unwrap().len(), 2);

        let (status, body) = call(&api, Method::DELETE, "/entries").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 3);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let (api, _) = seeded_api().await;
        let (status, body) = call(&api, Method::GET, "/proxy/8081/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");

        let (status, body) = call(&api, Method::POST, "/proxy/8081/har/entries").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"]["kind"], "method_not_allowed");
    }

    #[tokio::test]
    async fn zero_timeout_reports_gateway_timeout() {
        let (_, store) = seeded_api().await;
        let api = ControlApi::new(StoreHandle::with_store(store), Duration::ZERO);
        let (status, body) = call(&api, Method::GET, "/entries?urlPattern=.*").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["kind"], "timeout");
    }

    #[tokio::test]
    async fn empty_url_pattern_means_all_entries_for_status_checks() {
        let (api, _) = seeded_api().await;

        let (status, body) = call(
            &api,
            Method::GET,
            "/proxy/9090/har/entries/assertStatusSuccess?urlPattern=",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["passed"], true);
        assert_eq!(body["message"], "1 passed, 1 total");
        assert!(body["filter"].get("urlPattern").is_none());

        let (status, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/entries/assertStatusEquals?status=200&urlPattern=",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "1 passed, 2 total");

        let (status, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/mostRecentEntry/assertStatusClientError?urlPattern=",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["passed"], true);
    }

    #[tokio::test]
    async fn most_recent_assertions_check_only_the_newest_match() {
        let (api, _) = seeded_api().await;

        let (_, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/mostRecentEntry/assertStatusEquals?status=404",
        )
        .await;
        assert_eq!(body["passed"], true);
        assert_eq!(body["message"], "1 passed, 1 total");
        assert_eq!(body["requests"][0]["url"], "http://a.com/missing");

        let (_, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/mostRecentEntry/assertResponseTimeLessThanOrEqual?urlPattern=.*x&milliseconds=100",
        )
        .await;
        assert_eq!(body["passed"], true);

        let (_, body) = call(
            &api,
            Method::GET,
            "/proxy/7000/har/mostRecentEntry/assertStatusSuccess",
        )
        .await;
        assert_eq!(body["passed"], true);
        assert_eq!(body["message"], "0 passed, 0 total");
    }

    async fn content_api() -> ControlApi {
        let store = Arc::new(EntryStore::unbounded());
        for (url, content_type, body) in [
            ("http://a.com/api", "application/json", r#"{"ok":true}"#),
            ("http://a.com/page", "text/html", "<html>hello</html>"),
        ] {
            let mut entry = CapturedEntry::new(HttpMethod::Get, url, 8081);
            entry.status_code = Some(200);
            entry.response_headers = vec![("Content-Type".into(), content_type.into())];
            entry.response_body = Some(body.as_bytes().to_vec());
            store.append(entry).await;
        }
        ControlApi::new(StoreHandle::with_store(store), DEFAULT_QUERY_TIMEOUT)
    }

    #[tokio::test]
    async fn content_assertion_routes() {
        let api = content_api().await;
        let base = "/proxy/8081/har/entries";

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentContains?urlPattern=.*api&contentText=ok"),
        )
        .await;
        assert_eq!(body["passed"], true);

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentContains?urlPattern=.*&contentText=hello"),
        )
        .await;
        assert_eq!(body["message"], "1 passed, 2 total");
        assert_eq!(body["requests"][0]["failed"], true);

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentDoesNotContain?urlPattern=.*&contentText=error"),
        )
        .await;
        assert_eq!(body["passed"], true);

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentMatches?urlPattern=.*page&contentPattern=%3Chtml%3E.*"),
        )
        .await;
        assert_eq!(body["passed"], true);

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentLengthLessThanOrEqual?urlPattern=.*&length=11"),
        )
        .await;
        assert_eq!(body["message"], "1 passed, 2 total");

        let (_, body) = call(
            &api,
            Method::GET,
            "/proxy/8081/har/mostRecentEntry/assertContentContains?urlPattern=.*&contentText=hello",
        )
        .await;
        assert_eq!(body["message"], "1 passed, 1 total");
    }

    #[tokio::test]
    async fn header_assertion_routes() {
        let api = content_api().await;
        let base = "/proxy/8081/har/entries";

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertResponseHeaderContains?urlPattern=.*&headerName=content-type&headerValue=json"),
        )
        .await;
        assert_eq!(body["message"], "1 passed, 2 total");

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertResponseHeaderContains?urlPattern=.*&headerName=&headerValue=text"),
        )
        .await;
        assert_eq!(body["message"], "1 passed, 2 total");

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertResponseHeaderDoesNotContain?urlPattern=.*&headerValue=xml"),
        )
        .await;
        assert_eq!(body["passed"], true);

        let (_, body) = call(
            &api,
            Method::GET,
            &format!(
                "{base}/assertResponseHeaderMatches?urlPattern=.*&headerNamePattern=Content-Type&headerValuePattern=%28application%7Ctext%29%2F.%2A"
            ),
        )
        .await;
        assert_eq!(body["passed"], true);
        assert_eq!(body["message"], "2 passed, 2 total");
    }

    #[tokio::test]
    async fn assertion_parameter_validation() {
        let api = content_api().await;
        let base = "/proxy/8081/har/entries";

        let (status, body) =
            call(&api, Method::GET, &format!("{base}/assertContentContains?urlPattern=.*")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "missing_parameter");

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentContains?urlPattern=.*&contentText="),
        )
        .await;
        assert_eq!(body["error"]["kind"], "missing_parameter");

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentMatches?urlPattern=.*&contentPattern=%28"),
        )
        .await;
        assert_eq!(body["error"]["kind"], "invalid_pattern");

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertContentLengthLessThanOrEqual?urlPattern=.*&length=-1"),
        )
        .await;
        assert_eq!(body["error"]["kind"], "invalid_parameter");

        let (_, body) = call(
            &api,
            Method::GET,
            &format!("{base}/assertResponseHeaderMatches?headerValuePattern=.*"),
        )
        .await;
        assert_eq!(body["error"]["kind"], "missing_parameter");
    }

    #[test]
    fn resolve_maps_paths_to_routes() {
        assert_eq!(
            resolve(&Method::GET, "/proxy/8081/har/entries/").unwrap(),
            Route::Proxy(8081, ProxyRoute::Entries)
        );
        assert_eq!(
            resolve(&Method::GET, "/proxy/8081/har/entries/assertStatusServerError").unwrap(),
            Route::Proxy(
                8081,
                ProxyRoute::Assert(Scope::Entries, Check::StatusClass(StatusClass::ServerError))
            )
        );
        assert_eq!(
            resolve(&Method::GET, "/proxy/8081/har/mostRecentEntry/assertContentMatches").unwrap(),
            Route::Proxy(8081, ProxyRoute::Assert(Scope::MostRecent, Check::ContentMatches))
        );
        assert_eq!(
            resolve(&Method::DELETE, "/entries").unwrap(),
            Route::ClearEntries
        );
        assert!(matches!(
            resolve(&Method::GET, "/proxy/8081/har/mostRecentEntry/assertNothing"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            resolve(&Method::GET, "/proxy/abc/har"),
            Err(ApiError::Query(QueryError::InvalidPort { .. }))
        ));
    }
}
