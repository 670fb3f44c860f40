use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use thiserror::Error;

use crate::error::QueryError;

/// Everything a Control API request can fail with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("missing required query parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no route for {0}")]
    NotFound(String),

    #[error("method {method} is not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Query(QueryError::InvalidPattern { .. })
            | ApiError::Query(QueryError::InvalidPort { .. })
            | ApiError::MissingParameter(_)
            | ApiError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            ApiError::Query(QueryError::StoreUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Query(QueryError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Stable machine-readable kind for the error body
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Query(QueryError::InvalidPattern { .. }) => "invalid_pattern",
            ApiError::Query(QueryError::InvalidPort { .. }) => "invalid_port",
            ApiError::Query(QueryError::StoreUnavailable) => "store_unavailable",
            ApiError::Query(QueryError::Timeout { .. }) => "timeout",
            ApiError::MissingParameter(_) => "missing_parameter",
            ApiError::InvalidParameter { .. } => "invalid_parameter",
            ApiError::NotFound(_) => "not_found",
            ApiError::MethodNotAllowed { .. } => "method_not_allowed",
        }
    }

    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Query(err) if err.is_retryable())
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let body = serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        let mut response = json_response(&body);
        *response.status_mut() = status;
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, DELETE"));
        }
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// 200 response carrying `value` as JSON
pub(crate) fn json_response<T: serde::Serialize + ?Sized>(value: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!("Failed to encode response body: {}", err);
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return response;
        }
    };
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_mapping_per_kind() {
        let cases = [
            (
                ApiError::from(QueryError::InvalidPattern {
                    pattern: "(".into(),
                    reason: "unclosed group".into(),
                }),
                StatusCode::BAD_REQUEST,
                "invalid_pattern",
            ),
            (
                ApiError::from(QueryError::InvalidPort { value: "0".into() }),
                StatusCode::BAD_REQUEST,
                "invalid_port",
            ),
            (
                ApiError::MissingParameter("urlPattern"),
                StatusCode::BAD_REQUEST,
                "missing_parameter",
            ),
            (
                ApiError::InvalidParameter {
                    name: "status",
                    reason: "not a number".into(),
                },
                StatusCode::BAD_REQUEST,
                "invalid_parameter",
            ),
            (
                ApiError::from(QueryError::StoreUnavailable),
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
            ),
            (
                ApiError::from(QueryError::Timeout { elapsed_ms: 10 }),
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
            ),
            (
                ApiError::NotFound("/nope".into()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                ApiError::MethodNotAllowed {
                    method: "POST".into(),
                    path: "/entries".into(),
                },
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
            ),
        ];
        for (err, status, kind) in cases {
            assert_eq!(err.status(), status, "{err}");
            assert_eq!(err.kind(), kind);
        }
    }

    #[tokio::test]
    async fn error_body_shape() {
        let response = ApiError::from(QueryError::StoreUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["kind"], "store_unavailable");
        assert_eq!(json["error"]["message"], "entry store is not initialized");
    }

    #[test]
    fn only_transient_failures_ask_for_retry() {
        let unavailable = ApiError::from(QueryError::StoreUnavailable);
        assert!(unavailable.is_retryable());
        assert_eq!(
            unavailable.into_response().headers().get(header::RETRY_AFTER).unwrap(),
            "1"
        );

        let timeout = ApiError::from(QueryError::Timeout { elapsed_ms: 10 });
        assert!(timeout.is_retryable());

        let bad_port = ApiError::from(QueryError::InvalidPort { value: "0".into() });
        assert!(!bad_port.is_retryable());
        assert!(bad_port.into_response().headers().get(header::RETRY_AFTER).is_none());
        assert!(!ApiError::MissingParameter("urlPattern").is_retryable());
    }
}
