//! Captured entry model
//!
//! Represents a single HTTP request/response pair observed by the capture proxy.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpMethod {
    /// Convert from string (lossy, defaults to GET)
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "CONNECT" => HttpMethod::Connect,
            "TRACE" => HttpMethod::Trace,
            _ => HttpMethod::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a captured exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// Upstream answered and the response was relayed
    Completed,
    /// Upstream was unreachable or returned something unparseable
    Failed,
}

/// Timing information for a captured exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryTiming {
    /// When the request started
    pub started_at: i64, // milliseconds since epoch
    /// Time spent writing the request upstream
    pub send_ms: Option<u32>,
    /// Time to first byte of the response head
    pub wait_ms: Option<u32>,
    /// Response body transfer duration
    pub receive_ms: Option<u32>,
    /// Total duration in ms
    pub total_ms: Option<u32>,
}

impl Default for EntryTiming {
    fn default() -> Self {
        Self {
            started_at: Utc::now().timestamp_millis(),
            send_ms: None,
            wait_ms: None,
            receive_ms: None,
            total_ms: None,
        }
    }
}

/// One captured HTTP transaction.
///
/// Entries are immutable once appended to an [`EntryStore`](crate::storage::EntryStore);
/// the store hands out shared references and never copies payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedEntry {
    /// Arrival order, assigned by the store on append (0 until then)
    pub sequence_id: u64,

    /// Stable external identifier
    pub id: String,

    /// Destination port the exchange was proxied to
    pub upstream_port: u16,

    /// HTTP method
    pub method: HttpMethod,

    /// Full request URL (scheme://host[:port]/path?query)
    pub url: String,

    /// HTTP version (e.g., "HTTP/1.1")
    pub http_version: String,

    pub state: EntryState,

    // Request data
    /// Request headers in wire order
    pub request_headers: Vec<(String, String)>,
    /// Request body (if any, truncated to the capture limit)
    pub request_body: Option<Vec<u8>>,
    /// Request content type
    pub request_content_type: Option<String>,

    // Response data
    /// HTTP status code
    pub status_code: Option<u16>,
    /// HTTP status message
    pub status_message: Option<String>,
    /// Response headers in wire order
    pub response_headers: Vec<(String, String)>,
    /// Response body (if any, truncated to the capture limit)
    pub response_body: Option<Vec<u8>>,
    /// Response content type
    pub response_content_type: Option<String>,
    /// Response size in bytes as seen on the wire
    pub response_size: Option<u64>,

    /// Timing information
    pub timing: EntryTiming,
    /// Free-form diagnostic note (set on failures)
    pub notes: Option<String>,
}

impl CapturedEntry {
    /// Create a new entry for an outgoing request
    pub fn new(method: HttpMethod, url: impl Into<String>, upstream_port: u16) -> Self {
        Self {
            sequence_id: 0,
            id: uuid::Uuid::new_v4().to_string(),
            upstream_port,
            method,
            url: url.into(),
            http_version: "HTTP/1.1".to_string(),
            state: EntryState::Completed,
            request_headers: Vec::new(),
            request_body: None,
            request_content_type: None,
            status_code: None,
            status_message: None,
            response_headers: Vec::new(),
            response_body: None,
            response_content_type: None,
            response_size: None,
            timing: EntryTiming::default(),
            notes: None,
        }
    }

    /// Case-insensitive lookup of a response header
    pub fn response_header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.response_headers, name)
    }

    /// Case-insensitive lookup of a request header
    pub fn request_header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.request_headers, name)
    }

    /// Captured response body as text, lossily decoded
    pub fn response_text(&self) -> Option<Cow<'_, str>> {
        self.response_body
            .as_deref()
            .map(String::from_utf8_lossy)
    }

    /// Response body length: the wire size when known, else the captured length
    pub fn response_content_size(&self) -> u64 {
        self.response_size.unwrap_or_else(|| {
            self.response_body
                .as_ref()
                .map_or(0, |body| body.len() as u64)
        })
    }

    /// Mark the entry as failed with the given synthetic status
    pub fn fail(&mut self, status: u16, message: &str, note: &str) {
        self.state = EntryState::Failed;
        self.status_code = Some(status);
        self.status_message = Some(message.to_string());
        self.notes = Some(note.to_string());
    }
}

fn header_lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Build the full URL for a request, omitting the port when it is the
/// scheme's default.
pub fn build_url(scheme: &str, host: &str, port: u16, path: &str) -> String {
    let port_str = if (scheme == "https" && port == 443) || (scheme == "http" && port == 80) {
        String::new()
    } else {
        format!(":{}", port)
    };
    let path = if path.is_empty() { "/" } else { path };
    format!("{}://{}{}{}", scheme, host, port_str, path)
}
