//! HAR 1.2 representation of captured entries
//!
//! This is the wire shape of the Control API: one [`HarEntry`] per captured
//! exchange, with the store's bookkeeping carried in underscore-prefixed
//! custom fields as the HAR format allows.

use base64::{engine::general_purpose, Engine as _};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::models::CapturedEntry;

const HAR_VERSION: &str = "1.2";
const CREATOR_NAME: &str = "harcap";
const CREATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct HarLog {
    pub log: HarLogInner,
}

#[derive(Debug, Serialize)]
pub struct HarLogInner {
    pub version: &'static str,
    pub creator: HarCreator,
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Serialize)]
pub struct HarCreator {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(rename = "_sequenceId")]
    pub sequence_id: u64,
    #[serde(rename = "_upstreamPort")]
    pub upstream_port: u16,
    #[serde(rename = "_id")]
    pub id: String,
    pub started_date_time: String,
    pub time: i64,
    pub request: HarRequest,
    pub response: HarResponse,
    pub cache: HashMap<String, Value>,
    pub timings: HarTimings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<HarHeader>,
    pub query_string: Vec<HarHeader>,
    pub cookies: Vec<Value>,
    pub headers_size: i64,
    pub body_size: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub post_data: Option<HarPostData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: i64,
    pub status_text: String,
    pub http_version: String,
    pub headers: Vec<HarHeader>,
    pub cookies: Vec<Value>,
    pub content: HarContent,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    pub mime_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    pub size: i64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarTimings {
    pub send: i64,
    pub wait: i64,
    pub receive: i64,
}

/// Wrap entries in a complete HAR log document
pub fn entries_to_har_log<'a, I>(entries: I) -> HarLog
where
    I: IntoIterator<Item = &'a CapturedEntry>,
{
    HarLog {
        log: HarLogInner {
            version: HAR_VERSION,
            creator: HarCreator {
                name: CREATOR_NAME,
                version: CREATOR_VERSION,
            },
            entries: entries.into_iter().map(HarEntry::from).collect(),
        },
    }
}

impl From<&CapturedEntry> for HarEntry {
    fn from(entry: &CapturedEntry) -> Self {
        let started_date_time = Utc
            .timestamp_millis_opt(entry.timing.started_at)
            .single()
            .unwrap_or_else(Utc::now)
            .to_rfc3339();
        let time = entry.timing.total_ms.unwrap_or(0) as i64;
        Self {
            sequence_id: entry.sequence_id,
            upstream_port: entry.upstream_port,
            id: entry.id.clone(),
            started_date_time,
            time,
            request: HarRequest::from(entry),
            response: HarResponse::from(entry),
            cache: HashMap::new(),
            timings: HarTimings {
                send: entry.timing.send_ms.map(i64::from).unwrap_or(0),
                wait: entry.timing.wait_ms.map(i64::from).unwrap_or(time),
                receive: entry.timing.receive_ms.map(i64::from).unwrap_or(0),
            },
        }
    }
}

impl From<&CapturedEntry> for HarRequest {
    fn from(entry: &CapturedEntry) -> Self {
        let (body_size, post_data) =
            encode_body(&entry.request_body, entry.request_content_type.as_deref());
        Self {
            method: entry.method.to_string(),
            url: entry.url.clone(),
            http_version: entry.http_version.clone(),
            headers: to_har_headers(&entry.request_headers),
            query_string: query_string_of(&entry.url),
            cookies: Vec::new(),
            headers_size: -1,
            body_size,
            post_data,
        }
    }
}

impl From<&CapturedEntry> for HarResponse {
    fn from(entry: &CapturedEntry) -> Self {
        let content = HarContent::from_body(
            &entry.response_body,
            entry.response_content_type.as_deref(),
            entry.response_size,
        );
        Self {
            status: entry.status_code.map(i64::from).unwrap_or(0),
            status_text: entry.status_message.clone().unwrap_or_default(),
            http_version: entry.http_version.clone(),
            headers: to_har_headers(&entry.response_headers),
            cookies: Vec::new(),
            body_size: content.size,
            content,
            redirect_url: entry
                .response_header("location")
                .unwrap_or_default()
                .to_string(),
            headers_size: -1,
        }
    }
}

impl HarContent {
    fn from_body(body: &Option<Vec<u8>>, mime_type: Option<&str>, declared: Option<u64>) -> Self {
        let mime_type = mime_type.unwrap_or(DEFAULT_MIME).to_string();
        match body {
            Some(bytes) => {
                let (text, encoding) = text_or_base64(bytes);
                Self {
                    size: declared.map(|s| s as i64).unwrap_or(bytes.len() as i64),
                    mime_type,
                    text: Some(text),
                    encoding,
                }
            }
            None => Self {
                size: declared.map(|s| s as i64).unwrap_or(0),
                mime_type,
                text: None,
                encoding: None,
            },
        }
    }
}

fn encode_body(body: &Option<Vec<u8>>, mime_type: Option<&str>) -> (i64, Option<HarPostData>) {
    match body {
        Some(bytes) => {
            let (text, encoding) = text_or_base64(bytes);
            (
                bytes.len() as i64,
                Some(HarPostData {
                    mime_type: mime_type.unwrap_or(DEFAULT_MIME).to_string(),
                    text,
                    encoding,
                }),
            )
        }
        None => (0, None),
    }
}

fn text_or_base64(bytes: &[u8]) -> (String, Option<String>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (
            general_purpose::STANDARD.encode(bytes),
            Some("base64".to_string()),
        ),
    }
}

fn to_har_headers(headers: &[(String, String)]) -> Vec<HarHeader> {
    headers
        .iter()
        .map(|(name, value)| HarHeader {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn query_string_of(url: &str) -> Vec<HarHeader> {
    let without_fragment = url.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((_, query)) => parse_query(query)
            .into_iter()
            .map(|(name, value)| HarHeader { name, value })
            .collect(),
        None => Vec::new(),
    }
}

/// Split an `application/x-www-form-urlencoded` query into decoded pairs
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut parts = segment.splitn(2, '=');
            let name = percent_decode(parts.next().unwrap_or_default());
            let value = percent_decode(parts.next().unwrap_or_default());
            (name, value)
        })
        .collect()
}

/// Decode `%XX` escapes and `+`; invalid escapes are kept literally
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                if let (Some(h), Some(l)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    output.push(h << 4 | l);
                    i += 3;
                    continue;
                }
                output.push(b'%');
                i += 1;
            }
            b'+' => {
                output.push(b' ');
                i += 1;
            }
            byte => {
                output.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&output).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
