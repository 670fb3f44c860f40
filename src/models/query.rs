//! Query and assertion models shared by the engine and the Control API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters of a single entries query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Restrict to one upstream port; `None` means all ports
    pub port_filter: Option<u16>,
    /// Full-match URL regular expression
    pub url_pattern: String,
}

impl QuerySpec {
    pub fn all_ports(url_pattern: impl Into<String>) -> Self {
        Self {
            port_filter: None,
            url_pattern: url_pattern.into(),
        }
    }

    pub fn for_port(port: u16, url_pattern: impl Into<String>) -> Self {
        Self {
            port_filter: Some(port),
            url_pattern: url_pattern.into(),
        }
    }
}

/// HTTP status code families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Unknown,
}

impl StatusClass {
    pub fn of(code: u16) -> Self {
        match code {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Unknown,
        }
    }

    pub fn contains(&self, code: u16) -> bool {
        StatusClass::of(code) == *self
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusClass::Informational => "Informational",
            StatusClass::Success => "Success",
            StatusClass::Redirection => "Redirection",
            StatusClass::ClientError => "Client Error",
            StatusClass::ServerError => "Server Error",
            StatusClass::Unknown => "Unknown Status",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which entries an assertion was evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Per-entry outcome of an assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionEntryResult {
    pub url: String,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Summary of an assertion over a set of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub message: String,
    pub passed: bool,
    pub failed: bool,
    pub filter: AssertionFilter,
    pub requests: Vec<AssertionEntryResult>,
}

impl AssertionResult {
    pub fn failed_requests(&self) -> impl Iterator<Item = &AssertionEntryResult> {
        self.requests.iter().filter(|r| r.failed)
    }
}
