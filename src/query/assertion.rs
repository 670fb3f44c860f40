use std::sync::Arc;

use crate::models::{
    AssertionEntryResult, AssertionFilter, AssertionResult, CapturedEntry, StatusClass,
};
use crate::query::UrlPattern;

/// Predicate checked against every entry a query selected
#[derive(Debug, Clone)]
pub enum EntryAssertion {
    /// Total exchange time must not exceed the given milliseconds
    ResponseTimeLessThanOrEqual(u64),
    StatusEquals(u16),
    StatusBelongsTo(StatusClass),
    ContentContains(String),
    ContentDoesNotContain(String),
    /// Response body text must match the pattern in full
    ContentMatches(UrlPattern),
    ContentLengthLessThanOrEqual(u64),
    /// Some response header value contains `value`; with `name`, only
    /// headers of that name are considered
    ResponseHeaderContains { name: Option<String>, value: String },
    ResponseHeaderDoesNotContain { name: Option<String>, value: String },
    /// Every response header (whose name matches `name`, when given) has a
    /// value matching `value`
    ResponseHeaderMatches {
        name: Option<UrlPattern>,
        value: UrlPattern,
    },
}

impl EntryAssertion {
    /// `None` when the entry passes, otherwise the failure message
    pub fn check(&self, entry: &CapturedEntry) -> Option<String> {
        match self {
            EntryAssertion::ResponseTimeLessThanOrEqual(limit) => {
                let actual = u64::from(entry.timing.total_ms.unwrap_or(0));
                (actual > *limit).then(|| mismatch("Time exceeded", limit, actual))
            }
            EntryAssertion::StatusEquals(expected) => {
                let actual = entry.status_code.unwrap_or(0);
                (actual != *expected).then(|| mismatch("Status mismatch", expected, actual))
            }
            EntryAssertion::StatusBelongsTo(class) => {
                let actual = entry.status_code.unwrap_or(0);
                (!class.contains(actual)).then(|| {
                    format!(
                        "Expected response status to belong to class: {}, but was: {} (belongs to {})",
                        class,
                        actual,
                        StatusClass::of(actual)
                    )
                })
            }
            EntryAssertion::ContentContains(text) => {
                let content = entry.response_text();
                let found = content.as_deref().is_some_and(|c| c.contains(text.as_str()));
                (!found).then(|| {
                    format!(
                        "Expected to find string in content. Search string: '{}', content: '{}'",
                        text,
                        content.unwrap_or_default()
                    )
                })
            }
            EntryAssertion::ContentDoesNotContain(text) => {
                let content = entry.response_text()?;
                content.contains(text.as_str()).then(|| {
                    format!(
                        "Expected to find no string with specified value in content. Search string: '{}', content: '{}'",
                        text, content
                    )
                })
            }
            EntryAssertion::ContentMatches(pattern) => {
                let content = entry.response_text();
                let matched = content.as_deref().is_some_and(|c| pattern.matches(c));
                (!matched).then(|| {
                    format!(
                        "Expected content to match pattern. Pattern: '{}', content: '{}'",
                        pattern.as_str(),
                        content.unwrap_or_default()
                    )
                })
            }
            EntryAssertion::ContentLengthLessThanOrEqual(max) => {
                let size = entry.response_content_size();
                (size > *max).then(|| {
                    format!(
                        "Expected content length not to exceed max value. Max value: {max}, content length: {size}"
                    )
                })
            }
            EntryAssertion::ResponseHeaderContains { name, value } => {
                let found = response_headers(entry, name.as_deref())
                    .any(|(_, v)| v.contains(value.as_str()));
                (!found).then(|| match name {
                    Some(name) => format!(
                        "Expected to find header with name: '{name}' and value containing string: '{value}'"
                    ),
                    None => format!(
                        "Expected to find one or more headers containing string: '{value}'"
                    ),
                })
            }
            EntryAssertion::ResponseHeaderDoesNotContain { name, value } => {
                let (found, _) = response_headers(entry, name.as_deref())
                    .find(|(_, v)| v.contains(value.as_str()))?;
                Some(match name {
                    Some(_) => format!(
                        "Expected to find no header with name '{found}' and value containing string '{value}'"
                    ),
                    None => format!(
                        "Expected to find no headers containing string '{value}'. Found header with name: '{found}' containing string: '{value}'"
                    ),
                })
            }
            EntryAssertion::ResponseHeaderMatches { name, value } => {
                let offending: Vec<&str> = non_empty_headers(entry)
                    .filter(|(n, _)| name.as_ref().map_or(true, |p| p.matches(n)))
                    .filter(|(_, v)| !value.matches(v))
                    .map(|(n, _)| n)
                    .collect();
                if offending.is_empty() {
                    return None;
                }
                let names = offending.join(",");
                Some(match name {
                    Some(name) => format!(
                        "Expected headers with names matching pattern: '{}' to have values matching pattern: '{}'. Headers names not matching value pattern: '{}'",
                        name.as_str(),
                        value.as_str(),
                        names
                    ),
                    None => format!(
                        "Expected headers values to match pattern: '{}'. Headers names which values don't match value pattern: {}",
                        value.as_str(),
                        names
                    ),
                })
            }
        }
    }
}

/// Response headers with a non-empty name and value
fn non_empty_headers(entry: &CapturedEntry) -> impl Iterator<Item = (&str, &str)> {
    entry
        .response_headers
        .iter()
        .filter(|(n, v)| !n.is_empty() && !v.is_empty())
        .map(|(n, v)| (n.as_str(), v.as_str()))
}

/// Non-empty response headers, restricted to `name` (case-insensitive) when given
fn response_headers<'a>(
    entry: &'a CapturedEntry,
    name: Option<&'a str>,
) -> impl Iterator<Item = (&'a str, &'a str)> {
    non_empty_headers(entry)
        .filter(move |(n, _)| name.map_or(true, |wanted| n.eq_ignore_ascii_case(wanted)))
}

fn mismatch(prefix: &str, expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> String {
    format!("{prefix}. Expected: {expected}, actual: {actual}")
}

/// Evaluate `assertion` against each entry. An empty entry list passes.
pub fn assert_entries(
    entries: &[Arc<CapturedEntry>],
    assertion: &EntryAssertion,
    filter: AssertionFilter,
) -> AssertionResult {
    let requests: Vec<AssertionEntryResult> = entries
        .iter()
        .map(|entry| {
            let message = assertion.check(entry);
            AssertionEntryResult {
                url: entry.url.clone(),
                failed: message.is_some(),
                message,
            }
        })
        .collect();

    let failed = requests.iter().filter(|r| r.failed).count();
    let total = requests.len();
    tracing::debug!("Assertion {:?}: {} of {} failed", assertion, failed, total);

    AssertionResult {
        message: format!("{} passed, {} total", total - failed, total),
        passed: failed == 0,
        failed: failed > 0,
        filter,
        requests,
    }
}
