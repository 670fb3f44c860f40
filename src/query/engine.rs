use std::sync::Arc;
use tokio::time::Instant;

use crate::error::QueryError;
use crate::models::{CapturedEntry, QuerySpec};
use crate::query::pattern::UrlPattern;
use crate::storage::{EntryStore, Snapshot};

/// Entries scanned between deadline checks and cooperative yields
const SCAN_BATCH: usize = 256;

/// Matched entries in ascending `sequence_id` order
pub type QueryResult = Vec<Arc<CapturedEntry>>;

/// Narrows a query to the traffic of one upstream port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortFilter(Option<u16>);

impl PortFilter {
    pub fn any() -> Self {
        Self(None)
    }

    pub fn only(port: u16) -> Self {
        Self(Some(port))
    }

    pub fn port(&self) -> Option<u16> {
        self.0
    }

    pub fn admits(&self, entry: &CapturedEntry) -> bool {
        self.0.map_or(true, |port| entry.upstream_port == port)
    }
}

impl From<Option<u16>> for PortFilter {
    fn from(port: Option<u16>) -> Self {
        Self(port)
    }
}

/// Parse a port parameter: a decimal integer in `1..=65535`
pub fn parse_port(raw: &str) -> Result<u16, QueryError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(QueryError::InvalidPort {
            value: raw.to_string(),
        }),
    }
}

pub async fn run(store: &EntryStore, query: &QuerySpec) -> Result<QueryResult, QueryError> {
    run_with_deadline(store, query, None).await
}

/// Compile the pattern, snapshot the store and filter it.
///
/// The pattern is compiled before the store is touched, so an invalid pattern
/// never yields partial results.
pub async fn run_with_deadline(
    store: &EntryStore,
    query: &QuerySpec,
    deadline: Option<Instant>,
) -> Result<QueryResult, QueryError> {
    let pattern = UrlPattern::compile(&query.url_pattern)?;
    run_compiled(store, query.port_filter.into(), &pattern, deadline).await
}

pub async fn run_compiled(
    store: &EntryStore,
    ports: PortFilter,
    pattern: &UrlPattern,
    deadline: Option<Instant>,
) -> Result<QueryResult, QueryError> {
    let snapshot = store.snapshot().await;
    filter_snapshot(&snapshot, ports, pattern, deadline).await
}

/// Apply the port filter then the pattern, keeping snapshot order.
///
/// Checks `deadline` before every batch and abandons the scan once it has
/// passed.
pub async fn filter_snapshot(
    snapshot: &Snapshot,
    ports: PortFilter,
    pattern: &UrlPattern,
    deadline: Option<Instant>,
) -> Result<QueryResult, QueryError> {
    let started = Instant::now();
    let mut matched = Vec::new();

    for (scanned, entry) in snapshot.iter().enumerate() {
        if scanned % SCAN_BATCH == 0 {
            check_deadline(deadline, started)?;
            if scanned > 0 {
                tokio::task::yield_now().await;
            }
        }
        if ports.admits(entry) && pattern.matches(&entry.url) {
            matched.push(Arc::clone(entry));
        }
    }

    tracing::debug!(
        "Query '{}' (port {:?}) matched {} of {} entries in {:?}",
        pattern.as_str(),
        ports.port(),
        matched.len(),
        snapshot.len(),
        started.elapsed()
    );
    Ok(matched)
}

/// The matching entry with the highest sequence id
pub async fn most_recent(
    store: &EntryStore,
    ports: PortFilter,
    pattern: &UrlPattern,
    deadline: Option<Instant>,
) -> Result<Option<Arc<CapturedEntry>>, QueryError> {
    let snapshot = store.snapshot().await;
    let started = Instant::now();
    for (scanned, entry) in snapshot.iter().rev().enumerate() {
        if scanned % SCAN_BATCH == 0 {
            check_deadline(deadline, started)?;
            if scanned > 0 {
                tokio::task::yield_now().await;
            }
        }
        if ports.admits(entry) && pattern.matches(&entry.url) {
            return Ok(Some(Arc::clone(entry)));
        }
    }
    Ok(None)
}

fn check_deadline(deadline: Option<Instant>, started: Instant) -> Result<(), QueryError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(QueryError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
        _ => Ok(()),
    }
}
