//! # harcap core
//!
//! Captures HTTP traffic flowing through a forward proxy and answers
//! port-scoped, URL-pattern queries over it as HAR entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  append   ┌─────────────┐  snapshot  ┌──────────────┐
//! │ Capture      │──────────▶│ Entry Store │◀───────────│ Query Engine │
//! │ Proxy        │           │ (ring, Arc) │            │ port + regex │
//! └──────────────┘           └─────────────┘            └──────┬───────┘
//!                                                              │
//!                                                       ┌──────▼───────┐
//!                                                       │ Control API  │
//!                                                       │ (REST, JSON) │
//!                                                       └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod query;
pub mod runtime;
pub mod storage;

pub use error::QueryError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
