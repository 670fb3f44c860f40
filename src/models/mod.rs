//! Data models for captured traffic and queries over it

pub mod entry;
pub mod query;

pub use entry::*;
pub use query::*;
