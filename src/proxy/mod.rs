//! HTTP capture proxy
//!
//! Forwards plain HTTP traffic and appends each exchange to the entry store.

mod server;

pub use server::serve;
