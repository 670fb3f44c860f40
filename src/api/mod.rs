//! Control API
//!
//! HTTP/JSON surface for querying and asserting on captured entries. Routes
//! are scoped by upstream port (`/proxy/{port}/har/...`) with a cross-port
//! `/entries` view.

mod control;
mod error;
mod params;

pub use control::{serve, ControlApi, DEFAULT_QUERY_TIMEOUT};
pub use error::ApiError;
pub use params::QueryParams;
