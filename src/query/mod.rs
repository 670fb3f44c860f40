//! URL pattern compilation, port-scoped scans and entry assertions

pub mod assertion;
pub mod engine;
mod pattern;

pub use assertion::{assert_entries, EntryAssertion};
pub use engine::{
    most_recent, parse_port, run, run_compiled, run_with_deadline, PortFilter, QueryResult,
};
pub use pattern::UrlPattern;
