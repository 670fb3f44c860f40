//! Service configuration from command-line flags and `HARCAP_*` variables

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::DEFAULT_MAX_ENTRIES;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "harcap", author, version, about = "Traffic capture proxy with a HAR query API", long_about = None)]
pub struct Config {
    /// Address the Control API binds to
    #[arg(long, env = "HARCAP_REST_HOST", default_value = "127.0.0.1")]
    pub rest_host: String,

    /// Port of the Control API (0 picks a free port)
    #[arg(long, env = "HARCAP_REST_PORT", default_value_t = 8080)]
    pub rest_port: u16,

    /// Address the capture proxy binds to
    #[arg(long, env = "HARCAP_PROXY_HOST", default_value = "127.0.0.1")]
    pub proxy_host: String,

    /// Port of the capture proxy (0 picks a free port)
    #[arg(long, env = "HARCAP_PROXY_PORT", default_value_t = 8081)]
    pub proxy_port: u16,

    /// Run only the Control API; entries must be fed by an embedding process
    #[arg(long, env = "HARCAP_DISABLE_CAPTURE")]
    pub disable_capture: bool,

    /// Entries kept before the oldest are evicted (0 = unbounded)
    #[arg(long, env = "HARCAP_MAX_ENTRIES", default_value_t = DEFAULT_MAX_ENTRIES)]
    pub max_entries: usize,

    /// Deadline for a single Control API query in milliseconds
    #[arg(long, env = "HARCAP_QUERY_TIMEOUT_MS", default_value_t = 5000)]
    pub query_timeout_ms: u64,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, env = "HARCAP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rest_host: "127.0.0.1".to_string(),
            rest_port: 8080,
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: 8081,
            disable_capture: false,
            max_entries: DEFAULT_MAX_ENTRIES,
            query_timeout_ms: 5000,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn rest_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_addr(&self.rest_host, self.rest_port)
    }

    pub fn proxy_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_addr(&self.proxy_host, self.proxy_port)
    }
}

fn parse_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let ip: std::net::IpAddr = host
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {}", host, e))?;
    Ok(SocketAddr::new(ip, port))
}
