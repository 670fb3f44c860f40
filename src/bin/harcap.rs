//! harcap service binary.
//!
//! Runs the capture proxy and the Control API until interrupted.
//!
//! Usage:
//! ```text
//! harcap --rest-port 8080 --proxy-port 8081 --max-entries 10000
//! ```

use clap::Parser;
use harcap_core::config::Config;
use harcap_core::logging::init_tracing;
use harcap_core::runtime::Runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let _logging = init_tracing(config.log_dir.as_deref())?;

    let runtime = Runtime::start(&config).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");

    runtime.stop().await
}
