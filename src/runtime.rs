//! Process lifecycle: store, Control API and capture proxy

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{self, ControlApi};
use crate::config::Config;
use crate::proxy;
use crate::storage::{EntryStore, StoreHandle};

/// Running service. Dropping it without [`Runtime::stop`] leaves the tasks
/// running until the tokio runtime shuts down.
pub struct Runtime {
    store: StoreHandle,
    shutdown: watch::Sender<bool>,
    rest_addr: SocketAddr,
    proxy_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl Runtime {
    /// Initialize the store, bind both listeners and start serving
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let store = StoreHandle::new();
        store.init(config.max_entries)?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let rest_listener = TcpListener::bind(config.rest_addr()?)
            .await
            .with_context(|| format!("binding Control API to {}:{}", config.rest_host, config.rest_port))?;
        let rest_addr = rest_listener.local_addr()?;

        let proxy_listener = if config.disable_capture {
            tracing::info!("Capture proxy disabled");
            None
        } else {
            Some(
                TcpListener::bind(config.proxy_addr()?)
                    .await
                    .with_context(|| {
                        format!(
                            "binding capture proxy to {}:{}",
                            config.proxy_host, config.proxy_port
                        )
                    })?,
            )
        };
        let proxy_addr = proxy_listener
            .as_ref()
            .map(TcpListener::local_addr)
            .transpose()?;

        let api = ControlApi::new(store.clone(), config.query_timeout());
        tasks.push(tokio::spawn(api::serve(
            rest_listener,
            api,
            shutdown_rx.clone(),
        )));
        if let Some(listener) = proxy_listener {
            tasks.push(tokio::spawn(proxy::serve(
                listener,
                store.clone(),
                shutdown_rx,
            )));
        }

        tracing::info!(
            "harcap v{} started (api: {}, proxy: {})",
            crate::VERSION,
            rest_addr,
            proxy_addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );

        Ok(Self {
            store,
            shutdown,
            rest_addr,
            proxy_addr,
            tasks,
        })
    }

    pub fn rest_addr(&self) -> SocketAddr {
        self.rest_addr
    }

    pub fn proxy_addr(&self) -> Option<SocketAddr> {
        self.proxy_addr
    }

    pub fn store_handle(&self) -> &StoreHandle {
        &self.store
    }

    pub fn store(&self) -> anyhow::Result<Arc<EntryStore>> {
        Ok(self.store.get()?)
    }

    /// Stop accepting connections, wait for the servers and tear down the store
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        let mut outcome = Ok(());
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Server exited with error: {}", e);
                    outcome = Err(e);
                }
                Err(e) => tracing::error!("Server task failed: {}", e),
            }
        }
        if let Ok(store) = self.store.get() {
            tracing::info!(
                "Captured {} exchanges this session",
                store.last_sequence_id().await.unwrap_or(0)
            );
        }
        self.store.teardown();
        tracing::info!("harcap stopped");
        outcome
    }
}
