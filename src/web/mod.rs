use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use salvo::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;

pub mod handlers;
pub mod metrics;
pub mod router;

use self::router::create_router;

#[derive(Debug, Clone)]
pub struct WebState {
    pub channel: String,
    pub users: usize,
}

static WEB_STATE: OnceCell<WebState> = OnceCell::new();

pub fn web_state() -> Option<&'static WebState> {
    WEB_STATE.get()
}

/// Serves `/metrics` and `/health` while the bridge runs.
#[derive(Clone)]
pub struct WebServer {
    config: Arc<Config>,
}

impl WebServer {
    pub fn new(config: Arc<Config>) -> Self {
        let _ = WEB_STATE.set(WebState {
            channel: config.channel.clone(),
            users: config.users.len(),
        });

        Self { config }
    }

    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.metrics.bind_address, self.config.metrics.port
        );
        info!("starting metrics server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr.clone())
            .try_bind()
            .await
            .with_context(|| format!("failed to bind metrics server on {bind_addr}"))?;
        let server = Server::new(acceptor);
        let handle = server.handle();
        tokio::spawn(async move {
            cancel.cancelled().await;
            handle.stop_graceful(None);
        });
        server.serve(create_router()).await;

        info!("metrics server stopped");
        Ok(())
    }
}
