#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bridge;
mod chat;
mod cli;
mod config;
mod untappd;
mod utils;
mod web;

use bridge::MessageSink;
use chat::IrcSession;
use cli::Args;
use config::Config;
use untappd::{CheckinSource, UntappdClient};
use web::WebServer;
use web::metrics::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init_tracing();

    let args = Args::parse_args();
    let config = Arc::new(Config::load(args.config.as_deref()).context("failed to load config")?);
    info!(
        "untappd-irc bridge starting up for {} users",
        config.users.len()
    );
    Metrics::init();

    let source: Arc<dyn CheckinSource> = Arc::new(UntappdClient::new(&config)?);
    let cancel = CancellationToken::new();
    let tasks: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

    if config.metrics.enabled {
        let web_server = WebServer::new(config.clone());
        let web_cancel = cancel.clone();
        tasks.lock().push(tokio::spawn(async move {
            if let Err(e) = web_server.start(web_cancel).await {
                error!("web server error: {}", e);
            }
        }));
    }

    let session = IrcSession::connect(config.clone()).await?;
    let sink: Arc<dyn MessageSink> = Arc::new(session.sink());

    let on_joined = {
        let config = config.clone();
        let cancel = cancel.clone();
        let tasks = tasks.clone();
        move || {
            let handles = bridge::spawn(config.clone(), source.clone(), sink.clone(), cancel.clone());
            tasks.lock().extend(handles);
        }
    };

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    let result = session.run(cancel.clone(), on_joined).await;

    cancel.cancel();
    let handles: Vec<_> = tasks.lock().drain(..).collect();
    for handle in handles {
        if let Err(e) = handle.await {
            error!("task failed during shutdown: {}", e);
        }
    }

    info!("untappd-irc bridge shutting down");
    result
}
