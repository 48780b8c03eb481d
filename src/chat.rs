use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use irc::client::prelude::{Client, Config as IrcConfig, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::MessageSink;
use crate::config::Config;

pub mod event_handler;

pub use self::event_handler::{ChatEvent, SessionAction, SessionEventHandler};

const DEFAULT_TLS_PORT: u16 = 6697;
const DEFAULT_PLAIN_PORT: u16 = 6667;
const QUIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Splits `host[:port]`, falling back to the conventional port for the
/// transport.
pub fn split_server_address(server: &str, use_tls: bool) -> Result<(String, u16)> {
    let server = server.trim();
    let default_port = if use_tls {
        DEFAULT_TLS_PORT
    } else {
        DEFAULT_PLAIN_PORT
    };

    let (host, port) = match server.rsplit_once(':') {
        // bare IPv6 literal without a port
        Some((host, _)) if host.contains(':') && !host.ends_with(']') => (server, default_port),
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("invalid port in server address {server}"))?;
            (host, port)
        }
        None => (server, default_port),
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(anyhow!("server address {server} has no host"));
    }
    Ok((host.to_string(), port))
}

/// Posts delivery lines as PRIVMSGs to the configured channel.
#[derive(Clone)]
pub struct ChannelSink {
    sender: Sender,
    channel: String,
}

impl MessageSink for ChannelSink {
    fn send_line(&self, line: &str) -> Result<()> {
        self.sender
            .send_privmsg(&self.channel, line)
            .with_context(|| format!("failed to send to {}", self.channel))
    }
}

/// One connection to the chat server: registers, joins the channel and
/// reports when the bot is in it.
pub struct IrcSession {
    config: Arc<Config>,
    client: Client,
    handler: SessionEventHandler,
}

impl IrcSession {
    pub async fn connect(config: Arc<Config>) -> Result<Self> {
        let (host, port) = split_server_address(&config.server, config.use_tls)?;
        info!(
            "connecting to {}:{} as {} (tls={})",
            host, port, config.bot_name, config.use_tls
        );

        let irc_config = IrcConfig {
            nickname: Some(config.bot_name.clone()),
            username: Some(config.bot_name.clone()),
            realname: Some(config.bot_name.clone()),
            server: Some(host.clone()),
            port: Some(port),
            use_tls: Some(config.use_tls),
            ..IrcConfig::default()
        };

        let client = Client::from_config(irc_config)
            .await
            .with_context(|| format!("failed to connect to {host}:{port}"))?;
        client.identify().context("failed to register with server")?;

        let handler = SessionEventHandler::new(&config.channel);
        Ok(Self {
            config,
            client,
            handler,
        })
    }

    pub fn sink(&self) -> ChannelSink {
        ChannelSink {
            sender: self.client.sender(),
            channel: self.config.channel.clone(),
        }
    }

    /// Drives the connection until `cancel` fires or the server goes away.
    /// `on_joined` runs once, the first time the channel's names list
    /// arrives.
    pub async fn run<F>(mut self, cancel: CancellationToken, mut on_joined: F) -> Result<()>
    where
        F: FnMut(),
    {
        let sender = self.client.sender();
        let mut stream = self.client.stream().context("irc stream unavailable")?;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("leaving {}", self.config.channel);
                    if let Err(e) = sender.send_quit("bye") {
                        warn!("failed to send quit: {}", e);
                    }
                    // outgoing messages are flushed by polling the stream
                    let _ = tokio::time::timeout(QUIT_FLUSH_TIMEOUT, async {
                        while stream.next().await.is_some() {}
                    })
                    .await;
                    return Ok(());
                }
                next = stream.next() => next,
            };

            let Some(message) = next.transpose().context("irc connection failed")? else {
                return Err(anyhow!("irc connection closed by server"));
            };

            let event = ChatEvent::from_message(&message);
            if event == ChatEvent::Other {
                debug!("irc <- {}", message.to_string().trim_end());
                continue;
            }

            match self.handler.handle(&event) {
                Some(SessionAction::Join(channel)) => {
                    info!("registered, joining {}", channel);
                    sender
                        .send_join(&channel)
                        .with_context(|| format!("failed to join {channel}"))?;
                }
                Some(SessionAction::StartPolling) => {
                    info!("joined {}, starting bridge", self.config.channel);
                    on_joined();
                }
                None => {}
            }
        }
    }
}
