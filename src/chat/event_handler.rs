use std::sync::atomic::{AtomicU8, Ordering};

use irc::client::prelude::{Command, Message, Response};
use tracing::{debug, trace};

/// Inbound traffic the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Welcome,
    Ping { payload: String },
    NamesReply { channel: Option<String> },
    Other,
}

impl ChatEvent {
    pub fn from_message(message: &Message) -> Self {
        match &message.command {
            Command::Response(Response::RPL_WELCOME, _) => ChatEvent::Welcome,
            Command::PING(payload, _) => ChatEvent::Ping {
                payload: payload.clone(),
            },
            Command::Response(Response::RPL_NAMREPLY, args) => ChatEvent::NamesReply {
                channel: names_reply_channel(args),
            },
            _ => ChatEvent::Other,
        }
    }
}

/// Channel of a names reply. Both `<nick> <symbol> <channel> :<names>` and
/// the older `<nick> <channel> :<names>` are in use; the trailing names list
/// is never the channel.
fn names_reply_channel(args: &[String]) -> Option<String> {
    let middle = args.len().saturating_sub(2);
    args.iter()
        .skip(1)
        .take(middle)
        .find(|arg| arg.starts_with(['#', '&', '+', '!']))
        .cloned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Join(String),
    StartPolling,
}

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;

/// Admits exactly one NOT_STARTED -> RUNNING transition.
#[derive(Debug, Default)]
pub struct StartGate {
    state: AtomicU8,
}

impl StartGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }
}

pub struct SessionEventHandler {
    channel: String,
    gate: StartGate,
}

impl SessionEventHandler {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            gate: StartGate::new(),
        }
    }

    pub fn handle(&self, event: &ChatEvent) -> Option<SessionAction> {
        match event {
            ChatEvent::Welcome => Some(SessionAction::Join(self.channel.clone())),
            // The irc client state answers PING with a PONG carrying the payload.
            ChatEvent::Ping { payload } => {
                trace!("keep-alive ping payload={}", payload);
                None
            }
            ChatEvent::NamesReply { channel } => {
                let ours = channel
                    .as_deref()
                    .is_none_or(|name| name.eq_ignore_ascii_case(&self.channel));
                if !ours {
                    debug!("ignoring names reply for {:?}", channel);
                    return None;
                }
                self.gate.try_start().then_some(SessionAction::StartPolling)
            }
            ChatEvent::Other => None,
        }
    }

    #[cfg(test)]
    pub fn is_polling(&self) -> bool {
        self.gate.is_running()
    }
}
