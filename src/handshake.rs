//! Version handshake state machine.
//!
//! Each side sends its `version` once and answers the peer's `version` with a
//! `verack`. Nothing else may be exchanged before both have been received.
//! The machine does no I/O, it tells the caller what to do with each message.

use tracing::debug;

use super::{
    errors::{BTCP2PError, Result},
    message::Message,
};

/// Progress of the handshake as seen from this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent or received yet.
    Init,
    /// Our version went out, the peer's has not arrived.
    VersionSent,
    /// The peer's version arrived and was acknowledged, waiting for its verack.
    PeerVersionSeen,
    /// Both version and verack received.
    HandshakeComplete,
    /// At least one application message was handed over.
    Streaming,
}

/// What the session must do after a message went through the machine.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Handshake bookkeeping only.
    None,
    /// Write this message back to the peer.
    Reply(Message),
    /// Hand this application message to the consumer.
    Deliver(Message),
}

#[derive(Debug, Default)]
pub struct Handshake {
    version_sent: bool,
    version_received: bool,
    verack_received: bool,
    delivered: u64,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that our own version message was written.
    pub fn mark_version_sent(&mut self) {
        self.version_sent = true;
    }

    pub fn version_received(&self) -> bool {
        self.version_received
    }

    pub fn verack_received(&self) -> bool {
        self.verack_received
    }

    pub fn is_complete(&self) -> bool {
        self.version_received && self.verack_received
    }

    /// Number of application messages handed over so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn state(&self) -> HandshakeState {
        if self.delivered > 0 {
            HandshakeState::Streaming
        } else if self.is_complete() {
            HandshakeState::HandshakeComplete
        } else if self.version_received {
            HandshakeState::PeerVersionSeen
        } else if self.version_sent {
            HandshakeState::VersionSent
        } else {
            HandshakeState::Init
        }
    }

    /// Advances the machine with the next received message, in arrival order.
    ///
    /// Any error is a protocol violation that ends the session.
    pub fn process(&mut self, message: Message) -> Result<Action> {
        match message {
            Message::Version(version) => {
                if self.version_received {
                    return Err(BTCP2PError::DuplicateVersion);
                }
                self.version_received = true;
                debug!(
                    version = version.version,
                    user_agent = %version.user_agent,
                    start_height = version.start_height,
                    "received peer version"
                );

                Ok(Action::Reply(Message::VerAck))
            }
            Message::VerAck => {
                if self.verack_received {
                    return Err(BTCP2PError::DuplicateVerack);
                }
                self.verack_received = true;
                debug!("received verack");

                Ok(Action::None)
            }
            message => {
                if !self.is_complete() {
                    return Err(BTCP2PError::PrematureMessage(message.command().to_string()));
                }
                self.delivered += 1;

                Ok(Action::Deliver(message))
            }
        }
    }
}
