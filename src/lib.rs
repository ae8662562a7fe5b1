//! Bitcoin p2p handshake client
//!
//! This crate implements the Bitcoin p2p wire format and the `version`/`verack`
//! handshake over a single peer connection, then streams the decoded messages
//! the peer sends afterwards.
//!
//! ```no_run
//! use btc_handshake::{Config, Session};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> btc_handshake::Result<()> {
//! let config = Config::from_env()?;
//! let mut messages = Session::new(&config, CancellationToken::new()).connect().await?;
//!
//! while let Some(message) = messages.recv().await {
//!     println!("received {}", message.command());
//! }
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod encode;
mod errors;
mod handshake;
mod message;
mod network;
mod payload;
mod session;

/// Protocol version announced in our version message.
pub const PROTOCOL_VERSION: u32 = 70015;

pub use command::Command;
pub use config::Config;
pub use encode::{decode, encode, Decodable, Encodable, Port, VarInt, VarStr};
pub use errors::{BTCP2PError, Result};
pub use handshake::{Action, Handshake, HandshakeState};
pub use message::{
    checksum, read_message, receive_message, send_message, write_message, Message, MessageHeader,
};
pub use network::Network;
pub use payload::{NetworkAddress, RawPayload, ServiceFlags, VersionPayload};
pub use session::{MessageStream, Session};
