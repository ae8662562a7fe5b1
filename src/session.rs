//! A single peer session.
//!
//! The session dials the node, announces itself with a `version` message and
//! hands the socket to a receive loop task. The loop drives the handshake and
//! pushes application messages on a bounded queue, so a slow consumer stalls
//! the socket reads instead of dropping messages. The loop stops on the first
//! decode or protocol error, or when the cancellation token fires. Either way
//! the socket and the queue are closed, which the consumer sees as the end of
//! the [`MessageStream`].

use std::net::SocketAddr;

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{
    config::Config,
    errors::{BTCP2PError, Result},
    handshake::{Action, Handshake},
    message::{read_message, write_message, Message},
    network::Network,
    payload::{unix_timestamp, NetworkAddress, ServiceFlags, VersionPayload},
};

pub struct Session {
    address: String,
    network: Network,
    services: ServiceFlags,
    start_height: u32,
    queue_capacity: usize,
    cancel: CancellationToken,
}

impl Session {
    /// Creates a session bound to the configured node. Cancelling `cancel`
    /// tears the session down.
    pub fn new(config: &Config, cancel: CancellationToken) -> Self {
        Self {
            address: config.node_address.clone(),
            network: config.network,
            services: config.services,
            start_height: config.start_height,
            queue_capacity: config.queue_capacity.max(1),
            cancel,
        }
    }

    /// Dials the node and starts the session.
    ///
    /// Returns as soon as our version is sent; the handshake completes in the
    /// background and only post-handshake messages reach the stream.
    pub async fn connect(self) -> Result<MessageStream> {
        info!(address = %self.address, network = %self.network, "connecting to bitcoin node");

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(BTCP2PError::Cancelled),
            dialed = TcpStream::connect(self.address.as_str()) => {
                dialed.map_err(|source| BTCP2PError::Connection {
                    address: self.address.clone(),
                    source,
                })?
            }
        };
        let (local, peer) = (stream.local_addr()?, stream.peer_addr()?);
        info!(%peer, %local, "connected");

        let version = self.version_payload(peer, local);
        self.start(stream, version).await
    }

    /// Starts the session over an already established byte stream.
    ///
    /// Fails with [`BTCP2PError::Cancelled`] if the token fires before our
    /// version is written.
    pub async fn start<S>(self, mut stream: S, version: VersionPayload) -> Result<MessageStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let version_msg = Message::Version(version);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(BTCP2PError::Cancelled),
            sent = write_message(self.network, &version_msg, &mut stream) => sent?,
        }
        debug!("sent version");

        let mut handshake = Handshake::new();
        handshake.mark_version_sent();

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let receiver = ReceiveLoop {
            network: self.network,
            handshake,
            tx,
            cancel: self.cancel.clone(),
        };
        tokio::spawn(receiver.run(stream));

        Ok(MessageStream {
            rx,
            cancel: self.cancel,
        })
    }

    /// The version message announcing this client to `peer`.
    pub fn version_payload(&self, peer: SocketAddr, local: SocketAddr) -> VersionPayload {
        VersionPayload::new(
            unix_timestamp(),
            self.services,
            NetworkAddress::new(ServiceFlags::UNNAMED, peer),
            NetworkAddress::new(self.services, local),
            rand::random(),
            self.start_height,
        )
    }
}

/// Post-handshake messages of a session, in wire order.
///
/// `recv` returning `None` means the session is over, for good.
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
}

impl MessageStream {
    pub async fn recv(&mut self) -> Option<Message> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.rx.close();
                None
            }
            message = self.rx.recv() => message,
        }
    }
}

/// Why the receive loop stopped without an error.
#[derive(Debug)]
enum Stop {
    Cancelled,
    ConsumerGone,
}

/// Sole owner of the socket once the session started: nothing else reads
/// from or writes to it, so handshake replies need no locking.
struct ReceiveLoop {
    network: Network,
    handshake: Handshake,
    tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    async fn run<S>(mut self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.receive(&mut stream).await {
            Ok(Stop::Cancelled) => info!("session cancelled"),
            Ok(Stop::ConsumerGone) => info!("message stream dropped, closing session"),
            Err(err) => error!(
                error = %err,
                state = ?self.handshake.state(),
                "session terminated"
            ),
        }

        if let Err(err) = stream.shutdown().await {
            debug!(error = %err, "failed to shut down socket");
        }
        // the queue closes when `self.tx` drops with the loop
    }

    async fn receive<S>(&mut self, stream: &mut S) -> Result<Stop>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let (header, message) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Stop::Cancelled),
                frame = read_message(stream) => frame?,
            };

            if header.magic != self.network.magic() {
                return Err(BTCP2PError::UnexpectedMagic(header.magic));
            }
            debug!(command = %header.command(), size = header.payload_size, "received message");

            let was_complete = self.handshake.is_complete();
            match self.handshake.process(message)? {
                Action::None => {}
                Action::Reply(reply) => {
                    // a peer that never reads must not outlive cancellation
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Ok(Stop::Cancelled),
                        sent = write_message(self.network, &reply, stream) => sent?,
                    }
                    debug!(command = %reply.command(), "sent handshake reply");
                }
                Action::Deliver(message) => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Ok(Stop::Cancelled),
                        sent = self.tx.send(message) => {
                            if sent.is_err() {
                                return Ok(Stop::ConsumerGone);
                            }
                        }
                    }
                }
            }

            if !was_complete && self.handshake.is_complete() {
                info!("handshake complete");
            }
        }
    }
}
