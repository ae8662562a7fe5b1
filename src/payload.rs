use std::{
    io::{Read, Write},
    net::{IpAddr, Ipv6Addr, SocketAddr},
    ops::BitOr,
    time::SystemTime,
};

use super::{
    encode::{Decodable, Encodable, Port, VarStr},
    errors::Result,
    message::MessageHeader,
    PROTOCOL_VERSION,
};

/// ServiceFlags represents the service flags of a node
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ServiceFlags(u64);

impl ServiceFlags {
    /// This node is not a full node. It may not be able to provide any data except for the transactions it originates.
    pub const UNNAMED: ServiceFlags = ServiceFlags(0);

    /// This is a full node and can be asked for full blocks. It should implement all protocol features available in its self-reported protocol version
    pub const NODE_NETWORK: ServiceFlags = ServiceFlags(0x1);

    /// This is a full node capable of responding to the getutxo protocol request. This is not supported by any currently-maintained Bitcoin node.
    pub const NODE_GETUTXO: ServiceFlags = ServiceFlags(0x2);

    /// This is a full node capable and willing to handle bloom-filtered connections.
    pub const NODE_BLOOM: ServiceFlags = ServiceFlags(0x4);

    /// This is a full node that can be asked for blocks and transactions including witness data.
    pub const NODE_WITNESS: ServiceFlags = ServiceFlags(0x8);

    /// This is a full node that supports Xtreme Thinblocks. This is not supported by any currently-maintained Bitcoin node.
    pub const NODE_XTHIN: ServiceFlags = ServiceFlags(0x10);

    /// This node serves compact block filters (BIP157/158).
    pub const NODE_COMPACT_FILTERS: ServiceFlags = ServiceFlags(0x40);

    /// This is the same as NODE_NETWORK but the node has at least the last 288 blocks (last 2 days).
    pub const NODE_NETWORK_LIMITED: ServiceFlags = ServiceFlags(0x0400);

    /// Gets the integer representation of this ServiceFlags
    pub fn to_u64(self) -> u64 {
        self.0
    }

    /// Gets the ServiceFlags from an integer representation
    pub fn from_u64(n: u64) -> Self {
        ServiceFlags(n)
    }

    /// Whether every bit of `other` is advertised.
    pub fn has(self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl From<u64> for ServiceFlags {
    fn from(n: u64) -> Self {
        ServiceFlags(n)
    }
}

impl BitOr for ServiceFlags {
    type Output = ServiceFlags;

    fn bitor(self, rhs: ServiceFlags) -> ServiceFlags {
        ServiceFlags(self.0 | rhs.0)
    }
}

impl Encodable for ServiceFlags {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.0.encode(writer)
    }
}

impl Decodable for ServiceFlags {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(ServiceFlags(u64::decode(reader)?))
    }
}

/// NetworkAddress represents a peer address as found in version and addr messages
/// https://developer.bitcoin.org/reference/p2p_networking.html#addr
///
/// The `time` field is only written when it is non-zero, which is the layout
/// of the version message. Decoding always reads the layout without `time`,
/// so an `addr` entry (which does carry it) cannot be decoded with this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAddress {
    /// Unix time the peer was last seen. Zero when unused.
    pub time: u32,

    /// The services the node advertised.
    pub services: ServiceFlags,

    /// IPv6 address, IPv4 addresses in their IPv4-mapped form.
    pub ip: Ipv6Addr,

    /// Port number, big endian on the wire.
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(services: ServiceFlags, socket: SocketAddr) -> Self {
        let ip = match socket.ip() {
            IpAddr::V4(x) => x.to_ipv6_mapped(),
            IpAddr::V6(x) => x,
        };

        Self {
            time: 0,
            services,
            ip,
            port: socket.port(),
        }
    }

    /// The socket address, unmapping IPv4-mapped addresses.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = match self.ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(self.ip),
        };

        SocketAddr::new(ip, self.port)
    }
}

impl Encodable for NetworkAddress {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.time > 0 {
            self.time.encode(writer)?;
        }
        self.services.encode(writer)?;
        self.ip.encode(writer)?;
        Port(self.port).encode(writer)
    }
}

impl Decodable for NetworkAddress {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(NetworkAddress {
            time: 0,
            services: ServiceFlags::decode(reader)?,
            ip: Ipv6Addr::decode(reader)?,
            port: Port::decode(reader)?.0,
        })
    }
}

/// VersionPayload represents the payload of a version message
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPayload {
    /// The highest protocol version understood by the transmitting node.
    pub version: u32,

    /// The services supported by the transmitting node encoded as a bitfield.
    pub services: ServiceFlags,

    /// The current Unix epoch time according to the transmitting node’s clock.
    pub timestamp: u64,

    /// The receiving node as perceived by the transmitting node.
    pub addr_recv: NetworkAddress,

    /// The transmitting node. Should carry the same services as the field above.
    pub addr_from: NetworkAddress,

    /// A random nonce which can help a node detect a connection to itself.
    /// If the nonce is 0, the nonce field is ignored.
    pub nonce: u64,

    /// User agent of the transmitting node, as a var_str.
    pub user_agent: String,

    /// The height of the transmitting node’s best block chain or, in the case of an SPV client, best block header chain.
    pub start_height: u32,

    /// Transaction relay flag (BIP37). If false, no “inv” or “tx” messages announcing new transactions should be sent to this client.
    pub relay: bool,
}

impl VersionPayload {
    /// Builds the version payload this client announces itself with.
    pub fn new(
        timestamp: u64,
        services: ServiceFlags,
        addr_recv: NetworkAddress,
        addr_from: NetworkAddress,
        nonce: u64,
        start_height: u32,
    ) -> Self {
        VersionPayload {
            version: PROTOCOL_VERSION,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent: user_agent(),
            start_height,
            relay: false,
        }
    }
}

impl Encodable for VersionPayload {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.version.encode(writer)?;
        self.services.encode(writer)?;
        self.timestamp.encode(writer)?;
        self.addr_recv.encode(writer)?;
        self.addr_from.encode(writer)?;
        self.nonce.encode(writer)?;
        VarStr(self.user_agent.clone()).encode(writer)?;
        self.start_height.encode(writer)?;
        self.relay.encode(writer)
    }
}

impl Decodable for VersionPayload {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(VersionPayload {
            version: u32::decode(reader)?,
            services: ServiceFlags::decode(reader)?,
            timestamp: u64::decode(reader)?,
            addr_recv: NetworkAddress::decode(reader)?,
            addr_from: NetworkAddress::decode(reader)?,
            nonce: u64::decode(reader)?,
            user_agent: VarStr::decode(reader)?.0,
            start_height: u32::decode(reader)?,
            relay: bool::decode(reader)?,
        })
    }
}

/// RawPayload keeps a message with no dedicated type as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub header: MessageHeader,
    pub body: Vec<u8>,
}

/// `/<crate name>:<crate version>/`
pub fn user_agent() -> String {
    const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
    const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");

    format!("/{}:{}/", CARGO_PKG_NAME, CARGO_PKG_VERSION)
}

/// Seconds since the unix epoch, zero if the clock is set before it.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
