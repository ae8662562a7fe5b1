use thiserror::Error;

pub type Result<T> = std::result::Result<T, BTCP2PError>;

///! BTCP2PError represents an error in the BTC proto or in a peer session
#[derive(Debug, Error)]
pub enum BTCP2PError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Failed to connect to bitcoin node {address}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read or write buffer")]
    BufferIOError(#[from] std::io::Error),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(u32),

    #[error("Invalid checksum: expected {expected:02x?}, got {actual:02x?}")]
    InvalidChecksum { expected: [u8; 4], actual: [u8; 4] },

    #[error("Unexpected network magic {0:02x?}")]
    UnexpectedMagic([u8; 4]),

    #[error("Non-canonical varint: prefix {prefix:#04x} carrying {value}")]
    InvalidVarInt { prefix: u8, value: u64 },

    #[error("Failed to encode message: {0}")]
    EncodeError(String),

    #[error("Failed to decode string")]
    DecodeString(#[from] std::string::FromUtf8Error),

    #[error("Failed to decode {context}")]
    DecodeError {
        context: String,
        #[source]
        source: Box<BTCP2PError>,
    },

    #[error("Received duplicate version message")]
    DuplicateVersion,

    #[error("Received duplicate verack message")]
    DuplicateVerack,

    #[error("Received {0} message before handshake completed")]
    PrematureMessage(String),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BTCP2PError {
    /// Wraps an error with a description of what was being decoded.
    pub fn decoding(context: impl Into<String>, source: BTCP2PError) -> Self {
        BTCP2PError::DecodeError {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
