use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    command::{Command, COMMAND_NAME_SIZE},
    encode::{decode, Decodable, Encodable},
    errors::{BTCP2PError, Result},
    network::Network,
    payload::{RawPayload, VersionPayload},
};

const START_STRING_SIZE: usize = 4;
const PAYLOAD_LEN_SIZE: usize = 4;
const CHECKSUM_SIZE: usize = 4;
pub const HEADER_SIZE: usize =
    START_STRING_SIZE + COMMAND_NAME_SIZE + PAYLOAD_LEN_SIZE + CHECKSUM_SIZE;

// 32 MB
pub const MAX_PAYLOAD_SIZE: u32 = 32 * 1024 * 1024;

/// Message header
/// https://developer.bitcoin.org/reference/p2p_networking.html#message-headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Network start string.
    pub magic: [u8; START_STRING_SIZE],

    /// ASCII command name, zero padded.
    pub command: [u8; COMMAND_NAME_SIZE],

    /// Number of bytes in the payload.
    pub payload_size: u32,

    /// First 4 bytes of SHA256(SHA256(payload)).
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl MessageHeader {
    pub fn new(network: Network, command: &Command, payload: &[u8]) -> Self {
        Self {
            magic: network.magic(),
            command: command.to_bytes(),
            payload_size: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    pub fn command(&self) -> Command {
        Command::from_bytes(&self.command)
    }

    pub fn network(&self) -> Result<Network> {
        Network::from_magic(&self.magic)
    }

    /// Checks that `payload` is the one this header announces.
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        if payload.len() != self.payload_size as usize {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }

        let actual = checksum(payload);
        if actual != self.checksum {
            return Err(BTCP2PError::InvalidChecksum {
                expected: self.checksum,
                actual,
            });
        }

        Ok(())
    }

    fn check_payload_size(&self) -> Result<()> {
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(BTCP2PError::PayloadTooLarge(self.payload_size));
        }
        Ok(())
    }
}

impl Encodable for MessageHeader {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        // start string char[4]
        self.magic.encode(writer)?;

        // command name char[12]
        self.command.encode(writer)?;

        // payload length uint32 (4 bytes)
        self.payload_size.encode(writer)?;

        // checksum char[4]
        self.checksum.encode(writer)
    }
}

impl Decodable for MessageHeader {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            magic: Decodable::decode(reader)?,
            command: Decodable::decode(reader)?,
            payload_size: u32::decode(reader)?,
            checksum: Decodable::decode(reader)?,
        })
    }
}

/// A decoded p2p message.
///
/// Commands without a variant of their own arrive as `Raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionPayload),
    VerAck,
    Raw(RawPayload),
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Message::Version(_) => Command::Version,
            Message::VerAck => Command::VerAck,
            Message::Raw(raw) => raw.header.command(),
        }
    }

    /// Writes the payload alone, without header.
    pub fn encode_payload<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Message::Version(version) => version.encode(writer),
            Message::VerAck => Ok(()),
            Message::Raw(raw) => Err(BTCP2PError::EncodeError(format!(
                "raw {} messages are receive only",
                raw.header.command()
            ))),
        }
    }

    /// Maps the header command to its message type and decodes the payload into it.
    pub fn from_payload(header: &MessageHeader, payload: &[u8]) -> Result<Self> {
        let command = header.command();
        let message = match command {
            Command::Version => decode::<VersionPayload>(payload).map(Message::Version),
            Command::VerAck => Ok(Message::VerAck),
            Command::Other(_) => Ok(Message::Raw(RawPayload {
                header: *header,
                body: payload.to_vec(),
            })),
        };

        message.map_err(|err| BTCP2PError::decoding(format!("{command} payload"), err))
    }
}

/// Computes Bitcoin checksum for given data
pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let hash = Sha256::digest(Sha256::digest(data));

    let mut buffer = [0u8; CHECKSUM_SIZE];
    buffer.clone_from_slice(&hash[..CHECKSUM_SIZE]);

    buffer
}

/// Serializes a full frame, header then payload.
///
/// The payload is encoded first since the header carries its length and checksum.
pub fn send_message<W: Write>(network: Network, message: &Message, writer: &mut W) -> Result<()> {
    let mut payload = vec![];
    message.encode_payload(&mut payload)?;

    let header = MessageHeader::new(network, &message.command(), &payload);
    header.encode(writer)?;
    writer.write_all(&payload)?;

    Ok(())
}

/// Reads one full frame and decodes it into its message type.
pub fn receive_message<R: Read>(reader: &mut R) -> Result<(MessageHeader, Message)> {
    let header = MessageHeader::decode(reader)
        .map_err(|err| BTCP2PError::decoding("message header", err))?;
    header.check_payload_size()?;

    let mut payload = vec![0u8; header.payload_size as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|err| BTCP2PError::decoding("message payload", err.into()))?;

    decode_frame(header, &payload)
}

/// Async counterpart of [`receive_message`] for sockets.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(MessageHeader, Message)> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut bytes)
        .await
        .map_err(|err| BTCP2PError::decoding("message header", err.into()))?;

    let header = decode::<MessageHeader>(&bytes)
        .map_err(|err| BTCP2PError::decoding("message header", err))?;
    header.check_payload_size()?;

    let mut payload = vec![0u8; header.payload_size as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|err| BTCP2PError::decoding("message payload", err.into()))?;

    decode_frame(header, &payload)
}

/// Async counterpart of [`send_message`] for sockets.
pub async fn write_message<W: AsyncWrite + Unpin>(
    network: Network,
    message: &Message,
    writer: &mut W,
) -> Result<()> {
    let mut buffer = Vec::with_capacity(HEADER_SIZE);
    send_message(network, message, &mut buffer)?;

    writer.write_all(&buffer).await?;
    writer.flush().await?;

    Ok(())
}

fn decode_frame(header: MessageHeader, payload: &[u8]) -> Result<(MessageHeader, Message)> {
    header.verify(payload)?;
    let message = Message::from_payload(&header, payload)?;

    Ok((header, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode, tests::unhex};
    use crate::payload::tests::docs_version;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use std::io::Cursor;

    const DOCS_VERSION_FRAME: &str = "
        F9 BE B4 D9 76 65 72 73 69 6F 6E 00 00 00 00 00
        65 00 00 00 8A 80 97 A9 62 EA 00 00 01 00 00 00
        00 00 00 00 11 B2 D0 50 00 00 00 00 01 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 FF FF
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 FF FF 00 00 00 00 00 00
        3B 2E B3 5D 8C E6 17 65 0F 2F 53 61 74 6F 73 68
        69 3A 30 2E 37 2E 32 2F C0 3E 03 00 00";

    #[test]
    fn test_header_encode() {
        let cases = [
            (Network::MainNet, "F9 BE B4 D9"),
            (Network::TestNet3, "0B 11 09 07"),
            (Network::RegTest, "FA BF B5 DA"),
        ];

        for (network, magic) in cases {
            let header = MessageHeader::new(network, &Command::Version, b"test data ");
            let want = format!(
                "{magic} 76 65 72 73 69 6F 6E 00 00 00 00 00 0A 00 00 00 6E D5 BA D9"
            );
            assert_eq!(encode(&header).unwrap(), unhex(&want), "{network}");
        }
    }

    #[test]
    fn test_header_decode() {
        let bytes = unhex(
            "F9 BE B4 D9 76 65 72 73 69 6F 6E 00 00 00 00 00
             0A 00 00 00 6E D5 BA D9",
        );

        let header = decode::<MessageHeader>(&bytes).unwrap();
        assert_eq!(
            header,
            MessageHeader::new(Network::MainNet, &Command::Version, b"test data ")
        );
        assert_eq!(header.command(), Command::Version);
        assert_eq!(header.network().unwrap(), Network::MainNet);
        assert_eq!(header.payload_size, 10);
    }

    #[quickcheck]
    fn header_roundtrip(network: Network, command: Command, payload: Vec<u8>) -> TestResult {
        let header = MessageHeader::new(network, &command, &payload);
        let bytes = encode(&header).unwrap();

        let decoded = decode::<MessageHeader>(&bytes).unwrap();
        TestResult::from_bool(
            bytes.len() == HEADER_SIZE && decoded == header && decoded.command() == command,
        )
    }

    #[quickcheck]
    fn header_differs_only_in_magic(payload: Vec<u8>) -> TestResult {
        let main = encode(&MessageHeader::new(Network::MainNet, &Command::VerAck, &payload)).unwrap();
        let test = encode(&MessageHeader::new(Network::TestNet3, &Command::VerAck, &payload)).unwrap();
        let reg = encode(&MessageHeader::new(Network::RegTest, &Command::VerAck, &payload)).unwrap();

        TestResult::from_bool(main[4..] == test[4..] && test[4..] == reg[4..])
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(b"test data "), [0x6e, 0xd5, 0xba, 0xd9]);
        // checksum of the empty payload carried by verack
        assert_eq!(checksum(&[]), [0x5d, 0xf6, 0xe0, 0xe2]);
    }

    #[test]
    fn test_send_version() {
        let mut buffer = vec![];
        send_message(Network::MainNet, &Message::Version(docs_version()), &mut buffer).unwrap();

        assert_eq!(buffer, unhex(DOCS_VERSION_FRAME));
    }

    #[test]
    fn test_receive_version() {
        let mut reader = Cursor::new(unhex(DOCS_VERSION_FRAME));
        let (header, message) = receive_message(&mut reader).unwrap();

        assert_eq!(header.command(), Command::Version);
        assert_eq!(header.payload_size, 0x65);
        assert_eq!(message, Message::Version(docs_version()));
    }

    #[test]
    fn test_verack_roundtrip() {
        let mut buffer = vec![];
        send_message(Network::RegTest, &Message::VerAck, &mut buffer).unwrap();
        assert_eq!(buffer.len(), HEADER_SIZE);

        let (header, message) = receive_message(&mut buffer.as_slice()).unwrap();
        assert_eq!(header.command(), Command::VerAck);
        assert_eq!(header.network().unwrap(), Network::RegTest);
        assert_eq!(message, Message::VerAck);
    }

    #[test]
    fn test_receive_unknown_command_as_raw() {
        let payload = 0x1122334455667788u64.to_le_bytes();
        let header = MessageHeader::new(Network::MainNet, &Command::from("ping"), &payload);
        let mut bytes = encode(&header).unwrap();
        bytes.extend_from_slice(&payload);

        let (_, message) = receive_message(&mut bytes.as_slice()).unwrap();
        assert_eq!(message.command(), Command::Other("ping".to_string()));
        match message {
            Message::Raw(raw) => {
                assert_eq!(raw.header, header);
                assert_eq!(raw.body, payload.to_vec());
            }
            other => panic!("expected raw message, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_cannot_be_sent() {
        let header = MessageHeader::new(Network::MainNet, &Command::from("ping"), &[]);
        let raw = Message::Raw(RawPayload {
            header,
            body: vec![],
        });

        let mut buffer = vec![];
        let err = send_message(Network::MainNet, &raw, &mut buffer).unwrap_err();
        assert!(matches!(err, BTCP2PError::EncodeError(_)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_receive_invalid_checksum() {
        let mut bytes = unhex(DOCS_VERSION_FRAME);
        bytes[20] ^= 0xff;

        let err = receive_message(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BTCP2PError::InvalidChecksum { .. }));
    }

    #[test]
    fn test_receive_truncated_payload() {
        let bytes = unhex(DOCS_VERSION_FRAME);

        let err = receive_message(&mut &bytes[..bytes.len() - 4]).unwrap_err();
        match err {
            BTCP2PError::DecodeError { context, source } => {
                assert_eq!(context, "message payload");
                assert!(matches!(*source, BTCP2PError::BufferIOError(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_receive_truncated_header() {
        let bytes = unhex(DOCS_VERSION_FRAME);

        let err = receive_message(&mut &bytes[..10]).unwrap_err();
        assert!(matches!(err, BTCP2PError::DecodeError { .. }));
    }

    #[test]
    fn test_receive_payload_too_large() {
        let mut header = MessageHeader::new(Network::MainNet, &Command::from("block"), &[]);
        header.payload_size = MAX_PAYLOAD_SIZE + 1;

        let err = receive_message(&mut encode(&header).unwrap().as_slice()).unwrap_err();
        assert!(matches!(err, BTCP2PError::PayloadTooLarge(size) if size == MAX_PAYLOAD_SIZE + 1));
    }

    #[test]
    fn test_receive_malformed_version_is_wrapped() {
        let payload = [0x01, 0x02, 0x03];
        let header = MessageHeader::new(Network::MainNet, &Command::Version, &payload);
        let mut bytes = encode(&header).unwrap();
        bytes.extend_from_slice(&payload);

        let err = receive_message(&mut bytes.as_slice()).unwrap_err();
        match err {
            BTCP2PError::DecodeError { context, .. } => assert_eq!(context, "version payload"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_read_truncated_frames() {
        let bytes = unhex(DOCS_VERSION_FRAME);

        for (cut, want) in [(10, "message header"), (bytes.len() - 4, "message payload")] {
            let err = read_message(&mut &bytes[..cut]).await.unwrap_err();
            match err {
                BTCP2PError::DecodeError { context, .. } => assert_eq!(context, want),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_async_read_write() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_message(Network::MainNet, &Message::Version(docs_version()), &mut client)
            .await
            .unwrap();
        write_message(Network::MainNet, &Message::VerAck, &mut client)
            .await
            .unwrap();

        let (_, first) = read_message(&mut server).await.unwrap();
        let (_, second) = read_message(&mut server).await.unwrap();
        assert_eq!(first, Message::Version(docs_version()));
        assert_eq!(second, Message::VerAck);
    }
}
