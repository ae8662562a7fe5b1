use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::net::Ipv6Addr;

use super::errors::{BTCP2PError, Result};

/// Largest value a `VarInt` stores in its prefix byte.
const VARINT_MAX_1_BYTE: u64 = 0xfc;
const VARINT_MAX_2_BYTES: u64 = 0xffff;
const VARINT_MAX_4_BYTES: u64 = 0xffff_ffff;

const VARINT_PREFIX_2_BYTES: u8 = 0xfd;
const VARINT_PREFIX_4_BYTES: u8 = 0xfe;
const VARINT_PREFIX_8_BYTES: u8 = 0xff;

/// A value that can be written in its wire representation.
pub trait Encodable {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// A value that can be read back from its wire representation.
///
/// Implementations consume exactly the bytes of the value; a short read is
/// an error and never yields a partial value.
pub trait Decodable: Sized {
    fn decode<R: Read>(reader: &mut R) -> Result<Self>;
}

pub fn encode<T: Encodable>(object: &T) -> Result<Vec<u8>> {
    let mut buffer = vec![];
    object.encode(&mut buffer)?;
    Ok(buffer)
}

pub fn decode<T: Decodable>(mut bytes: &[u8]) -> Result<T> {
    T::decode(&mut bytes)
}

macro_rules! impl_le_integer {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Encodable for $ty {
            fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
                writer.$write::<LittleEndian>(*self)?;
                Ok(())
            }
        }

        impl Decodable for $ty {
            fn decode<R: Read>(reader: &mut R) -> Result<Self> {
                Ok(reader.$read::<LittleEndian>()?)
            }
        }
    };
}

impl_le_integer!(u16, write_u16, read_u16);
impl_le_integer!(u32, write_u32, read_u32);
impl_le_integer!(u64, write_u64, read_u64);

impl Encodable for u8 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)?;
        Ok(())
    }
}

impl Decodable for u8 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u8()?)
    }
}

/// Booleans travel as a single 0x00/0x01 byte; any non-zero byte decodes as true.
impl Encodable for bool {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        u8::from(*self).encode(writer)
    }
}

impl Decodable for bool {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(u8::decode(reader)? != 0x00)
    }
}

/// Fixed-size raw byte blocks (magic, command, checksum).
impl<const N: usize> Encodable for [u8; N] {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self)?;
        Ok(())
    }
}

impl<const N: usize> Decodable for [u8; N] {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; N];
        reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

/// IP addresses are always 16 bytes on the wire, IPv4 in its mapped form.
impl Encodable for Ipv6Addr {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.octets().encode(writer)
    }
}

impl Decodable for Ipv6Addr {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Ipv6Addr::from(<[u8; 16]>::decode(reader)?))
    }
}

/// A TCP port, the only big endian integer of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(pub u16);

impl Encodable for Port {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.0)?;
        Ok(())
    }
}

impl Decodable for Port {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Port(reader.read_u16::<BigEndian>()?))
    }
}

/// CompactSize unsigned integer.
/// https://developer.bitcoin.org/reference/transactions.html#compactsize-unsigned-integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Number of bytes the encoded value occupies, prefix included.
    pub fn encoded_len(&self) -> usize {
        match self.0 {
            n if n <= VARINT_MAX_1_BYTE => 1,
            n if n <= VARINT_MAX_2_BYTES => 3,
            n if n <= VARINT_MAX_4_BYTES => 5,
            _ => 9,
        }
    }
}

impl Encodable for VarInt {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self.0 {
            n if n <= VARINT_MAX_1_BYTE => writer.write_u8(n as u8)?,
            n if n <= VARINT_MAX_2_BYTES => {
                writer.write_u8(VARINT_PREFIX_2_BYTES)?;
                writer.write_u16::<LittleEndian>(n as u16)?;
            }
            n if n <= VARINT_MAX_4_BYTES => {
                writer.write_u8(VARINT_PREFIX_4_BYTES)?;
                writer.write_u32::<LittleEndian>(n as u32)?;
            }
            _ => {
                writer.write_u8(VARINT_PREFIX_8_BYTES)?;
                writer.write_u64::<LittleEndian>(self.0)?;
            }
        }
        Ok(())
    }
}

impl Decodable for VarInt {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let prefix = reader.read_u8()?;
        let (value, min) = match prefix {
            VARINT_PREFIX_2_BYTES => (
                u64::from(reader.read_u16::<LittleEndian>()?),
                VARINT_MAX_1_BYTE + 1,
            ),
            VARINT_PREFIX_4_BYTES => (
                u64::from(reader.read_u32::<LittleEndian>()?),
                VARINT_MAX_2_BYTES + 1,
            ),
            VARINT_PREFIX_8_BYTES => (
                reader.read_u64::<LittleEndian>()?,
                VARINT_MAX_4_BYTES + 1,
            ),
            n => return Ok(VarInt(u64::from(n))),
        };

        // a wider encoding than the value needs is a corrupted stream
        if value < min {
            return Err(BTCP2PError::InvalidVarInt { prefix, value });
        }

        Ok(VarInt(value))
    }
}

/// Length prefixed string, the length counted in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarStr(pub String);

impl Encodable for VarStr {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        VarInt(self.0.len() as u64).encode(writer)?;
        writer.write_all(self.0.as_bytes())?;
        Ok(())
    }
}

impl Decodable for VarStr {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let VarInt(len) = VarInt::decode(reader)?;

        // read through `take` so a bogus length cannot force a huge allocation
        let mut bytes = vec![];
        reader.take(len).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }

        Ok(VarStr(String::from_utf8(bytes)?))
    }
}

impl From<&str> for VarStr {
    fn from(s: &str) -> Self {
        VarStr(s.to_string())
    }
}
