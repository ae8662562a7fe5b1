use std::{fmt, str::FromStr};

use super::errors::{BTCP2PError, Result};

/// Represents the network to which a message belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Mainnet
    /// Default Port 8333
    MainNet,

    /// Testnet3
    /// Default Port 18333
    TestNet3,

    /// Regtest
    /// Default Port 18444
    RegTest,
}

impl Network {
    /// The start string every message header of this network begins with.
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Network::MainNet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::TestNet3 => [0x0b, 0x11, 0x09, 0x07],
            Network::RegTest => [0xfa, 0xbf, 0xb5, 0xda],
        }
    }

    pub fn from_magic(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [0xf9, 0xbe, 0xb4, 0xd9] => Ok(Self::MainNet),
            [0x0b, 0x11, 0x09, 0x07] => Ok(Self::TestNet3),
            [0xfa, 0xbf, 0xb5, 0xda] => Ok(Self::RegTest),
            _ => Err(BTCP2PError::UnknownNetwork(format!("magic {bytes:02x?}"))),
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Network::MainNet => 8333,
            Network::TestNet3 => 18333,
            Network::RegTest => 18444,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::MainNet => "mainnet",
            Network::TestNet3 => "testnet3",
            Network::RegTest => "regtest",
        }
    }
}

impl FromStr for Network {
    type Err = BTCP2PError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Self::MainNet),
            "testnet3" | "testnet" | "test" => Ok(Self::TestNet3),
            "regtest" => Ok(Self::RegTest),
            other => Err(BTCP2PError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, TestResult};
    use quickcheck_macros::quickcheck;

    impl Arbitrary for Network {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            match u8::arbitrary(g) % 3 {
                0 => Self::MainNet,
                1 => Self::TestNet3,
                2 => Self::RegTest,
                _ => unreachable!(),
            }
        }
    }

    #[quickcheck]
    fn test_magic_roundtrip(network: Network) -> TestResult {
        let network2 = Network::from_magic(&network.magic()).unwrap();
        TestResult::from_bool(network == network2)
    }

    #[quickcheck]
    fn test_name_roundtrip(network: Network) -> TestResult {
        let network2: Network = network.to_string().parse().unwrap();
        TestResult::from_bool(network == network2)
    }

    #[test]
    fn test_from_magic() {
        assert_eq!(
            Network::from_magic(&[0xf9, 0xbe, 0xb4, 0xd9]).unwrap(),
            Network::MainNet
        );
        assert_eq!(
            Network::from_magic(&[0x0b, 0x11, 0x09, 0x07]).unwrap(),
            Network::TestNet3
        );
        assert_eq!(
            Network::from_magic(&[0xfa, 0xbf, 0xb5, 0xda]).unwrap(),
            Network::RegTest
        );
        assert!(Network::from_magic(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }

    #[test]
    fn test_from_str_unknown() {
        let err = "signet".parse::<Network>().unwrap_err();
        assert!(matches!(err, BTCP2PError::UnknownNetwork(name) if name == "signet"));
    }

    #[test]
    fn test_default_port() {
        assert_eq!(Network::MainNet.default_port(), 8333);
        assert_eq!(Network::TestNet3.default_port(), 18333);
        assert_eq!(Network::RegTest.default_port(), 18444);
    }
}
