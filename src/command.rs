use std::fmt;

/// Size of the zero padded command field of a message header.
pub const COMMAND_NAME_SIZE: usize = 12;

/// Name of a p2p message as carried in the header.
///
/// Commands without a dedicated message type are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Version,
    VerAck,
    Other(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Version => "version",
            Command::VerAck => "verack",
            Command::Other(name) => name,
        }
    }

    /// Zero padded header form. Names longer than the field are truncated.
    pub fn to_bytes(&self) -> [u8; COMMAND_NAME_SIZE] {
        let mut buffer = [0u8; COMMAND_NAME_SIZE];
        let name = self.as_str().as_bytes();
        let len = name.len().min(COMMAND_NAME_SIZE);
        buffer[..len].copy_from_slice(&name[..len]);
        buffer
    }

    /// Recovers the command from its header form by stripping the trailing zeros.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let end = bytes
            .iter()
            .rposition(|b| *b != 0x00)
            .map_or(0, |last| last + 1);

        Self::from(String::from_utf8_lossy(&bytes[..end]).as_ref())
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name {
            "version" => Self::Version,
            "verack" => Self::VerAck,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
