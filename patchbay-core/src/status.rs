//! Connection status shared by server and client directory entries.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, WireDecode, WireEncode};

/// Connection state of a directory entry.
///
/// The wire form is a single byte: 0 = Pending, 1 = Connected,
/// 2 = Disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Registered and waiting for a counterpart.
    Pending,
    /// Matched to a live counterpart.
    Connected,
    /// The counterpart went away.
    Disconnected,
}

impl ConnectionStatus {
    /// Whether this entry is connected to a live counterpart.
    pub const fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Whether this entry has been told something and is still waiting
    /// for, or holding, a connection.
    pub const fn is_waiting(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Pending | ConnectionStatus::Connected
        )
    }

    /// The single-byte wire form.
    pub const fn as_byte(self) -> u8 {
        match self {
            ConnectionStatus::Pending => 0,
            ConnectionStatus::Connected => 1,
            ConnectionStatus::Disconnected => 2,
        }
    }

    /// Decode the single-byte wire form.
    pub fn from_byte(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(ConnectionStatus::Pending),
            1 => Ok(ConnectionStatus::Connected),
            2 => Ok(ConnectionStatus::Disconnected),
            other => Err(CodecError::UnknownDiscriminant {
                value: other,
                type_name: "ConnectionStatus",
            }),
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Pending => write!(f, "pending"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl WireEncode for ConnectionStatus {
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_byte().encode(out);
    }
}

impl WireDecode for ConnectionStatus {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Self::from_byte(u8::decode(input)?)
    }
}
