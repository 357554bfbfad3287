//! Connect/disconnect notices exchanged between the service manager and
//! endpoint dispatchers.
//!
//! Wire form: `[tag:1][proxy][stub][status:1]` where the tag selects the
//! receiving side (0 = stub, 1 = proxy).

use serde::{Deserialize, Serialize};

use crate::address::{ProxyAddress, StubAddress};
use crate::codec::{CodecError, WireDecode, WireEncode};
use crate::status::ConnectionStatus;

/// Which side of a pairing a notice is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectKind {
    /// Delivered to the stub owning dispatcher.
    StubConnect,
    /// Delivered to the proxy owning dispatcher.
    ProxyConnect,
}

impl ConnectKind {
    /// The single-byte wire tag.
    pub const fn as_byte(self) -> u8 {
        match self {
            ConnectKind::StubConnect => 0,
            ConnectKind::ProxyConnect => 1,
        }
    }

    /// Decode the single-byte wire tag.
    pub fn from_byte(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(ConnectKind::StubConnect),
            1 => Ok(ConnectKind::ProxyConnect),
            other => Err(CodecError::UnknownDiscriminant {
                value: other,
                type_name: "ConnectKind",
            }),
        }
    }
}

/// Notification of a `(proxy, stub)` pairing change.
///
/// Carries both endpoint addresses so either side can identify its
/// counterpart, plus the status the pairing moved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectNotice {
    /// The client side of the pairing.
    pub proxy: ProxyAddress,
    /// The server side of the pairing.
    pub stub: StubAddress,
    /// Status the pairing moved to.
    pub status: ConnectionStatus,
}

impl ConnectNotice {
    /// Create a notice for a pairing change.
    pub fn new(proxy: ProxyAddress, stub: StubAddress, status: ConnectionStatus) -> Self {
        Self {
            proxy,
            stub,
            status,
        }
    }

    /// Encode with the tag byte selecting the receiving side.
    pub fn encode_tagged(&self, kind: ConnectKind, out: &mut Vec<u8>) {
        kind.as_byte().encode(out);
        self.proxy.encode(out);
        self.stub.encode(out);
        self.status.encode(out);
    }

    /// Decode a tagged notice, returning the receiving side with it.
    pub fn decode_tagged(input: &mut &[u8]) -> Result<(ConnectKind, Self), CodecError> {
        let kind = ConnectKind::from_byte(u8::decode(input)?)?;
        let notice = Self {
            proxy: ProxyAddress::decode(input)?,
            stub: StubAddress::decode(input)?,
            status: ConnectionStatus::decode(input)?,
        };
        Ok((kind, notice))
    }
}

impl std::fmt::Display for ConnectNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} <-> {}", self.status, self.proxy, self.stub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{ServiceCategory, Version};

    fn sample() -> ConnectNotice {
        ConnectNotice::new(
            ProxyAddress::local("Echo", "first", Version::default(), ServiceCategory::Public, 2),
            StubAddress::local("Echo", "first", Version::default(), ServiceCategory::Public, 3),
            ConnectionStatus::Connected,
        )
    }

    #[test]
    fn test_tagged_roundtrip() {
        for kind in [ConnectKind::StubConnect, ConnectKind::ProxyConnect] {
            let notice = sample();
            let mut buf = Vec::new();
            notice.encode_tagged(kind, &mut buf);

            let mut input = buf.as_slice();
            let (decoded_kind, decoded) =
                ConnectNotice::decode_tagged(&mut input).expect("decode");
            assert_eq!(decoded_kind, kind);
            assert_eq!(decoded, notice);
            assert!(input.is_empty());
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let notice = sample();
        let mut buf = Vec::new();
        notice.encode_tagged(ConnectKind::StubConnect, &mut buf);
        buf[0] = 9;

        let mut input = buf.as_slice();
        assert!(ConnectNotice::decode_tagged(&mut input).is_err());
    }
}
