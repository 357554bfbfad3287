//! Stub and proxy addresses.
//!
//! Both address kinds share the [`ServiceIdent`] shape plus a cookie and
//! a delivery channel. Two addresses are equal when their service name,
//! role name, category, cookie and channel source agree; the channel
//! target is delivery state, re-stamped on registration, and never part
//! of identity.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, WireDecode, WireEncode};
use crate::ident::{
    Channel, Cookie, ServiceCategory, ServiceIdent, ServiceKey, SourceId, Version, COOKIE_LOCAL,
    COOKIE_UNKNOWN, SOURCE_UNKNOWN, TARGET_UNKNOWN,
};

/// Error parsing an address from its textual path form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The path has fewer segments than `category/service/version/role`.
    #[error("address path has too few segments")]
    MissingSegment,
    /// The category segment is neither `local` nor `public`.
    #[error("unknown service category `{0}`")]
    UnknownCategory(String),
    /// The version segment is not a `major.minor.patch` triple.
    #[error("invalid version segment `{0}`")]
    InvalidVersion(String),
}

fn parse_ident(path: &str) -> Result<ServiceIdent, AddressParseError> {
    let mut parts = path.split('/').filter(|s| !s.is_empty());
    let category = match parts.next().ok_or(AddressParseError::MissingSegment)? {
        "local" => ServiceCategory::Local,
        "public" => ServiceCategory::Public,
        other => return Err(AddressParseError::UnknownCategory(other.to_string())),
    };
    let service_name = parts.next().ok_or(AddressParseError::MissingSegment)?;
    let version_text = parts.next().ok_or(AddressParseError::MissingSegment)?;
    let version: Version = version_text
        .parse()
        .map_err(|_| AddressParseError::InvalidVersion(version_text.to_string()))?;
    let role_name = parts.next().ok_or(AddressParseError::MissingSegment)?;
    Ok(ServiceIdent::new(service_name, role_name, version, category))
}

fn stamp(current: &mut Channel, cookie: &mut Cookie, incoming: Channel) {
    let mut next = incoming;
    if next.cookie == COOKIE_UNKNOWN {
        next.cookie = current.cookie;
    }
    if next.source == SOURCE_UNKNOWN {
        next.source = current.source;
    }
    *current = next;
    if current.cookie != COOKIE_UNKNOWN {
        *cookie = current.cookie;
    }
}

/// Address of a server-side endpoint implementing a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubAddress {
    ident: ServiceIdent,
    cookie: Cookie,
    channel: Channel,
}

impl StubAddress {
    /// Create a stub address owned by the dispatcher named in `channel`.
    pub fn new(ident: ServiceIdent, channel: Channel) -> Self {
        Self {
            ident,
            cookie: channel.cookie,
            channel,
        }
    }

    /// Create a locally-owned stub address.
    pub fn local(
        service_name: impl Into<String>,
        role_name: impl Into<String>,
        version: Version,
        category: ServiceCategory,
        source: SourceId,
    ) -> Self {
        Self::new(
            ServiceIdent::new(service_name, role_name, version, category),
            Channel::new(COOKIE_LOCAL, source, TARGET_UNKNOWN),
        )
    }

    /// Placeholder for a server entry that has no stub yet. Invalid by
    /// construction; holds the `(service, role)` key of waiting clients.
    pub fn waiting(ident: ServiceIdent) -> Self {
        Self {
            ident,
            cookie: COOKIE_UNKNOWN,
            channel: Channel::invalid(),
        }
    }

    /// The shared service identity.
    pub fn ident(&self) -> &ServiceIdent {
        &self.ident
    }

    /// The directory lookup key.
    pub fn key(&self) -> ServiceKey {
        self.ident.key()
    }

    /// Cookie of the registering process.
    pub fn cookie(&self) -> Cookie {
        self.cookie
    }

    /// Dispatcher that owns this stub.
    pub fn source(&self) -> SourceId {
        self.channel.source
    }

    /// Current delivery channel.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Re-stamp the delivery channel. Unknown parts of the incoming
    /// channel never erase resolved ones.
    pub fn set_channel(&mut self, channel: Channel) {
        stamp(&mut self.channel, &mut self.cookie, channel);
    }

    /// Valid when the identity names are non-empty and a cookie is set.
    pub fn is_valid(&self) -> bool {
        self.ident.is_valid() && self.cookie != COOKIE_UNKNOWN
    }

    /// Whether the stub was registered by the local process.
    pub fn is_local(&self) -> bool {
        self.cookie == COOKIE_LOCAL
    }

    /// Whether the stub originates from another process.
    pub fn is_remote(&self) -> bool {
        self.cookie != COOKIE_UNKNOWN && self.cookie != COOKIE_LOCAL
    }

    /// Whether the service is eligible for cross-process matching.
    pub fn is_public(&self) -> bool {
        self.ident.category.is_public()
    }

    /// Textual path form, `category/service/version/role/`.
    pub fn to_path(&self) -> String {
        self.ident.to_string()
    }

    /// Parse the path form into an unstamped address.
    pub fn from_path(path: &str) -> Result<Self, AddressParseError> {
        Ok(Self::waiting(parse_ident(path)?))
    }
}

impl PartialEq for StubAddress {
    fn eq(&self, other: &Self) -> bool {
        self.ident.service_name == other.ident.service_name
            && self.ident.role_name == other.ident.role_name
            && self.ident.category == other.ident.category
            && self.cookie == other.cookie
            && self.channel.source == other.channel.source
    }
}

impl Eq for StubAddress {}

impl std::fmt::Display for StubAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.ident, self.channel)
    }
}

impl WireEncode for StubAddress {
    fn encode(&self, out: &mut Vec<u8>) {
        self.ident.encode(out);
        self.cookie.encode(out);
        self.channel.encode(out);
    }
}

impl WireDecode for StubAddress {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            ident: ServiceIdent::decode(input)?,
            cookie: Cookie::decode(input)?,
            channel: Channel::decode(input)?,
        })
    }
}

/// Address of a client-side endpoint bound to a `(service, role)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAddress {
    ident: ServiceIdent,
    cookie: Cookie,
    channel: Channel,
}

impl ProxyAddress {
    /// Create a proxy address owned by the dispatcher named in `channel`.
    pub fn new(ident: ServiceIdent, channel: Channel) -> Self {
        Self {
            ident,
            cookie: channel.cookie,
            channel,
        }
    }

    /// Create a locally-owned proxy address.
    pub fn local(
        service_name: impl Into<String>,
        role_name: impl Into<String>,
        version: Version,
        category: ServiceCategory,
        source: SourceId,
    ) -> Self {
        Self::new(
            ServiceIdent::new(service_name, role_name, version, category),
            Channel::new(COOKIE_LOCAL, source, TARGET_UNKNOWN),
        )
    }

    /// The shared service identity.
    pub fn ident(&self) -> &ServiceIdent {
        &self.ident
    }

    /// The directory lookup key.
    pub fn key(&self) -> ServiceKey {
        self.ident.key()
    }

    /// Cookie of the registering process.
    pub fn cookie(&self) -> Cookie {
        self.cookie
    }

    /// Dispatcher that owns this proxy.
    pub fn source(&self) -> SourceId {
        self.channel.source
    }

    /// Current delivery channel.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Re-stamp the delivery channel. Unknown parts of the incoming
    /// channel never erase resolved ones.
    pub fn set_channel(&mut self, channel: Channel) {
        stamp(&mut self.channel, &mut self.cookie, channel);
    }

    /// Valid when the identity names are non-empty and a cookie is set.
    pub fn is_valid(&self) -> bool {
        self.ident.is_valid() && self.cookie != COOKIE_UNKNOWN
    }

    /// Whether the proxy was registered by the local process.
    pub fn is_local(&self) -> bool {
        self.cookie == COOKIE_LOCAL
    }

    /// Whether the proxy originates from another process.
    pub fn is_remote(&self) -> bool {
        self.cookie != COOKIE_UNKNOWN && self.cookie != COOKIE_LOCAL
    }

    /// Whether the consumed service is public.
    pub fn is_public(&self) -> bool {
        self.ident.category.is_public()
    }

    /// Textual path form, `category/service/version/role/`.
    pub fn to_path(&self) -> String {
        self.ident.to_string()
    }

    /// Parse the path form into an unstamped address.
    pub fn from_path(path: &str) -> Result<Self, AddressParseError> {
        Ok(Self {
            ident: parse_ident(path)?,
            cookie: COOKIE_UNKNOWN,
            channel: Channel::invalid(),
        })
    }
}

impl PartialEq for ProxyAddress {
    fn eq(&self, other: &Self) -> bool {
        self.ident.service_name == other.ident.service_name
            && self.ident.role_name == other.ident.role_name
            && self.ident.category == other.ident.category
            && self.cookie == other.cookie
            && self.channel.source == other.channel.source
    }
}

impl Eq for ProxyAddress {}

impl std::fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.ident, self.channel)
    }
}

impl WireEncode for ProxyAddress {
    fn encode(&self, out: &mut Vec<u8>) {
        self.ident.encode(out);
        self.cookie.encode(out);
        self.channel.encode(out);
    }
}

impl WireDecode for ProxyAddress {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            ident: ServiceIdent::decode(input)?,
            cookie: Cookie::decode(input)?,
            channel: Channel::decode(input)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(service: &str, role: &str) -> ServiceIdent {
        ServiceIdent::new(service, role, Version::default(), ServiceCategory::Public)
    }

    #[test]
    fn test_identity_ignores_channel_target() {
        let mut a = StubAddress::local("Echo", "first", Version::default(), ServiceCategory::Public, 4);
        let b = a.clone();
        a.set_channel(Channel::new(COOKIE_LOCAL, 4, 99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_includes_cookie_and_source() {
        let a = StubAddress::new(ident("Echo", "first"), Channel::new(5, 1, 0));
        let b = StubAddress::new(ident("Echo", "first"), Channel::new(6, 1, 0));
        let c = StubAddress::new(ident("Echo", "first"), Channel::new(5, 2, 0));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_waiting_stub_is_invalid() {
        let stub = StubAddress::waiting(ident("Echo", "first"));
        assert!(!stub.is_valid());
        assert!(!stub.is_local());
        assert!(!stub.is_remote());
    }

    #[test]
    fn test_stamp_preserves_resolved_parts() {
        let mut proxy =
            ProxyAddress::local("Echo", "first", Version::default(), ServiceCategory::Local, 7);
        proxy.set_channel(Channel::new(COOKIE_UNKNOWN, SOURCE_UNKNOWN, 3));
        assert_eq!(proxy.cookie(), COOKIE_LOCAL);
        assert_eq!(proxy.source(), 7);
        assert_eq!(proxy.channel().target, 3);
    }

    #[test]
    fn test_locality() {
        let local = StubAddress::local("Echo", "a", Version::default(), ServiceCategory::Local, 1);
        assert!(local.is_local());
        assert!(!local.is_remote());

        let remote = StubAddress::new(ident("Echo", "a"), Channel::new(9, 1, 0));
        assert!(remote.is_remote());
        assert!(!remote.is_local());
    }

    #[test]
    fn test_path_roundtrip() {
        let stub = StubAddress::local(
            "Telemetry",
            "sensor0",
            Version::new(1, 2, 0),
            ServiceCategory::Public,
            3,
        );
        let path = stub.to_path();
        assert_eq!(path, "public/Telemetry/1.2.0/sensor0/");

        let parsed = StubAddress::from_path(&path).expect("parse");
        assert_eq!(parsed.ident(), stub.ident());
    }

    #[test]
    fn test_path_rejects_garbage() {
        assert!(StubAddress::from_path("public/Only/1.0.0").is_err());
        assert!(StubAddress::from_path("weird/S/1.0.0/r/").is_err());
        assert!(ProxyAddress::from_path("public/S/x.y.z/r/").is_err());
    }

    #[test]
    fn test_wire_roundtrip() {
        let proxy = ProxyAddress::new(ident("Echo", "first"), Channel::new(5, 2, 8));
        let buf = proxy.to_wire();
        let mut input = buf.as_slice();
        let decoded = ProxyAddress::decode(&mut input).expect("decode");
        assert_eq!(proxy, decoded);
        assert_eq!(decoded.channel(), proxy.channel());
    }
}
