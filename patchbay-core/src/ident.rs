//! Identity primitives: cookies, sources, channels and service identity.
//!
//! A *cookie* names a process, a *source* names a dispatcher inside a
//! process, and a [`Channel`] combines both with a delivery target to
//! locate the dispatcher that owns an endpoint.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, WireDecode, WireEncode};

/// Process-scoped identity of a registration origin.
pub type Cookie = u64;

/// Identity of a dispatcher inside a process.
pub type SourceId = u64;

/// Identity of a delivery target inside a process.
pub type TargetId = u64;

/// Cookie of an endpoint that has not been assigned an origin yet.
pub const COOKIE_UNKNOWN: Cookie = 0;

/// Cookie of every endpoint created by the local process.
pub const COOKIE_LOCAL: Cookie = 1;

/// Cookie reserved for the message router itself.
pub const COOKIE_ROUTER: Cookie = 2;

/// Match-any sentinel used when filtering directory snapshots.
pub const COOKIE_ANY: Cookie = u64::MAX;

/// Source of an endpoint that has not been delivered to a dispatcher.
pub const SOURCE_UNKNOWN: SourceId = 0;

/// Target of a channel that has not been resolved yet.
pub const TARGET_UNKNOWN: TargetId = 0;

/// Locator of the dispatcher owning an endpoint.
///
/// A channel with source [`SOURCE_UNKNOWN`] means "not yet delivered to
/// a real endpoint". Channels are re-stamped on every registration and
/// never participate in address identity beyond their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Cookie of the owning process.
    pub cookie: Cookie,
    /// Dispatcher that owns the endpoint.
    pub source: SourceId,
    /// Delivery target inside the owning process.
    pub target: TargetId,
}

impl Channel {
    /// Create a channel from explicit parts.
    pub const fn new(cookie: Cookie, source: SourceId, target: TargetId) -> Self {
        Self {
            cookie,
            source,
            target,
        }
    }

    /// The invalid channel: every part unknown.
    pub const fn invalid() -> Self {
        Self {
            cookie: COOKIE_UNKNOWN,
            source: SOURCE_UNKNOWN,
            target: TARGET_UNKNOWN,
        }
    }

    /// A channel is valid when at least its cookie is known.
    pub const fn is_valid(&self) -> bool {
        self.cookie != COOKIE_UNKNOWN
    }

    /// Whether the channel points at a resolved dispatcher.
    pub const fn is_source_resolved(&self) -> bool {
        self.source != SOURCE_UNKNOWN
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::invalid()
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.cookie, self.source, self.target)
    }
}

impl WireEncode for Channel {
    fn encode(&self, out: &mut Vec<u8>) {
        self.cookie.encode(out);
        self.source.encode(out);
        self.target.encode(out);
    }
}

impl WireDecode for Channel {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            cookie: Cookie::decode(input)?,
            source: SourceId::decode(input)?,
            target: TargetId::decode(input)?,
        })
    }
}

/// Visibility scope of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    /// Visible only inside the registering process.
    Local,
    /// Eligible for cross-process matching through the router.
    Public,
}

impl ServiceCategory {
    /// Whether the service may be exported via the remote router.
    pub const fn is_public(&self) -> bool {
        matches!(self, ServiceCategory::Public)
    }

    fn as_byte(self) -> u8 {
        match self {
            ServiceCategory::Local => 0,
            ServiceCategory::Public => 1,
        }
    }

    fn from_byte(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(ServiceCategory::Local),
            1 => Ok(ServiceCategory::Public),
            other => Err(CodecError::UnknownDiscriminant {
                value: other,
                type_name: "ServiceCategory",
            }),
        }
    }
}

impl std::fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceCategory::Local => write!(f, "local"),
            ServiceCategory::Public => write!(f, "public"),
        }
    }
}

impl WireEncode for ServiceCategory {
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_byte().encode(out);
    }
}

impl WireDecode for ServiceCategory {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Self::from_byte(u8::decode(input)?)
    }
}

/// Interface version carried next to every service name.
///
/// A version is valid when its major or minor number is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Patch number.
    pub patch: u32,
}

impl Version {
    /// Create a version from explicit numbers.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Valid when major or minor is non-zero.
    pub const fn is_valid(&self) -> bool {
        self.major != 0 || self.minor != 0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = || -> Result<u32, VersionParseError> {
            parts
                .next()
                .ok_or(VersionParseError::MissingPart)?
                .trim()
                .parse()
                .map_err(|_| VersionParseError::InvalidNumber)
        };
        let major = next()?;
        let minor = next()?;
        let patch = next()?;
        if parts.next().is_some() {
            return Err(VersionParseError::TrailingData);
        }
        Ok(Self::new(major, minor, patch))
    }
}

/// Error parsing a version from its `major.minor.patch` text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    /// Fewer than three dot-separated parts.
    #[error("missing version part")]
    MissingPart,
    /// A part is not a number.
    #[error("invalid version number")]
    InvalidNumber,
    /// More than three parts.
    #[error("trailing data after patch number")]
    TrailingData,
}

impl WireEncode for Version {
    fn encode(&self, out: &mut Vec<u8>) {
        self.major.encode(out);
        self.minor.encode(out);
        self.patch.encode(out);
    }
}

impl WireDecode for Version {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            major: u32::decode(input)?,
            minor: u32::decode(input)?,
            patch: u32::decode(input)?,
        })
    }
}

/// The shared shape of stub and proxy addresses: what service is offered
/// or consumed, under which role, with which visibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdent {
    /// Name of the service interface.
    pub service_name: String,
    /// Role name of the component instance.
    pub role_name: String,
    /// Interface version.
    pub version: Version,
    /// Visibility scope.
    pub category: ServiceCategory,
}

impl ServiceIdent {
    /// Create a service identity.
    pub fn new(
        service_name: impl Into<String>,
        role_name: impl Into<String>,
        version: Version,
        category: ServiceCategory,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            role_name: role_name.into(),
            version,
            category,
        }
    }

    /// Valid when both names are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.service_name.is_empty() && !self.role_name.is_empty()
    }

    /// The directory lookup key of this identity.
    pub fn key(&self) -> ServiceKey {
        ServiceKey {
            service_name: self.service_name.clone(),
            role_name: self.role_name.clone(),
        }
    }
}

impl std::fmt::Display for ServiceIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/",
            self.category, self.service_name, self.version, self.role_name
        )
    }
}

impl WireEncode for ServiceIdent {
    fn encode(&self, out: &mut Vec<u8>) {
        self.service_name.encode(out);
        self.role_name.encode(out);
        self.version.encode(out);
        self.category.encode(out);
    }
}

impl WireDecode for ServiceIdent {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            service_name: String::decode(input)?,
            role_name: String::decode(input)?,
            version: Version::decode(input)?,
            category: ServiceCategory::decode(input)?,
        })
    }
}

/// Directory lookup key: an entry per `(service, role)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    /// Name of the service interface.
    pub service_name: String,
    /// Role name of the component instance.
    pub role_name: String,
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service_name, self.role_name)
    }
}
