//! # patchbay-core
//!
//! Core types for the patchbay component runtime.
//!
//! This crate defines the identity model shared by every layer of the
//! runtime: how a service endpoint is named, which dispatcher owns it,
//! and how those facts travel over a wire.
//!
//! ## The identity model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  StubAddress / ProxyAddress                         │
//! │  ┌───────────────────────────┐                      │
//! │  │ ServiceIdent               │   cookie (process)  │
//! │  │  service name              │   channel (routing) │
//! │  │  role name                 │                     │
//! │  │  version / category        │                     │
//! │  └───────────────────────────┘                      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Two addresses are equal when their service name, role name, category,
//! cookie and channel source agree. The channel *target* never
//! participates in identity: it is re-stamped each time the endpoint
//! registers with a dispatcher.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`ident`] | Cookies, channels, service identity and keys |
//! | [`address`] | Stub and proxy addresses |
//! | [`status`] | Connection status shared by servers and clients |
//! | [`connect`] | Connect/disconnect notices and their wire form |
//! | [`codec`] | Explicit encode/decode pairs for wire-visible types |
//! | [`frame`] | Checksummed packet framing |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Stub and proxy addresses.
pub mod address;

/// Explicit encode/decode pairs for wire-visible types.
pub mod codec;

/// Connect/disconnect notices and their wire form.
pub mod connect;

/// Checksummed packet framing.
pub mod frame;

/// Cookies, channels, service identity and keys.
pub mod ident;

/// Connection status shared by servers and clients.
pub mod status;

pub use address::{AddressParseError, ProxyAddress, StubAddress};
pub use codec::{CodecError, WireDecode, WireEncode, MAX_WIRE_ELEMENTS, MAX_WIRE_STRING};
pub use connect::{ConnectKind, ConnectNotice};
pub use frame::{
    read_frame, try_read_frame, write_frame, FrameError, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD,
};
pub use ident::{
    Channel, Cookie, ServiceCategory, ServiceIdent, ServiceKey, SourceId, TargetId, Version,
    COOKIE_ANY, COOKIE_LOCAL, COOKIE_ROUTER, COOKIE_UNKNOWN, SOURCE_UNKNOWN, TARGET_UNKNOWN,
};
pub use status::ConnectionStatus;
