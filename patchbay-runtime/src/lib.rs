//! # patchbay-runtime
//!
//! The patchbay component runtime: event dispatch, the service
//! directory, and the service manager that ties them to a remote
//! router.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                Components (stubs / proxies)           │
//! │        post register/unregister requests              │
//! ├──────────────────────────────────────────────────────┤
//! │  ServiceManager (one worker thread per process)       │
//! │  • owns the ServiceDirectory                          │
//! │  • matches proxies to stubs                           │
//! │  • emits connect/disconnect notices                   │
//! ├──────────────────────────────────────────────────────┤
//! │  RemoteRegistry (router adapter boundary)             │
//! │  • announces local public endpoints                   │
//! │  • feeds remote registrations back in                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation of the directory happens on the manager's worker
//! thread; the public API posts commands and never blocks beyond the
//! enqueue. Connect notices travel back to the dispatcher owning each
//! endpoint through the [`DispatcherRegistry`].
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`EventDispatcher`] | FIFO queue with a single named worker thread |
//! | [`ServiceDirectory`] | `(service, role) → (server, clients)` map |
//! | [`ServiceManager`] | Command loop driving directory and router |
//! | [`RouterLink`] | In-tree router adapter behind [`RemoteRegistry`] |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// The service directory and its entry types.
pub mod directory;

/// Typed event dispatch with per-dispatcher worker threads.
pub mod dispatcher;

/// The event union and service manager command set.
pub mod event;

/// The service manager.
pub mod manager;

/// The router adapter boundary.
pub mod router;

pub use directory::{compatible, ClientInfo, DirectoryError, ServerInfo, ServiceDirectory};
pub use dispatcher::{
    Directive, DispatcherError, DispatcherRegistry, EventConsumer, EventDispatcher, EventPump,
};
pub use event::{Event, EventKind, ServiceCommand};
pub use manager::{ManagerError, ServiceManager, SERVICE_MANAGER_THREAD_NAME};
pub use router::{
    announce, RemoteDirectory, RemoteRegistry, RouterLink, DEFAULT_ROUTER_HOST,
    DEFAULT_ROUTER_PORT, KEY_CONNECTION_ADDRESS, KEY_CONNECTION_PORT,
};
