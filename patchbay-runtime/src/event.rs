//! The event model: one tagged union over every event kind a dispatcher
//! can accept, and the service manager command set.

use std::path::PathBuf;

use patchbay_core::{Channel, ConnectNotice, ProxyAddress, StubAddress};

/// An event carried through a dispatcher queue.
///
/// The variant tag is what a dispatcher's acceptance filter matches on;
/// `post_event` rejects events whose kind the dispatcher was not
/// constructed to consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A service manager command.
    Command(ServiceCommand),
    /// Connection notice addressed to a stub's owning dispatcher.
    StubConnect(ConnectNotice),
    /// Connection notice addressed to a proxy's owning dispatcher.
    ProxyConnect(ConnectNotice),
    /// Exit marker, guaranteed to be the last event processed.
    Exit,
}

impl Event {
    /// The acceptance tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Command(_) => EventKind::Command,
            Event::StubConnect(_) => EventKind::StubConnect,
            Event::ProxyConnect(_) => EventKind::ProxyConnect,
            Event::Exit => EventKind::Exit,
        }
    }
}

/// Discriminant of [`Event`], used by dispatcher acceptance filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::Command`].
    Command,
    /// [`Event::StubConnect`].
    StubConnect,
    /// [`Event::ProxyConnect`].
    ProxyConnect,
    /// [`Event::Exit`].
    Exit,
}

impl EventKind {
    pub(crate) const fn bit(self) -> u8 {
        match self {
            EventKind::Command => 1 << 0,
            EventKind::StubConnect => 1 << 1,
            EventKind::ProxyConnect => 1 << 2,
            EventKind::Exit => 1 << 3,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Command => write!(f, "command"),
            EventKind::StubConnect => write!(f, "stub-connect"),
            EventKind::ProxyConnect => write!(f, "proxy-connect"),
            EventKind::Exit => write!(f, "exit"),
        }
    }
}

/// The service manager command set, posted through the manager's queue
/// and executed on its worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCommand {
    /// Register a server endpoint; the channel is stamped onto the
    /// address before the directory mutation.
    RegisterStub(StubAddress, Channel),
    /// Withdraw a server endpoint.
    UnregisterStub(StubAddress, Channel),
    /// Register a client endpoint.
    RegisterProxy(ProxyAddress, Channel),
    /// Withdraw a client endpoint.
    UnregisterProxy(ProxyAddress, Channel),
    /// Enable the router and configure it without starting.
    ConfigureConnection {
        /// Configuration file, or `None` to keep/apply defaults.
        config: Option<PathBuf>,
    },
    /// Enable, configure if needed, then start the router.
    StartConnection {
        /// Configuration file, or `None` to keep/apply defaults.
        config: Option<PathBuf>,
    },
    /// Enable, set an explicit router address, then start.
    StartNetConnection {
        /// Router host.
        host: String,
        /// Router port.
        port: u16,
    },
    /// Stop the router; the directory is kept.
    StopConnection,
    /// Flip the router's enabled flag.
    SetEnableService(bool),
    /// The router came online: re-announce every local public endpoint.
    RegisterConnection(Channel),
    /// The router went offline in an orderly way.
    UnregisterConnection(Channel),
    /// The router connection was lost.
    LostConnection(Channel),
    /// Soft shutdown: notify waiting clients, drain, pulse-exit.
    StopRoutingClient,
    /// Hard shutdown: drop pending events, drain the directory, exit.
    ShutdownService,
}

impl ServiceCommand {
    /// Short command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceCommand::RegisterStub(..) => "register-stub",
            ServiceCommand::UnregisterStub(..) => "unregister-stub",
            ServiceCommand::RegisterProxy(..) => "register-proxy",
            ServiceCommand::UnregisterProxy(..) => "unregister-proxy",
            ServiceCommand::ConfigureConnection { .. } => "configure-connection",
            ServiceCommand::StartConnection { .. } => "start-connection",
            ServiceCommand::StartNetConnection { .. } => "start-net-connection",
            ServiceCommand::StopConnection => "stop-connection",
            ServiceCommand::SetEnableService(_) => "set-enable-service",
            ServiceCommand::RegisterConnection(_) => "register-connection",
            ServiceCommand::UnregisterConnection(_) => "unregister-connection",
            ServiceCommand::LostConnection(_) => "lost-connection",
            ServiceCommand::StopRoutingClient => "stop-routing-client",
            ServiceCommand::ShutdownService => "shutdown-service",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds() {
        assert_eq!(
            Event::Command(ServiceCommand::StopConnection).kind(),
            EventKind::Command
        );
        assert_eq!(Event::Exit.kind(), EventKind::Exit);
    }

    #[test]
    fn test_kind_bits_are_distinct() {
        let kinds = [
            EventKind::Command,
            EventKind::StubConnect,
            EventKind::ProxyConnect,
            EventKind::Exit,
        ];
        for a in kinds {
            for b in kinds {
                if a != b {
                    assert_eq!(a.bit() & b.bit(), 0);
                }
            }
        }
    }
}
