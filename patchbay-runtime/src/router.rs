//! The boundary between the service manager and the remote transport.
//!
//! [`RemoteRegistry`] is the capability surface the manager drives:
//! configuration, lifecycle and announcement of local public endpoints.
//! [`RemoteDirectory`] is the callback surface a transport drives to feed
//! remote-origin registrations back into the local directory.
//!
//! [`RouterLink`] is the in-tree adapter: it tracks the
//! enabled/configured/started state machine, reads the routing
//! configuration file, and emits framed announcements onto an outbound
//! byte channel. The socket transport behind that channel lives outside
//! this crate.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use patchbay_config::ConfigScript;
use patchbay_core::{
    write_frame, Channel, Cookie, ProxyAddress, StubAddress, WireEncode,
};

/// Default router host applied when no configuration names one.
pub const DEFAULT_ROUTER_HOST: &str = "127.0.0.1";

/// Default router port applied when no configuration names one.
pub const DEFAULT_ROUTER_PORT: u16 = 8181;

/// Configuration key naming the router host.
pub const KEY_CONNECTION_ADDRESS: &str = "connection.address";

/// Configuration key naming the router port.
pub const KEY_CONNECTION_PORT: &str = "connection.port";

/// Frame tags for router-bound announcements. Tags 0 and 1 are taken by
/// the connect-notice wire form.
pub mod announce {
    /// A local public stub became available.
    pub const REGISTER_STUB: u8 = 2;
    /// A local public stub was withdrawn.
    pub const UNREGISTER_STUB: u8 = 3;
    /// A local public proxy subscribed.
    pub const REGISTER_PROXY: u8 = 4;
    /// A local public proxy unsubscribed.
    pub const UNREGISTER_PROXY: u8 = 5;
}

/// Capability interface the service manager drives.
///
/// Every call is made on the service manager thread. Calls made while
/// the router is down are no-ops by contract; only `start` retries
/// configuration.
pub trait RemoteRegistry: Send {
    /// Configure from the given file, or apply defaults with `None`.
    /// Returns whether the router is configured afterwards.
    fn configure(&mut self, config: Option<&Path>) -> bool;

    /// Whether a configuration has been applied.
    fn is_configured(&self) -> bool;

    /// Whether the router connection is up.
    fn is_started(&self) -> bool;

    /// Whether remote servicing is enabled at all.
    fn is_enabled(&self) -> bool;

    /// Flip the enabled flag. Disabling stops a running connection.
    fn set_enabled(&mut self, enabled: bool);

    /// Set an explicit router address, marking the router configured.
    fn set_address(&mut self, host: &str, port: u16);

    /// Bring the router connection up. Requires enabled + configured.
    fn start(&mut self) -> bool;

    /// Tear the router connection down.
    fn stop(&mut self);

    /// Announce a local public stub to the router.
    fn register_service(&mut self, stub: &StubAddress);

    /// Withdraw a local public stub from the router.
    fn unregister_service(&mut self, stub: &StubAddress);

    /// Announce a local public proxy to the router.
    fn register_service_client(&mut self, proxy: &ProxyAddress);

    /// Withdraw a local public proxy from the router.
    fn unregister_service_client(&mut self, proxy: &ProxyAddress);
}

/// Callback interface a transport drives to feed remote-origin state
/// into the local directory. Implemented by the service manager handle;
/// every method is thread-safe and non-blocking.
pub trait RemoteDirectory {
    /// Enter a remote stub into the local directory.
    fn register_remote_stub(&self, stub: StubAddress) -> bool;

    /// Enter a remote proxy into the local directory.
    fn register_remote_proxy(&self, proxy: ProxyAddress) -> bool;

    /// Remove a remote stub from the local directory.
    fn unregister_remote_stub(&self, stub: StubAddress, cookie: Cookie) -> bool;

    /// Remove a remote proxy from the local directory.
    fn unregister_remote_proxy(&self, proxy: ProxyAddress, cookie: Cookie) -> bool;

    /// The router connection came up on the given channel.
    fn remote_service_started(&self, channel: Channel) -> bool;

    /// The router connection was shut down in an orderly way.
    fn remote_service_stopped(&self, channel: Channel) -> bool;

    /// The router connection was lost.
    fn remote_connection_lost(&self, channel: Channel) -> bool;

    /// Snapshot of all stubs and proxies whose cookie matches;
    /// `COOKIE_ANY` matches all.
    fn service_list(&self, cookie: Cookie) -> (Vec<StubAddress>, Vec<ProxyAddress>);
}

/// In-tree router adapter.
///
/// Tracks the enabled/configured/started state machine and encodes
/// announcements as checksummed frames onto an optional outbound
/// channel. Tests (and a transport, when one is attached) consume the
/// frames from the receiving end.
#[derive(Debug)]
pub struct RouterLink {
    enabled: bool,
    configured: bool,
    started: bool,
    host: String,
    port: u16,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl RouterLink {
    /// Create a disabled, unconfigured router link.
    pub fn new() -> Self {
        Self {
            enabled: false,
            configured: false,
            started: false,
            host: DEFAULT_ROUTER_HOST.to_string(),
            port: DEFAULT_ROUTER_PORT,
            outbound: None,
        }
    }

    /// Create a router link that emits announcement frames onto `tx`.
    pub fn with_outbound(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            outbound: Some(tx),
            ..Self::new()
        }
    }

    /// The configured router address.
    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    fn announce(&self, tag: u8, payload: Vec<u8>) {
        if !self.started {
            debug!(tag, "router not started, dropping announcement");
            return;
        }
        let Some(tx) = &self.outbound else {
            return;
        };
        match write_frame(tag, &payload) {
            Ok(frame) => {
                let _ = tx.send(frame);
            }
            Err(err) => error!(%err, tag, "failed to frame announcement"),
        }
    }
}

impl Default for RouterLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteRegistry for RouterLink {
    fn configure(&mut self, config: Option<&Path>) -> bool {
        match config {
            Some(path) => match ConfigScript::from_file(path) {
                Ok(script) => {
                    self.host = script
                        .value_of(KEY_CONNECTION_ADDRESS)
                        .map(|value| value.as_str().to_string())
                        .unwrap_or_else(|| DEFAULT_ROUTER_HOST.to_string());
                    self.port = script
                        .value_of(KEY_CONNECTION_PORT)
                        .and_then(|value| value.as_u16())
                        .unwrap_or(DEFAULT_ROUTER_PORT);
                    self.configured = true;
                    info!(host = %self.host, port = self.port, "router configured");
                    true
                }
                Err(err) => {
                    error!(%err, path = %path.display(), "failed to read router configuration");
                    false
                }
            },
            None => {
                self.configured = true;
                info!(host = %self.host, port = self.port, "router configured with defaults");
                true
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        if !enabled && self.started {
            self.stop();
        }
        self.enabled = enabled;
    }

    fn set_address(&mut self, host: &str, port: u16) {
        self.host = host.to_string();
        self.port = port;
        self.configured = true;
    }

    fn start(&mut self) -> bool {
        if !self.enabled || !self.configured {
            warn!(
                enabled = self.enabled,
                configured = self.configured,
                "router cannot start"
            );
            return false;
        }
        if !self.started {
            info!(host = %self.host, port = self.port, "router started");
        }
        self.started = true;
        true
    }

    fn stop(&mut self) {
        if self.started {
            info!("router stopped");
        }
        self.started = false;
    }

    fn register_service(&mut self, stub: &StubAddress) {
        self.announce(announce::REGISTER_STUB, stub.to_wire());
    }

    fn unregister_service(&mut self, stub: &StubAddress) {
        self.announce(announce::UNREGISTER_STUB, stub.to_wire());
    }

    fn register_service_client(&mut self, proxy: &ProxyAddress) {
        self.announce(announce::REGISTER_PROXY, proxy.to_wire());
    }

    fn unregister_service_client(&mut self, proxy: &ProxyAddress) {
        self.announce(announce::UNREGISTER_PROXY, proxy.to_wire());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_core::{read_frame, ServiceCategory, Version, WireDecode};

    fn stub() -> StubAddress {
        StubAddress::local("Echo", "first", Version::default(), ServiceCategory::Public, 1)
    }

    #[test]
    fn test_start_requires_enable_and_configure() {
        let mut link = RouterLink::new();
        assert!(!link.start());

        link.set_enabled(true);
        assert!(!link.start());

        assert!(link.configure(None));
        assert!(link.start());
        assert!(link.is_started());

        link.stop();
        assert!(!link.is_started());
        assert!(link.is_configured());
    }

    #[test]
    fn test_disable_stops_running_router() {
        let mut link = RouterLink::new();
        link.set_enabled(true);
        link.configure(None);
        link.start();

        link.set_enabled(false);
        assert!(!link.is_started());
        assert!(!link.is_enabled());
    }

    #[test]
    fn test_set_address_marks_configured() {
        let mut link = RouterLink::new();
        link.set_address("10.0.0.1", 9000);
        assert!(link.is_configured());
        assert_eq!(link.address(), ("10.0.0.1", 9000));
    }

    #[test]
    fn test_configure_from_file() {
        let path = std::env::temp_dir().join(format!(
            "patchbay-router-{}-{:?}.init",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(
            &path,
            "# router\nconnection.address = 192.168.1.5\nconnection.port = 9282\n",
        )
        .expect("write config");

        let mut link = RouterLink::new();
        assert!(link.configure(Some(&path)));
        assert_eq!(link.address(), ("192.168.1.5", 9282));

        std::fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn test_configure_missing_file_fails() {
        let mut link = RouterLink::new();
        assert!(!link.configure(Some(Path::new("/nonexistent/patchbay.init"))));
        assert!(!link.is_configured());
    }

    #[test]
    fn test_announcements_are_framed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = RouterLink::with_outbound(tx);
        link.set_enabled(true);
        link.configure(None);
        link.start();

        let address = stub();
        link.register_service(&address);

        let frame = rx.try_recv().expect("announcement frame");
        let (tag, payload) = read_frame(&frame).expect("read frame");
        assert_eq!(tag, announce::REGISTER_STUB);

        let mut input = payload.as_slice();
        let decoded = StubAddress::decode(&mut input).expect("decode stub");
        assert_eq!(decoded, address);
    }

    #[test]
    fn test_announcements_dropped_while_stopped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = RouterLink::with_outbound(tx);
        link.register_service(&stub());
        assert!(rx.try_recv().is_err());
    }
}
