//! The service manager: a per-process dispatcher that owns the service
//! directory, matches proxies to stubs, and drives the remote router.
//!
//! The public [`ServiceManager`] handle is thread-safe and non-blocking:
//! every request posts a command into the manager's queue and returns.
//! All directory mutation happens on the worker thread, which takes the
//! snapshot mutex only around the mutation itself — never while connect
//! notices are being emitted.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use patchbay_core::{
    Channel, ConnectNotice, ConnectionStatus, Cookie, ProxyAddress, SourceId, StubAddress,
    SOURCE_UNKNOWN,
};

use crate::directory::{ClientInfo, ServiceDirectory};
use crate::dispatcher::{
    lock, Directive, DispatcherError, DispatcherRegistry, EventConsumer, EventDispatcher,
    EventPump,
};
use crate::event::{Event, EventKind, ServiceCommand};
use crate::router::{RemoteDirectory, RemoteRegistry, RouterLink};

/// Name of the service manager worker thread. External tooling may
/// assume this exact name.
pub const SERVICE_MANAGER_THREAD_NAME: &str = "_AREG_SERVICE_MANAGER_THREAD_";

/// Errors starting the service manager.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The worker thread could not be spawned.
    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),
}

struct ManagerShared {
    directory: Mutex<ServiceDirectory>,
    router: Mutex<Box<dyn RemoteRegistry>>,
}

thread_local! {
    static THREAD_DEFAULT: RefCell<Option<ServiceManager>> = const { RefCell::new(None) };
}

/// Handle to a running service manager.
///
/// One directory per manager; construct one per process and share the
/// handle. A thread-local default is available for callers that cannot
/// take an injected handle.
#[derive(Clone)]
pub struct ServiceManager {
    dispatcher: EventDispatcher,
    shared: Arc<ManagerShared>,
    registry: DispatcherRegistry,
}

impl ServiceManager {
    /// Start a service manager with the default router link.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Dispatcher`] when the worker thread
    /// cannot be spawned; this is fatal and should propagate to the
    /// process entry point.
    pub fn start(registry: &DispatcherRegistry) -> Result<Self, ManagerError> {
        Self::start_with_router(registry, Box::new(RouterLink::new()))
    }

    /// Start a service manager driving the given router adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Dispatcher`] when the worker thread
    /// cannot be spawned.
    pub fn start_with_router(
        registry: &DispatcherRegistry,
        router: Box<dyn RemoteRegistry>,
    ) -> Result<Self, ManagerError> {
        let shared = Arc::new(ManagerShared {
            directory: Mutex::new(ServiceDirectory::new()),
            router: Mutex::new(router),
        });

        let core_shared = Arc::clone(&shared);
        let core_registry = registry.clone();
        let dispatcher = EventDispatcher::spawn(
            SERVICE_MANAGER_THREAD_NAME,
            &[EventKind::Command],
            registry,
            move |handle| ManagerCore {
                shared: core_shared,
                registry: core_registry,
                own: handle.clone(),
            },
        )?;

        Ok(Self {
            dispatcher,
            shared,
            registry: registry.clone(),
        })
    }

    /// Install this manager as the current thread's default.
    pub fn set_thread_default(manager: ServiceManager) {
        THREAD_DEFAULT.with(|slot| *slot.borrow_mut() = Some(manager));
    }

    /// The current thread's default manager, if one was installed.
    pub fn thread_default() -> Option<ServiceManager> {
        THREAD_DEFAULT.with(|slot| slot.borrow().clone())
    }

    /// Remove the current thread's default manager.
    pub fn clear_thread_default() {
        THREAD_DEFAULT.with(|slot| *slot.borrow_mut() = None);
    }

    /// Whether the manager worker thread is running.
    pub fn is_started(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Source id of the manager's own dispatcher.
    pub fn source(&self) -> SourceId {
        self.dispatcher.source()
    }

    fn post(&self, command: ServiceCommand) -> bool {
        self.dispatcher.post_event(Event::Command(command))
    }

    /// Register a server endpoint. Non-blocking; the directory mutation
    /// and any connect notices happen on the manager thread.
    pub fn request_register_server(&self, stub: StubAddress) -> bool {
        debug!(stub = %stub, "requesting server registration");
        let channel = stub.channel();
        self.post(ServiceCommand::RegisterStub(stub, channel))
    }

    /// Withdraw a server endpoint.
    pub fn request_unregister_server(&self, stub: StubAddress) -> bool {
        debug!(stub = %stub, "requesting server unregistration");
        let channel = stub.channel();
        self.post(ServiceCommand::UnregisterStub(stub, channel))
    }

    /// Register a client endpoint.
    pub fn request_register_client(&self, proxy: ProxyAddress) -> bool {
        debug!(proxy = %proxy, "requesting client registration");
        let channel = proxy.channel();
        self.post(ServiceCommand::RegisterProxy(proxy, channel))
    }

    /// Withdraw a client endpoint.
    pub fn request_unregister_client(&self, proxy: ProxyAddress) -> bool {
        debug!(proxy = %proxy, "requesting client unregistration");
        let channel = proxy.channel();
        self.post(ServiceCommand::UnregisterProxy(proxy, channel))
    }

    /// Enable and configure the router without starting it.
    pub fn routing_service_configure(&self, config: Option<PathBuf>) -> bool {
        self.post(ServiceCommand::ConfigureConnection { config })
    }

    /// Enable, configure if needed, then start the router.
    pub fn routing_service_start(&self, config: Option<PathBuf>) -> bool {
        self.post(ServiceCommand::StartConnection { config })
    }

    /// Enable, set an explicit router address, then start the router.
    /// Rejects an empty host or a zero port.
    pub fn routing_service_start_net(&self, host: &str, port: u16) -> bool {
        if host.is_empty() || port == 0 {
            return false;
        }
        self.post(ServiceCommand::StartNetConnection {
            host: host.to_string(),
            port,
        })
    }

    /// Stop the router connection; the directory is kept.
    pub fn routing_service_stop(&self) -> bool {
        self.post(ServiceCommand::StopConnection)
    }

    /// Flip the router's enabled flag.
    pub fn routing_service_enable(&self, enable: bool) -> bool {
        self.post(ServiceCommand::SetEnableService(enable))
    }

    /// Whether the router connection is up.
    pub fn is_routing_service_started(&self) -> bool {
        lock(&self.shared.router).is_started()
    }

    /// Whether the router has been configured.
    pub fn is_routing_service_configured(&self) -> bool {
        lock(&self.shared.router).is_configured()
    }

    /// Whether remote servicing is enabled.
    pub fn is_routing_service_enabled(&self) -> bool {
        lock(&self.shared.router).is_enabled()
    }

    /// Point-in-time snapshot of registered stubs and proxies whose
    /// cookie matches; `COOKIE_ANY` matches all.
    pub fn service_list(&self, cookie: Cookie) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        lock(&self.shared.directory).snapshot(cookie)
    }

    /// Point-in-time snapshot of registered stubs and proxies owned by
    /// the given dispatcher source.
    pub fn service_sources(&self, source: SourceId) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        lock(&self.shared.directory).sources(source)
    }

    /// Soft shutdown: notify every waiting client, drain the queue and
    /// let the worker exit through a pulsed exit marker.
    pub fn request_stop_routing(&self) -> bool {
        self.post(ServiceCommand::StopRoutingClient)
    }

    /// Hard shutdown: drop pending commands, drain the directory with
    /// disconnect notices, stop the router and join the worker thread.
    pub fn shutdown(&self) {
        self.post(ServiceCommand::ShutdownService);
        self.dispatcher.completion_wait();
    }
}

impl RemoteDirectory for ServiceManager {
    fn register_remote_stub(&self, stub: StubAddress) -> bool {
        self.request_register_server(stub)
    }

    fn register_remote_proxy(&self, proxy: ProxyAddress) -> bool {
        self.request_register_client(proxy)
    }

    fn unregister_remote_stub(&self, stub: StubAddress, _cookie: Cookie) -> bool {
        self.request_unregister_server(stub)
    }

    fn unregister_remote_proxy(&self, proxy: ProxyAddress, _cookie: Cookie) -> bool {
        self.request_unregister_client(proxy)
    }

    fn remote_service_started(&self, channel: Channel) -> bool {
        self.post(ServiceCommand::RegisterConnection(channel))
    }

    fn remote_service_stopped(&self, channel: Channel) -> bool {
        self.post(ServiceCommand::UnregisterConnection(channel))
    }

    fn remote_connection_lost(&self, channel: Channel) -> bool {
        self.post(ServiceCommand::LostConnection(channel))
    }

    fn service_list(&self, cookie: Cookie) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        ServiceManager::service_list(self, cookie)
    }
}

/// The consumer running on the manager worker thread.
struct ManagerCore {
    shared: Arc<ManagerShared>,
    registry: DispatcherRegistry,
    own: EventDispatcher,
}

impl EventConsumer for ManagerCore {
    fn process_event(&mut self, event: Event, pump: &mut EventPump<'_>) -> Directive {
        let command = match event {
            Event::Command(command) => command,
            other => {
                warn!(kind = %other.kind(), "service manager received foreign event");
                return Directive::Continue;
            }
        };
        debug!(command = command.name(), "executing service manager command");

        match command {
            ServiceCommand::RegisterStub(stub, channel) => {
                self.register_server(stub, channel);
            }
            ServiceCommand::UnregisterStub(stub, channel) => {
                self.unregister_server(stub, channel);
            }
            ServiceCommand::RegisterProxy(proxy, channel) => {
                self.register_client(proxy, channel);
            }
            ServiceCommand::UnregisterProxy(proxy, channel) => {
                self.unregister_client(proxy, channel);
            }
            ServiceCommand::ConfigureConnection { config } => {
                let mut router = lock(&self.shared.router);
                router.set_enabled(true);
                if let Some(path) = config {
                    router.configure(Some(&path));
                } else if !router.is_configured() {
                    router.configure(None);
                }
            }
            ServiceCommand::StartConnection { config } => {
                let mut router = lock(&self.shared.router);
                router.set_enabled(true);
                let configured = if let Some(path) = config {
                    router.configure(Some(&path))
                } else if !router.is_configured() {
                    router.configure(None)
                } else {
                    true
                };
                if configured {
                    router.start();
                }
            }
            ServiceCommand::StartNetConnection { host, port } => {
                let mut router = lock(&self.shared.router);
                router.set_enabled(true);
                router.set_address(&host, port);
                if router.is_configured() {
                    router.start();
                }
            }
            ServiceCommand::StopConnection => {
                lock(&self.shared.router).stop();
            }
            ServiceCommand::SetEnableService(enable) => {
                lock(&self.shared.router).set_enabled(enable);
            }
            ServiceCommand::RegisterConnection(_channel) => {
                self.reannounce_local_services();
            }
            ServiceCommand::UnregisterConnection(_channel)
            | ServiceCommand::LostConnection(_channel) => {
                self.drop_remote_services();
            }
            ServiceCommand::StopRoutingClient => {
                self.drain_directory_with_notices();
                lock(&self.shared.router).stop();
                pump.remove_events(false);
                self.own.pulse_exit();
            }
            ServiceCommand::ShutdownService => {
                pump.remove_events(false);
                self.drain_directory_with_notices();
                lock(&self.shared.router).stop();
                return Directive::Exit;
            }
        }

        Directive::Continue
    }
}

impl ManagerCore {
    fn register_server(&self, mut stub: StubAddress, channel: Channel) {
        stub.set_channel(channel);
        if !stub.is_valid() {
            warn!(stub = %stub, "dropping registration of invalid stub address");
            return;
        }
        if stub.is_local() && stub.is_public() {
            lock(&self.shared.router).register_service(&stub);
        }

        let result = lock(&self.shared.directory).register_server(stub.clone());
        match result {
            Ok((server, resolved)) => {
                debug!(
                    server = %server,
                    waiting = resolved.len(),
                    "server registered"
                );
                for client in &resolved {
                    self.send_client_connected(client, server.address());
                }
            }
            Err(err) => warn!(%err, "stub registration rejected"),
        }
    }

    fn unregister_server(&self, mut stub: StubAddress, channel: Channel) {
        stub.set_channel(channel);
        if stub.is_local() && stub.is_public() {
            lock(&self.shared.router).unregister_service(&stub);
        }

        let result = lock(&self.shared.directory).unregister_server(&stub);
        if let Some((server, affected)) = result {
            debug!(
                server = %server,
                clients = affected.len(),
                "server unregistered"
            );
            for client in &affected {
                self.send_client_disconnected(client, &stub);
            }
        }
    }

    fn register_client(&self, mut proxy: ProxyAddress, channel: Channel) {
        proxy.set_channel(channel);
        if !proxy.is_valid() {
            warn!(proxy = %proxy, "dropping registration of invalid proxy address");
            return;
        }
        if proxy.is_local() && proxy.is_public() {
            lock(&self.shared.router).register_service_client(&proxy);
        }

        let (server_address, client) = lock(&self.shared.directory).register_client(proxy);
        debug!(client = %client, server = %server_address, "client registered");
        self.send_client_connected(&client, &server_address);
    }

    fn unregister_client(&self, mut proxy: ProxyAddress, channel: Channel) {
        proxy.set_channel(channel);
        if proxy.is_local() && proxy.is_public() {
            lock(&self.shared.router).unregister_service_client(&proxy);
        }

        let result = lock(&self.shared.directory).unregister_client(&proxy);
        if let Some((server_address, client)) = result {
            debug!(client = %client, server = %server_address, "client unregistered");
            self.send_client_disconnected(&client, &server_address);
        }
    }

    /// The router just came online: announce every valid local public
    /// stub and proxy again so the router learns the full local state.
    fn reannounce_local_services(&self) {
        let entries = lock(&self.shared.directory).dump();
        let mut router = lock(&self.shared.router);
        for (server, clients) in &entries {
            let stub = server.address();
            if stub.is_valid() && stub.is_local() && stub.is_public() {
                router.register_service(stub);
            }
            for client in clients {
                let proxy = client.address();
                if proxy.is_valid() && proxy.is_local() && proxy.is_public() {
                    router.register_service_client(proxy);
                }
            }
        }
    }

    /// The router went away: synthesize unregistration for every remote
    /// entry. Local entries survive and keep waiting.
    fn drop_remote_services(&self) {
        let entries = lock(&self.shared.directory).dump();
        let mut stubs = Vec::new();
        let mut proxies = Vec::new();
        for (server, clients) in &entries {
            let stub = server.address();
            if stub.is_valid() && stub.is_remote() && stub.is_public() {
                stubs.push(stub.clone());
            }
            for client in clients {
                let proxy = client.address();
                if proxy.is_valid() && proxy.is_remote() && proxy.is_public() {
                    proxies.push(proxy.clone());
                }
            }
        }

        debug!(
            stubs = stubs.len(),
            proxies = proxies.len(),
            "dropping remote services after router loss"
        );
        for stub in stubs {
            let channel = stub.channel();
            self.unregister_server(stub, channel);
        }
        for proxy in proxies {
            let channel = proxy.channel();
            self.unregister_client(proxy, channel);
        }
    }

    /// Shutdown drain: every still-waiting client receives a disconnect
    /// notice, then the directory is emptied.
    fn drain_directory_with_notices(&self) {
        let entries = lock(&self.shared.directory).dump();
        for (server, clients) in &entries {
            for client in clients {
                self.send_client_disconnected(client, server.address());
            }
        }
        lock(&self.shared.directory).clear();
    }

    /// Deliver a connected pair of notices. The stub side requires a
    /// local address with a resolved source; so does the proxy side.
    fn send_client_connected(&self, client: &ClientInfo, stub: &StubAddress) {
        if !client.is_connected() {
            debug!(client = %client, "client has no connection yet, nothing to send");
            return;
        }
        let proxy = client.address();
        if stub.is_local() && stub.source() != SOURCE_UNKNOWN {
            self.registry.post_to(
                stub.source(),
                Event::StubConnect(ConnectNotice::new(
                    proxy.clone(),
                    stub.clone(),
                    ConnectionStatus::Connected,
                )),
            );
        }
        if proxy.is_local() && proxy.source() != SOURCE_UNKNOWN {
            self.registry.post_to(
                proxy.source(),
                Event::ProxyConnect(ConnectNotice::new(
                    proxy.clone(),
                    stub.clone(),
                    ConnectionStatus::Connected,
                )),
            );
        }
    }

    /// Deliver a disconnected pair of notices to a waiting client. The
    /// proxy side does not require a resolved source: a proxy that was
    /// announced must hear the disconnect even while its channel target
    /// is still unresolved.
    fn send_client_disconnected(&self, client: &ClientInfo, stub: &StubAddress) {
        if !client.is_waiting() {
            return;
        }
        let proxy = client.address();
        if stub.is_local() && stub.source() != SOURCE_UNKNOWN {
            self.registry.post_to(
                stub.source(),
                Event::StubConnect(ConnectNotice::new(
                    proxy.clone(),
                    stub.clone(),
                    ConnectionStatus::Disconnected,
                )),
            );
        }
        if proxy.is_local() {
            self.registry.post_to(
                proxy.source(),
                Event::ProxyConnect(ConnectNotice::new(
                    proxy.clone(),
                    stub.clone(),
                    ConnectionStatus::Disconnected,
                )),
            );
        }
    }
}
