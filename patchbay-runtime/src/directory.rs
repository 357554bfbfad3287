//! The service directory: the authoritative map of every stub and proxy
//! registered in the process.
//!
//! One entry per `(service, role)` key. An entry holds the server side
//! (possibly a placeholder while no stub exists) and the ordered list of
//! clients subscribed to that key. All mutation happens on the service
//! manager thread; diagnostic snapshots go through the manager's mutex.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use patchbay_core::{
    ConnectionStatus, Cookie, ProxyAddress, ServiceKey, SourceId, StubAddress, COOKIE_ANY,
};

/// Errors produced by directory mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// A second stub tried to claim an occupied `(service, role)` key.
    /// The first writer wins; the newcomer is rejected without touching
    /// the directory.
    #[error("duplicate stub: {existing} holds the entry, {rejected} rejected")]
    DuplicateStub {
        /// The stub already holding the entry.
        existing: StubAddress,
        /// The rejected newcomer.
        rejected: StubAddress,
    },
}

/// A stub S serves a proxy P when they share the `(service, role)` key
/// and either the service is public or both endpoints live in the same
/// process.
pub fn compatible(stub: &StubAddress, proxy: &ProxyAddress) -> bool {
    stub.ident().service_name == proxy.ident().service_name
        && stub.ident().role_name == proxy.ident().role_name
        && (stub.is_public() || stub.cookie() == proxy.cookie())
}

/// The server side of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    address: StubAddress,
    status: ConnectionStatus,
}

impl ServerInfo {
    fn connected(address: StubAddress) -> Self {
        Self {
            address,
            status: ConnectionStatus::Connected,
        }
    }

    fn waiting(address: StubAddress) -> Self {
        Self {
            address,
            status: ConnectionStatus::Pending,
        }
    }

    /// The stub address, a placeholder while no stub is registered.
    pub fn address(&self) -> &StubAddress {
        &self.address
    }

    /// Connection status of the entry.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether a live stub holds the entry.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

impl std::fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.address, self.status)
    }
}

/// One client subscribed to a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    address: ProxyAddress,
    status: ConnectionStatus,
}

impl ClientInfo {
    /// The proxy address.
    pub fn address(&self) -> &ProxyAddress {
        &self.address
    }

    /// Connection status of this client.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the client is connected to a live stub.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Whether the client has been told something and still waits for,
    /// or holds, a connection. Only waiting clients receive disconnect
    /// notifications.
    pub fn is_waiting(&self) -> bool {
        self.status.is_waiting()
    }
}

impl std::fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.address, self.status)
    }
}

#[derive(Debug, Clone)]
struct ServerEntry {
    server: ServerInfo,
    clients: Vec<ClientInfo>,
}

/// The directory: `ServiceKey → (ServerInfo, clients)`.
///
/// Invariants:
/// - at most one entry per `(service, role)` key;
/// - every registered proxy appears under exactly one entry;
/// - an entry with no stub and no clients does not exist (it is
///   garbage-collected by the unregister operations).
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    entries: HashMap<ServiceKey, ServerEntry>,
}

impl ServiceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server endpoint.
    ///
    /// Creates the entry, or upgrades a waiting entry in place keeping
    /// its accumulated client list. Re-registering the same address is
    /// idempotent. Returns the entry and the clients that just became
    /// connected and must be notified.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::DuplicateStub`] when a different stub already
    /// holds the key; the directory is left untouched.
    pub fn register_server(
        &mut self,
        stub: StubAddress,
    ) -> Result<(ServerInfo, Vec<ClientInfo>), DirectoryError> {
        let key = stub.key();
        match self.entries.get_mut(&key) {
            None => {
                let server = ServerInfo::connected(stub);
                debug!(server = %server, "registered new service entry, no waiting clients");
                self.entries.insert(
                    key,
                    ServerEntry {
                        server: server.clone(),
                        clients: Vec::new(),
                    },
                );
                Ok((server, Vec::new()))
            }
            Some(entry) => {
                if entry.server.address.is_valid() {
                    if entry.server.address == stub {
                        debug!(server = %entry.server, "stub already registered, ignoring");
                        return Ok((entry.server.clone(), Vec::new()));
                    }
                    return Err(DirectoryError::DuplicateStub {
                        existing: entry.server.address.clone(),
                        rejected: stub,
                    });
                }

                entry.server = ServerInfo::connected(stub);
                let mut resolved = Vec::new();
                for client in &mut entry.clients {
                    if compatible(&entry.server.address, &client.address) {
                        client.status = ConnectionStatus::Connected;
                        resolved.push(client.clone());
                    }
                }
                debug!(
                    server = %entry.server,
                    waiting = resolved.len(),
                    "service entry upgraded, notifying waiting clients"
                );
                Ok((entry.server.clone(), resolved))
            }
        }
    }

    /// Withdraw a server endpoint.
    ///
    /// A silent no-op (`None`) when the key is unknown or held by a
    /// different address. Otherwise the entry reverts to a waiting
    /// placeholder — or is garbage-collected when no clients remain —
    /// and the returned snapshot carries every client with its status
    /// at the moment of withdrawal; survivors are reset to pending.
    pub fn unregister_server(
        &mut self,
        stub: &StubAddress,
    ) -> Option<(ServerInfo, Vec<ClientInfo>)> {
        let key = stub.key();
        let entry = match self.entries.get_mut(&key) {
            Some(entry) => entry,
            None => {
                warn!(stub = %stub, "unregister for unknown service entry, ignoring");
                return None;
            }
        };
        if entry.server.address != *stub {
            warn!(
                stub = %stub,
                holder = %entry.server.address,
                "unregister from non-holding stub, ignoring"
            );
            return None;
        }

        let server = ServerInfo {
            address: entry.server.address.clone(),
            status: ConnectionStatus::Disconnected,
        };
        let affected = entry.clients.clone();

        if entry.clients.is_empty() {
            info!(server = %server, "service entry has no clients, removing");
            self.entries.remove(&key);
        } else {
            entry.server = ServerInfo {
                address: StubAddress::waiting(stub.ident().clone()),
                status: ConnectionStatus::Disconnected,
            };
            for client in &mut entry.clients {
                client.status = ConnectionStatus::Pending;
            }
            info!(
                server = %server,
                clients = affected.len(),
                "service entry kept for waiting clients"
            );
        }

        Some((server, affected))
    }

    /// Register a client endpoint under its `(service, role)` key,
    /// creating a waiting entry when no stub exists yet.
    ///
    /// Returns the (possibly placeholder) stub address the proxy is now
    /// subscribed to, and the client record with its resulting status.
    pub fn register_client(&mut self, proxy: ProxyAddress) -> (StubAddress, ClientInfo) {
        let key = proxy.key();
        let entry = self.entries.entry(key).or_insert_with(|| ServerEntry {
            server: ServerInfo::waiting(StubAddress::waiting(proxy.ident().clone())),
            clients: Vec::new(),
        });

        let status = if entry.server.is_connected()
            && entry.server.address.is_valid()
            && compatible(&entry.server.address, &proxy)
        {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Pending
        };

        let client = ClientInfo {
            address: proxy,
            status,
        };

        match entry
            .clients
            .iter()
            .position(|existing| existing.address == client.address)
        {
            Some(index) => entry.clients[index] = client.clone(),
            None => entry.clients.push(client.clone()),
        }

        debug!(client = %client, server = %entry.server, "client registered");
        (entry.server.address.clone(), client)
    }

    /// Remove a client by exact address equality.
    ///
    /// Garbage-collects the entry when it holds no stub and no other
    /// clients. Returns the removed client with its last status and the
    /// stub address it was subscribed to.
    pub fn unregister_client(
        &mut self,
        proxy: &ProxyAddress,
    ) -> Option<(StubAddress, ClientInfo)> {
        let key = proxy.key();
        let entry = self.entries.get_mut(&key)?;
        let index = entry
            .clients
            .iter()
            .position(|client| client.address == *proxy)?;

        let client = entry.clients.remove(index);
        let server_address = entry.server.address.clone();
        if !entry.server.address.is_valid() && entry.clients.is_empty() {
            info!(key = %key, "last waiting client left, removing service entry");
            self.entries.remove(&key);
        }
        Some((server_address, client))
    }

    /// Mark one client disconnected in place without removing it.
    pub fn disconnect_client(
        &mut self,
        proxy: &ProxyAddress,
    ) -> Option<(StubAddress, ClientInfo)> {
        let entry = self.entries.get_mut(&proxy.key())?;
        let client = entry
            .clients
            .iter_mut()
            .find(|client| client.address == *proxy)?;
        client.status = ConnectionStatus::Disconnected;
        Some((entry.server.address.clone(), client.clone()))
    }

    /// Snapshot of every valid stub and proxy whose cookie matches;
    /// [`COOKIE_ANY`] matches all.
    pub fn snapshot(&self, cookie: Cookie) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        let mut stubs = Vec::new();
        let mut proxies = Vec::new();
        for entry in self.entries.values() {
            let server = &entry.server.address;
            if server.is_valid() && (cookie == COOKIE_ANY || server.cookie() == cookie) {
                stubs.push(server.clone());
            }
            for client in &entry.clients {
                let proxy = &client.address;
                if proxy.is_valid() && (cookie == COOKIE_ANY || proxy.cookie() == cookie) {
                    proxies.push(proxy.clone());
                }
            }
        }
        (stubs, proxies)
    }

    /// Snapshot of every valid stub and proxy owned by the given
    /// dispatcher source.
    pub fn sources(&self, source: SourceId) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        let mut stubs = Vec::new();
        let mut proxies = Vec::new();
        for entry in self.entries.values() {
            let server = &entry.server.address;
            if server.is_valid() && server.source() == source {
                stubs.push(server.clone());
            }
            for client in &entry.clients {
                let proxy = &client.address;
                if proxy.is_valid() && proxy.source() == source {
                    proxies.push(proxy.clone());
                }
            }
        }
        (stubs, proxies)
    }

    /// Clone the full directory content, entry by entry.
    pub fn dump(&self) -> Vec<(ServerInfo, Vec<ClientInfo>)> {
        self.entries
            .values()
            .map(|entry| (entry.server.clone(), entry.clients.clone()))
            .collect()
    }

    /// Iterate over entries. Order is unspecified but stable within a
    /// single pass.
    pub fn iter(&self) -> impl Iterator<Item = (&ServerInfo, &[ClientInfo])> {
        self.entries
            .values()
            .map(|entry| (&entry.server, entry.clients.as_slice()))
    }

    /// Number of `(service, role)` entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
