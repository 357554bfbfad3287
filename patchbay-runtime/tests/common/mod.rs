//! Shared harness for service manager integration tests: endpoint
//! dispatchers that record the connect notices delivered to them.

#![allow(dead_code)]

use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use patchbay_core::{
    ConnectNotice, ProxyAddress, ServiceCategory, SourceId, StubAddress, Version,
};
use patchbay_runtime::{
    Directive, DispatcherRegistry, Event, EventConsumer, EventDispatcher, EventKind, EventPump,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_WINDOW: Duration = Duration::from_millis(200);

struct Recording {
    tx: std_mpsc::Sender<Event>,
}

impl EventConsumer for Recording {
    fn process_event(&mut self, event: Event, _pump: &mut EventPump<'_>) -> Directive {
        let _ = self.tx.send(event);
        Directive::Continue
    }
}

/// A component endpoint: one dispatcher accepting connect notices, with
/// a channel the test drains to observe what was delivered.
pub struct Endpoint {
    pub dispatcher: EventDispatcher,
    events: std_mpsc::Receiver<Event>,
}

/// Best-effort tracing setup so `RUST_LOG` works in test runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

impl Endpoint {
    pub fn spawn(registry: &DispatcherRegistry, name: &str) -> Self {
        init_tracing();
        let (tx, rx) = std_mpsc::channel();
        let dispatcher = EventDispatcher::spawn(
            name,
            &[EventKind::StubConnect, EventKind::ProxyConnect],
            registry,
            move |_| Recording { tx },
        )
        .expect("spawn endpoint dispatcher");
        Self {
            dispatcher,
            events: rx,
        }
    }

    pub fn source(&self) -> SourceId {
        self.dispatcher.source()
    }

    /// A stub address owned by this endpoint's dispatcher.
    pub fn stub(&self, service: &str, role: &str, category: ServiceCategory) -> StubAddress {
        StubAddress::local(service, role, Version::default(), category, self.source())
    }

    /// A proxy address owned by this endpoint's dispatcher.
    pub fn proxy(&self, service: &str, role: &str, category: ServiceCategory) -> ProxyAddress {
        ProxyAddress::local(service, role, Version::default(), category, self.source())
    }

    pub fn expect_event(&self) -> Event {
        self.events
            .recv_timeout(EVENT_TIMEOUT)
            .expect("expected a connect notice in time")
    }

    pub fn expect_stub_connect(&self) -> ConnectNotice {
        match self.expect_event() {
            Event::StubConnect(notice) => notice,
            other => panic!("expected stub-connect, got {other:?}"),
        }
    }

    pub fn expect_proxy_connect(&self) -> ConnectNotice {
        match self.expect_event() {
            Event::ProxyConnect(notice) => notice,
            other => panic!("expected proxy-connect, got {other:?}"),
        }
    }

    /// Assert nothing is delivered within a short quiet window.
    pub fn assert_quiet(&self) {
        if let Ok(event) = self.events.recv_timeout(QUIET_WINDOW) {
            panic!("expected no notice, got {event:?}");
        }
    }

    pub fn stop(&self) {
        self.dispatcher.pulse_exit();
        self.dispatcher.completion_wait();
    }
}

/// Poll until the condition holds, panicking after the deadline.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

/// Poll a tokio unbounded receiver from sync test code.
pub fn recv_bytes(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<u8> {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    loop {
        match rx.try_recv() {
            Ok(bytes) => return bytes,
            Err(_) => {
                if Instant::now() >= deadline {
                    panic!("timed out waiting for an outbound frame");
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
