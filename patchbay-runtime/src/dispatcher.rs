//! Typed event dispatch: one FIFO queue, one worker thread.
//!
//! A dispatcher owns an unbounded MPSC queue and a dedicated worker
//! thread draining it. Producers on any thread enqueue through
//! [`EventDispatcher::post_event`] and never block; exactly one consumer
//! processes events, one at a time, to completion. The acceptance filter
//! is fixed at construction: events of any other kind are rejected and
//! dropped at the post site.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use patchbay_core::SourceId;

use crate::event::{Event, EventKind};

/// Lock a mutex, recovering the guard from a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Errors constructing a dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    /// The worker thread could not be spawned. This is the only fatal
    /// startup failure; callers propagate it to the process entry point.
    #[error("failed to spawn dispatcher thread `{name}`: {source}")]
    SpawnFailed {
        /// Name of the dispatcher being started.
        name: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// What the run loop should do after an event was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep pumping events.
    Continue,
    /// Leave the run loop immediately.
    Exit,
}

/// Worker-side access to the queue, handed to the consumer while it
/// processes an event. Lets a consumer drain its own queue without
/// dispatching, the way shutdown commands require.
pub struct EventPump<'a> {
    rx: &'a mut mpsc::UnboundedReceiver<Event>,
    exit_drained: bool,
}

impl EventPump<'_> {
    /// Drop every queued event without dispatching it.
    ///
    /// With `keep_exit` set, a drained exit marker still takes effect:
    /// the run loop exits once the current event's handler returns.
    /// Returns the number of events removed.
    pub fn remove_events(&mut self, keep_exit: bool) -> usize {
        let mut removed = 0;
        while let Ok(event) = self.rx.try_recv() {
            if keep_exit && matches!(event, Event::Exit) {
                self.exit_drained = true;
            }
            removed += 1;
        }
        removed
    }
}

/// A consumer of dispatched events. Runs entirely on the dispatcher's
/// worker thread.
pub trait EventConsumer: Send + 'static {
    /// Called on the worker thread before the first event.
    fn started(&mut self) {}

    /// Process one event. The pump drains the consumer's own queue;
    /// the directive decides whether the run loop continues.
    fn process_event(&mut self, event: Event, pump: &mut EventPump<'_>) -> Directive;

    /// Called on the worker thread after the run loop ends.
    fn stopped(&mut self) {}
}

#[derive(Debug)]
struct DispatcherInner {
    name: String,
    source: SourceId,
    accepts: u8,
    tx: mpsc::UnboundedSender<Event>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running dispatcher.
///
/// Cloning the handle shares the queue; the worker thread exits when an
/// exit marker is processed, regardless of how many handles remain.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl EventDispatcher {
    /// Spawn a dispatcher with a dedicated named worker thread.
    ///
    /// The consumer is built by `make_consumer`, which receives the
    /// handle so consumers can post to their own queue. The dispatcher
    /// registers itself with `registry` under a freshly allocated source
    /// id and deregisters when the worker exits. Exit markers are always
    /// accepted in addition to `accepts`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatcherError::SpawnFailed`] when the OS refuses the
    /// worker thread.
    pub fn spawn<C, F>(
        name: &str,
        accepts: &[EventKind],
        registry: &DispatcherRegistry,
        make_consumer: F,
    ) -> Result<EventDispatcher, DispatcherError>
    where
        C: EventConsumer,
        F: FnOnce(&EventDispatcher) -> C,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = registry.allocate_source();
        let mask = accepts
            .iter()
            .fold(EventKind::Exit.bit(), |mask, kind| mask | kind.bit());

        let handle = EventDispatcher {
            inner: Arc::new(DispatcherInner {
                name: name.to_string(),
                source,
                accepts: mask,
                tx,
                running: AtomicBool::new(true),
                worker: Mutex::new(None),
            }),
        };

        let mut consumer = make_consumer(&handle);
        registry.register(handle.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        let worker_handle = handle.clone();
        let worker_registry = registry.clone();
        let spawned = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _ = ready_tx.send(());
                run_dispatcher(rx, &mut consumer, &worker_handle, &worker_registry);
            });

        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                registry.deregister(source);
                return Err(DispatcherError::SpawnFailed {
                    name: name.to_string(),
                    source: err,
                });
            }
        };

        *lock(&handle.inner.worker) = Some(join);
        let _ = ready_rx.blocking_recv();
        Ok(handle)
    }

    /// Name of the worker thread.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Source id this dispatcher is registered under.
    pub fn source(&self) -> SourceId {
        self.inner.source
    }

    /// Whether the worker thread is still pumping events.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Enqueue an event.
    ///
    /// Returns `false`, dropping the event, when its kind is not
    /// accepted by this dispatcher or when the worker already exited.
    pub fn post_event(&self, event: Event) -> bool {
        let kind = event.kind();
        if self.inner.accepts & kind.bit() == 0 {
            warn!(
                dispatcher = %self.inner.name,
                %kind,
                "dropping event of unaccepted kind"
            );
            return false;
        }
        self.inner.tx.send(event).is_ok()
    }

    /// Post an exit marker. Already-queued events are still processed;
    /// the marker is guaranteed to be the last event consumed.
    pub fn pulse_exit(&self) -> bool {
        self.inner.tx.send(Event::Exit).is_ok()
    }

    /// Block until the worker thread exits. Safe to call from any thread
    /// except the worker itself, where it is a no-op.
    pub fn completion_wait(&self) {
        let join = lock(&self.inner.worker).take();
        if let Some(join) = join {
            if join.thread().id() == std::thread::current().id() {
                return;
            }
            let _ = join.join();
        }
    }
}

fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<Event>,
    consumer: &mut dyn EventConsumer,
    handle: &EventDispatcher,
    registry: &DispatcherRegistry,
) {
    debug!(dispatcher = %handle.name(), source = handle.source(), "dispatcher started");
    consumer.started();

    while let Some(event) = rx.blocking_recv() {
        if matches!(event, Event::Exit) {
            break;
        }
        let mut pump = EventPump {
            rx: &mut rx,
            exit_drained: false,
        };
        let directive = consumer.process_event(event, &mut pump);
        let exit_drained = pump.exit_drained;
        if directive == Directive::Exit || exit_drained {
            break;
        }
    }

    consumer.stopped();
    registry.deregister(handle.source());
    handle.inner.running.store(false, Ordering::Release);
    debug!(dispatcher = %handle.name(), "dispatcher exited");
}

#[derive(Debug, Default)]
struct RegistryInner {
    dispatchers: Mutex<HashMap<SourceId, EventDispatcher>>,
    next_source: AtomicU64,
}

/// Process directory of running dispatchers, keyed by source id.
///
/// Connect notices are routed to the dispatcher owning an endpoint by
/// looking up the endpoint's channel source here. Explicitly constructed
/// and injected; there is no process-global instance.
#[derive(Debug, Clone, Default)]
pub struct DispatcherRegistry {
    inner: Arc<RegistryInner>,
}

impl DispatcherRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh source id, never `SOURCE_UNKNOWN`.
    pub fn allocate_source(&self) -> SourceId {
        self.inner.next_source.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn register(&self, dispatcher: EventDispatcher) {
        lock(&self.inner.dispatchers).insert(dispatcher.source(), dispatcher);
    }

    fn deregister(&self, source: SourceId) {
        lock(&self.inner.dispatchers).remove(&source);
    }

    /// Look up a dispatcher by source id.
    pub fn get(&self, source: SourceId) -> Option<EventDispatcher> {
        lock(&self.inner.dispatchers).get(&source).cloned()
    }

    /// Post an event to the dispatcher registered under `source`.
    ///
    /// Returns `false` when no such dispatcher exists or the event was
    /// rejected; the event is dropped in either case.
    pub fn post_to(&self, source: SourceId, event: Event) -> bool {
        match self.get(source) {
            Some(dispatcher) => dispatcher.post_event(event),
            None => {
                debug!(source, "no dispatcher for source, dropping event");
                false
            }
        }
    }

    /// Number of registered dispatchers.
    pub fn len(&self) -> usize {
        lock(&self.inner.dispatchers).len()
    }

    /// Whether no dispatcher is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ServiceCommand;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    struct Recorder {
        seen: std_mpsc::Sender<Event>,
        drain_on_stop_command: bool,
    }

    impl EventConsumer for Recorder {
        fn process_event(&mut self, event: Event, pump: &mut EventPump<'_>) -> Directive {
            if self.drain_on_stop_command
                && matches!(event, Event::Command(ServiceCommand::StopConnection))
            {
                pump.remove_events(true);
            }
            let _ = self.seen.send(event);
            Directive::Continue
        }
    }

    fn spawn_recorder(
        registry: &DispatcherRegistry,
        drain_on_stop_command: bool,
    ) -> (EventDispatcher, std_mpsc::Receiver<Event>) {
        let (tx, rx) = std_mpsc::channel();
        let dispatcher = EventDispatcher::spawn(
            "test-dispatcher",
            &[EventKind::Command],
            registry,
            move |_| Recorder {
                seen: tx,
                drain_on_stop_command,
            },
        )
        .expect("spawn dispatcher");
        (dispatcher, rx)
    }

    #[test]
    fn test_events_processed_in_post_order() {
        let registry = DispatcherRegistry::new();
        let (dispatcher, rx) = spawn_recorder(&registry, false);

        for enable in [true, false, true] {
            assert!(dispatcher.post_event(Event::Command(ServiceCommand::SetEnableService(
                enable
            ))));
        }

        for expected in [true, false, true] {
            let event = rx.recv_timeout(Duration::from_secs(5)).expect("event");
            assert_eq!(
                event,
                Event::Command(ServiceCommand::SetEnableService(expected))
            );
        }

        dispatcher.pulse_exit();
        dispatcher.completion_wait();
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_unaccepted_kind_rejected() {
        let registry = DispatcherRegistry::new();
        let (dispatcher, rx) = spawn_recorder(&registry, false);

        let notice = patchbay_core::ConnectNotice::new(
            patchbay_core::ProxyAddress::local(
                "Echo",
                "a",
                patchbay_core::Version::default(),
                patchbay_core::ServiceCategory::Local,
                1,
            ),
            patchbay_core::StubAddress::local(
                "Echo",
                "a",
                patchbay_core::Version::default(),
                patchbay_core::ServiceCategory::Local,
                2,
            ),
            patchbay_core::ConnectionStatus::Connected,
        );
        assert!(!dispatcher.post_event(Event::StubConnect(notice)));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        dispatcher.pulse_exit();
        dispatcher.completion_wait();
    }

    #[test]
    fn test_pulse_exit_is_processed_last() {
        let registry = DispatcherRegistry::new();
        let (dispatcher, rx) = spawn_recorder(&registry, false);

        dispatcher.post_event(Event::Command(ServiceCommand::StopConnection));
        dispatcher.pulse_exit();
        dispatcher.completion_wait();

        // The queued command was processed before the exit marker.
        let event = rx.recv_timeout(Duration::from_secs(5)).expect("event");
        assert_eq!(event, Event::Command(ServiceCommand::StopConnection));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_remove_events_drains_without_dispatch() {
        let registry = DispatcherRegistry::new();
        let (tx, rx) = std_mpsc::channel();
        let started = std_mpsc::channel::<()>();
        let gate_rx = started.1;
        let gate_holder = std_mpsc::channel::<()>();
        let gate_open = gate_holder.1;

        struct Gated {
            seen: std_mpsc::Sender<Event>,
            first_event: Option<std_mpsc::Receiver<()>>,
            notify_processing: std_mpsc::Sender<()>,
        }
        impl EventConsumer for Gated {
            fn process_event(&mut self, event: Event, pump: &mut EventPump<'_>) -> Directive {
                let _ = self.notify_processing.send(());
                if let Some(gate) = self.first_event.take() {
                    // Hold the first event until the test queued more,
                    // then drop everything behind it.
                    let _ = gate.recv_timeout(Duration::from_secs(5));
                    pump.remove_events(true);
                }
                let _ = self.seen.send(event);
                Directive::Continue
            }
        }

        let dispatcher = EventDispatcher::spawn(
            "gated",
            &[EventKind::Command],
            &registry,
            move |_| Gated {
                seen: tx,
                first_event: Some(gate_open),
                notify_processing: started.0,
            },
        )
        .expect("spawn");

        dispatcher.post_event(Event::Command(ServiceCommand::StopConnection));
        gate_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker picked up first event");

        // These land in the queue while the first event is still held.
        dispatcher.post_event(Event::Command(ServiceCommand::SetEnableService(true)));
        dispatcher.pulse_exit();
        gate_holder.0.send(()).expect("release gate");

        dispatcher.completion_wait();

        // Only the first event was dispatched; the drained exit marker
        // still ended the loop.
        let event = rx.recv_timeout(Duration::from_secs(5)).expect("event");
        assert_eq!(event, Event::Command(ServiceCommand::StopConnection));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_registry_routes_by_source() {
        let registry = DispatcherRegistry::new();
        let (dispatcher, rx) = spawn_recorder(&registry, false);

        assert!(registry.post_to(
            dispatcher.source(),
            Event::Command(ServiceCommand::StopConnection)
        ));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        assert!(!registry.post_to(
            dispatcher.source() + 100,
            Event::Command(ServiceCommand::StopConnection)
        ));

        dispatcher.pulse_exit();
        dispatcher.completion_wait();
        assert!(registry.get(dispatcher.source()).is_none());
    }

    #[test]
    fn test_source_ids_are_unique_and_known() {
        let registry = DispatcherRegistry::new();
        let a = registry.allocate_source();
        let b = registry.allocate_source();
        assert_ne!(a, patchbay_core::SOURCE_UNKNOWN);
        assert_ne!(a, b);
    }
}
