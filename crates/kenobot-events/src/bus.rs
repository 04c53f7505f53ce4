//! The signal bus: ordered dispatch with an inhibiting middleware pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::error::BusResult;
use crate::middleware::{DeadSignalMiddleware, LoggingMiddleware, Middleware, TraceMiddleware, Verdict};
use crate::signal::{ErrorReport, Signal, SignalPayload, SignalType};

/// Error returned by a failing handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Handler = Arc<dyn Fn(&Arc<Signal>) -> Result<(), HandlerError> + Send + Sync>;

/// Identifier of a registered handler, used to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub(crate) struct Registration {
    id: SubscriberId,
    name: String,
    once: bool,
    handler: Handler,
}

pub(crate) type HandlerTable = Arc<RwLock<HashMap<SignalType, Vec<Registration>>>>;

/// Snapshot of bus counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BusStats {
    /// Signals dispatched (including middleware-bypassing emits).
    pub fired: u64,
    /// Signals suppressed by middleware.
    pub inhibited: u64,
    /// Dispatch counts keyed by wire name.
    pub by_type: HashMap<String, u64>,
}

/// Typed publish/subscribe bus with a deterministic middleware pipeline.
///
/// The bus is an owned value passed by reference; multiple independent
/// instances can coexist in one process. The handler table is mutated only
/// by `on`/`once`/`off`; `fire` dispatches to a snapshot, so a handler
/// registered during dispatch does not receive the in-flight signal.
pub struct SignalBus {
    handlers: HandlerTable,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    fired: AtomicU64,
    inhibited: AtomicU64,
    by_type: DashMap<SignalType, u64>,
    audit: Mutex<Option<Arc<AuditTrail>>>,
    next_subscriber: AtomicU64,
}

impl SignalBus {
    /// Create a bus with no middleware and no audit trail.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            middleware: RwLock::new(Vec::new()),
            fired: AtomicU64::new(0),
            inhibited: AtomicU64::new(0),
            by_type: DashMap::new(),
            audit: Mutex::new(None),
            next_subscriber: AtomicU64::new(1),
        }
    }

    /// Install the three standard middleware: trace propagation, signal
    /// logging, and dead-signal detection, in that order.
    pub fn install_standard_middleware(&self) {
        self.use_middleware(TraceMiddleware::new());
        self.use_middleware(LoggingMiddleware::default());
        self.use_middleware(DeadSignalMiddleware::new(Arc::clone(&self.handlers)));
    }

    /// Append a middleware to the pipeline.
    ///
    /// Middleware runs first-registered-first; returning
    /// [`Verdict::Inhibit`] aborts the pipeline and suppresses delivery.
    pub fn use_middleware(&self, middleware: impl Middleware + 'static) {
        self.middleware
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Arc::new(middleware));
    }

    /// Enable the on-disk audit trail.
    pub fn enable_audit(&self, path: impl Into<std::path::PathBuf>) -> BusResult<()> {
        let trail = AuditTrail::open(path)?;
        *self
            .audit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::new(trail));
        Ok(())
    }

    /// The audit trail, if enabled.
    #[must_use]
    pub fn audit_trail(&self) -> Option<Arc<AuditTrail>> {
        self.audit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Register a handler for a signal type. Returns its id for `off`.
    pub fn on<F>(&self, signal_type: SignalType, handler: F) -> SubscriberId
    where
        F: Fn(&Arc<Signal>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(signal_type, "handler", false, Arc::new(handler))
    }

    /// Register a named handler (the name appears in error reports).
    pub fn on_named<F>(
        &self,
        signal_type: SignalType,
        name: impl Into<String>,
        handler: F,
    ) -> SubscriberId
    where
        F: Fn(&Arc<Signal>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(signal_type, name, false, Arc::new(handler))
    }

    /// Register a handler that is removed after its first invocation.
    pub fn once<F>(&self, signal_type: SignalType, handler: F) -> SubscriberId
    where
        F: Fn(&Arc<Signal>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(signal_type, "once-handler", true, Arc::new(handler))
    }

    /// Deregister a handler. Returns whether anything was removed.
    pub fn off(&self, id: SubscriberId) -> bool {
        let mut table = self
            .handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for registrations in table.values_mut() {
            if let Some(pos) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(pos);
                return true;
            }
        }
        false
    }

    /// Register a handler that forwards signals into an unbounded channel.
    ///
    /// This is the bridge for async consumers (the agent loop): they own
    /// the receiving end and process signals at their own pace.
    pub fn subscribe_channel(
        &self,
        signal_type: SignalType,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<Arc<Signal>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on_named(signal_type, "channel-subscriber", move |signal| {
            // A dropped receiver just means the consumer is gone.
            let _ = tx.send(Arc::clone(signal));
            Ok(())
        });
        (id, rx)
    }

    /// Number of handlers currently registered for a type.
    #[must_use]
    pub fn handler_count(&self, signal_type: SignalType) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&signal_type)
            .map_or(0, Vec::len)
    }

    /// Construct a signal, run middleware, and dispatch.
    ///
    /// Returns `None` when a middleware inhibited delivery.
    pub fn fire(
        &self,
        signal_type: SignalType,
        payload: SignalPayload,
        source: &str,
    ) -> Option<Arc<Signal>> {
        self.run(Signal::new(signal_type, payload, source), true)
    }

    /// Like [`SignalBus::fire`] with a caller-supplied trace id.
    pub fn fire_traced(
        &self,
        signal_type: SignalType,
        payload: SignalPayload,
        source: &str,
        trace_id: Uuid,
    ) -> Option<Arc<Signal>> {
        self.run(
            Signal::with_trace(signal_type, payload, source, trace_id),
            true,
        )
    }

    /// Dispatch bypassing the middleware pipeline.
    ///
    /// Retained for strict backward paths — the scheduler and internal
    /// fan-out that must not loop through tracing.
    pub fn emit(
        &self,
        signal_type: SignalType,
        payload: SignalPayload,
        source: &str,
    ) -> Arc<Signal> {
        // Without middleware nothing can inhibit, so dispatch always happens.
        match self.run(Signal::new(signal_type, payload, source), false) {
            Some(signal) => signal,
            None => unreachable!("emit cannot be inhibited"),
        }
    }

    /// Snapshot of the bus counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            fired: self.fired.load(Ordering::Relaxed),
            inhibited: self.inhibited.load(Ordering::Relaxed),
            by_type: self
                .by_type
                .iter()
                .map(|entry| (entry.key().wire_name().to_string(), *entry.value()))
                .collect(),
        }
    }

    fn register(
        &self,
        signal_type: SignalType,
        name: impl Into<String>,
        once: bool,
        handler: Handler,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(signal_type)
            .or_default()
            .push(Registration {
                id,
                name: name.into(),
                once,
                handler,
            });
        id
    }

    fn run(&self, mut signal: Signal, with_middleware: bool) -> Option<Arc<Signal>> {
        if with_middleware {
            let pipeline: Vec<Arc<dyn Middleware>> = self
                .middleware
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone();
            for mw in pipeline {
                if mw.apply(&mut signal) == Verdict::Inhibit {
                    debug!(signal_type = %signal.signal_type, middleware = mw.name(), "signal inhibited");
                    self.inhibited.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let signal = Arc::new(signal);
        self.fired.fetch_add(1, Ordering::Relaxed);
        *self.by_type.entry(signal.signal_type).or_insert(0) += 1;

        if let Some(trail) = self.audit_trail() {
            if let Err(e) = trail.record(&signal) {
                warn!(error = %e, "failed to append signal to audit trail");
            }
        }

        // Snapshot so handler-table mutation during dispatch (including by
        // the handlers themselves) cannot affect this delivery.
        let snapshot: Vec<(SubscriberId, String, bool, Handler)> = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&signal.signal_type)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|r| (r.id, r.name.clone(), r.once, Arc::clone(&r.handler)))
                    .collect()
            })
            .unwrap_or_default();

        // Retire once-handlers before invoking, so a reentrant fire from
        // inside a handler cannot run them twice.
        for (id, _, once, _) in &snapshot {
            if *once {
                self.off(*id);
            }
        }

        for (_, name, _, handler) in snapshot {
            if let Err(err) = handler(&signal) {
                error!(
                    signal_type = %signal.signal_type,
                    subscriber = %name,
                    error = %err,
                    "subscriber failed"
                );
                // A failing ERROR handler is only logged, never re-fired.
                if signal.signal_type != SignalType::Error {
                    self.emit(
                        SignalType::Error,
                        SignalPayload::Error(ErrorReport {
                            message: err.to_string(),
                            context: name.clone(),
                        }),
                        "bus",
                    );
                }
            }
        }

        Some(signal)
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
