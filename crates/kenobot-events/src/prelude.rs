//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kenobot_events::prelude::*;` to import all essential types.

// Bus
pub use crate::{BusStats, HandlerError, SignalBus, SubscriberId};

// Signals
pub use crate::{ErrorReport, HealthTransition, Signal, SignalPayload, SignalType};

// Middleware
pub use crate::{DeadSignalMiddleware, LoggingMiddleware, Middleware, TraceMiddleware, Verdict};

// Audit
pub use crate::AuditTrail;

// Errors
pub use crate::{BusError, BusResult};
