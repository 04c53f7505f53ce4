//! KenoBot Events - Signal bus for the KenoBot assistant daemon.
//!
//! This crate provides:
//! - A closed set of signal types with stable wire names
//! - The [`SignalBus`]: ordered synchronous dispatch with an inhibiting
//!   middleware pipeline
//! - Built-in middleware: trace propagation, structured logging, and
//!   dead-signal detection
//! - An optional append-only audit trail of serialized signals
//!
//! # Architecture
//!
//! Every in-process component communicates through one bus instance, passed
//! by reference — there is no global emitter. `fire` runs the middleware
//! pipeline to completion, then dispatches to a snapshot of the handlers
//! registered for the signal's type, in registration order. A middleware
//! can inhibit delivery; a failing handler is logged and converted into an
//! `ERROR` signal without disturbing later handlers.
//!
//! # Example
//!
//! ```rust
//! use kenobot_events::{Signal, SignalBus, SignalPayload, SignalType};
//! use kenobot_core::{ChatId, InboundMessage};
//!
//! let bus = SignalBus::new();
//! bus.on(SignalType::IncomingMessage, |signal: &std::sync::Arc<Signal>| {
//!     println!("got {}", signal.signal_type);
//!     Ok(())
//! });
//!
//! let msg = InboundMessage::new("hello there", ChatId::api("demo"), "demo", "api");
//! let fired = bus.fire(
//!     SignalType::IncomingMessage,
//!     SignalPayload::Inbound(msg),
//!     "example",
//! );
//! assert!(fired.is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod audit;
mod bus;
mod error;
mod middleware;
mod signal;

pub use audit::AuditTrail;
pub use bus::{BusStats, HandlerError, SignalBus, SubscriberId};
pub use error::{BusError, BusResult};
pub use middleware::{
    DeadSignalMiddleware, LoggingMiddleware, Middleware, TraceMiddleware, Verdict,
};
pub use signal::{ErrorReport, HealthTransition, Signal, SignalPayload, SignalType};
