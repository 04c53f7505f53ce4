//! KenoBot Runtime - Wiring and lifecycle.
//!
//! This crate provides:
//! - The [`ChannelAdapter`] trait transport adapters implement, and the
//!   outbound router that delivers each reply to exactly one of them
//! - The [`Agent`] trait plus the bridge that turns `INCOMING_MESSAGE`
//!   into exactly one `OUTGOING_MESSAGE`
//! - The health notifier translating `HEALTH_*` signals into owner
//!   notifications
//! - The canonical watchdog checks (circuit state, process RSS,
//!   sleep-cycle staleness)
//! - [`Kenobot`]: one construction function that wires bus, watchdog,
//!   scheduler, sleep cycle, and HTTP gateway with no global state
//!
//! Multiple independent [`Kenobot`] instances can coexist in a process;
//! everything an instance owns is released by `stop()`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod agent;
mod channel;
mod checks;
mod error;
mod notifier;
mod runtime;

pub use agent::{Agent, AgentBridge, AgentError, EchoAgent, ProviderAgent};
pub use channel::{ChannelAdapter, ChannelError, OutboundRouter};
pub use checks::{BreakerCheck, MemoryCheck, SleepCheck};
pub use error::{RuntimeError, RuntimeResult};
pub use notifier::HealthNotifier;
pub use runtime::Kenobot;
