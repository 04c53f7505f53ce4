//! KenoBot Gateway - The HTTP surface of the KenoBot assistant daemon.
//!
//! This crate provides:
//! - `POST /webhook`: a signed synchronous endpoint whose reply is the
//!   agent's answer, bridged over the signal bus
//! - `/api/v1`: the authenticated REST API over conversations, memory,
//!   scheduler, sleep cycle, and tasks
//! - The [`PendingTable`] correlator pairing synchronous HTTP callers with
//!   asynchronous `OUTGOING_MESSAGE` signals
//! - A per-IP sliding-window rate limiter applied before authentication
//!
//! # Locking Design
//!
//! Pending tables and the rate limiter are mutated by HTTP worker tasks
//! and the bus subscriber; both sit behind plain mutexes locked only for
//! table operations, never across awaits. Each correlator (webhook, API)
//! owns its own pending table, so the at-most-one-in-flight invariant is
//! per correlator.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod api;
mod auth;
mod envelope;
mod error;
mod pending;
mod ratelimit;
mod server;
mod state;
mod webhook;

pub use auth::{sign_body, verify_bearer, verify_signature};
pub use envelope::{ApiError, ErrorCode};
pub use error::{GatewayError, GatewayResult};
pub use pending::{PendingOutcome, PendingTable};
pub use ratelimit::{RateDecision, RateLimiter};
pub use server::{GatewayServer, build_router};
pub use state::{BreakerProbe, GatewayConfig, GatewayState};
