//! Prelude module - commonly used types for convenient import.

pub use crate::{
    ApiError, BreakerProbe, ErrorCode, GatewayConfig, GatewayError, GatewayResult, GatewayServer,
    GatewayState, PendingOutcome, PendingTable, RateDecision, RateLimiter, build_router,
    sign_body, verify_bearer, verify_signature,
};
