//! Prelude module - commonly used types for convenient import.

pub use crate::{
    Agent, AgentBridge, AgentError, BreakerCheck, ChannelAdapter, ChannelError, EchoAgent,
    HealthNotifier, Kenobot, MemoryCheck, OutboundRouter, ProviderAgent, RuntimeError,
    RuntimeResult, SleepCheck,
};
