//! Prelude module - commonly used types for convenient import.

pub use crate::{
    NoopPhase, PhaseError, PhaseReport, ProposalWriter, STANDARD_PHASES, SleepCycle,
    SleepCycleState, SleepError, SleepPhase, SleepResult, SleepStatus,
};
