//! Round settlement and document rotation
//!
//! [`SettlementEngine`] is the single entry point every trigger funnels
//! into; [`RotationPolicy`] decides whether the winning sentence continues
//! the current story or retires it and starts a fresh one.

pub mod engine;
pub mod rotation;

pub use engine::{SettleError, SettleOutcome, SettleResult, SettlementEngine, WinnerSummary};
pub use rotation::{RotationDecision, RotationPolicy};
