//! Round lifecycle: creation and admission control
//!
//! The [`RoundManager`] owns round creation, the current-round accessor,
//! and the admission rules for submissions and ballots. Settlement lives
//! in [`crate::settle`]; nothing here ever settles a round.

pub mod manager;

pub use manager::{AdmissionError, AdmissionResult, RoundManager};
