//! Collaborative story rounds with exactly-once settlement
//!
//! This library runs the lifecycle of a shared story written one sentence
//! at a time:
//! - Participants submit short sentences (one per round) and cast one vote
//!   per round while the round is open
//! - When the deadline passes, any trigger may settle the round; a
//!   conditional claim guarantees exactly one of them does
//! - The winning sentence (most votes, earliest submission on ties) is
//!   appended to the story; a story past the length threshold is retired
//!   and a fresh one takes over
//!
//! # Modules
//!
//! - [`store`]: storage trait and the in-memory adapter
//! - [`rounds`]: round lifecycle, submission and vote admission
//! - [`settle`]: settlement engine and rotation policy
//! - [`events`]: broadcast bus for lifecycle events
//! - [`generate`]: text-generation client that keeps quiet stories alive
//! - [`identity`]: display-name resolution for authors
//! - [`config`]: engine tunables

pub mod config;
pub mod events;
pub mod generate;
pub mod identity;
pub mod rounds;
pub mod settle;
pub mod store;

pub use config::EngineConfig;
pub use events::{EventBus, SharedEventBus, StoryEvent};
pub use rounds::{AdmissionError, RoundManager};
pub use settle::{SettleOutcome, SettlementEngine};
pub use store::{MemoryStore, SharedStore, Story, StoryStore};
