//! Event-driven notification surface for story changes
//!
//! Observers (display layers, log sinks) follow round and story changes
//! through a Tokio broadcast bus. Delivery is best-effort: no admission
//! or settlement path depends on an event being received.
//!
//! # Usage
//!
//! ```ignore
//! use rounds::events::{EventBus, StoryEvent};
//!
//! let bus = EventBus::new().shared();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(StoryEvent::RoundOpened {
//!     round_id: "r1".to_string(),
//!     story_id: "s1".to_string(),
//!     end_time: chrono::Utc::now(),
//!     timestamp: chrono::Utc::now(),
//! });
//!
//! let event = receiver.recv().await?;
//! ```

pub mod bus;
pub mod types;

// Re-export core types
pub use bus::{EventBus, SharedEventBus};
pub use types::StoryEvent;
