//! Event types for story and round changes
//!
//! Purely observational: subscribers (display layers, loggers) follow
//! state changes here, but no correctness depends on delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{RoundId, StoryId, SubmissionId};

/// All story lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryEvent {
    /// A new active story was created
    StoryCreated {
        story_id: StoryId,
        opening_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A new round was opened on a story
    RoundOpened {
        round_id: RoundId,
        story_id: StoryId,
        end_time: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A candidate sentence was admitted
    SubmissionReceived {
        submission_id: SubmissionId,
        round_id: RoundId,
        author_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A ballot was admitted
    VoteCast {
        round_id: RoundId,
        submission_id: SubmissionId,
        vote_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A round was settled exactly once
    RoundSettled {
        round_id: RoundId,
        story_id: StoryId,
        winner: Option<String>,
        vote_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A story crossed the length threshold and was retired
    StoryRotated {
        retired_story_id: StoryId,
        final_len: usize,
        timestamp: DateTime<Utc>,
    },
}

impl StoryEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            StoryEvent::StoryCreated { timestamp, .. } => *timestamp,
            StoryEvent::RoundOpened { timestamp, .. } => *timestamp,
            StoryEvent::SubmissionReceived { timestamp, .. } => *timestamp,
            StoryEvent::VoteCast { timestamp, .. } => *timestamp,
            StoryEvent::RoundSettled { timestamp, .. } => *timestamp,
            StoryEvent::StoryRotated { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            StoryEvent::StoryCreated { .. } => "story_created",
            StoryEvent::RoundOpened { .. } => "round_opened",
            StoryEvent::SubmissionReceived { .. } => "submission_received",
            StoryEvent::VoteCast { .. } => "vote_cast",
            StoryEvent::RoundSettled { .. } => "round_settled",
            StoryEvent::StoryRotated { .. } => "story_rotated",
        }
    }

    /// Get the round id if this event is round-scoped
    pub fn round_id(&self) -> Option<&str> {
        match self {
            StoryEvent::RoundOpened { round_id, .. } => Some(round_id),
            StoryEvent::SubmissionReceived { round_id, .. } => Some(round_id),
            StoryEvent::VoteCast { round_id, .. } => Some(round_id),
            StoryEvent::RoundSettled { round_id, .. } => Some(round_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = StoryEvent::RoundSettled {
            round_id: "r1".to_string(),
            story_id: "s1".to_string(),
            winner: Some("The door opened.".to_string()),
            vote_count: 3,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: StoryEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_type(), "round_settled");
        assert_eq!(parsed.round_id(), Some("r1"));
    }

    #[test]
    fn test_story_scoped_event_has_no_round() {
        let event = StoryEvent::StoryCreated {
            story_id: "s1".to_string(),
            opening_preview: "Once.".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.round_id(), None);
    }
}
