//! Core persisted types for the round lifecycle
//!
//! These rows live behind the [`StoryStore`](super::StoryStore) trait and
//! represent the durable state of the collaborative story: the story text
//! itself, its voting rounds, candidate submissions, and ballots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for stories
pub type StoryId = String;

/// Unique identifier for rounds
pub type RoundId = String;

/// Unique identifier for submissions
pub type SubmissionId = String;

/// Opaque caller identity, resolved to a display name at the boundary
pub type UserId = String;

/// The accumulating shared story text
///
/// Exactly one story is active at a time. Content is append-only within a
/// story's lifetime; rounds are owned as an ordered id sequence whose last
/// element is the current round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// Unique story identifier
    pub id: StoryId,

    /// Accumulated story text
    pub content: String,

    /// Whether this is the story currently accepting rounds
    pub active: bool,

    /// Ordered round ids; the last entry is the current round
    pub round_ids: Vec<RoundId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Story {
    /// Create a new active story with an opening sentence
    pub fn new(content: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            active: true,
            round_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Id of the current round, if any round has been opened
    pub fn current_round_id(&self) -> Option<&RoundId> {
        self.round_ids.last()
    }

    /// Append a newly opened round
    pub fn push_round(&mut self, round_id: RoundId) {
        self.round_ids.push(round_id);
        self.touch();
    }

    /// Replace the story content
    pub fn set_content(&mut self, content: String) {
        self.content = content;
        self.touch();
    }

    /// Update the last-activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A bounded voting window
///
/// The `settled` flag is monotonic: it transitions false to true exactly
/// once, via the store's conditional claim, and is never reversed. The
/// outcome is recorded separately after the claim so that a settled round
/// with no outcome is detectable as a partially applied settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Unique round identifier
    pub id: RoundId,

    /// Story this round belongs to
    pub story_id: StoryId,

    /// When the round was opened
    pub opened_at: DateTime<Utc>,

    /// Story content length (in characters) when the round opened;
    /// recovery compares against it to tell whether the winner was
    /// already applied
    pub base_len: usize,

    /// Absolute admission deadline
    pub end_time: DateTime<Utc>,

    /// Whether a settlement claim has succeeded for this round
    pub settled: bool,

    /// Outcome recorded once settlement has been applied
    pub outcome: Option<RoundOutcome>,
}

impl Round {
    /// Open a new round on a story with the given deadline
    pub fn new(story_id: StoryId, base_len: usize, end_time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            story_id,
            opened_at: Utc::now(),
            base_len,
            end_time,
            settled: false,
            outcome: None,
        }
    }

    /// Whether submissions and votes are still admissible at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.end_time
    }

    /// Whether the round is past its deadline and still unclaimed
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        !self.settled && now >= self.end_time
    }
}

/// Result of applying a settled round to its story
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Winning submission, or None for a round with no submissions
    pub winning_submission: Option<SubmissionId>,

    /// The winner's vote count frozen at settlement time
    pub vote_count: u32,

    /// Story content length after the winner was applied
    pub content_len: usize,

    /// When the outcome was applied
    pub applied_at: DateTime<Utc>,
}

impl RoundOutcome {
    /// Outcome for a round that produced a winner
    pub fn winner(submission_id: SubmissionId, vote_count: u32, content_len: usize) -> Self {
        Self {
            winning_submission: Some(submission_id),
            vote_count,
            content_len,
            applied_at: Utc::now(),
        }
    }

    /// Outcome for a round that closed with no submissions
    pub fn empty(content_len: usize) -> Self {
        Self {
            winning_submission: None,
            vote_count: 0,
            content_len,
            applied_at: Utc::now(),
        }
    }
}

/// A candidate sentence submitted during a round's open window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Unique submission identifier
    pub id: SubmissionId,

    /// Round this submission belongs to
    pub round_id: RoundId,

    /// Owning story, denormalized for query efficiency
    pub story_id: StoryId,

    /// The candidate sentence (trimmed)
    pub content: String,

    /// Submitting author
    pub author_id: UserId,

    /// Display name resolved at submission time
    pub author_name: String,

    /// Ballot count, maintained atomically with vote inserts
    pub vote_count: u32,

    /// Set when the owning round has been settled
    pub processed: bool,

    /// Creation timestamp; tie-break key for winner selection
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Create a new submission with zero votes
    pub fn new(
        round_id: RoundId,
        story_id: StoryId,
        author_id: UserId,
        author_name: String,
        content: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            round_id,
            story_id,
            content,
            author_id,
            author_name,
            vote_count: 0,
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Override the creation timestamp (deterministic ordering in tests)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// A single ballot; never changed or deleted once cast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    /// Unique vote identifier
    pub id: String,

    /// Round scope of the ballot (one vote per voter per round)
    pub round_id: RoundId,

    /// Submission this ballot was cast for
    pub submission_id: SubmissionId,

    /// The voter
    pub voter_id: UserId,

    /// When the ballot was cast
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Cast a new ballot
    pub fn new(round_id: RoundId, submission_id: SubmissionId, voter_id: UserId) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            round_id,
            submission_id,
            voter_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_story_round_sequence() {
        let mut story = Story::new("Once.".to_string());
        assert!(story.active);
        assert!(story.current_round_id().is_none());

        story.push_round("r1".to_string());
        story.push_round("r2".to_string());
        assert_eq!(story.current_round_id(), Some(&"r2".to_string()));
    }

    #[test]
    fn test_round_window() {
        let now = Utc::now();
        let round = Round::new("s1".to_string(), 0, now + Duration::minutes(5));
        assert!(round.is_open(now));
        assert!(!round.is_claimable(now));
        assert!(round.is_claimable(now + Duration::minutes(6)));
    }

    #[test]
    fn test_settled_round_without_outcome_is_not_claimable() {
        let now = Utc::now();
        let mut round = Round::new("s1".to_string(), 0, now - Duration::minutes(1));
        round.settled = true;
        assert!(!round.is_claimable(now));
        assert!(round.outcome.is_none());
    }

    #[test]
    fn test_submission_starts_unprocessed() {
        let sub = Submission::new(
            "r1".to_string(),
            "s1".to_string(),
            "user-1".to_string(),
            "Ada".to_string(),
            "The door opened.".to_string(),
        );
        assert_eq!(sub.vote_count, 0);
        assert!(!sub.processed);
    }
}
