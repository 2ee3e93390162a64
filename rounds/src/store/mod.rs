//! Store adapter for round and story state
//!
//! The engine is written against the [`StoryStore`] trait: a transactional
//! key/row store offering conditional updates (the `claim_round` CAS) and
//! ordered range queries. [`MemoryStore`] is the in-process adapter and
//! test double; a durable backend implements the same trait.

pub mod memory;
pub mod schema;
pub mod types;

pub use memory::MemoryStore;
pub use types::{
    Round, RoundId, RoundOutcome, Story, StoryId, Submission, SubmissionId, UserId, Vote,
};

use std::sync::Arc;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a store adapter
pub type SharedStore = Arc<dyn StoryStore>;

/// Abstract transactional store for stories, rounds, submissions, and votes
///
/// Every method is a single bounded operation. The two concurrency-critical
/// entry points are `claim_round` (compare-and-swap on the settled flag; at
/// most one caller ever receives `true` per round) and
/// `insert_vote_and_count` (ballot insert and counter increment applied as
/// one atomic step, so concurrent voters never lose updates).
pub trait StoryStore: Send + Sync {
    /// Insert or replace a story row
    fn put_story(&self, story: &Story) -> StoreResult<()>;

    /// Get a story by id
    fn get_story(&self, story_id: &str) -> StoreResult<Option<Story>>;

    /// Get the active story, most recently updated first if several exist
    fn active_story(&self) -> StoreResult<Option<Story>>;

    /// Insert or replace a round row
    fn put_round(&self, round: &Round) -> StoreResult<()>;

    /// Get a round by id
    fn get_round(&self, round_id: &str) -> StoreResult<Option<Round>>;

    /// Conditionally flip the round's settled flag from false to true
    ///
    /// Returns `true` only for the single caller whose claim succeeded;
    /// `false` means another caller already holds the claim. A missing
    /// round is `NotFound`.
    fn claim_round(&self, round_id: &str) -> StoreResult<bool>;

    /// Conditionally clamp the round's deadline to now
    ///
    /// Applies only while the round is open and unclaimed; the settled
    /// flag is never written from here. Returns whether the deadline
    /// changed. A missing round is `NotFound`.
    fn clamp_end_time(&self, round_id: &str) -> StoreResult<bool>;

    /// Insert a submission; `Conflict` if the author already has one in
    /// the round
    fn put_submission(&self, submission: &Submission) -> StoreResult<()>;

    /// Replace an existing submission row (vote freeze, processed flag)
    fn update_submission(&self, submission: &Submission) -> StoreResult<()>;

    /// Get a submission by round and id
    fn get_submission(&self, round_id: &str, submission_id: &str)
        -> StoreResult<Option<Submission>>;

    /// Get the author's submission in a round, if any
    fn submission_by_author(
        &self,
        round_id: &str,
        author_id: &str,
    ) -> StoreResult<Option<Submission>>;

    /// All submissions in a round, ordered by vote count descending then
    /// creation time ascending (winner selection order)
    fn round_submissions(&self, round_id: &str) -> StoreResult<Vec<Submission>>;

    /// Get the voter's ballot in a round, if any
    fn vote_by_voter(&self, round_id: &str, voter_id: &str) -> StoreResult<Option<Vote>>;

    /// Atomically insert a ballot and increment the target submission's
    /// vote count; returns the new count
    ///
    /// `Conflict` if the voter already has a ballot in the round;
    /// `NotFound` if the submission does not exist in the round.
    fn insert_vote_and_count(&self, vote: &Vote) -> StoreResult<u32>;
}
