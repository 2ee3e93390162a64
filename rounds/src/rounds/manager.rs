//! Round manager: round creation and admission control
//!
//! Admits submissions and votes against the current round of a story and
//! owns round creation. Admission never triggers settlement; the two are
//! deliberately decoupled so `submit` and `vote` block only on the store.

use chrono::Utc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::events::{SharedEventBus, StoryEvent};
use crate::identity::{SharedIdentity, DEFAULT_DISPLAY_NAME};
use crate::store::{
    Round, RoundId, SharedStore, StoreError, Submission, SubmissionId, Vote,
};

/// Error type for admission and round-creation operations
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("submission is empty after trimming")]
    EmptyContent,

    #[error("submission is {len} characters, maximum is {max}")]
    ContentTooLong { len: usize, max: usize },

    #[error("round is closed")]
    RoundClosed,

    #[error("author already submitted in this round")]
    DuplicateSubmission,

    #[error("voter already voted in this round")]
    DuplicateVote,

    #[error("submission not found: {0}")]
    SubmissionNotFound(String),

    #[error("round not found: {0}")]
    RoundNotFound(String),

    #[error("story not found: {0}")]
    StoryNotFound(String),

    #[error("story already has a round")]
    RoundAlreadyExists,

    #[error("store error: {0}")]
    Store(String),
}

/// Result type for admission operations
pub type AdmissionResult<T> = Result<T, AdmissionError>;

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        AdmissionError::Store(e.to_string())
    }
}

/// Admission control and round creation for one shared store
#[derive(Clone)]
pub struct RoundManager {
    store: SharedStore,
    event_bus: SharedEventBus,
    identity: SharedIdentity,
    config: EngineConfig,
}

impl RoundManager {
    /// Create a new round manager
    pub fn new(
        store: SharedStore,
        event_bus: SharedEventBus,
        identity: SharedIdentity,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            event_bus,
            identity,
            config,
        }
    }

    // =========================================================================
    // Round creation
    // =========================================================================

    /// Open the very first round on a story
    ///
    /// Fails with `RoundAlreadyExists` if the story already has rounds.
    pub fn open_first_round(&self, story_id: &str) -> AdmissionResult<RoundId> {
        let story = self
            .store
            .get_story(story_id)?
            .ok_or_else(|| AdmissionError::StoryNotFound(story_id.to_string()))?;

        if !story.round_ids.is_empty() {
            return Err(AdmissionError::RoundAlreadyExists);
        }

        self.open_round(story)
    }

    /// Open the next round on a story, superseding the current one
    ///
    /// Called from settlement after a round has been applied; older rounds
    /// are implicitly closed once superseded.
    pub fn open_next_round(&self, story_id: &str) -> AdmissionResult<RoundId> {
        let story = self
            .store
            .get_story(story_id)?
            .ok_or_else(|| AdmissionError::StoryNotFound(story_id.to_string()))?;
        self.open_round(story)
    }

    fn open_round(&self, mut story: crate::store::Story) -> AdmissionResult<RoundId> {
        let end_time = Utc::now() + self.config.round_duration();
        let round = Round::new(story.id.clone(), story.content.chars().count(), end_time);

        self.store.put_round(&round)?;
        story.push_round(round.id.clone());
        self.store.put_story(&story)?;

        self.event_bus.publish(StoryEvent::RoundOpened {
            round_id: round.id.clone(),
            story_id: story.id.clone(),
            end_time,
            timestamp: Utc::now(),
        });

        info!(round_id = %round.id, story_id = %story.id, %end_time, "round opened");
        Ok(round.id)
    }

    /// Get the current round of a story (the most recently opened one)
    pub fn current_round(&self, story_id: &str) -> AdmissionResult<Round> {
        let story = self
            .store
            .get_story(story_id)?
            .ok_or_else(|| AdmissionError::StoryNotFound(story_id.to_string()))?;
        let round_id = story
            .current_round_id()
            .ok_or_else(|| AdmissionError::RoundNotFound(format!("no rounds on {}", story_id)))?;
        self.store
            .get_round(round_id)?
            .ok_or_else(|| AdmissionError::RoundNotFound(round_id.clone()))
    }

    /// Clamp the current round's deadline to now
    ///
    /// The round becomes immediately claimable; the caller then invokes the
    /// normal settlement entry point, which is what makes a forced end safe
    /// against every other trigger. The clamp is a conditional store
    /// operation, not a row rewrite, so a concurrent settlement claim can
    /// never be overwritten from here.
    pub fn force_end(&self, story_id: &str) -> AdmissionResult<Round> {
        let round = self.current_round(story_id)?;

        if self.store.clamp_end_time(&round.id)? {
            info!(round_id = %round.id, "round force-ended");
        } else {
            debug!(round_id = %round.id, "force end on expired or claimed round");
        }

        self.store
            .get_round(&round.id)?
            .ok_or_else(|| AdmissionError::RoundNotFound(round.id.clone()))
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Admit a candidate sentence into an open round
    pub async fn submit(
        &self,
        round_id: &str,
        author_id: &str,
        text: &str,
    ) -> AdmissionResult<SubmissionId> {
        let content = text.trim();
        if content.is_empty() {
            return Err(AdmissionError::EmptyContent);
        }
        let len = content.chars().count();
        if len > self.config.max_submission_chars {
            return Err(AdmissionError::ContentTooLong {
                len,
                max: self.config.max_submission_chars,
            });
        }

        let round = self
            .store
            .get_round(round_id)?
            .ok_or_else(|| AdmissionError::RoundNotFound(round_id.to_string()))?;
        if !round.is_open(Utc::now()) {
            return Err(AdmissionError::RoundClosed);
        }

        if self
            .store
            .submission_by_author(round_id, author_id)?
            .is_some()
        {
            return Err(AdmissionError::DuplicateSubmission);
        }

        let author_name = self
            .identity
            .display_name(author_id)
            .await
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

        let submission = Submission::new(
            round.id.clone(),
            round.story_id.clone(),
            author_id.to_string(),
            author_name.clone(),
            content.to_string(),
        );

        // The author-uniqueness key closes the check-then-insert race: a
        // concurrent duplicate loses at the store and surfaces here.
        match self.store.put_submission(&submission) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AdmissionError::DuplicateSubmission),
            Err(e) => return Err(e.into()),
        }

        self.event_bus.publish(StoryEvent::SubmissionReceived {
            submission_id: submission.id.clone(),
            round_id: round.id.clone(),
            author_name,
            timestamp: Utc::now(),
        });

        info!(submission_id = %submission.id, round_id, author_id, "submission admitted");
        Ok(submission.id)
    }

    /// Admit a ballot for a submission in an open round; returns the new
    /// vote count
    pub fn vote(
        &self,
        round_id: &str,
        voter_id: &str,
        submission_id: &str,
    ) -> AdmissionResult<u32> {
        let round = self
            .store
            .get_round(round_id)?
            .ok_or_else(|| AdmissionError::RoundNotFound(round_id.to_string()))?;
        if !round.is_open(Utc::now()) {
            return Err(AdmissionError::RoundClosed);
        }

        // Submission keys are round-scoped, so a submission from another
        // round is simply not found here.
        if self.store.get_submission(round_id, submission_id)?.is_none() {
            return Err(AdmissionError::SubmissionNotFound(submission_id.to_string()));
        }

        if self.store.vote_by_voter(round_id, voter_id)?.is_some() {
            return Err(AdmissionError::DuplicateVote);
        }

        let vote = Vote::new(
            round_id.to_string(),
            submission_id.to_string(),
            voter_id.to_string(),
        );

        // Ballot insert and counter increment happen as one atomic store
        // step; the duplicate check above is advisory, the key is binding.
        let new_count = match self.store.insert_vote_and_count(&vote) {
            Ok(count) => count,
            Err(StoreError::Conflict(_)) => return Err(AdmissionError::DuplicateVote),
            Err(StoreError::NotFound(s)) => return Err(AdmissionError::SubmissionNotFound(s)),
            Err(e) => return Err(e.into()),
        };

        self.event_bus.publish(StoryEvent::VoteCast {
            round_id: round_id.to_string(),
            submission_id: submission_id.to_string(),
            vote_count: new_count,
            timestamp: Utc::now(),
        });

        debug!(round_id, submission_id, new_count, "vote admitted");
        Ok(new_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::identity::StaticIdentity;
    use crate::store::{MemoryStore, Story};
    use chrono::Duration;

    fn test_setup() -> (RoundManager, SharedStore, String) {
        let store: SharedStore = MemoryStore::new().shared();
        let bus = EventBus::new().shared();
        let identity = StaticIdentity::new().with_name("user-1", "Ada").shared();
        let manager = RoundManager::new(store.clone(), bus, identity, EngineConfig::default());

        let story = Story::new("Once.".to_string());
        store.put_story(&story).unwrap();
        (manager, store, story.id)
    }

    #[test]
    fn test_open_first_round_once() {
        let (manager, _store, story_id) = test_setup();

        let round_id = manager.open_first_round(&story_id).unwrap();
        let current = manager.current_round(&story_id).unwrap();
        assert_eq!(current.id, round_id);

        assert!(matches!(
            manager.open_first_round(&story_id),
            Err(AdmissionError::RoundAlreadyExists)
        ));
    }

    #[test]
    fn test_current_round_tracks_latest() {
        let (manager, _store, story_id) = test_setup();

        manager.open_first_round(&story_id).unwrap();
        let second = manager.open_next_round(&story_id).unwrap();
        assert_eq!(manager.current_round(&story_id).unwrap().id, second);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let (manager, _store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        assert!(matches!(
            manager.submit(&round_id, "user-1", "   ").await,
            Err(AdmissionError::EmptyContent)
        ));

        let long = "x".repeat(51);
        assert!(matches!(
            manager.submit(&round_id, "user-1", &long).await,
            Err(AdmissionError::ContentTooLong { len: 51, max: 50 })
        ));

        // Exactly at the limit is fine.
        let edge = "y".repeat(50);
        manager.submit(&round_id, "user-1", &edge).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        manager
            .submit(&round_id, "user-1", "The door opened.")
            .await
            .unwrap();
        assert!(matches!(
            manager.submit(&round_id, "user-1", "Another try.").await,
            Err(AdmissionError::DuplicateSubmission)
        ));

        // Original submission unaffected.
        let kept = store
            .submission_by_author(&round_id, "user-1")
            .unwrap()
            .unwrap();
        assert_eq!(kept.content, "The door opened.");
        assert_eq!(kept.author_name, "Ada");
    }

    #[tokio::test]
    async fn test_unknown_author_gets_default_name() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        let id = manager
            .submit(&round_id, "stranger", "A light flickered.")
            .await
            .unwrap();
        let sub = store.get_submission(&round_id, &id).unwrap().unwrap();
        assert_eq!(sub.author_name, DEFAULT_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_submit_to_closed_round() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        let mut round = store.get_round(&round_id).unwrap().unwrap();
        round.end_time = Utc::now() - Duration::seconds(1);
        store.put_round(&round).unwrap();

        assert!(matches!(
            manager.submit(&round_id, "user-1", "Too late.").await,
            Err(AdmissionError::RoundClosed)
        ));
    }

    #[tokio::test]
    async fn test_vote_flow_and_duplicates() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        let s1 = manager
            .submit(&round_id, "user-1", "The door opened.")
            .await
            .unwrap();
        let s2 = manager
            .submit(&round_id, "user-2", "A light flickered.")
            .await
            .unwrap();

        assert_eq!(manager.vote(&round_id, "voter-1", &s1).unwrap(), 1);
        assert_eq!(manager.vote(&round_id, "voter-2", &s1).unwrap(), 2);

        // Second ballot in the same round, even for a different submission.
        assert!(matches!(
            manager.vote(&round_id, "voter-1", &s2),
            Err(AdmissionError::DuplicateVote)
        ));
        let unchanged = store.get_submission(&round_id, &s1).unwrap().unwrap();
        assert_eq!(unchanged.vote_count, 2);
    }

    #[tokio::test]
    async fn test_vote_for_foreign_submission() {
        let (manager, _store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        assert!(matches!(
            manager.vote(&round_id, "voter-1", "not-a-submission"),
            Err(AdmissionError::SubmissionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_vote_after_deadline() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();
        let s1 = manager
            .submit(&round_id, "user-1", "The door opened.")
            .await
            .unwrap();

        let mut round = store.get_round(&round_id).unwrap().unwrap();
        round.end_time = Utc::now() - Duration::seconds(1);
        store.put_round(&round).unwrap();

        assert!(matches!(
            manager.vote(&round_id, "voter-1", &s1),
            Err(AdmissionError::RoundClosed)
        ));
    }

    #[test]
    fn test_force_end_clamps_deadline() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        let before = store.get_round(&round_id).unwrap().unwrap();
        assert!(before.is_open(Utc::now()));

        let forced = manager.force_end(&story_id).unwrap();
        assert_eq!(forced.id, round_id);
        assert!(forced.is_claimable(Utc::now()));
    }

    #[test]
    fn test_force_end_cannot_revert_a_settlement_claim() {
        let (manager, store, story_id) = test_setup();
        let round_id = manager.open_first_round(&story_id).unwrap();

        // A settlement trigger wins the claim between the force-end
        // caller reading the round and applying its clamp.
        assert!(store.claim_round(&round_id).unwrap());

        let after = manager.force_end(&story_id).unwrap();
        assert!(after.settled);

        // Settled stays set in the store and no second claim succeeds.
        let stored = store.get_round(&round_id).unwrap().unwrap();
        assert!(stored.settled);
        assert!(!store.claim_round(&round_id).unwrap());
    }
}
