//! Settlement engine: exactly-once processing of expired rounds
//!
//! Any number of independent triggers (a periodic ticker, a manual
//! operator action, a forced round end) call the same [`settle`] entry
//! point. The conditional claim on the round's settled flag is what makes
//! that safe: exactly one caller ever proceeds past the claim, every
//! other caller gets a quiet no-op.
//!
//! State machine per round:
//!
//! ```text
//! OPEN --(deadline passes)--> CLAIMABLE --(claim wins)--> SETTLING --> SETTLED
//! ```
//!
//! `SETTLED` is terminal. A settled round with no recorded outcome is a
//! partially applied settlement and is what [`recover`] repairs.
//!
//! [`settle`]: SettlementEngine::settle
//! [`recover`]: SettlementEngine::recover

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::events::{SharedEventBus, StoryEvent};
use crate::generate::SharedGenerator;
use crate::rounds::RoundManager;
use crate::settle::rotation::{RotationDecision, RotationPolicy};
use crate::store::{
    Round, RoundOutcome, SharedStore, Story, StoreError, Submission, SubmissionId,
};

/// Error type for settlement operations
///
/// Losing the claim race and already-settled rounds are not errors; they
/// are `NoOp` outcomes.
#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    #[error("store error: {0}")]
    Store(String),

    #[error("round creation failed: {0}")]
    RoundCreation(String),
}

/// Result type for settlement operations
pub type SettleResult<T> = Result<T, SettleError>;

impl From<StoreError> for SettleError {
    fn from(e: StoreError) -> Self {
        SettleError::Store(e.to_string())
    }
}

/// Outcome of one settlement attempt
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// Nothing to settle, or another caller won the claim
    NoOp,

    /// This caller settled the round; `winner` is None for an empty round
    Settled { winner: Option<WinnerSummary> },
}

impl SettleOutcome {
    /// Whether this attempt performed the settlement
    pub fn is_settled(&self) -> bool {
        matches!(self, SettleOutcome::Settled { .. })
    }
}

/// The winning submission, as frozen at settlement time
#[derive(Debug, Clone)]
pub struct WinnerSummary {
    pub submission_id: SubmissionId,
    pub content: String,
    pub vote_count: u32,
}

/// Claims expired rounds and applies their outcome to the story
pub struct SettlementEngine {
    store: SharedStore,
    event_bus: SharedEventBus,
    manager: RoundManager,
    generator: SharedGenerator,
    rotation: RotationPolicy,
    config: EngineConfig,
}

impl SettlementEngine {
    /// Create a new settlement engine
    pub fn new(
        store: SharedStore,
        event_bus: SharedEventBus,
        manager: RoundManager,
        generator: SharedGenerator,
        config: EngineConfig,
    ) -> Self {
        let rotation = RotationPolicy::new(
            store.clone(),
            event_bus.clone(),
            generator.clone(),
            config.content_threshold,
        );
        Self {
            store,
            event_bus,
            manager,
            generator,
            rotation,
            config,
        }
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Settle the story's most recent expired, unsettled round
    ///
    /// Safe to call from any number of concurrent triggers at any cadence;
    /// the deadline is a passive comparison, not a timer owned here.
    pub async fn settle(&self, story_id: &str) -> SettleResult<SettleOutcome> {
        let story = match self.store.get_story(story_id)? {
            Some(story) if story.active => story,
            _ => {
                debug!(story_id, "no active story to settle");
                return Ok(SettleOutcome::NoOp);
            }
        };

        let now = Utc::now();
        let mut claimable = None;
        for round_id in story.round_ids.iter().rev() {
            let round = self
                .store
                .get_round(round_id)?
                .ok_or_else(|| SettleError::Store(format!("missing round row {}", round_id)))?;
            if round.is_claimable(now) {
                claimable = Some(round);
                break;
            }
        }
        let round = match claimable {
            Some(round) => round,
            None => {
                debug!(story_id, "no claimable round");
                return Ok(SettleOutcome::NoOp);
            }
        };

        // The claim: exactly one concurrent caller sees true here.
        if !self.store.claim_round(&round.id)? {
            debug!(round_id = %round.id, "lost settlement claim");
            return Ok(SettleOutcome::NoOp);
        }
        info!(round_id = %round.id, story_id, "settlement claim won");

        self.apply_claimed(story, round).await
    }

    /// Apply a claimed round: pick the winner, mutate the story, open the
    /// next round
    async fn apply_claimed(&self, story: Story, round: Round) -> SettleResult<SettleOutcome> {
        // Single consistent snapshot of the round's submissions, already in
        // winner order (votes desc, created_at asc).
        let submissions = self.store.round_submissions(&round.id)?;

        if submissions.is_empty() {
            return self.apply_empty_round(story, round).await;
        }

        let winner = submissions[0].clone();
        info!(
            round_id = %round.id,
            winner = %winner.content,
            votes = winner.vote_count,
            "winner selected"
        );

        let decision = self.rotation.apply(story.clone(), &winner.content).await?;

        self.freeze_round(&round.id, &submissions)?;
        self.record_outcome(
            &round.id,
            RoundOutcome::winner(winner.id.clone(), winner.vote_count, decision.content_len()),
        )?;

        self.event_bus.publish(StoryEvent::RoundSettled {
            round_id: round.id.clone(),
            story_id: story.id.clone(),
            winner: Some(winner.content.clone()),
            vote_count: winner.vote_count,
            timestamp: Utc::now(),
        });

        self.open_following_round(&story.id, &decision)?;

        Ok(SettleOutcome::Settled {
            winner: Some(WinnerSummary {
                submission_id: winner.id,
                content: winner.content,
                vote_count: winner.vote_count,
            }),
        })
    }

    /// A round that expired with no submissions: the story is untouched,
    /// the generator keeps it alive by seeding the next round
    async fn apply_empty_round(&self, story: Story, round: Round) -> SettleResult<SettleOutcome> {
        info!(round_id = %round.id, "round expired with no submissions");

        self.record_outcome(&round.id, RoundOutcome::empty(story.content.chars().count()))?;

        self.event_bus.publish(StoryEvent::RoundSettled {
            round_id: round.id.clone(),
            story_id: story.id.clone(),
            winner: None,
            vote_count: 0,
            timestamp: Utc::now(),
        });

        let next_round_id = self
            .manager
            .open_next_round(&story.id)
            .map_err(|e| SettleError::RoundCreation(e.to_string()))?;

        match self.generator.continuation(&story.content).await {
            Ok(text) => {
                let submission = Submission::new(
                    next_round_id.clone(),
                    story.id.clone(),
                    self.config.ai_author_id.clone(),
                    self.config.ai_author_name.clone(),
                    text,
                );
                self.store.put_submission(&submission)?;
                self.event_bus.publish(StoryEvent::SubmissionReceived {
                    submission_id: submission.id.clone(),
                    round_id: next_round_id,
                    author_name: self.config.ai_author_name.clone(),
                    timestamp: Utc::now(),
                });
                info!(submission_id = %submission.id, "generator seeded empty round");
            }
            Err(e) => {
                // Best-effort: the next round simply starts without a seed.
                warn!(round_id = %round.id, "continuation generation failed: {}", e);
            }
        }

        Ok(SettleOutcome::Settled { winner: None })
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Re-apply any settled round whose outcome was never recorded
    ///
    /// A crash between the claim and the final outcome write leaves a
    /// round with `settled == true` and `outcome == None`. Winner
    /// selection is a pure function of immutable submissions, so
    /// re-application is deterministic; comparing the story length
    /// against the round's recorded base length tells whether the append
    /// already happened, so it is never repeated. Returns the number of
    /// rounds repaired.
    pub async fn recover(&self, story_id: &str) -> SettleResult<u32> {
        let story = match self.store.get_story(story_id)? {
            Some(story) => story,
            None => return Ok(0),
        };

        let mut repaired = 0;
        for round_id in story.round_ids.clone() {
            let round = self
                .store
                .get_round(&round_id)?
                .ok_or_else(|| SettleError::Store(format!("missing round row {}", round_id)))?;
            if !round.settled || round.outcome.is_some() {
                continue;
            }

            // Reload: an earlier iteration may have mutated the story.
            let story = self
                .store
                .get_story(story_id)?
                .ok_or_else(|| SettleError::Store(format!("missing story row {}", story_id)))?;

            let submissions = self.store.round_submissions(&round.id)?;
            // Length arithmetic, not a suffix match: a winner identical to
            // the sentence the previous round appended would make any
            // suffix test lie.
            let already_applied = submissions
                .first()
                .map(|winner| {
                    story.content.chars().count()
                        == round.base_len + 1 + winner.content.chars().count()
                })
                .unwrap_or(false);

            if already_applied {
                let winner = submissions[0].clone();
                info!(round_id = %round.id, "outcome missing but winner already applied");
                self.freeze_round(&round.id, &submissions)?;
                self.record_outcome(
                    &round.id,
                    RoundOutcome::winner(
                        winner.id,
                        winner.vote_count,
                        story.content.chars().count(),
                    ),
                )?;
                if story.current_round_id() == Some(&round.id) && story.active {
                    self.manager
                        .open_next_round(&story.id)
                        .map_err(|e| SettleError::RoundCreation(e.to_string()))?;
                }
            } else {
                self.apply_claimed(story, round).await?;
            }
            repaired += 1;
        }

        if repaired > 0 {
            info!(story_id, repaired, "settlement recovery applied");
        }
        Ok(repaired)
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    /// Mark every submission in the round processed, freezing vote counts
    fn freeze_round(&self, round_id: &str, submissions: &[Submission]) -> SettleResult<()> {
        for submission in submissions {
            let mut frozen = submission.clone();
            frozen.processed = true;
            self.store.update_submission(&frozen)?;
        }
        debug!(round_id, count = submissions.len(), "submissions frozen");
        Ok(())
    }

    /// Record the applied outcome on the (already settled) round row
    fn record_outcome(&self, round_id: &str, outcome: RoundOutcome) -> SettleResult<()> {
        let mut round = self
            .store
            .get_round(round_id)?
            .ok_or_else(|| SettleError::Store(format!("missing round row {}", round_id)))?;
        round.outcome = Some(outcome);
        self.store.put_round(&round)?;
        Ok(())
    }

    /// Open the round that follows a settled one, on whichever story
    /// survived the rotation decision
    fn open_following_round(
        &self,
        story_id: &str,
        decision: &RotationDecision,
    ) -> SettleResult<()> {
        match decision {
            RotationDecision::Continued { .. } => {
                self.manager
                    .open_next_round(story_id)
                    .map_err(|e| SettleError::RoundCreation(e.to_string()))?;
            }
            RotationDecision::Rotated {
                new_story_id: Some(new_story_id),
                ..
            } => {
                self.manager
                    .open_first_round(new_story_id)
                    .map_err(|e| SettleError::RoundCreation(e.to_string()))?;
            }
            RotationDecision::Rotated {
                new_story_id: None, ..
            } => {
                warn!("no replacement story after rotation; awaiting bootstrap");
            }
        }
        Ok(())
    }
}
