//! In-memory store adapter
//!
//! A single sorted map of serialized rows behind one `RwLock`. Holding the
//! write lock across a read-modify-write gives the conditional update and
//! the vote insert+increment their atomicity; everything else is a single
//! get, put, or prefix scan.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};

use super::schema::{self, keys};
use super::types::*;
use super::{StoreError, StoreResult, StoryStore};

/// Shared reference to a MemoryStore
pub type SharedMemoryStore = Arc<MemoryStore>;

/// Sorted-map store for tests and single-process deployments
pub struct MemoryStore {
    rows: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedMemoryStore {
        Arc::new(self)
    }

    // =========================================================================
    // Generic row operations
    // =========================================================================

    fn put<T: Serialize>(&self, key: String, value: &T) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        rows.insert(key, bytes);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        match rows.get(key) {
            Some(bytes) => {
                let value = serde_json::from_slice(bytes)
                    .map_err(|e| StoreError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut values = Vec::new();
        let range = rows.range::<String, _>((Bound::Included(prefix.to_string()), Bound::Unbounded));
        for (key, bytes) in range {
            if !key.starts_with(prefix) {
                break;
            }
            let value = serde_json::from_slice(bytes)
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;
            values.push(value);
        }
        Ok(values)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryStore for MemoryStore {
    fn put_story(&self, story: &Story) -> StoreResult<()> {
        self.put(keys::story(&story.id), story)
    }

    fn get_story(&self, story_id: &str) -> StoreResult<Option<Story>> {
        self.get(&keys::story(story_id))
    }

    fn active_story(&self) -> StoreResult<Option<Story>> {
        let mut stories: Vec<Story> = self
            .scan_prefix::<Story>(schema::STORY_PREFIX)?
            .into_iter()
            .filter(|s| s.active)
            .collect();
        stories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(stories.into_iter().next())
    }

    fn put_round(&self, round: &Round) -> StoreResult<()> {
        self.put(keys::round(&round.id), round)
    }

    fn get_round(&self, round_id: &str) -> StoreResult<Option<Round>> {
        self.get(&keys::round(round_id))
    }

    fn claim_round(&self, round_id: &str) -> StoreResult<bool> {
        let key = keys::round(round_id);
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;

        let bytes = rows
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("round {}", round_id)))?;
        let mut round: Round = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

        if round.settled {
            return Ok(false);
        }

        round.settled = true;
        let bytes =
            serde_json::to_vec(&round).map_err(|e| StoreError::Serialization(e.to_string()))?;
        rows.insert(key, bytes);
        Ok(true)
    }

    fn clamp_end_time(&self, round_id: &str) -> StoreResult<bool> {
        let key = keys::round(round_id);
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;

        let bytes = rows
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("round {}", round_id)))?;
        let mut round: Round = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

        // Re-read under the write lock: a claim or an earlier clamp that
        // landed first stays in effect.
        let now = Utc::now();
        if round.settled || now >= round.end_time {
            return Ok(false);
        }

        round.end_time = now;
        let bytes =
            serde_json::to_vec(&round).map_err(|e| StoreError::Serialization(e.to_string()))?;
        rows.insert(key, bytes);
        Ok(true)
    }

    fn put_submission(&self, submission: &Submission) -> StoreResult<()> {
        let index_key = keys::submission_author(&submission.round_id, &submission.author_id);
        let row_key = keys::submission(&submission.round_id, &submission.id);
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;

        if rows.contains_key(&index_key) {
            return Err(StoreError::Conflict(format!(
                "author {} already submitted in round {}",
                submission.author_id, submission.round_id
            )));
        }

        let row_bytes =
            serde_json::to_vec(submission).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let index_bytes = serde_json::to_vec(&submission.id)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        rows.insert(row_key, row_bytes);
        rows.insert(index_key, index_bytes);
        Ok(())
    }

    fn update_submission(&self, submission: &Submission) -> StoreResult<()> {
        let key = keys::submission(&submission.round_id, &submission.id);
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        if !rows.contains_key(&key) {
            return Err(StoreError::NotFound(format!("submission {}", submission.id)));
        }
        let bytes =
            serde_json::to_vec(submission).map_err(|e| StoreError::Serialization(e.to_string()))?;
        rows.insert(key, bytes);
        Ok(())
    }

    fn get_submission(
        &self,
        round_id: &str,
        submission_id: &str,
    ) -> StoreResult<Option<Submission>> {
        self.get(&keys::submission(round_id, submission_id))
    }

    fn submission_by_author(
        &self,
        round_id: &str,
        author_id: &str,
    ) -> StoreResult<Option<Submission>> {
        let submission_id: Option<SubmissionId> =
            self.get(&keys::submission_author(round_id, author_id))?;
        match submission_id {
            Some(id) => self.get_submission(round_id, &id),
            None => Ok(None),
        }
    }

    fn round_submissions(&self, round_id: &str) -> StoreResult<Vec<Submission>> {
        let mut submissions: Vec<Submission> =
            self.scan_prefix(&keys::round_submissions(round_id))?;
        // Winner selection order: highest votes first, earliest submission
        // breaks ties.
        submissions.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(submissions)
    }

    fn vote_by_voter(&self, round_id: &str, voter_id: &str) -> StoreResult<Option<Vote>> {
        self.get(&keys::vote(round_id, voter_id))
    }

    fn insert_vote_and_count(&self, vote: &Vote) -> StoreResult<u32> {
        let vote_key = keys::vote(&vote.round_id, &vote.voter_id);
        let submission_key = keys::submission(&vote.round_id, &vote.submission_id);
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;

        if rows.contains_key(&vote_key) {
            return Err(StoreError::Conflict(format!(
                "voter {} already voted in round {}",
                vote.voter_id, vote.round_id
            )));
        }

        let bytes = rows.get(&submission_key).ok_or_else(|| {
            StoreError::NotFound(format!(
                "submission {} in round {}",
                vote.submission_id, vote.round_id
            ))
        })?;
        let mut submission: Submission = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

        submission.vote_count += 1;
        let new_count = submission.vote_count;

        let submission_bytes =
            serde_json::to_vec(&submission).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let vote_bytes =
            serde_json::to_vec(vote).map_err(|e| StoreError::Serialization(e.to_string()))?;
        rows.insert(submission_key, submission_bytes);
        rows.insert(vote_key, vote_bytes);
        Ok(new_count)
    }
}
