//! Key construction for the ordered key/value store
//!
//! Compound keys give each entity class its own prefix so range scans over
//! a sorted map stay cheap, and uniqueness invariants (one submission per
//! author per round, one vote per voter per round) fall out of key shape.

/// Prefix for story rows
pub const STORY_PREFIX: &str = "story:";

/// Prefix for round rows
pub const ROUND_PREFIX: &str = "round:";

/// Prefix for submission rows
pub const SUBMISSION_PREFIX: &str = "sub:";

/// Prefix for the author-uniqueness index
pub const SUBMISSION_AUTHOR_PREFIX: &str = "subauth:";

/// Prefix for vote rows
pub const VOTE_PREFIX: &str = "vote:";

/// Key builders for compound keys
pub mod keys {
    /// Key for a story row
    pub fn story(story_id: &str) -> String {
        format!("story:{}", story_id)
    }

    /// Key for a round row
    pub fn round(round_id: &str) -> String {
        format!("round:{}", round_id)
    }

    /// Key for a submission row, scoped under its round for range scans
    pub fn submission(round_id: &str, submission_id: &str) -> String {
        format!("sub:{}:{}", round_id, submission_id)
    }

    /// Prefix matching every submission in a round
    pub fn round_submissions(round_id: &str) -> String {
        format!("sub:{}:", round_id)
    }

    /// Index key enforcing one submission per (author, round)
    pub fn submission_author(round_id: &str, author_id: &str) -> String {
        format!("subauth:{}:{}", round_id, author_id)
    }

    /// Key enforcing one vote per (voter, round)
    pub fn vote(round_id: &str, voter_id: &str) -> String {
        format!("vote:{}:{}", round_id, voter_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        assert_eq!(keys::story("abc"), "story:abc");
        assert_eq!(keys::round("r1"), "round:r1");
        assert_eq!(keys::submission("r1", "s1"), "sub:r1:s1");
        assert_eq!(keys::submission_author("r1", "user-1"), "subauth:r1:user-1");
        assert_eq!(keys::vote("r1", "voter-1"), "vote:r1:voter-1");
    }

    #[test]
    fn test_round_prefix_scopes_submissions() {
        let key = keys::submission("r1", "s1");
        assert!(key.starts_with(&keys::round_submissions("r1")));
        assert!(!key.starts_with(&keys::round_submissions("r2")));
    }
}
