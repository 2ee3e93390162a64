//! Engine configuration

use chrono::Duration;

/// Configuration shared by the round manager, settlement engine, and
/// rotation policy
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed duration of every voting round, in seconds
    pub round_duration_secs: i64,

    /// Story content length at which the story is retired
    pub content_threshold: usize,

    /// Maximum submission length in characters, after trimming
    pub max_submission_chars: usize,

    /// Generation endpoint (OpenAI-compatible chat completions)
    pub generator_url: String,

    /// Model name sent to the generation endpoint
    pub generator_model: String,

    /// Sampling temperature for generation
    pub temperature: f32,

    /// Requested sentence length range for generated text, in characters
    pub gen_min_chars: usize,
    pub gen_max_chars: usize,

    /// Author identity attached to generator-seeded submissions
    pub ai_author_id: String,
    pub ai_author_name: String,
}

impl EngineConfig {
    /// Round duration as a chrono Duration
    pub fn round_duration(&self) -> Duration {
        Duration::seconds(self.round_duration_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 3600,
            content_threshold: 1000,
            max_submission_chars: 50,
            generator_url: std::env::var("ROUNDS_GENERATOR_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v1/chat/completions".to_string()),
            generator_model: std::env::var("ROUNDS_GENERATOR_MODEL")
                .unwrap_or_else(|_| "google/gemini-flash-1.5".to_string()),
            temperature: 0.9,
            gen_min_chars: 25,
            gen_max_chars: 45,
            ai_author_id: "ai-generator".to_string(),
            ai_author_name: "Storyteller".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.content_threshold, 1000);
        assert_eq!(config.max_submission_chars, 50);
        assert_eq!(config.round_duration(), Duration::hours(1));
    }
}
