//! Text-generation collaborator
//!
//! Produces story openings and continuations: a fresh opening when a story
//! is bootstrapped or rotated, a continuation sentence when a round closes
//! with no submissions. Best-effort only; the caller retries or defers,
//! and a failure can never corrupt round or story state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;

/// Error type for generation operations
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("http error: {0}")]
    Http(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("empty completion")]
    EmptyCompletion,

    #[error("no scripted text left")]
    Exhausted,
}

/// Result type for generation operations
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Shared reference to a story generator
pub type SharedGenerator = Arc<dyn StoryGenerator>;

/// Produces opening and continuation sentences for the story
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Produce a fresh opening sentence for a new story
    async fn opening(&self) -> GenerateResult<String>;

    /// Produce one sentence continuing the given story content
    async fn continuation(&self, content: &str) -> GenerateResult<String>;
}

/// Generator backed by an OpenAI-compatible chat completions endpoint
pub struct HttpGenerator {
    http: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    min_chars: usize,
    max_chars: usize,
}

impl HttpGenerator {
    /// Build a generator from the engine configuration
    pub fn from_config(config: &EngineConfig) -> GenerateResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| GenerateError::Http(e.to_string()))?;
        Ok(Self {
            http,
            url: config.generator_url.clone(),
            model: config.generator_model.clone(),
            temperature: config.temperature,
            min_chars: config.gen_min_chars,
            max_chars: config.gen_max_chars,
        })
    }

    /// Create a shared reference to this generator
    pub fn shared(self) -> SharedGenerator {
        Arc::new(self)
    }

    async fn complete(&self, prompt: &str) -> GenerateResult<String> {
        #[derive(Serialize)]
        struct ChatMessage {
            role: String,
            content: String,
        }

        #[derive(Serialize)]
        struct ChatRequest {
            model: String,
            messages: Vec<ChatMessage>,
            max_tokens: u32,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: Option<String>,
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: 120,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Failed(format!("HTTP {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Failed(e.to_string()))?;

        let text = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerateError::EmptyCompletion);
        }

        debug!(chars = text.chars().count(), "generation complete");
        Ok(text)
    }
}

#[async_trait]
impl StoryGenerator for HttpGenerator {
    async fn opening(&self) -> GenerateResult<String> {
        let prompt = format!(
            "Write the opening sentence of a short collaborative story.\n\
             Requirements:\n\
             1. Exactly one sentence, {} to {} characters long\n\
             2. Evocative and emotionally charged, leaving room to continue\n\
             3. End with a period\n\
             4. Return only the sentence, nothing else",
            self.min_chars, self.max_chars
        );
        self.complete(&prompt).await
    }

    async fn continuation(&self, content: &str) -> GenerateResult<String> {
        let prompt = format!(
            "Continue this collaborative story. Current content: \"{}\"\n\
             Requirements:\n\
             1. Exactly one sentence, {} to {} characters long\n\
             2. Follow naturally from the existing text and advance the story\n\
             3. Keep the established tone\n\
             4. End with a period\n\
             5. Return only the new sentence, nothing else",
            content, self.min_chars, self.max_chars
        );
        self.complete(&prompt).await
    }
}

/// Generator double that replays queued sentences (tests, offline runs)
pub struct ScriptedGenerator {
    openings: Mutex<VecDeque<String>>,
    continuations: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    /// Create an empty scripted generator; all calls fail until queued
    pub fn new() -> Self {
        Self {
            openings: Mutex::new(VecDeque::new()),
            continuations: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue an opening sentence
    pub fn with_opening(self, text: &str) -> Self {
        self.openings
            .lock()
            .expect("scripted generator lock")
            .push_back(text.to_string());
        self
    }

    /// Queue a continuation sentence
    pub fn with_continuation(self, text: &str) -> Self {
        self.continuations
            .lock()
            .expect("scripted generator lock")
            .push_back(text.to_string());
        self
    }

    /// Create a shared reference to this generator
    pub fn shared(self) -> SharedGenerator {
        Arc::new(self)
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoryGenerator for ScriptedGenerator {
    async fn opening(&self) -> GenerateResult<String> {
        self.openings
            .lock()
            .map_err(|_| GenerateError::Failed("lock poisoned".to_string()))?
            .pop_front()
            .ok_or(GenerateError::Exhausted)
    }

    async fn continuation(&self, _content: &str) -> GenerateResult<String> {
        self.continuations
            .lock()
            .map_err(|_| GenerateError::Failed("lock poisoned".to_string()))?
            .pop_front()
            .ok_or(GenerateError::Exhausted)
    }
}
