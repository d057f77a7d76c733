use async_trait::async_trait;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use tracing::info;

use crate::{error::{GenerationError, ValidationError}, models::MAX_PROMPT_CHARS};

/// One remote image generation attempt: expanded prompt in, image reference out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Produces the image for an already validated prompt.
    async fn render(&self, prompt: &str) -> Result<String, GenerationError>;

    async fn generate(&self, expanded_prompt: &str) -> Result<String, GenerationError> {
        let prompt = validate_prompt(expanded_prompt)?;
        self.render(prompt).await
    }
}

pub fn validate_prompt(prompt: &str) -> Result<&str, ValidationError> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ValidationError::PromptTooLong { max: MAX_PROMPT_CHARS });
    }
    Ok(prompt)
}

/// Stand-in used when no Gemini key is configured. Hands out unique-looking URLs without any network I/O.
pub struct PlaceholderImageGenerator {
    base_url: String,
}

impl PlaceholderImageGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self { base_url: base_url.trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl ImageGenerator for PlaceholderImageGenerator {
    async fn render(&self, prompt: &str) -> Result<String, GenerationError> {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        let url = format!("{}/{}-{}.jpg", self.base_url, Utc::now().timestamp_millis(), suffix);
        info!("📦 Placeholder image for prompt ({} chars): {}", prompt.chars().count(), url);
        Ok(url)
    }
}
