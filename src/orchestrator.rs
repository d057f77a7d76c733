//! Drives a generation request from `pending` to a terminal state.
//!
//! Once a record exists, every failure of a step, including a store write that
//! fails mid-pipeline, is recorded as a `failed` record instead of being returned
//! as an error. After creation, only a failure of that final `failed` write
//! reaches the caller as `Err`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn, error};

use crate::{
    error::{GenerationError, ServiceError, ValidationError},
    expander::PromptExpander,
    generator::ImageGenerator,
    models::{GenerationRequest, NewRequest, RequestPatch, RequestStatus, StatusUpdate, MAX_IDEA_CHARS},
    store::RequestStore,
};

/// Result of one pipeline step: the patch to persist, or why the request gave up.
#[derive(Debug)]
enum StepOutcome {
    Advance(RequestPatch),
    Fail { step: &'static str, reason: String },
}

pub struct RequestOrchestrator {
    store: Arc<dyn RequestStore>,
    expander: PromptExpander,
    generator: Arc<dyn ImageGenerator>,
}

impl RequestOrchestrator {
    pub fn new(store: Arc<dyn RequestStore>, expander: PromptExpander, generator: Arc<dyn ImageGenerator>) -> Self {
        Self { store, expander, generator }
    }

    /// Creates a request and runs it to completion or failure.
    pub async fn process(&self, user_idea: &str) -> Result<GenerationRequest, ServiceError> {
        let record = self.submit(user_idea).await?;
        self.drive(record).await
    }

    /// Persists a `pending` request without running it.
    pub async fn submit(&self, user_idea: &str) -> Result<GenerationRequest, ServiceError> {
        let len = user_idea.chars().count();
        if len == 0 {
            return Err(ValidationError::Empty.into());
        }
        if len > MAX_IDEA_CHARS {
            return Err(ValidationError::TooLong { max: MAX_IDEA_CHARS }.into());
        }
        let record = self.store.create(NewRequest::pending(user_idea)).await?;
        info!(id = record.id, "🚀 Created generation request");
        Ok(record)
    }

    /// Runs a previously submitted `pending` request.
    pub async fn run(&self, id: i64) -> Result<GenerationRequest, ServiceError> {
        let record = self.store.get_by_id(id).await?.ok_or(ServiceError::NotFound { id })?;
        if record.status != RequestStatus::Pending {
            return Err(ServiceError::InvalidTransition { from: record.status, to: RequestStatus::Processing });
        }
        self.drive(record).await
    }

    async fn drive(&self, record: GenerationRequest) -> Result<GenerationRequest, ServiceError> {
        let id = record.id;

        let processing = match self.expand_step(&record.user_idea) {
            StepOutcome::Advance(patch) => match self.store.update(id, patch).await {
                Ok(r) => r,
                Err(e) => return self.fail(id, "persist expansion", e.to_string()).await,
            },
            StepOutcome::Fail { step, reason } => return self.fail(id, step, reason).await,
        };
        info!(id, "🧠 Prompt expanded, request is processing");

        match self.generate_step(&processing.expanded_prompt).await {
            StepOutcome::Advance(patch) => match self.store.update(id, patch).await {
                Ok(done) => {
                    info!(id, "✅ Generation request completed");
                    Ok(done)
                }
                Err(e) => self.fail(id, "persist completion", e.to_string()).await,
            },
            StepOutcome::Fail { step, reason } => self.fail(id, step, reason).await,
        }
    }

    fn expand_step(&self, user_idea: &str) -> StepOutcome {
        match self.expander.expand(user_idea) {
            Ok(prompt) => StepOutcome::Advance(RequestPatch::processing(prompt)),
            Err(e) => StepOutcome::Fail { step: "expansion", reason: e.to_string() },
        }
    }

    async fn generate_step(&self, expanded_prompt: &str) -> StepOutcome {
        match self.generator.generate(expanded_prompt).await {
            Ok(url) => StepOutcome::Advance(RequestPatch::completed(url, Utc::now())),
            Err(e) => StepOutcome::Fail { step: "generation", reason: e.to_string() },
        }
    }

    /// Single attempt at the terminal `failed` write; only its own failure reaches the caller.
    async fn fail(&self, id: i64, step: &str, reason: String) -> Result<GenerationRequest, ServiceError> {
        error!(id, step, "❌ Generation request failed: {}", reason);
        Ok(self.store.update(id, RequestPatch::failed(Utc::now())).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<GenerationRequest>, ServiceError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<GenerationRequest>, ServiceError> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Manual override. The merged record must still satisfy the request invariants,
    /// and terminal records are never reopened.
    // TODO: refuse overrides while `drive` holds the same id once the store tracks in-flight runs.
    pub async fn set_status(&self, id: i64, update: StatusUpdate) -> Result<GenerationRequest, ServiceError> {
        let current = self.store.get_by_id(id).await?.ok_or(ServiceError::NotFound { id })?;
        let target = update.status();
        if !current.status.can_move_to(target) {
            warn!(id, "⚠️ Rejected override {} -> {}", current.status, target);
            return Err(ServiceError::InvalidTransition { from: current.status, to: target });
        }

        let patch = update.to_patch(&current, Utc::now());
        let mut merged = current;
        patch.apply(&mut merged);
        merged.check_invariants()?;

        let updated = self.store.update(id, patch).await?;
        info!(id, status = %updated.status, "✏️ Status overridden");
        Ok(updated)
    }

    pub fn expand_idea(&self, user_idea: &str) -> Result<String, ValidationError> {
        self.expander.expand(user_idea)
    }

    pub async fn generate_image(&self, expanded_prompt: &str) -> Result<String, GenerationError> {
        self.generator.generate(expanded_prompt).await
    }
}
