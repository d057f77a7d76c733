use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::atomic::{AtomicI64, Ordering}};

use crate::{error::StoreError, models::{GenerationRequest, NewRequest, RequestPatch}};

/// Record store for generation requests, keyed by id.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn create(&self, new: NewRequest) -> Result<GenerationRequest, StoreError>;
    /// Fails with `StoreError::NotFound` when `id` does not exist.
    async fn update(&self, id: i64, patch: RequestPatch) -> Result<GenerationRequest, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<GenerationRequest>, StoreError>;
    /// Most recent first.
    async fn list_all(&self) -> Result<Vec<GenerationRequest>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<i64, GenerationRequest>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn create(&self, new: NewRequest) -> Result<GenerationRequest, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = GenerationRequest {
            id,
            user_idea: new.user_idea,
            expanded_prompt: new.expanded_prompt,
            image_url: None,
            status: new.status,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.records.write().insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, patch: RequestPatch) -> Result<GenerationRequest, StoreError> {
        let mut guard = self.records.write();
        let record = guard.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<GenerationRequest>, StoreError> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<GenerationRequest>, StoreError> {
        let mut all: Vec<_> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all)
    }
}
