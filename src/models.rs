use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::ValidationError;

pub const MAX_IDEA_CHARS: usize = 500;
pub const MAX_PROMPT_CHARS: usize = 2000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::Processing => 1,
            RequestStatus::Completed | RequestStatus::Failed => 2,
        }
    }

    /// Forward-only: a request may stay where it is or advance, never return.
    pub fn can_move_to(self, next: RequestStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationRequest {
    pub id: i64,
    pub user_idea: String,
    pub expanded_prompt: String,
    pub image_url: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationRequest {
    /// Checks the status/field combinations a persisted record must satisfy.
    ///
    /// A `failed` record may carry an empty prompt when expansion itself was the failing step.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let broken = |msg: &str| Err(ValidationError::Inconsistent(format!("{} request {}", self.status, msg)));
        match self.status {
            RequestStatus::Pending | RequestStatus::Processing if self.completed_at.is_some() => broken("must not have completed_at"),
            RequestStatus::Pending | RequestStatus::Processing if self.image_url.is_some() => broken("must not have an image_url"),
            RequestStatus::Processing | RequestStatus::Completed if self.expanded_prompt.trim().is_empty() => broken("requires an expanded_prompt"),
            RequestStatus::Completed if self.image_url.is_none() => broken("requires an image_url"),
            RequestStatus::Completed | RequestStatus::Failed if self.completed_at.is_none() => broken("requires completed_at"),
            RequestStatus::Failed if self.image_url.is_some() => broken("must not have an image_url"),
            _ => Ok(()),
        }
    }
}

/// Fields supplied when a record is first persisted; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub user_idea: String,
    pub expanded_prompt: String,
    pub status: RequestStatus,
}

impl NewRequest {
    pub fn pending(user_idea: impl Into<String>) -> Self {
        Self { user_idea: user_idea.into(), expanded_prompt: String::new(), status: RequestStatus::Pending }
    }
}

/// Partial update written by the store. `None` leaves a field untouched;
/// the nullable columns use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPatch {
    pub status: Option<RequestStatus>,
    pub expanded_prompt: Option<String>,
    pub image_url: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl RequestPatch {
    pub fn processing(expanded_prompt: String) -> Self {
        Self { status: Some(RequestStatus::Processing), expanded_prompt: Some(expanded_prompt), ..Self::default() }
    }

    pub fn completed(image_url: String, at: DateTime<Utc>) -> Self {
        Self { status: Some(RequestStatus::Completed), image_url: Some(Some(image_url)), completed_at: Some(Some(at)), ..Self::default() }
    }

    pub fn failed(at: DateTime<Utc>) -> Self {
        Self { status: Some(RequestStatus::Failed), image_url: Some(None), completed_at: Some(Some(at)), ..Self::default() }
    }

    pub fn apply(&self, record: &mut GenerationRequest) {
        if let Some(status) = self.status { record.status = status; }
        if let Some(prompt) = &self.expanded_prompt { record.expanded_prompt = prompt.clone(); }
        if let Some(url) = &self.image_url { record.image_url = url.clone(); }
        if let Some(at) = self.completed_at { record.completed_at = at; }
    }
}

/// Manual override, one variant per target status carrying only the fields that status may set.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Pending { expanded_prompt: Option<String> },
    Processing { expanded_prompt: Option<String> },
    Completed { expanded_prompt: Option<String>, image_url: Option<String>, completed_at: Option<DateTime<Utc>> },
    Failed { expanded_prompt: Option<String>, completed_at: Option<DateTime<Utc>> },
}

impl StatusUpdate {
    pub fn status(&self) -> RequestStatus {
        match self {
            StatusUpdate::Pending { .. } => RequestStatus::Pending,
            StatusUpdate::Processing { .. } => RequestStatus::Processing,
            StatusUpdate::Completed { .. } => RequestStatus::Completed,
            StatusUpdate::Failed { .. } => RequestStatus::Failed,
        }
    }

    /// Builds the store patch for `current`. Terminal targets get `now` when neither the
    /// update nor the record carries a completion time.
    pub fn to_patch(&self, current: &GenerationRequest, now: DateTime<Utc>) -> RequestPatch {
        let stamp = |at: &Option<DateTime<Utc>>| match (at, current.completed_at) {
            (Some(at), _) => Some(Some(*at)),
            (None, Some(_)) => None,
            (None, None) => Some(Some(now)),
        };
        match self {
            StatusUpdate::Pending { expanded_prompt } | StatusUpdate::Processing { expanded_prompt } => RequestPatch {
                status: Some(self.status()),
                expanded_prompt: expanded_prompt.clone(),
                ..RequestPatch::default()
            },
            StatusUpdate::Completed { expanded_prompt, image_url, completed_at } => RequestPatch {
                status: Some(RequestStatus::Completed),
                expanded_prompt: expanded_prompt.clone(),
                image_url: image_url.clone().map(Some),
                completed_at: stamp(completed_at),
            },
            StatusUpdate::Failed { expanded_prompt, completed_at } => RequestPatch {
                status: Some(RequestStatus::Failed),
                expanded_prompt: expanded_prompt.clone(),
                image_url: None,
                completed_at: stamp(completed_at),
            },
        }
    }
}

/// Flat wire form of a manual status override. Absent and `null` are distinct for the nullable fields.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StatusUpdateBody {
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub expanded_prompt: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TryFrom<StatusUpdateBody> for StatusUpdate {
    type Error = ValidationError;

    fn try_from(body: StatusUpdateBody) -> Result<Self, Self::Error> {
        let status = body.status.ok_or_else(|| ValidationError::Inconsistent("status is required".into()))?;
        let reject = |field: &str| Err(ValidationError::Inconsistent(format!("{field} cannot be set on a {status} request")));
        let expanded_prompt = body.expanded_prompt;
        match status {
            RequestStatus::Pending | RequestStatus::Processing => {
                if matches!(body.image_url, Some(Some(_))) { return reject("image_url"); }
                if matches!(body.completed_at, Some(Some(_))) { return reject("completed_at"); }
                Ok(if status == RequestStatus::Pending {
                    StatusUpdate::Pending { expanded_prompt }
                } else {
                    StatusUpdate::Processing { expanded_prompt }
                })
            }
            RequestStatus::Completed => {
                if matches!(body.image_url, Some(None)) { return reject("a null image_url"); }
                if matches!(body.completed_at, Some(None)) { return reject("a null completed_at"); }
                Ok(StatusUpdate::Completed {
                    expanded_prompt,
                    image_url: body.image_url.flatten(),
                    completed_at: body.completed_at.flatten(),
                })
            }
            RequestStatus::Failed => {
                if matches!(body.image_url, Some(Some(_))) { return reject("image_url"); }
                if matches!(body.completed_at, Some(None)) { return reject("a null completed_at"); }
                Ok(StatusUpdate::Failed { expanded_prompt, completed_at: body.completed_at.flatten() })
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateRequest {
    pub user_idea: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExpandedPrompt {
    pub expanded_prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneratedImage {
    pub image_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(status: RequestStatus) -> GenerationRequest {
        GenerationRequest {
            id: 1,
            user_idea: "a cat".into(),
            expanded_prompt: "a detailed cat".into(),
            image_url: None,
            status,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RequestStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(serde_json::from_str::<RequestStatus>("\"failed\"").unwrap(), RequestStatus::Failed);
    }

    #[test]
    fn transitions_only_move_forward() {
        assert!(RequestStatus::Pending.can_move_to(RequestStatus::Processing));
        assert!(RequestStatus::Pending.can_move_to(RequestStatus::Failed));
        assert!(RequestStatus::Processing.can_move_to(RequestStatus::Completed));
        assert!(!RequestStatus::Processing.can_move_to(RequestStatus::Pending));
        assert!(!RequestStatus::Completed.can_move_to(RequestStatus::Failed));
        assert!(!RequestStatus::Failed.can_move_to(RequestStatus::Failed));
    }

    #[test]
    fn invariants_hold_for_consistent_records() {
        assert_eq!(record(RequestStatus::Processing).check_invariants(), Ok(()));

        let mut done = record(RequestStatus::Completed);
        done.image_url = Some("https://img/1.jpg".into());
        done.completed_at = Some(Utc::now());
        assert_eq!(done.check_invariants(), Ok(()));

        let mut failed = record(RequestStatus::Failed);
        failed.expanded_prompt.clear();
        failed.completed_at = Some(Utc::now());
        assert_eq!(failed.check_invariants(), Ok(()));
    }

    #[test]
    fn invariants_reject_inconsistent_records() {
        let mut done = record(RequestStatus::Completed);
        done.completed_at = Some(Utc::now());
        assert!(done.check_invariants().is_err());

        let mut processing = record(RequestStatus::Processing);
        processing.completed_at = Some(Utc::now());
        assert!(processing.check_invariants().is_err());

        let mut failed = record(RequestStatus::Failed);
        failed.completed_at = Some(Utc::now());
        failed.image_url = Some("https://img/1.jpg".into());
        assert!(failed.check_invariants().is_err());
    }

    #[test]
    fn failed_patch_clears_image_and_stamps_completion() {
        let mut r = record(RequestStatus::Processing);
        let at = Utc::now();
        RequestPatch::failed(at).apply(&mut r);
        assert_eq!(r.status, RequestStatus::Failed);
        assert_eq!(r.image_url, None);
        assert_eq!(r.completed_at, Some(at));
        assert_eq!(r.expanded_prompt, "a detailed cat");
    }

    #[test]
    fn body_distinguishes_absent_from_null() {
        let absent: StatusUpdateBody = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert_eq!(absent.image_url, None);
        let null: StatusUpdateBody = serde_json::from_str(r#"{"status":"failed","image_url":null}"#).unwrap();
        assert_eq!(null.image_url, Some(None));
    }

    #[test]
    fn body_converts_into_per_status_update() {
        let body: StatusUpdateBody = serde_json::from_str(
            r#"{"status":"completed","image_url":"https://img/2.jpg","completed_at":"2024-01-02T03:04:05Z"}"#,
        ).unwrap();
        let update = StatusUpdate::try_from(body).unwrap();
        match update {
            StatusUpdate::Completed { image_url, completed_at, expanded_prompt } => {
                assert_eq!(image_url.as_deref(), Some("https://img/2.jpg"));
                assert!(completed_at.is_some());
                assert_eq!(expanded_prompt, None);
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn body_rejects_fields_foreign_to_the_status() {
        let failed_with_image = StatusUpdateBody {
            status: Some(RequestStatus::Failed),
            image_url: Some(Some("https://img/3.jpg".into())),
            ..Default::default()
        };
        assert!(StatusUpdate::try_from(failed_with_image).is_err());

        let pending_with_completion = StatusUpdateBody {
            status: Some(RequestStatus::Pending),
            completed_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        assert!(StatusUpdate::try_from(pending_with_completion).is_err());

        assert!(StatusUpdate::try_from(StatusUpdateBody::default()).is_err());
    }

    #[test]
    fn terminal_update_keeps_existing_completion_time() {
        let mut current = record(RequestStatus::Processing);
        let now = Utc::now();
        let patch = StatusUpdate::Failed { expanded_prompt: None, completed_at: None }.to_patch(&current, now);
        assert_eq!(patch.completed_at, Some(Some(now)));

        current.completed_at = Some(now);
        let patch = StatusUpdate::Failed { expanded_prompt: None, completed_at: None }.to_patch(&current, Utc::now());
        assert_eq!(patch.completed_at, None);
    }
}
