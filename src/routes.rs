use axum::{Json, Router, extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, routing::{get, patch, post}};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};

use crate::{
    error::ServiceError,
    models::{CreateRequest, ExpandedPrompt, GeneratedImage, GenerationRequest, StatusUpdate, StatusUpdateBody},
    orchestrator::RequestOrchestrator,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RequestOrchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/requests", post(process_request).get(list_requests))
        .route("/api/requests/create", post(create_request))
        .route("/api/requests/:id", get(get_request))
        .route("/api/requests/:id/process", post(run_request))
        .route("/api/requests/:id/status", patch(update_status))
        .route("/api/expand", post(expand_prompt))
        .route("/api/generate", post(generate_image))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

pub async fn process_request(State(state): State<AppState>, Json(body): Json<CreateRequest>) -> Result<Json<GenerationRequest>, ServiceError> {
    tracing::info!("🚀 Processing idea: {}", body.user_idea);
    let record = state.orchestrator.process(&body.user_idea).await?;
    tracing::info!("🏁 Request {} finished as {}", record.id, record.status);
    Ok(Json(record))
}

// Create a pending request without running the pipeline yet
pub async fn create_request(State(state): State<AppState>, Json(body): Json<CreateRequest>) -> Result<Json<GenerationRequest>, ServiceError> {
    Ok(Json(state.orchestrator.submit(&body.user_idea).await?))
}

pub async fn run_request(Path(id): Path<i64>, State(state): State<AppState>) -> Result<Json<GenerationRequest>, ServiceError> {
    Ok(Json(state.orchestrator.run(id).await?))
}

pub async fn list_requests(State(state): State<AppState>) -> Result<Json<Vec<GenerationRequest>>, ServiceError> {
    Ok(Json(state.orchestrator.list_all().await?))
}

pub async fn get_request(Path(id): Path<i64>, State(state): State<AppState>) -> Result<Response, ServiceError> {
    match state.orchestrator.get_by_id(id).await? {
        Some(r) => Ok(Json(r).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

#[axum::debug_handler]
pub async fn update_status(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<StatusUpdateBody>
) -> Result<Json<GenerationRequest>, ServiceError> {
    let update = StatusUpdate::try_from(body)?;
    Ok(Json(state.orchestrator.set_status(id, update).await?))
}

pub async fn expand_prompt(State(state): State<AppState>, Json(body): Json<CreateRequest>) -> Result<Json<ExpandedPrompt>, ServiceError> {
    let expanded_prompt = state.orchestrator.expand_idea(&body.user_idea)?;
    Ok(Json(ExpandedPrompt { expanded_prompt }))
}

pub async fn generate_image(State(state): State<AppState>, Json(body): Json<ExpandedPrompt>) -> Result<Json<GeneratedImage>, ServiceError> {
    let image_url = state.orchestrator.generate_image(&body.expanded_prompt).await?;
    Ok(Json(GeneratedImage { image_url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expander::PromptExpander, generator::PlaceholderImageGenerator, models::RequestStatus, store::InMemoryStore};
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn app() -> Router {
        let orchestrator = RequestOrchestrator::new(
            Arc::new(InMemoryStore::new()),
            PromptExpander::new(),
            Arc::new(PlaceholderImageGenerator::new("https://img.test")),
        );
        router(AppState { orchestrator: Arc::new(orchestrator) })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(&app(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn process_returns_completed_record_in_wire_shape() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/requests", Some(json!({ "user_idea": "a cat" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["user_idea"], "a cat");
        assert!(body["id"].is_i64());
        assert!(body["image_url"].as_str().unwrap().starts_with("https://img.test/"));
        assert!(body["created_at"].is_string());
        assert!(body["completed_at"].is_string());

        let (status, fetched) = send(&app, "GET", &format!("/api/requests/{}", body["id"]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, body);
    }

    #[tokio::test]
    async fn empty_idea_is_a_bad_request() {
        let (status, body) = send(&app(), "POST", "/api/requests", Some(json!({ "user_idea": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn unknown_request_is_404() {
        let app = app();
        let (status, _) = send(&app, "GET", "/api/requests/12345", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "PATCH", "/api/requests/12345/status", Some(json!({ "status": "failed" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_then_process_then_list() {
        let app = app();
        let (_, created) = send(&app, "POST", "/api/requests/create", Some(json!({ "user_idea": "forest path" }))).await;
        assert_eq!(created["status"], "pending");
        assert_eq!(created["image_url"], serde_json::Value::Null);

        let uri = format!("/api/requests/{}/process", created["id"]);
        let (status, done) = send(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "completed");
        assert!(done["expanded_prompt"].as_str().unwrap().contains("golden hour lighting"));

        let (status, _) = send(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, all) = send(&app, "GET", "/api/requests", None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_override_validates_combinations() {
        let app = app();
        let (_, created) = send(&app, "POST", "/api/requests/create", Some(json!({ "user_idea": "a cat" }))).await;
        let uri = format!("/api/requests/{}/status", created["id"]);

        let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "status": "failed", "image_url": "https://x/y.jpg" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "PATCH", &uri, Some(json!({ "status": "failed" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
        assert!(body["completed_at"].is_string());
        let record: GenerationRequest = serde_json::from_value(body).unwrap();
        assert_eq!(record.status, RequestStatus::Failed);
    }

    #[tokio::test]
    async fn expand_and_generate_endpoints() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/expand", Some(json!({ "user_idea": "sunset over ocean" }))).await;
        assert_eq!(status, StatusCode::OK);
        let prompt = body["expanded_prompt"].as_str().unwrap().to_string();
        assert!(prompt.contains("warm, golden tones"));

        let (status, body) = send(&app, "POST", "/api/generate", Some(json!({ "expanded_prompt": prompt }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["image_url"].as_str().unwrap().ends_with(".jpg"));

        let (status, _) = send(&app, "POST", "/api/generate", Some(json!({ "expanded_prompt": "A".repeat(2001) }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
