/// Workflow management REST API endpoints
///
/// CRUD for the caller's workflows plus run enqueueing and history. Every
/// handler acts as the user named by the token's claims; another user's
/// workflow answers 404 exactly like a missing one.

use crate::api::{ApiError, AppState};
use crate::auth::Claims;
use crate::workflow::types::{RunLog, Workflow, WorkflowRun};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use serde::Deserialize;

/// Request body for workflow creation
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    #[serde(default)]
    pub name: String,
}

/// Request body for workflow update
#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_enabled: bool,
}

/// Request body for run enqueueing; the whole body is optional
#[derive(Debug, Default, Deserialize)]
pub struct EnqueueRunRequest {
    #[serde(default)]
    pub trigger_type: String,
}

/// Create workflow management routes
///
/// All endpoints expect [`Claims`] in the request extensions, so the router
/// must be mounted behind the auth middleware.
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", get(list_workflows).post(create_workflow))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/runs", get(list_runs).post(enqueue_run))
        .route("/api/workflows/{id}/runs/{run_id}/logs", get(list_run_logs))
}

fn require_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    Ok(())
}

/// POST /api/workflows
/// Body: { "name": "..." }
async fn create_workflow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateWorkflowRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    require_name(&req.name)?;

    let workflow = state
        .workflows
        .create_workflow(state.deadline(), &claims.sub, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/workflows
async fn list_workflows(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let workflows = state.workflows.list_workflows(state.deadline(), &claims.sub).await?;
    Ok(Json(workflows))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.workflows.get_workflow(state.deadline(), &claims.sub, &id).await?;
    Ok(Json(workflow))
}

/// PUT /api/workflows/{id}
/// Body: { "name": "...", "is_enabled": true }
async fn update_workflow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateWorkflowRequest>, JsonRejection>,
) -> Result<Json<Workflow>, ApiError> {
    let Json(req) = payload?;
    require_name(&req.name)?;

    let workflow = state
        .workflows
        .update_workflow(state.deadline(), &claims.sub, &id, &req.name, req.is_enabled)
        .await?;
    Ok(Json(workflow))
}

/// DELETE /api/workflows/{id}
async fn delete_workflow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.workflows.delete_workflow(state.deadline(), &claims.sub, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/workflows/{id}/runs
/// Body (optional): { "trigger_type": "manual" }
///
/// An absent or unparseable body enqueues a manual run.
async fn enqueue_run(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    payload: Result<Json<EnqueueRunRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = payload.map(|Json(req)| req).unwrap_or_default();

    let run = state
        .workflows
        .enqueue_run(state.deadline(), &claims.sub, &id, &req.trigger_type)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// GET /api/workflows/{id}/runs
async fn list_runs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowRun>>, ApiError> {
    let runs = state.workflows.list_runs(state.deadline(), &claims.sub, &id).await?;
    Ok(Json(runs))
}

/// GET /api/workflows/{id}/runs/{run_id}/logs
async fn list_run_logs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, run_id)): Path<(String, String)>,
) -> Result<Json<Vec<RunLog>>, ApiError> {
    let logs = state
        .workflows
        .list_run_logs(state.deadline(), &claims.sub, &id, &run_id)
        .await?;
    Ok(Json(logs))
}
