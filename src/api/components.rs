/// Trigger and action endpoints
///
/// Both live under a workflow and share its tenant scope. The `config` field
/// is arbitrary JSON; its bytes are stored exactly as submitted and handed
/// back verbatim.

use crate::api::{ApiError, AppState};
use crate::auth::Claims;
use crate::workflow::types::{Action, Trigger};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, put},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Request body for trigger create/update
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(rename = "type", default)]
    pub trigger_type: String,
    #[serde(default)]
    pub config: Option<Box<RawValue>>,
}

/// Request body for action create/update
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub config: Option<Box<RawValue>>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub id: String,
    pub workflow_id: String,
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub config: Option<Box<RawValue>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub id: String,
    pub workflow_id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub position: i32,
    pub config: Option<Box<RawValue>>,
    pub created_at: DateTime<Utc>,
}

impl From<Trigger> for TriggerResponse {
    fn from(t: Trigger) -> Self {
        Self {
            config: config_value(&t.config),
            id: t.id,
            workflow_id: t.workflow_id,
            trigger_type: t.trigger_type,
            created_at: t.created_at,
        }
    }
}

impl From<Action> for ActionResponse {
    fn from(a: Action) -> Self {
        Self {
            config: config_value(&a.config),
            id: a.id,
            workflow_id: a.workflow_id,
            action_type: a.action_type,
            position: a.position,
            created_at: a.created_at,
        }
    }
}

/// Stored config bytes back to raw JSON; empty or unparseable bytes read as null
fn config_value(bytes: &[u8]) -> Option<Box<RawValue>> {
    let text = std::str::from_utf8(bytes).ok()?;
    if text.is_empty() {
        return None;
    }
    RawValue::from_string(text.to_string()).ok()
}

/// The submitted config text, byte for byte. An absent config stores nothing.
fn config_bytes(config: Option<&RawValue>) -> Vec<u8> {
    config.map(|raw| raw.get().as_bytes().to_vec()).unwrap_or_default()
}

fn require_type(kind: &str) -> Result<(), ApiError> {
    if kind.trim().is_empty() {
        return Err(ApiError::BadRequest("type is required".to_string()));
    }
    Ok(())
}

/// Create trigger and action routes; mount behind the auth middleware
pub fn create_component_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/workflows/{id}/triggers",
            get(list_triggers).post(create_trigger),
        )
        .route(
            "/api/workflows/{id}/triggers/{trigger_id}",
            put(update_trigger).delete(delete_trigger),
        )
        .route(
            "/api/workflows/{id}/actions",
            get(list_actions).post(create_action),
        )
        .route(
            "/api/workflows/{id}/actions/{action_id}",
            put(update_action).delete(delete_action),
        )
}

/// POST /api/workflows/{id}/triggers
/// Body: { "type": "schedule", "config": { ... } }
async fn create_trigger(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(workflow_id): Path<String>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    require_type(&req.trigger_type)?;
    let config = config_bytes(req.config.as_deref());

    let trigger = state
        .workflows
        .create_trigger(state.deadline(), &claims.sub, &workflow_id, &req.trigger_type, &config)
        .await?;
    Ok((StatusCode::CREATED, Json(TriggerResponse::from(trigger))))
}

/// GET /api/workflows/{id}/triggers
async fn list_triggers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<TriggerResponse>>, ApiError> {
    let triggers = state
        .workflows
        .list_triggers(state.deadline(), &claims.sub, &workflow_id)
        .await?;
    Ok(Json(triggers.into_iter().map(TriggerResponse::from).collect()))
}

/// PUT /api/workflows/{id}/triggers/{trigger_id}
async fn update_trigger(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((workflow_id, trigger_id)): Path<(String, String)>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let Json(req) = payload?;
    require_type(&req.trigger_type)?;
    let config = config_bytes(req.config.as_deref());

    let trigger = state
        .workflows
        .update_trigger(
            state.deadline(),
            &claims.sub,
            &workflow_id,
            &trigger_id,
            &req.trigger_type,
            &config,
        )
        .await?;
    Ok(Json(trigger.into()))
}

/// DELETE /api/workflows/{id}/triggers/{trigger_id}
async fn delete_trigger(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((workflow_id, trigger_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .workflows
        .delete_trigger(state.deadline(), &claims.sub, &workflow_id, &trigger_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/workflows/{id}/actions
/// Body: { "type": "http", "position": 1, "config": { ... } }
async fn create_action(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(workflow_id): Path<String>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    require_type(&req.action_type)?;
    let config = config_bytes(req.config.as_deref());

    let action = state
        .workflows
        .create_action(
            state.deadline(),
            &claims.sub,
            &workflow_id,
            &req.action_type,
            req.position,
            &config,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ActionResponse::from(action))))
}

/// GET /api/workflows/{id}/actions
async fn list_actions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<ActionResponse>>, ApiError> {
    let actions = state
        .workflows
        .list_actions(state.deadline(), &claims.sub, &workflow_id)
        .await?;
    Ok(Json(actions.into_iter().map(ActionResponse::from).collect()))
}

/// PUT /api/workflows/{id}/actions/{action_id}
async fn update_action(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((workflow_id, action_id)): Path<(String, String)>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let Json(req) = payload?;
    require_type(&req.action_type)?;
    let config = config_bytes(req.config.as_deref());

    let action = state
        .workflows
        .update_action(
            state.deadline(),
            &claims.sub,
            &workflow_id,
            &action_id,
            &req.action_type,
            req.position,
            &config,
        )
        .await?;
    Ok(Json(action.into()))
}

/// DELETE /api/workflows/{id}/actions/{action_id}
async fn delete_action(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((workflow_id, action_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .workflows
        .delete_action(state.deadline(), &claims.sub, &workflow_id, &action_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_bytes_are_kept_verbatim() {
        let config = r#"{"zeta":1, "alpha":12345678901234567890123,"nested":{"b":[1.50,2]}}"#;
        let body = format!(r#"{{"type":"http","config":{config}}}"#);

        let req: TriggerRequest = serde_json::from_str(&body).unwrap();
        let stored = config_bytes(req.config.as_deref());
        assert_eq!(stored, config.as_bytes());

        let returned = config_value(&stored).unwrap();
        assert_eq!(returned.get(), config);
    }

    #[test]
    fn response_embeds_stored_config_unchanged() {
        let config = r#"{"zeta":1,"alpha":12345678901234567890123}"#;
        let trigger = Trigger {
            id: "t1".to_string(),
            workflow_id: "wf".to_string(),
            trigger_type: "webhook".to_string(),
            config: config.as_bytes().to_vec(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&TriggerResponse::from(trigger)).unwrap();
        assert!(json.contains(&format!(r#""config":{config}"#)), "got {json}");
    }

    #[test]
    fn empty_or_garbage_config_reads_as_null() {
        assert!(config_value(b"").is_none());
        assert!(config_value(b"\xff\xfe").is_none());
        assert!(config_value(b"{not json").is_none());
    }

    #[test]
    fn invalid_config_json_is_rejected() {
        assert!(serde_json::from_str::<TriggerRequest>(r#"{"type":"http","config":{"a":}}"#).is_err());
    }

    #[test]
    fn action_request_defaults() {
        let req: ActionRequest = serde_json::from_str(r#"{"type": "http"}"#).unwrap();
        assert_eq!(req.action_type, "http");
        assert_eq!(req.position, 0);
        assert!(req.config.is_none());
        assert!(config_bytes(req.config.as_deref()).is_empty());
    }
}
