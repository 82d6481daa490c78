//! REST endpoints for onboarding sessions, profiles, and feature flags.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DatabaseError, OnboardingError};
use crate::store::{FlagStore, ProfileStore};

use super::controller::{OnboardingController, OnboardingDeps, StepOutcome};
use super::model::{DraftField, IdentityMetadata, NewProfile, Role};
use super::resume::ResumeFile;
use super::sessions::SessionRegistry;
use super::state::StepAction;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub deps: OnboardingDeps,
    pub flags: Arc<dyn FlagStore>,
    pub sessions: Arc<SessionRegistry>,
}

impl OnboardingRouteState {
    pub fn new(
        deps: OnboardingDeps,
        flags: Arc<dyn FlagStore>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            deps,
            flags,
            sessions,
        }
    }

    fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.deps.store
    }

    async fn session(&self, id: &str) -> Result<(Uuid, Arc<OnboardingController>), Response> {
        let session_id = Uuid::parse_str(id).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid session ID"})),
            )
                .into_response()
        })?;
        match self.sessions.get(&session_id).await {
            Some(flow) => Ok((session_id, flow)),
            None => Err((
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Onboarding session not found"})),
            )
                .into_response()),
        }
    }
}

/// Map a flow error to a response. The body carries the inline message and
/// whether retrying the same request makes sense.
fn onboarding_error(err: &OnboardingError) -> Response {
    let status = match err {
        OnboardingError::Validation(_) | OnboardingError::RejectedFile(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OnboardingError::InvalidAction { .. }
        | OnboardingError::UploadNotAvailable { .. }
        | OnboardingError::NotTerminal { .. }
        | OnboardingError::CompletionInFlight
        | OnboardingError::AlreadyCompleted { .. }
        | OnboardingError::RoleMismatch { .. } => StatusCode::CONFLICT,
        OnboardingError::Finished => StatusCode::GONE,
        OnboardingError::Persistence(_) | OnboardingError::Lookup(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (
        status,
        Json(serde_json::json!({
            "error": err.user_message(),
            "detail": err.to_string(),
            "retryable": err.is_retryable(),
        })),
    )
        .into_response()
}

fn database_error(err: &DatabaseError) -> Response {
    let status = match err {
        DatabaseError::Constraint(_) => StatusCode::CONFLICT,
        DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "recruit-onboard"
    }))
}

// ── Sessions ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StartRequest {
    user_id: String,
    role: Role,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    company: Option<String>,
}

/// POST /api/onboarding/sessions
///
/// A user with a live session gets that session back (200) instead of a
/// second one.
async fn start_session(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<StartRequest>,
) -> Response {
    let existing = state.sessions.find_by_user(&body.user_id).await;
    let (session_id, flow, created) = match existing {
        Some((session_id, flow)) => {
            if flow.role() != body.role {
                return onboarding_error(&OnboardingError::RoleMismatch {
                    user_id: body.user_id,
                    stored: flow.role(),
                    requested: body.role,
                });
            }
            (session_id, flow, false)
        }
        None => {
            let identity = IdentityMetadata {
                name: body.name,
                company: body.company,
            };
            let flow = match OnboardingController::start(
                body.user_id,
                body.role,
                &identity,
                state.deps.clone(),
            )
            .await
            {
                Ok(flow) => Arc::new(flow),
                Err(e) => return onboarding_error(&e),
            };
            let registered = state.sessions.insert(flow).await;
            (registered.session_id, registered.flow, registered.created)
        }
    };

    let view = match flow.view().await {
        Ok(view) => view,
        Err(e) => return onboarding_error(&e),
    };
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(serde_json::json!({"session_id": session_id, "view": view})),
    )
        .into_response()
}

/// GET /api/onboarding/sessions/{id}
async fn get_session(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    let (_, flow) = match state.session(&id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match flow.view().await {
        Ok(view) => Json(view).into_response(),
        Err(e) => onboarding_error(&e),
    }
}

/// Partial draft update; absent fields are left alone.
#[derive(Deserialize)]
struct DraftPatch {
    name: Option<String>,
    phone: Option<String>,
    location: Option<String>,
    bio: Option<String>,
    company: Option<String>,
    industry: Option<String>,
}

impl DraftPatch {
    fn into_fields(self) -> Vec<(DraftField, String)> {
        [
            (DraftField::Name, self.name),
            (DraftField::Phone, self.phone),
            (DraftField::Location, self.location),
            (DraftField::Bio, self.bio),
            (DraftField::Company, self.company),
            (DraftField::Industry, self.industry),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }
}

/// PATCH /api/onboarding/sessions/{id}/draft
async fn patch_draft(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<DraftPatch>,
) -> Response {
    let (_, flow) = match state.session(&id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    let mut view = match flow.view().await {
        Ok(view) => view,
        Err(e) => return onboarding_error(&e),
    };
    for (field, value) in body.into_fields() {
        view = match flow.set_field(field, value).await {
            Ok(view) => view,
            Err(e) => return onboarding_error(&e),
        };
    }
    Json(view).into_response()
}

/// POST /api/onboarding/sessions/{id}/resume
async fn submit_resume(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(file): Json<ResumeFile>,
) -> Response {
    let (_, flow) = match state.session(&id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match flow.submit_resume(file).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => onboarding_error(&e),
    }
}

#[derive(Deserialize)]
struct ActionRequest {
    action: StepAction,
}

/// POST /api/onboarding/sessions/{id}/actions
async fn apply_action(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> Response {
    let (session_id, flow) = match state.session(&id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match flow.advance(body.action).await {
        Ok(outcome) => {
            if matches!(outcome, StepOutcome::Completed(_)) {
                state.sessions.remove(&session_id).await;
            }
            Json(outcome).into_response()
        }
        Err(e) => {
            if e.is_retryable() {
                warn!(session_id = %session_id, error = %e, "Onboarding action failed");
            }
            if matches!(
                e,
                OnboardingError::AlreadyCompleted { .. } | OnboardingError::Finished
            ) {
                state.sessions.remove(&session_id).await;
            }
            onboarding_error(&e)
        }
    }
}

/// DELETE /api/onboarding/sessions/{id}
async fn abandon_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let (session_id, flow) = match state.session(&id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    flow.abandon().await;
    state.sessions.remove(&session_id).await;
    Json(serde_json::json!({"status": "abandoned"})).into_response()
}

// ── Profiles ────────────────────────────────────────────────────────────

/// POST /api/profiles
///
/// Creates the not-yet-onboarded profile at sign-up.
async fn create_profile(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<NewProfile>,
) -> Response {
    match state.profiles().create_profile(&body).await {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(e) => database_error(&e),
    }
}

/// GET /api/profiles/{user_id}
async fn get_profile(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.profiles().get_profile(&user_id).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No profile exists yet"})),
        )
            .into_response(),
        Err(e) => database_error(&e),
    }
}

/// POST /api/profiles/{user_id}/reset-onboarding
async fn reset_onboarding(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.profiles().reset_onboarding(&user_id).await {
        Ok(true) => Json(serde_json::json!({"status": "reset"})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No profile exists yet"})),
        )
            .into_response(),
        Err(e) => database_error(&e),
    }
}

// ── Flags ───────────────────────────────────────────────────────────────

/// GET /api/flags/{user_id}/{key}
async fn get_flag(
    State(state): State<OnboardingRouteState>,
    Path((user_id, key)): Path<(String, String)>,
) -> Response {
    match state.flags.get_flag(&user_id, &key).await {
        Ok(value) => Json(serde_json::json!({"key": key, "value": value})).into_response(),
        Err(e) => database_error(&e),
    }
}

#[derive(Deserialize)]
struct FlagRequest {
    value: bool,
}

/// PUT /api/flags/{user_id}/{key}
async fn put_flag(
    State(state): State<OnboardingRouteState>,
    Path((user_id, key)): Path<(String, String)>,
    Json(body): Json<FlagRequest>,
) -> Response {
    match state.flags.set_flag(&user_id, &key, body.value).await {
        Ok(()) => Json(serde_json::json!({"key": key, "value": body.value})).into_response(),
        Err(e) => database_error(&e),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/sessions", post(start_session))
        .route(
            "/api/onboarding/sessions/{id}",
            get(get_session).delete(abandon_session),
        )
        .route("/api/onboarding/sessions/{id}/draft", patch(patch_draft))
        .route("/api/onboarding/sessions/{id}/resume", post(submit_resume))
        .route("/api/onboarding/sessions/{id}/actions", post(apply_action))
        .route("/api/profiles", post(create_profile))
        .route("/api/profiles/{user_id}", get(get_profile))
        .route(
            "/api/profiles/{user_id}/reset-onboarding",
            post(reset_onboarding),
        )
        .route("/api/flags/{user_id}/{key}", get(get_flag).put(put_flag))
        .with_state(state)
}
