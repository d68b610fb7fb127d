//! Composition-session API endpoints.
//!
//! The HTTP layer is the hosting runtime for the composer: it delivers user
//! events one at a time and reports back the derived render state. A session's
//! lock is held for the duration of each call, so events apply strictly in the
//! order they arrive.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{error, success, ApiResult};
use crate::composer::{ComposerEvent, ComposerSession, ComposerState};
use crate::errors::AppError;
use crate::models::{LocationFix, TeamOption, TrashDrop, UserContext};
use crate::AppState;

/// Request body for opening a composition session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user: UserContext,
    /// The latest geolocation fix, if the client already has one.
    #[serde(default)]
    pub location: Option<LocationFix>,
}

/// A session as reported to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub team_options: Vec<TeamOption>,
    pub state: ComposerState,
}

/// Response body for a successful submit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub drop: TrashDrop,
    /// The reset session, ready for the next drop.
    pub state: ComposerState,
}

/// POST /api/sessions - Open a composition session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<SessionView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.user.user_id.trim().is_empty() {
        return error(
            AppError::Validation("userId is required".to_string()),
            revision_id,
        );
    }

    let now = Utc::now();
    let session = ComposerSession::new(request.user, request.location.unwrap_or_default(), now);
    let catalog = state.catalog_snapshot().await;
    let view = SessionView {
        session_id: session.id,
        team_options: session.team_options().to_vec(),
        state: session.state(&catalog, &state.gate, now),
    };

    state
        .sessions
        .write()
        .await
        .insert(session.id, Arc::new(Mutex::new(session)));
    tracing::info!("Opened composition session {}", view.session_id);

    success(view, revision_id)
}

/// GET /api/sessions/:id - The current render state.
pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SessionView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(entry) = state.sessions.read().await.get(&id).cloned() else {
        return error(
            AppError::NotFound(format!("Session {} not found", id)),
            revision_id,
        );
    };

    let session = entry.lock().await;
    let catalog = state.catalog_snapshot().await;
    let view = SessionView {
        session_id: session.id,
        team_options: session.team_options().to_vec(),
        state: session.state(&catalog, &state.gate, Utc::now()),
    };

    success(view, revision_id)
}

/// POST /api/sessions/:id/events - Deliver one composer event.
pub async fn post_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<ComposerEvent>,
) -> ApiResult<SessionView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(entry) = state.sessions.read().await.get(&id).cloned() else {
        return error(
            AppError::NotFound(format!("Session {} not found", id)),
            revision_id,
        );
    };

    let mut session = entry.lock().await;
    let catalog = state.catalog_snapshot().await;
    let now = Utc::now();

    if let Err(e) = session.apply(event, &catalog, &state.gate, now) {
        return error(e.into(), revision_id);
    }

    let view = SessionView {
        session_id: session.id,
        team_options: session.team_options().to_vec(),
        state: session.state(&catalog, &state.gate, now),
    };

    success(view, revision_id)
}

/// POST /api/sessions/:id/submit - Finalize the draft and persist it.
pub async fn submit_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SubmitResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(entry) = state.sessions.read().await.get(&id).cloned() else {
        return error(
            AppError::NotFound(format!("Session {} not found", id)),
            revision_id,
        );
    };

    let mut session = entry.lock().await;
    let catalog = state.catalog_snapshot().await;
    let now = Utc::now();

    let record = match session.finalize(&catalog, &state.gate, now) {
        Ok(record) => record,
        Err(e) => return error(e.into(), revision_id),
    };

    match state.repo.save_drop(&record).await {
        Ok(saved) => {
            session.reset(Utc::now());
            tracing::info!(
                "Session {} recorded drop {}",
                id,
                saved.id.as_deref().unwrap_or("?")
            );

            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            let response = SubmitResponse {
                drop: saved,
                state: session.state(&catalog, &state.gate, now),
            };
            success(response, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/sessions/:id - Discard a session and its draft.
pub async fn close_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if state.sessions.write().await.remove(&id).is_none() {
        return error(
            AppError::NotFound(format!("Session {} not found", id)),
            revision_id,
        );
    }

    success((), revision_id)
}
