//! Recorded-drop API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{TrashDrop, UpdateDropRequest};
use crate::AppState;

/// Drop list query parameters.
#[derive(Debug, Deserialize)]
pub struct DropsQuery {
    /// Filter to drops that are (not) awaiting collection.
    #[serde(default)]
    pub active: Option<bool>,
}

/// GET /api/drops - List recorded drops.
pub async fn list_drops(
    State(state): State<AppState>,
    Query(params): Query<DropsQuery>,
) -> ApiResult<Vec<TrashDrop>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_drops(params.active).await {
        Ok(drops) => success(drops, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/drops/:id - Get a single drop.
pub async fn get_drop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TrashDrop> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_drop(&id).await {
        Ok(Some(drop)) => success(drop, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Drop {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/drops/:id - Patch a drop (e.g. mark it collected).
pub async fn update_drop(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDropRequest>,
) -> ApiResult<TrashDrop> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.bag_count == Some(0) {
        return error(
            AppError::Validation("bagCount must be at least 1".to_string()),
            revision_id,
        );
    }

    match state.repo.update_drop(&id, &request).await {
        Ok(drop) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(drop, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/drops/:id - Delete a drop.
pub async fn delete_drop(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_drop(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
