//! Reference-data API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::catalog::SiteCatalog;
use crate::errors::AppError;
use crate::models::{
    CollectionSite, ReferenceData, ReplaceReferenceRequest, RevisionInfo, Town,
};
use crate::AppState;

/// GET /api/reference - The full reference set.
pub async fn get_reference(State(state): State<AppState>) -> ApiResult<ReferenceData> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_reference().await {
        Ok(reference) => success(reference, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/reference/revision - Revision info for change detection.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_revision_info().await {
        Ok(info) => success(info, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/reference - Replace the reference set (administrative import).
pub async fn replace_reference(
    State(state): State<AppState>,
    Json(request): Json<ReplaceReferenceRequest>,
) -> ApiResult<ReferenceData> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    // Validate before touching the database
    for town in &request.towns {
        if town.town_id.trim().is_empty() {
            return error(
                AppError::Validation("Town id is required".to_string()),
                revision_id,
            );
        }
    }
    for site in &request.sites {
        if site.id.trim().is_empty() {
            return error(
                AppError::Validation("Site id is required".to_string()),
                revision_id,
            );
        }
        if !request.towns.iter().any(|t| t.town_id == site.town_id) {
            return error(
                AppError::Validation(format!(
                    "Site {} references unknown town {}",
                    site.id, site.town_id
                )),
                revision_id,
            );
        }
    }

    if let Err(e) = state.repo.replace_reference(&request).await {
        return error(e, revision_id);
    }

    // Swap in the rebuilt catalog so live sessions see the new data
    let catalog = Arc::new(SiteCatalog::new(request.towns, request.sites));
    *state.catalog.write().await = catalog;
    tracing::info!("Reference data replaced");

    let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
    match state.repo.get_reference().await {
        Ok(reference) => success(reference, new_revision),
        Err(e) => error(e, new_revision),
    }
}

/// GET /api/towns - Ordered town list.
pub async fn list_towns(State(state): State<AppState>) -> ApiResult<Vec<Town>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let catalog = state.catalog_snapshot().await;
    success(catalog.towns().to_vec(), revision_id)
}

/// GET /api/sites - Ordered collection-site list.
pub async fn list_sites(State(state): State<AppState>) -> ApiResult<Vec<CollectionSite>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let catalog = state.catalog_snapshot().await;
    success(catalog.sites().to_vec(), revision_id)
}

/// GET /api/towns/:id/sites - Curated sites within one town.
pub async fn list_town_sites(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CollectionSite>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let catalog = state.catalog_snapshot().await;

    if catalog.town(&id).is_none() {
        return error(
            AppError::NotFound(format!("Town {} not found", id)),
            revision_id,
        );
    }

    let sites: Vec<CollectionSite> = catalog
        .sites_for_town(&id)
        .into_iter()
        .cloned()
        .collect();
    success(sites, revision_id)
}
