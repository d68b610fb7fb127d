//! Reference-data aggregate exchanged with clients and admin tooling.

use serde::{Deserialize, Serialize};

use super::{CollectionSite, Town};

/// The full reference set: towns and collection sites in configured order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    pub revision_id: i64,
    pub generated_at: String,
    pub towns: Vec<Town>,
    pub sites: Vec<CollectionSite>,
}

/// Request body for replacing the reference set (administrative import).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceReferenceRequest {
    pub towns: Vec<Town>,
    #[serde(default)]
    pub sites: Vec<CollectionSite>,
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}
