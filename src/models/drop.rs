//! Trash drop record and routing types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Coordinates, CreatedBy};

/// Labels from the client's fixed tag vocabulary. The draft accepts any
/// string label; these are the ones the form renders.
#[allow(dead_code)]
pub mod tag_labels {
    pub const BIO_WASTE: &str = "bio-waste";
    pub const TIRES: &str = "tires";
    pub const LARGE: &str = "large";
}

/// Where a drop is routed: a free roadside pin or a curated collection site.
///
/// Exactly one variant is ever set; the most recent assignment wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DropRouting {
    RoadsidePin { coordinates: Coordinates },
    Site { site_id: String },
}

/// A recorded trash drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashDrop {
    /// Null until first saved; assigned by the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// True for drops still awaiting collection.
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_site_id: Option<String>,
    /// Where the drop physically sits; null when routed to a site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    /// Kept in sync with `location` for older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub created: DateTime<Utc>,
    pub was_collected: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: CreatedBy,
    pub bag_count: u32,
}

/// Request body for patching a recorded drop. Updates are last-write-wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDropRequest {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub was_collected: Option<bool>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub bag_count: Option<u32>,
}
