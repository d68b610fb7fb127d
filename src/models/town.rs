//! Town reference data matching the client's townData shape.

use serde::{Deserialize, Serialize};

use super::TownBounds;

/// A town participating in the annual cleanup event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Town {
    pub town_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    /// When false, drops in this town must be routed to a collection site.
    pub allows_roadside: bool,
    pub bounds: TownBounds,
}
