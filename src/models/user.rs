//! Current-user context supplied by the client when a session opens.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Snapshot of the reporting user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub email: String,
    /// Team memberships keyed by team id.
    #[serde(default)]
    pub teams: BTreeMap<String, TeamMembership>,
}

/// One entry of the user's team mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMembership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A team the user may attribute a drop to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamOption {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Immutable reporter snapshot stamped on each drop at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBy {
    pub user_id: String,
    pub email: String,
}

impl UserContext {
    /// Available team affiliations, in stable (id) order.
    pub fn team_options(&self) -> Vec<TeamOption> {
        self.teams
            .iter()
            .map(|(id, membership)| TeamOption {
                id: id.clone(),
                name: membership.name.clone(),
            })
            .collect()
    }

    pub fn created_by(&self) -> CreatedBy {
        CreatedBy {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
        }
    }
}
