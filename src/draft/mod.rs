//! The in-progress drop draft and its mutation operations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::models::{Coordinates, CreatedBy, DropRouting, TeamOption, TrashDrop, UserContext};

/// Lowest bag count a draft can hold.
const MIN_BAG_COUNT: u32 = 1;

/// The single in-progress drop record being composed.
///
/// All mutations are pure with respect to inputs other than the draft and
/// perform no I/O. Unrelated fields are always preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct DropDraft {
    pub team_id: Option<String>,
    pub routing: Option<DropRouting>,
    pub created: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub created_by: CreatedBy,
    pub bag_count: u32,
}

impl DropDraft {
    /// Fresh draft: unrouted, no tags, one bag, defaulted to the user's
    /// first team membership if any.
    pub fn new(user: &UserContext, team_options: &[TeamOption], now: DateTime<Utc>) -> Self {
        Self {
            team_id: team_options.first().map(|t| t.id.clone()),
            routing: None,
            created: now,
            tags: BTreeSet::new(),
            created_by: user.created_by(),
            bag_count: MIN_BAG_COUNT,
        }
    }

    pub fn set_team(&mut self, team_id: &str) {
        self.team_id = Some(team_id.to_string());
    }

    /// Flips membership of `tag`. Unknown labels are accepted; the
    /// vocabulary is a form concern.
    pub fn toggle_tag(&mut self, tag: &str) {
        if !self.tags.remove(tag) {
            self.tags.insert(tag.to_string());
        }
    }

    /// Applies a typed bag-count entry. Non-numeric input and values below
    /// the floor both resolve to the floor.
    pub fn set_bag_count(&mut self, raw: &str) {
        self.bag_count = raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= MIN_BAG_COUNT)
            .unwrap_or(MIN_BAG_COUNT);
    }

    pub fn increment_bags(&mut self) {
        self.bag_count = self.bag_count.saturating_add(1);
    }

    /// Decrementing never goes below the floor.
    pub fn decrement_bags(&mut self) {
        self.bag_count = self.bag_count.saturating_sub(1).max(MIN_BAG_COUNT);
    }

    /// Pins the drop where the user tapped the map.
    pub fn set_location_from_map(&mut self, coordinates: Coordinates) {
        self.routing = Some(DropRouting::RoadsidePin { coordinates });
    }

    /// Routes the drop to a curated site, clearing any roadside pin.
    pub fn assign_site(&mut self, site_id: &str) {
        self.routing = Some(DropRouting::Site {
            site_id: site_id.to_string(),
        });
    }

    /// Roadside "drop here" shortcut: pins the drop at the user's location.
    pub fn assign_roadside_here(&mut self, user_location: Coordinates) {
        self.routing = Some(DropRouting::RoadsidePin {
            coordinates: user_location,
        });
    }

    /// Packages the draft as an unsaved record. Requires a routing; exactly
    /// one of the record's site/location fields ends up populated.
    pub fn finalize(&self) -> Option<TrashDrop> {
        let routing = self.routing.as_ref()?;
        let (collection_site_id, location) = match routing {
            DropRouting::Site { site_id } => (Some(site_id.clone()), None),
            DropRouting::RoadsidePin { coordinates } => (None, Some(*coordinates)),
        };

        Some(TrashDrop {
            id: None,
            active: true,
            team_id: self.team_id.clone(),
            collection_site_id,
            location,
            coordinates: location,
            created: self.created,
            was_collected: false,
            tags: self.tags.iter().cloned().collect(),
            created_by: self.created_by.clone(),
            bag_count: self.bag_count,
        })
    }
}
