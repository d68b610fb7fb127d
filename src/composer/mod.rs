//! The drop composition state machine.
//!
//! One `ComposerSession` owns the in-progress draft for the lifetime of a
//! composition. Every external input re-derives a single tagged
//! [`ComposerState`]; clients render it with one exhaustive switch instead of
//! re-checking overlapping conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::SiteCatalog;
use crate::draft::DropDraft;
use crate::eligibility::{EligibilityGate, EventWindow};
use crate::geo;
use crate::models::{
    CollectionSite, Coordinates, DropRouting, LocationFix, TeamOption, Town, TrashDrop,
    UserContext,
};

/// User interactions and external inputs delivered to the composer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ComposerEvent {
    /// The geolocation watch republished. Always accepted.
    LocationChanged { fix: LocationFix },
    TeamSelected { team_id: String },
    TagToggled { tag: String },
    BagCountEntered { value: String },
    BagCountIncremented,
    BagCountDecremented,
    MapTapped { coordinates: Coordinates },
    /// Roadside "drop bags here" shortcut.
    DropHere,
    SitePickerOpened,
    SitePickerCancelled,
    SiteChosen { site_id: String },
}

/// Why an event was rejected. The draft is never touched on rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    /// The composer is not in an editable state.
    NotComposing,
    /// Site events need the picker open.
    PickerClosed,
    /// The current routing affordance does not surface the picker.
    PickerUnavailable,
    /// Roadside drops are not allowed in the resolved town.
    RoadsideNotAllowed,
    /// The tapped point is not a usable coordinate pair.
    InvalidCoordinates,
    UnknownTeam(String),
    UnknownSite(String),
    /// Submit requires the draft to be routed somewhere.
    Unrouted,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::NotComposing => write!(f, "The form is not editable right now"),
            EventError::PickerClosed => write!(f, "The site picker is not open"),
            EventError::PickerUnavailable => write!(f, "No site picker is available here"),
            EventError::RoadsideNotAllowed => {
                write!(f, "This town routes all drops to collection sites")
            }
            EventError::InvalidCoordinates => write!(f, "Invalid map coordinates"),
            EventError::UnknownTeam(id) => write!(f, "Unknown team {id}"),
            EventError::UnknownSite(id) => write!(f, "Unknown collection site {id}"),
            EventError::Unrouted => write!(f, "Choose a drop location or collection site first"),
        }
    }
}

impl std::error::Error for EventError {}

/// Which routing controls the form presents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoutingAffordance {
    /// "Drop bags here" and "find a collection site", side by side.
    RoadsideAndSiteChoice,
    /// A single "drop bags here" control.
    RoadsideOnly,
    /// A single "find a collection site" action.
    SiteOnly,
}

/// How the form presents team attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TeamSelector {
    /// The user belongs to no team.
    Hidden,
    /// Exactly one membership: show the name, no picker.
    Label { team: TeamOption },
    Picker { options: Vec<TeamOption> },
}

/// The inline map sub-view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<Coordinates>,
}

/// The active editing view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposingView {
    pub town: Town,
    /// Absent once a site is selected; the routing buttons are hidden then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordance: Option<RoutingAffordance>,
    pub team_selector: TeamSelector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub bag_count: u32,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<DropRouting>,
    /// The chosen site record, when the routing points at one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_site: Option<CollectionSite>,
    /// The inline map; absent while the selected-site view replaces it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<MapView>,
}

/// The single state the client renders, re-derived on every input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum ComposerState {
    /// Location services reported an error.
    LocationDisabled { error: String },
    /// Still acquiring a first fix.
    Locating,
    /// Coordinates resolve to no known town.
    TownUnresolved,
    /// Outside the event window in an enforcing deployment.
    Blocked { window: EventWindow },
    /// Site picker modal, layered over the editing view.
    SiteSelection {
        sites: Vec<CollectionSite>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<CollectionSite>,
    },
    Composing(ComposingView),
}

/// One volunteer's composition session. Exclusively owns its draft.
#[derive(Debug)]
pub struct ComposerSession {
    pub id: Uuid,
    user: UserContext,
    team_options: Vec<TeamOption>,
    location: LocationFix,
    draft: DropDraft,
    picker_open: bool,
}

impl ComposerSession {
    pub fn new(user: UserContext, location: LocationFix, now: DateTime<Utc>) -> Self {
        let team_options = user.team_options();
        let draft = DropDraft::new(&user, &team_options, now);
        Self {
            id: Uuid::new_v4(),
            user,
            team_options,
            location,
            draft,
            picker_open: false,
        }
    }

    pub fn team_options(&self) -> &[TeamOption] {
        &self.team_options
    }

    /// Derives the render state. Precedence: location error, no fix yet,
    /// unresolved town, window gate, picker modal, editing view.
    pub fn state(
        &self,
        catalog: &SiteCatalog,
        gate: &EligibilityGate,
        now: DateTime<Utc>,
    ) -> ComposerState {
        if let Some(error) = &self.location.error {
            return ComposerState::LocationDisabled {
                error: error.clone(),
            };
        }
        if self.location.valid_coordinates().is_none() {
            return ComposerState::Locating;
        }
        let Some(town) = self.current_town(catalog) else {
            return ComposerState::TownUnresolved;
        };
        if !gate.can_record(now) {
            return ComposerState::Blocked {
                window: EligibilityGate::window_for(now),
            };
        }
        if self.picker_open {
            return ComposerState::SiteSelection {
                sites: catalog.sites().to_vec(),
                value: self.selected_site(catalog).cloned(),
            };
        }
        ComposerState::Composing(self.composing_view(town, catalog))
    }

    /// Applies one event. Rejected events leave the draft untouched.
    pub fn apply(
        &mut self,
        event: ComposerEvent,
        catalog: &SiteCatalog,
        gate: &EligibilityGate,
        now: DateTime<Utc>,
    ) -> Result<(), EventError> {
        if let ComposerEvent::LocationChanged { fix } = event {
            self.location = fix;
            return Ok(());
        }

        match self.state(catalog, gate, now) {
            ComposerState::SiteSelection { .. } => self.apply_in_picker(event, catalog),
            ComposerState::Composing(_) => self.apply_while_editing(event, catalog),
            _ => Err(EventError::NotComposing),
        }
    }

    /// Packages the draft for the save collaborator. Legal only while
    /// Composing with a routing chosen.
    pub fn finalize(
        &self,
        catalog: &SiteCatalog,
        gate: &EligibilityGate,
        now: DateTime<Utc>,
    ) -> Result<TrashDrop, EventError> {
        match self.state(catalog, gate, now) {
            ComposerState::Composing(_) => self.draft.finalize().ok_or(EventError::Unrouted),
            _ => Err(EventError::NotComposing),
        }
    }

    /// Starts a fresh draft after a successful save or explicit cancel:
    /// new creation timestamp, cleared tags and routing, bag count back to
    /// one, reporter re-snapshotted.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.draft = DropDraft::new(&self.user, &self.team_options, now);
        self.picker_open = false;
    }

    fn apply_in_picker(
        &mut self,
        event: ComposerEvent,
        catalog: &SiteCatalog,
    ) -> Result<(), EventError> {
        match event {
            ComposerEvent::SiteChosen { site_id } => {
                if catalog.find_site(&site_id).is_none() {
                    return Err(EventError::UnknownSite(site_id));
                }
                self.draft.assign_site(&site_id);
                self.picker_open = false;
                Ok(())
            }
            ComposerEvent::SitePickerCancelled => {
                self.picker_open = false;
                Ok(())
            }
            // the modal blocks the form underneath
            _ => Err(EventError::NotComposing),
        }
    }

    fn apply_while_editing(
        &mut self,
        event: ComposerEvent,
        catalog: &SiteCatalog,
    ) -> Result<(), EventError> {
        match event {
            ComposerEvent::TeamSelected { team_id } => {
                if !self.team_options.iter().any(|t| t.id == team_id) {
                    return Err(EventError::UnknownTeam(team_id));
                }
                self.draft.set_team(&team_id);
                Ok(())
            }
            ComposerEvent::TagToggled { tag } => {
                self.draft.toggle_tag(&tag);
                Ok(())
            }
            ComposerEvent::BagCountEntered { value } => {
                self.draft.set_bag_count(&value);
                Ok(())
            }
            ComposerEvent::BagCountIncremented => {
                self.draft.increment_bags();
                Ok(())
            }
            ComposerEvent::BagCountDecremented => {
                self.draft.decrement_bags();
                Ok(())
            }
            ComposerEvent::MapTapped { coordinates } => {
                self.require_roadside(catalog)?;
                if !coordinates.is_valid() {
                    return Err(EventError::InvalidCoordinates);
                }
                self.draft.set_location_from_map(coordinates);
                Ok(())
            }
            ComposerEvent::DropHere => {
                self.require_roadside(catalog)?;
                let here = self
                    .location
                    .valid_coordinates()
                    .ok_or(EventError::NotComposing)?;
                self.draft.assign_roadside_here(here);
                Ok(())
            }
            ComposerEvent::SitePickerOpened => {
                let town = self.current_town(catalog).ok_or(EventError::NotComposing)?;
                if EligibilityGate::allows_roadside(town) && !catalog.has_sites(&town.town_id) {
                    return Err(EventError::PickerUnavailable);
                }
                if matches!(self.draft.routing, Some(DropRouting::Site { .. })) {
                    // affordance buttons are hidden once a site is chosen
                    return Err(EventError::PickerUnavailable);
                }
                self.picker_open = true;
                Ok(())
            }
            _ => Err(EventError::PickerClosed),
        }
    }

    fn require_roadside(&self, catalog: &SiteCatalog) -> Result<(), EventError> {
        let town = self.current_town(catalog).ok_or(EventError::NotComposing)?;
        if EligibilityGate::allows_roadside(town) {
            Ok(())
        } else {
            Err(EventError::RoadsideNotAllowed)
        }
    }

    fn current_town<'a>(&self, catalog: &'a SiteCatalog) -> Option<&'a Town> {
        let town_id = geo::resolve_town(self.location.coordinates.as_ref(), catalog.towns())?;
        catalog.town(&town_id)
    }

    fn selected_site<'a>(&self, catalog: &'a SiteCatalog) -> Option<&'a CollectionSite> {
        match &self.draft.routing {
            Some(DropRouting::Site { site_id }) => catalog.find_site(site_id),
            _ => None,
        }
    }

    fn composing_view(&self, town: &Town, catalog: &SiteCatalog) -> ComposingView {
        let selected_site = self.selected_site(catalog).cloned();
        let affordance = if selected_site.is_some() {
            None
        } else {
            Some(routing_affordance(town, catalog))
        };
        let map = if selected_site.is_some() {
            None
        } else {
            self.location.valid_coordinates().map(|center| MapView {
                center,
                pin: match &self.draft.routing {
                    Some(DropRouting::RoadsidePin { coordinates }) => Some(*coordinates),
                    _ => None,
                },
            })
        };

        ComposingView {
            town: town.clone(),
            affordance,
            team_selector: team_selector(&self.team_options),
            team_id: self.draft.team_id.clone(),
            bag_count: self.draft.bag_count,
            tags: self.draft.tags.iter().cloned().collect(),
            routing: self.draft.routing.clone(),
            selected_site,
            map,
        }
    }
}

/// Which routing controls a town's policy and site coverage yield.
fn routing_affordance(town: &Town, catalog: &SiteCatalog) -> RoutingAffordance {
    if !EligibilityGate::allows_roadside(town) {
        RoutingAffordance::SiteOnly
    } else if catalog.has_sites(&town.town_id) {
        RoutingAffordance::RoadsideAndSiteChoice
    } else {
        RoutingAffordance::RoadsideOnly
    }
}

fn team_selector(options: &[TeamOption]) -> TeamSelector {
    match options {
        [] => TeamSelector::Hidden,
        [only] => TeamSelector::Label { team: only.clone() },
        _ => TeamSelector::Picker {
            options: options.to_vec(),
        },
    }
}
