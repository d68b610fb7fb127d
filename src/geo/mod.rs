//! Resolves raw coordinates to a town.

use crate::models::{Coordinates, Town};

/// Furthest a fix may sit from a town's center and still snap to it, in km.
const MAX_SNAP_DISTANCE_KM: f64 = 10.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maps a coordinate pair to the town containing it.
///
/// Containment is checked against each town's bounding box in the order the
/// reference data lists them; a point inside no box snaps to the nearest town
/// center within [`MAX_SNAP_DISTANCE_KM`]. Missing or malformed coordinates
/// resolve to `None`, never an error.
pub fn resolve_town(coordinates: Option<&Coordinates>, towns: &[Town]) -> Option<String> {
    let point = coordinates.filter(|c| c.is_valid())?;

    if let Some(town) = towns.iter().find(|t| t.bounds.contains(point)) {
        return Some(town.town_id.clone());
    }

    towns
        .iter()
        .map(|t| (haversine_km(point, &t.bounds.center()), t))
        .filter(|(distance, _)| *distance <= MAX_SNAP_DISTANCE_KM)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, town)| town.town_id.clone())
}

/// Great-circle distance between two points, in kilometers.
fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
