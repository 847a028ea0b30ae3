//! Geographic helpers over harvested streams

use serde::Serialize;

use crate::models::Stream;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle (haversine) distance in kilometres
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Closest stream to a position, with its distance in kilometres
pub fn nearest(streams: &[Stream], lat: f64, lon: f64) -> Option<(&Stream, f64)> {
    streams
        .iter()
        .map(|s| (s, distance_km(lat, lon, s.latitude, s.longitude)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// A place shared by more than one stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePlace {
    pub place: String,
    pub count: usize,
    pub mount_points: Vec<String>,
}

/// Places with more than one stream, in order of first appearance.
/// Streams without a place are ignored.
pub fn find_duplicate_places(streams: &[Stream]) -> Vec<DuplicatePlace> {
    let mut groups: Vec<DuplicatePlace> = Vec::new();

    for stream in streams {
        let Some(place) = stream.place.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };
        match groups.iter_mut().find(|g| g.place == place) {
            Some(group) => {
                group.count += 1;
                group.mount_points.push(stream.name.clone());
            }
            None => groups.push(DuplicatePlace {
                place: place.to_string(),
                count: 1,
                mount_points: vec![stream.name.clone()],
            }),
        }
    }

    groups.retain(|g| g.count > 1);
    groups
}
