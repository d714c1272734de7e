//! Great-circle distance, travel-time estimates and map links.
//!
//! Everything here is a pure function of its inputs. Travel times are rough
//! estimates from a fixed speed table, not routed times.

use url::form_urlencoded;

use crate::error::CoreError;
use crate::models::{Coordinate, RouteSegment, RouteSummary, TravelMode, TravelTime};

/// Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Distance below which walking is suggested.
pub const WALKING_THRESHOLD_METERS: f64 = 1_000.0;
/// Distance below which bicycling is suggested.
pub const BICYCLING_THRESHOLD_METERS: f64 = 5_000.0;
/// Distance below which driving is suggested; anything further suggests transit.
pub const DRIVING_THRESHOLD_METERS: f64 = 20_000.0;

pub const DEFAULT_MAPS_BASE_URL: &str = "https://www.google.com/maps";

/// Average speed assumption per mode, in km/h.
pub fn speed_kmh(mode: TravelMode) -> f64 {
    match mode {
        TravelMode::Walking => 5.0,
        TravelMode::Bicycling => 15.0,
        TravelMode::Driving => 30.0,
        TravelMode::Transit => 25.0,
    }
}

/// Haversine distance between two points in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> Result<f64, CoreError> {
    for point in [a, b] {
        if !point.is_finite() {
            return Err(CoreError::InvalidCoordinate(format!(
                "({}, {}) is not a finite coordinate",
                point.lat, point.lon
            )));
        }
    }

    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    Ok(EARTH_RADIUS_METERS * c)
}

/// Estimated travel time: minutes are floored, hours rounded to 2 decimals.
pub fn estimate_travel_time(distance_meters: f64, mode: TravelMode) -> TravelTime {
    let distance_km = distance_meters.max(0.0) / 1_000.0;
    let hours = distance_km / speed_kmh(mode);

    TravelTime {
        minutes: (hours * 60.0).floor() as u32,
        hours: round2(hours),
    }
}

pub fn suggest_mode(distance_meters: f64) -> TravelMode {
    if distance_meters < WALKING_THRESHOLD_METERS {
        TravelMode::Walking
    } else if distance_meters < BICYCLING_THRESHOLD_METERS {
        TravelMode::Bicycling
    } else if distance_meters < DRIVING_THRESHOLD_METERS {
        TravelMode::Driving
    } else {
        TravelMode::Transit
    }
}

/// Per-segment and total distance/time for an ordered list of stops.
pub fn build_route(
    stops: &[Coordinate],
    mode: TravelMode,
    links: &MapLinks,
) -> Result<RouteSummary, CoreError> {
    if stops.len() < 2 {
        return Err(CoreError::InsufficientStops(stops.len()));
    }

    let mut segments = Vec::with_capacity(stops.len() - 1);
    let mut total_distance = 0.0;
    let mut total_minutes = 0_u32;

    for (index, pair) in stops.windows(2).enumerate() {
        let meters = distance(pair[0], pair[1])?;
        let time = estimate_travel_time(meters, mode);
        total_distance += meters;
        total_minutes += time.minutes;
        segments.push(RouteSegment {
            from_index: index,
            to_index: index + 1,
            distance_meters: round2(meters),
            minutes: time.minutes,
        });
    }

    Ok(RouteSummary {
        total_stops: stops.len(),
        total_distance_meters: round2(total_distance),
        total_minutes,
        total_hours: round2(f64::from(total_minutes) / 60.0),
        mode,
        route_url: links.route_url(stops, mode),
        segments,
    })
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic map URL templating; never performs a network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLinks {
    base_url: String,
}

impl Default for MapLinks {
    fn default() -> Self {
        Self::new(DEFAULT_MAPS_BASE_URL)
    }
}

impl MapLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn place_url(&self, position: Option<Coordinate>, name: &str) -> String {
        let name = name.trim();
        let query = match (position, name.is_empty()) {
            (Some(point), true) => format_point(point),
            (Some(point), false) => format!("{} {}", name, format_point(point)),
            (None, _) => name.to_string(),
        };
        format!("{}/search/?api=1&query={}", self.base_url, encode(&query))
    }

    pub fn directions_url(&self, origin: Coordinate, destination: Coordinate, mode: TravelMode) -> String {
        format!(
            "{}/dir/?api=1&origin={}&destination={}&travelmode={}",
            self.base_url,
            format_point(origin),
            format_point(destination),
            mode.as_str()
        )
    }

    /// Directions through every intermediate stop as a waypoint.
    pub fn route_url(&self, stops: &[Coordinate], mode: TravelMode) -> String {
        match stops {
            [] => format!("{}/dir/?api=1&travelmode={}", self.base_url, mode.as_str()),
            [only] => self.directions_url(*only, *only, mode),
            [first, middle @ .., last] => {
                let mut url = self.directions_url(*first, *last, mode);
                if !middle.is_empty() {
                    let waypoints = middle
                        .iter()
                        .map(|point| format_point(*point))
                        .collect::<Vec<_>>()
                        .join("|");
                    url.push_str("&waypoints=");
                    url.push_str(&encode(&waypoints));
                }
                url
            }
        }
    }
}

fn format_point(point: Coordinate) -> String {
    format!("{},{}", point.lat, point.lon)
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
