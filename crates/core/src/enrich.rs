use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::availability::OpeningSchedule;
use crate::geo::{self, MapLinks};
use crate::models::{Coordinate, OpenState, Place, TravelInfo, TravelMode};
use crate::pricing::PriceEstimator;

/// Per-request inputs shared by every candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentContext {
    pub origin: Option<Coordinate>,
    pub num_people: u32,
    pub mode: Option<TravelMode>,
    /// Wall-clock instant in the catalog's local offset.
    pub reference_time: DateTime<FixedOffset>,
}

/// Computes derived attributes from a candidate's source fields.
#[derive(Debug, Clone)]
pub struct ResultEnricher {
    pricing: Arc<PriceEstimator>,
    links: MapLinks,
}

impl ResultEnricher {
    pub fn new(pricing: Arc<PriceEstimator>, links: MapLinks) -> Self {
        Self { pricing, links }
    }

    pub fn pricing(&self) -> &PriceEstimator {
        &self.pricing
    }

    pub fn links(&self) -> &MapLinks {
        &self.links
    }

    /// Recomputes every derived field. Running it twice with the same context
    /// yields the same place.
    pub fn enrich(&self, mut place: Place, context: &EnrichmentContext) -> Place {
        // index-provided distance is only kept when we cannot recompute it
        let index_distance = place.distance_meters.take();
        place.travel_info = None;
        place.suggested_mode = None;
        place.navigation_url = None;
        place.price_estimate = None;
        place.open_state = OpenState::Unknown;

        let position = place.usable_position();
        match (context.origin, position) {
            (Some(origin), Some(target)) => match geo::distance(origin, target) {
                Ok(meters) => {
                    let suggested = geo::suggest_mode(meters);
                    let mode = context.mode.unwrap_or(suggested);
                    let time = geo::estimate_travel_time(meters, mode);
                    place.distance_meters = Some(geo::round2(meters));
                    place.suggested_mode = Some(suggested);
                    place.travel_info = Some(TravelInfo {
                        mode,
                        distance_meters: geo::round2(meters),
                        minutes: time.minutes,
                        hours: time.hours,
                        directions_url: self.links.directions_url(origin, target, mode),
                    });
                }
                Err(error) => {
                    debug!(place_id = %place.place_id, %error, "distance not computed");
                }
            },
            (None, _) => place.distance_meters = index_distance,
            (Some(_), None) => {}
        }

        place.navigation_url = Some(self.links.place_url(position, &place.name));
        place.open_state = self.open_state(&place, context);
        place.price_estimate = Some(self.pricing.estimate_place(&place, context.num_people));
        place
    }

    pub fn enrich_all(&self, places: Vec<Place>, context: &EnrichmentContext) -> Vec<Place> {
        places
            .into_iter()
            .map(|place| self.enrich(place, context))
            .collect()
    }

    fn open_state(&self, place: &Place, context: &EnrichmentContext) -> OpenState {
        let Some(raw) = place.opening_hours.as_deref().filter(|raw| !raw.trim().is_empty()) else {
            return OpenState::Unknown;
        };

        match OpeningSchedule::parse(raw) {
            Ok(schedule) => schedule.is_open_at(context.reference_time.naive_local()),
            Err(error) => {
                debug!(place_id = %place.place_id, %error, "opening hours ignored");
                OpenState::Unknown
            }
        }
    }
}
