//! Time-boxed, budget-bounded day plans built on top of fusion ranking.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::error::CoreError;
use crate::fusion::FusionRanker;
use crate::geo::{self, MapLinks};
use crate::index::{SemanticIndex, SpatialIndex};
use crate::models::{
    Coordinate, ItineraryPlan, ItineraryRequest, ItineraryStop, Place, RankQuery, TravelMode,
};
use crate::pricing::{midpoint, PriceEstimator, DEFAULT_TRANSPORT_BUDGET};

pub const DEFAULT_MAX_STOPS: usize = 5;
pub const DEFAULT_DWELL_MINUTES: u32 = 60;
pub const DEFAULT_OVERRUN_TOLERANCE_MINUTES: u32 = 30;
pub const DEFAULT_GROUP_CANDIDATES: usize = 20;

pub const DEFAULT_INTERESTS: [&str; 3] = ["food", "culture", "shopping"];

#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryConfig {
    pub max_stops: usize,
    pub dwell_minutes: u32,
    pub overrun_tolerance_minutes: u32,
    /// Candidates requested per interest group.
    pub group_candidates: usize,
    pub default_mode: TravelMode,
    /// Adds a flat per-person transport line; it is reserved against the budget.
    pub include_transport: bool,
    pub transport_budget: u64,
}

impl Default for ItineraryConfig {
    fn default() -> Self {
        Self {
            max_stops: DEFAULT_MAX_STOPS,
            dwell_minutes: DEFAULT_DWELL_MINUTES,
            overrun_tolerance_minutes: DEFAULT_OVERRUN_TOLERANCE_MINUTES,
            group_candidates: DEFAULT_GROUP_CANDIDATES,
            default_mode: TravelMode::Driving,
            include_transport: false,
            transport_budget: DEFAULT_TRANSPORT_BUDGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestGroup {
    pub interest: String,
    pub categories: Vec<String>,
}

/// Category group behind one interest keyword. Unknown interests are taken
/// as a category name.
pub fn categories_for_interest(interest: &str) -> Vec<String> {
    let key = interest.trim().to_lowercase();
    let mapped: &[&str] = match key.as_str() {
        "food" => &["restaurant", "cafe", "street_food", "fast_food"],
        "culture" => &["museum", "temple", "historical", "gallery", "monument"],
        "shopping" => &["market", "shopping_mall"],
        "nature" => &["park", "lake", "garden", "zoo"],
        "nightlife" => &["bar", "pub", "theatre", "cinema"],
        "relax" => &["spa", "massage"],
        "accommodation" => &["hotel", "hostel", "guesthouse"],
        "" => &[],
        _ => return vec![key],
    };
    mapped.iter().map(|category| category.to_string()).collect()
}

pub fn interest_groups(interests: &[String]) -> Vec<InterestGroup> {
    let mut seen = HashSet::new();
    let mut groups = interests
        .iter()
        .map(|interest| interest.trim().to_lowercase())
        .filter(|interest| !interest.is_empty() && seen.insert(interest.clone()))
        .map(|interest| InterestGroup {
            categories: categories_for_interest(&interest),
            interest,
        })
        .collect::<Vec<_>>();

    if groups.is_empty() {
        groups = DEFAULT_INTERESTS
            .iter()
            .map(|interest| InterestGroup {
                interest: interest.to_string(),
                categories: categories_for_interest(interest),
            })
            .collect();
    }
    groups
}

pub struct ItineraryPlanner<S, M> {
    ranker: Arc<FusionRanker<S, M>>,
    pricing: Arc<PriceEstimator>,
    links: MapLinks,
    config: ItineraryConfig,
}

/// Running totals while stops are being chosen.
struct Walk {
    position: Coordinate,
    elapsed_minutes: u32,
    per_person_min: u64,
    per_person_max: u64,
}

impl<S, M> ItineraryPlanner<S, M>
where
    S: SpatialIndex,
    M: SemanticIndex,
{
    pub fn new(
        ranker: Arc<FusionRanker<S, M>>,
        pricing: Arc<PriceEstimator>,
        links: MapLinks,
        config: ItineraryConfig,
    ) -> Self {
        Self {
            ranker,
            pricing,
            links,
            config,
        }
    }

    pub fn config(&self) -> &ItineraryConfig {
        &self.config
    }

    #[instrument(skip_all, fields(duration = request.duration_minutes, interests = request.interests.len()))]
    pub async fn plan_itinerary(&self, request: ItineraryRequest) -> Result<ItineraryPlan, CoreError> {
        if !request.origin.is_valid() {
            return Err(CoreError::InvalidCoordinate(format!(
                "origin ({}, {}) is outside WGS84 bounds",
                request.origin.lat, request.origin.lon
            )));
        }

        let mode = request.mode.unwrap_or(self.config.default_mode);
        let people = request.num_people.max(1);
        if request.duration_minutes == 0 {
            return Ok(self.assemble(&request, mode, Vec::new(), 0));
        }

        let groups = interest_groups(&request.interests);
        let reference_time = request
            .reference_time
            .unwrap_or_else(|| Utc::now().with_timezone(&self.ranker.config().utc_offset));

        // with a budget, rank the whole radius and cap after filtering
        let group_limit = match request.budget_per_person {
            Some(_) => usize::MAX,
            None => self.config.group_candidates,
        };
        let rankings = join_all(groups.iter().map(|group| {
            let query = RankQuery {
                origin: Some(request.origin),
                categories: group.categories.clone(),
                radius_meters: request.radius_meters,
                limit: group_limit,
                num_people: people,
                mode: Some(mode),
                reference_time: Some(reference_time),
                ..RankQuery::default()
            };
            self.ranker.resolve_and_rank(query)
        }))
        .await;

        let mut causes = Vec::new();
        let mut pools = Vec::with_capacity(groups.len());
        for (group, ranking) in groups.iter().zip(rankings) {
            match ranking {
                Ok(set) => pools.push(set.candidates),
                Err(CoreError::AllSourcesUnavailable(reasons)) => {
                    warn!(interest = %group.interest, "interest group skipped; sources unavailable");
                    causes.extend(reasons);
                }
                Err(error) => return Err(error),
            }
        }
        if pools.is_empty() {
            return Err(CoreError::AllSourcesUnavailable(causes));
        }

        if let Some(budget) = request.budget_per_person {
            pools = pools
                .into_iter()
                .map(|pool| {
                    let mut affordable = self.pricing.filter_by_budget(pool, budget, people);
                    affordable.truncate(self.config.group_candidates);
                    affordable
                })
                .collect();
        }
        if pools.iter().all(Vec::is_empty) {
            return Err(CoreError::NoFeasibleStops(match request.budget_per_person {
                Some(budget) => format!("no candidate fits a budget of {budget} per person"),
                None => "no candidates near the origin".to_string(),
            }));
        }

        let (stops, elapsed) = self.select_stops(&request, mode, pools);
        if stops.is_empty() {
            return Err(CoreError::NoFeasibleStops(format!(
                "no stop fits within {} minutes",
                request.duration_minutes
            )));
        }

        let plan = self.assemble(&request, mode, stops, elapsed);
        info!(
            stops = plan.stops.len(),
            total_minutes = plan.total_duration_minutes,
            per_person = plan.cost.per_person.avg,
            "itinerary planned"
        );
        Ok(plan)
    }

    /// Round-robin over interest groups so each category shows up before any
    /// group gets a second stop.
    fn select_stops(
        &self,
        request: &ItineraryRequest,
        mode: TravelMode,
        pools: Vec<Vec<Place>>,
    ) -> (Vec<ItineraryStop>, u32) {
        let people = request.num_people.max(1);
        let time_limit = request
            .duration_minutes
            .saturating_add(self.config.overrun_tolerance_minutes);
        let reserved = if self.config.include_transport {
            self.config.transport_budget
        } else {
            0
        };

        let mut queues = pools
            .into_iter()
            .map(|pool| pool.into_iter())
            .collect::<Vec<_>>();
        let mut exhausted = vec![false; queues.len()];
        let mut chosen = HashSet::new();
        let mut stops = Vec::new();
        let mut walk = Walk {
            position: request.origin,
            elapsed_minutes: 0,
            per_person_min: reserved,
            per_person_max: reserved,
        };

        while stops.len() < self.config.max_stops && exhausted.iter().any(|done| !done) {
            for (index, queue) in queues.iter_mut().enumerate() {
                if stops.len() >= self.config.max_stops {
                    break;
                }
                if exhausted[index] {
                    continue;
                }

                let next = queue.find_map(|place| {
                    if chosen.contains(&place.place_id) {
                        return None;
                    }
                    self.try_visit(place, &mut walk, request, mode, people, time_limit)
                });
                match next {
                    Some(stop) => {
                        chosen.insert(stop.place.place_id.clone());
                        stops.push(stop);
                    }
                    None => exhausted[index] = true,
                }
            }
        }

        (stops, walk.elapsed_minutes)
    }

    fn try_visit(
        &self,
        place: Place,
        walk: &mut Walk,
        request: &ItineraryRequest,
        mode: TravelMode,
        people: u32,
        time_limit: u32,
    ) -> Option<ItineraryStop> {
        let target = place.usable_position()?;
        let meters = geo::distance(walk.position, target).ok()?;
        let travel_minutes = geo::estimate_travel_time(meters, mode).minutes;
        let arrival = walk.elapsed_minutes.saturating_add(travel_minutes);
        let departure = arrival.saturating_add(self.config.dwell_minutes);
        if departure > time_limit {
            return None;
        }

        let band = self.pricing.estimate_place(&place, people).per_person;
        let per_person_min = walk.per_person_min.saturating_add(band.min);
        let per_person_max = walk.per_person_max.saturating_add(band.max);
        if let Some(budget) = request.budget_per_person {
            if midpoint(per_person_min, per_person_max) > budget {
                return None;
            }
        }

        walk.position = target;
        walk.elapsed_minutes = departure;
        walk.per_person_min = per_person_min;
        walk.per_person_max = per_person_max;

        Some(ItineraryStop {
            arrival_time: request
                .start_time
                .map(|start| start + ChronoDuration::minutes(i64::from(arrival))),
            place,
            arrival_offset_minutes: arrival,
            travel_minutes,
            travel_distance_meters: geo::round2(meters),
            dwell_minutes: self.config.dwell_minutes,
        })
    }

    fn assemble(
        &self,
        request: &ItineraryRequest,
        mode: TravelMode,
        stops: Vec<ItineraryStop>,
        elapsed_minutes: u32,
    ) -> ItineraryPlan {
        let places = stops.iter().map(|stop| stop.place.clone()).collect::<Vec<_>>();
        let cost = self.pricing.estimate_itinerary(
            &places,
            request.num_people,
            self.config.include_transport,
            self.config.transport_budget,
        );

        let mut points = Vec::with_capacity(places.len() + 1);
        points.push(request.origin);
        points.extend(places.iter().filter_map(Place::usable_position));
        let route = match geo::build_route(&points, mode, &self.links) {
            Ok(route) => Some(route),
            Err(CoreError::InsufficientStops(_)) => None,
            Err(error) => {
                warn!(%error, "route summary unavailable");
                None
            }
        };

        ItineraryPlan {
            origin: request.origin,
            mode,
            total_distance_meters: route.as_ref().map_or(0.0, |route| route.total_distance_meters),
            total_travel_minutes: stops.iter().map(|stop| stop.travel_minutes).sum(),
            total_duration_minutes: elapsed_minutes,
            requested_duration_minutes: request.duration_minutes,
            stops,
            cost,
            route,
        }
    }
}
