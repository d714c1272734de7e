use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS_METERS: f64 = 2_000.0;
pub const DEFAULT_RESULT_LIMIT: usize = 20;
pub const DEFAULT_ITINERARY_RADIUS_METERS: f64 = 3_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum TravelMode {
    Walking,
    Bicycling,
    Driving,
    Transit,
}

impl From<String> for TravelMode {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl TravelMode {
    /// Unknown modes fall back to driving.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "walking" | "walk" | "foot" | "đi bộ" => Self::Walking,
            "bicycling" | "bicycle" | "bike" | "cycling" | "xe đạp" => Self::Bicycling,
            "transit" | "bus" | "public" | "xe buýt" => Self::Transit,
            _ => Self::Driving,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Bicycling => "bicycling",
            Self::Driving => "driving",
            Self::Transit => "transit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelTime {
    pub minutes: u32,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelInfo {
    pub mode: TravelMode,
    pub distance_meters: f64,
    pub minutes: u32,
    pub hours: f64,
    pub directions_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub from_index: usize,
    pub to_index: usize,
    pub distance_meters: f64,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub total_stops: usize,
    pub total_distance_meters: f64,
    pub total_minutes: u32,
    pub total_hours: f64,
    pub mode: TravelMode,
    pub route_url: String,
    pub segments: Vec<RouteSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceTier {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Expensive,
    #[serde(rename = "$$$$")]
    Luxury,
}

impl PriceTier {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Budget => "$",
            Self::Moderate => "$$",
            Self::Expensive => "$$$",
            Self::Luxury => "$$$$",
        }
    }
}

/// Per-person cost range in the profile currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: u64,
    pub max: u64,
}

impl PriceBand {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Swaps the bounds when they arrive reversed.
    pub fn ordered(self) -> Self {
        if self.min > self.max {
            Self::new(self.max, self.min)
        } else {
            self
        }
    }
}

/// Price as published by the data source. A missing maximum means twice the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePrice {
    pub min: u64,
    #[serde(default)]
    pub max: Option<u64>,
}

impl SourcePrice {
    pub fn band(&self) -> PriceBand {
        PriceBand::new(self.min, self.max.unwrap_or(self.min.saturating_mul(2)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub min: u64,
    pub max: u64,
    pub avg: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Explicit,
    Category,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub category: String,
    pub num_people: u32,
    pub per_person: CostSummary,
    pub total: CostSummary,
    pub tier: PriceTier,
    pub currency: String,
    pub source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub label: String,
    pub category: String,
    pub total: CostSummary,
    pub tier: Option<PriceTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryCost {
    pub num_people: u32,
    pub total_places: usize,
    pub total: CostSummary,
    pub per_person: CostSummary,
    pub breakdown: Vec<CostLine>,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonNote {
    MostAffordable,
    MostExpensive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub place_id: String,
    pub name: String,
    pub category: String,
    pub tier: PriceTier,
    pub avg_cost: u64,
    pub rank: usize,
    pub note: Option<ComparisonNote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub total_compared: usize,
    pub entries: Vec<ComparisonEntry>,
    pub lowest: u64,
    pub highest: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenState {
    Open,
    Closed,
    #[default]
    Unknown,
}

/// A candidate point of interest.
///
/// Source fields come from an index; enriched fields are only ever written by
/// the enricher and the ranker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    #[serde(default)]
    pub osm_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub position: Option<Coordinate>,
    #[serde(default)]
    pub has_position: bool,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub price_info: Option<SourcePrice>,

    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub price_estimate: Option<PriceEstimate>,
    #[serde(default)]
    pub open_state: OpenState,
    #[serde(default)]
    pub travel_info: Option<TravelInfo>,
    #[serde(default)]
    pub suggested_mode: Option<TravelMode>,
    #[serde(default)]
    pub navigation_url: Option<String>,

    #[serde(default)]
    pub similarity_score: Option<f32>,
    #[serde(default)]
    pub summary_text: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

impl Place {
    pub fn new(place_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Coordinate) -> Self {
        self.set_position(Some(position));
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_position(&mut self, position: Option<Coordinate>) {
        self.has_position = position.is_some_and(|value| value.is_valid());
        self.position = position;
    }

    /// Position usable for spatial work, `None` when absent or out of range.
    pub fn usable_position(&self) -> Option<Coordinate> {
        if self.has_position {
            self.position
        } else {
            None
        }
    }

    pub fn primary_category(&self) -> &str {
        self.categories
            .first()
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("attraction")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SemanticPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub price_info: Option<SourcePrice>,
    #[serde(default)]
    pub osm_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub place_id: String,
    pub score: f32,
    pub payload: SemanticPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub address: Option<String>,
    pub position: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkMatch {
    pub landmark: Option<Landmark>,
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingBasis {
    Distance,
    Similarity,
    Blended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Spatial,
    Semantic,
}

impl CandidateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spatial => "spatial",
            Self::Semantic => "semantic",
        }
    }
}

/// Relative weight of the distance and similarity components of a blended score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub distance: f64,
    pub similarity: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            distance: 0.5,
            similarity: 0.5,
        }
    }
}

impl BlendWeights {
    /// Negative or non-finite weights are clamped to zero; an all-zero pair
    /// falls back to equal weighting.
    pub fn sanitized(self) -> Self {
        let clean = |value: f64| if value.is_finite() { value.max(0.0) } else { 0.0 };
        let distance = clean(self.distance);
        let similarity = clean(self.similarity);
        if distance + similarity <= 0.0 {
            Self::default()
        } else {
            Self {
                distance,
                similarity,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankQuery {
    #[serde(default)]
    pub origin: Option<Coordinate>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_result_limit")]
    pub limit: usize,
    #[serde(default = "default_people")]
    pub num_people: u32,
    #[serde(default)]
    pub mode: Option<TravelMode>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
    #[serde(default)]
    pub blend: Option<BlendWeights>,
    #[serde(default)]
    pub reference_time: Option<DateTime<FixedOffset>>,
}

impl Default for RankQuery {
    fn default() -> Self {
        Self {
            origin: None,
            landmark: None,
            categories: Vec::new(),
            radius_meters: DEFAULT_RADIUS_METERS,
            text: None,
            limit: DEFAULT_RESULT_LIMIT,
            num_people: 1,
            mode: None,
            score_threshold: None,
            blend: None,
            reference_time: None,
        }
    }
}

impl RankQuery {
    pub fn spatial<I, S>(origin: Coordinate, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origin: Some(origin),
            categories: categories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn semantic(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn semantic_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn has_spatial_filter(&self) -> bool {
        let has_anchor = self.origin.is_some()
            || self
                .landmark
                .as_deref()
                .is_some_and(|value| !value.trim().is_empty());
        has_anchor && self.categories.iter().any(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidateSet {
    pub candidates: Vec<Place>,
    pub basis: RankingBasis,
    pub requested_basis: RankingBasis,
    pub unavailable_sources: Vec<CandidateSource>,
    pub total_before_limit: usize,
    pub landmark: Option<Landmark>,
}

impl RankedCandidateSet {
    pub fn is_degraded(&self) -> bool {
        !self.unavailable_sources.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryRequest {
    pub origin: Coordinate,
    pub duration_minutes: u32,
    #[serde(default)]
    pub budget_per_person: Option<u64>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default = "default_people")]
    pub num_people: u32,
    #[serde(default)]
    pub mode: Option<TravelMode>,
    #[serde(default = "default_itinerary_radius_meters")]
    pub radius_meters: f64,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub reference_time: Option<DateTime<FixedOffset>>,
}

impl ItineraryRequest {
    pub fn new(origin: Coordinate, duration_minutes: u32) -> Self {
        Self {
            origin,
            duration_minutes,
            budget_per_person: None,
            interests: Vec::new(),
            num_people: 1,
            mode: None,
            radius_meters: DEFAULT_ITINERARY_RADIUS_METERS,
            start_time: None,
            reference_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryStop {
    pub place: Place,
    pub arrival_offset_minutes: u32,
    pub travel_minutes: u32,
    pub travel_distance_meters: f64,
    pub dwell_minutes: u32,
    pub arrival_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryPlan {
    pub origin: Coordinate,
    pub mode: TravelMode,
    pub stops: Vec<ItineraryStop>,
    pub total_distance_meters: f64,
    pub total_travel_minutes: u32,
    pub total_duration_minutes: u32,
    pub requested_duration_minutes: u32,
    pub cost: ItineraryCost,
    pub route: Option<RouteSummary>,
}

fn default_radius_meters() -> f64 {
    DEFAULT_RADIUS_METERS
}

fn default_itinerary_radius_meters() -> f64 {
    DEFAULT_ITINERARY_RADIUS_METERS
}

fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

fn default_people() -> u32 {
    1
}
