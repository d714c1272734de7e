mod narrator;
mod settings;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use wayfinder_core::intent::{extract_landmark, extract_place_names};
use wayfinder_core::{
    detect_locale, normalize_text, Coordinate, CoreError, FusionRanker, Intent, IntentEntities,
    IntentResult, ItineraryCost, ItineraryPlan, ItineraryPlanner, ItineraryRequest, Locale,
    NarrativeGenerator, Place, PriceBand, PriceComparison, PriceEstimate, PriceEstimator,
    RankQuery, RankedCandidateSet, ResultEnricher, SemanticIndex, SpatialIndex,
    DEFAULT_RADIUS_METERS,
};
use wayfinder_ml::{IntentClassifier, IntentPrediction, RuleIntentClassifier};
use wayfinder_observability::AppMetrics;

pub use narrator::TemplateNarrator;
pub use settings::{AssistantSettings, DEFAULT_ORIGIN};

const SEARCH_LIMIT: usize = 20;
const SEMANTIC_LIMIT: usize = 10;
const PLACE_INFO_LIMIT: usize = 2;
const LANDMARK_RADIUS_METERS: f64 = 1_000.0;
const DEFAULT_SEARCH_CATEGORIES: [&str; 2] = ["restaurant", "cafe"];
const DEFAULT_TRIP_HOURS: f64 = 8.0;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub origin: Option<Coordinate>,
    #[serde(default)]
    pub num_people: Option<u32>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Narrator,
    Fallback,
}

/// Structured result of a chat turn; the reply text is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatPayload {
    Places {
        result: RankedCandidateSet,
    },
    Itinerary {
        plan: ItineraryPlan,
    },
    Comparison {
        comparison: PriceComparison,
        places: Vec<Place>,
        unresolved: Vec<String>,
    },
    Clarification {
        question: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub request_id: String,
    pub intent: Intent,
    pub confidence: f32,
    pub classifier: &'static str,
    pub locale: Locale,
    pub reply_text: String,
    pub narrative: NarrativeSource,
    pub payload: ChatPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub custom: Option<PriceBand>,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default = "one_person")]
    pub num_people: u32,
    #[serde(default)]
    pub include_transport: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostEstimate {
    Category { estimate: PriceEstimate },
    Itinerary { cost: ItineraryCost },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub comparison: PriceComparison,
    pub places: Vec<Place>,
    pub unresolved: Vec<String>,
}

fn one_person() -> u32 {
    1
}

/// Routes traveller requests to the ranking and planning core and narrates
/// the structured outcome.
pub struct AssistantAgent<S, M, N = TemplateNarrator, C = RuleIntentClassifier> {
    ranker: Arc<FusionRanker<S, M>>,
    planner: ItineraryPlanner<S, M>,
    pricing: Arc<PriceEstimator>,
    classifier: C,
    narrator: N,
    fallback: TemplateNarrator,
    metrics: Arc<AppMetrics>,
    settings: AssistantSettings,
}

impl<S, M, N, C> AssistantAgent<S, M, N, C>
where
    S: SpatialIndex,
    M: SemanticIndex,
    N: NarrativeGenerator,
    C: IntentClassifier,
{
    pub fn new(
        spatial: S,
        semantic: M,
        narrator: N,
        classifier: C,
        pricing: Arc<PriceEstimator>,
        metrics: Arc<AppMetrics>,
        settings: AssistantSettings,
    ) -> Self {
        let enricher = ResultEnricher::new(pricing.clone(), settings.map_links());
        let ranker = Arc::new(FusionRanker::new(
            spatial,
            semantic,
            enricher,
            settings.fusion_config(),
        ));
        let planner = ItineraryPlanner::new(
            ranker.clone(),
            pricing.clone(),
            settings.map_links(),
            settings.itinerary_config(),
        );

        Self {
            ranker,
            planner,
            pricing,
            classifier,
            narrator,
            fallback: TemplateNarrator,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn pricing(&self) -> &PriceEstimator {
        &self.pricing
    }

    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn handle_chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let started = Instant::now();
        self.metrics.inc_request();
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let message = normalize_text(&request.message);
        if message.is_empty() {
            return self.settle(started, Err(CoreError::EmptyQuery));
        }

        let explicit_locale = request.locale.as_deref().and_then(Locale::parse);
        let locale = detect_locale(explicit_locale, &message);
        let IntentPrediction { result, model } = self.classifier.classify(&message).await;

        let payload = match self.route(&result, &request, &message, locale).await {
            Ok(payload) => payload,
            Err(error) => return self.settle(started, Err(error)),
        };
        let (reply_text, narrative) = self.narrate(result.intent, locale, &message, &payload).await;

        self.metrics.observe_latency(started.elapsed());
        info!(
            request_id = %request_id,
            locale = locale.as_code(),
            intent = result.intent.as_str(),
            confidence = result.confidence,
            classifier = model,
            narrative = ?narrative,
            "chat handled"
        );

        Ok(ChatReply {
            request_id,
            intent: result.intent,
            confidence: result.confidence,
            classifier: model,
            locale,
            reply_text,
            narrative,
            payload,
        })
    }

    #[instrument(skip_all, fields(limit = query.limit, categories = query.categories.len()))]
    pub async fn resolve_and_rank(&self, query: RankQuery) -> Result<RankedCandidateSet> {
        let started = Instant::now();
        self.metrics.inc_request();
        let outcome = self.rank(query).await;
        self.settle(started, outcome)
    }

    #[instrument(skip_all, fields(duration = request.duration_minutes))]
    pub async fn plan_itinerary(&self, request: ItineraryRequest) -> Result<ItineraryPlan> {
        let started = Instant::now();
        self.metrics.inc_request();
        let outcome = self.planner.plan_itinerary(request).await;
        if let Ok(plan) = &outcome {
            self.metrics.add_candidates(plan.stops.len());
            info!(stops = plan.stops.len(), total_minutes = plan.total_duration_minutes, "itinerary planned");
        }
        self.settle(started, outcome)
    }

    /// Itinerary cost when places are given, otherwise a single category estimate.
    pub fn estimate_cost(&self, request: EstimateRequest) -> Result<CostEstimate> {
        let started = Instant::now();
        self.metrics.inc_request();

        let outcome = if !request.places.is_empty() {
            Ok(CostEstimate::Itinerary {
                cost: self.pricing.estimate_itinerary(
                    &request.places,
                    request.num_people,
                    request.include_transport,
                    self.settings.transport_budget,
                ),
            })
        } else {
            match request.category.as_deref().map(str::trim) {
                Some(category) if !category.is_empty() => Ok(CostEstimate::Category {
                    estimate: self.pricing.estimate(category, request.num_people, request.custom),
                }),
                _ if request.custom.is_some() => Ok(CostEstimate::Category {
                    estimate: self.pricing.estimate("attraction", request.num_people, request.custom),
                }),
                _ => Err(CoreError::EmptyQuery),
            }
        };

        self.settle(started, outcome)
    }

    /// Resolves each name to its best semantic match, then compares prices.
    /// Names without a match are reported back instead of failing the call.
    #[instrument(skip_all, fields(names = names.len()))]
    pub async fn compare_places(
        &self,
        names: &[String],
        origin: Option<Coordinate>,
    ) -> Result<ComparisonOutcome> {
        let started = Instant::now();
        self.metrics.inc_request();
        let outcome = self.compare_names(names, origin).await;
        self.settle(started, outcome)
    }

    async fn route(
        &self,
        intent: &IntentResult,
        request: &ChatRequest,
        message: &str,
        locale: Locale,
    ) -> Result<ChatPayload, CoreError> {
        let entities = &intent.entities;
        let num_people = request.num_people.or(entities.num_people).unwrap_or(1);
        let origin = entity_origin(entities).or(request.origin);

        match intent.intent {
            Intent::SearchPlaces => {
                let query = RankQuery {
                    origin: Some(origin.unwrap_or(self.settings.default_origin)),
                    categories: categories_or_default(entities),
                    radius_meters: entities.radius_meters.unwrap_or(DEFAULT_RADIUS_METERS),
                    limit: SEARCH_LIMIT,
                    num_people,
                    ..RankQuery::default()
                };
                self.places(query).await
            }
            Intent::NearbyLandmark => {
                match entities.landmark_name.clone().or_else(|| extract_landmark(message)) {
                    Some(landmark) => {
                        let query = RankQuery {
                            landmark: Some(landmark),
                            categories: categories_or_default(entities),
                            radius_meters: entities.radius_meters.unwrap_or(LANDMARK_RADIUS_METERS),
                            limit: SEARCH_LIMIT,
                            num_people,
                            ..RankQuery::default()
                        };
                        self.places(query).await
                    }
                    None => {
                        self.semantic(description(entities, message), origin, num_people, SEMANTIC_LIMIT)
                            .await
                    }
                }
            }
            Intent::PlaceInfo => {
                let name = entities
                    .place_names
                    .first()
                    .cloned()
                    .or_else(|| entities.landmark_name.clone())
                    .unwrap_or_else(|| message.to_string());
                self.semantic(name, origin, num_people, PLACE_INFO_LIMIT).await
            }
            Intent::ComparePlaces => {
                let mut names = entities.place_names.clone();
                if names.len() < 2 {
                    names = extract_place_names(message);
                }
                if names.len() < 2 {
                    return Ok(ChatPayload::Clarification {
                        question: match locale {
                            Locale::Vi => "Bạn muốn so sánh những địa điểm nào? Hãy nêu ít nhất hai tên.",
                            Locale::En => "Which places would you like to compare? Please name at least two.",
                        }
                        .to_string(),
                    });
                }
                let outcome = self.compare_names(&names, origin).await?;
                Ok(ChatPayload::Comparison {
                    comparison: outcome.comparison,
                    places: outcome.places,
                    unresolved: outcome.unresolved,
                })
            }
            Intent::PlanItinerary => {
                let origin = match origin {
                    Some(origin) => origin,
                    None => self.trip_origin(entities).await,
                };
                let hours = entities.duration_hours.unwrap_or(DEFAULT_TRIP_HOURS);
                let request = ItineraryRequest {
                    budget_per_person: entities.budget_per_person,
                    interests: entities.interests.clone(),
                    num_people,
                    ..ItineraryRequest::new(origin, (hours * 60.0).round() as u32)
                };
                let plan = self.planner.plan_itinerary(request).await?;
                self.metrics.add_candidates(plan.stops.len());
                Ok(ChatPayload::Itinerary { plan })
            }
            Intent::RecommendPlaces => {
                let query = RankQuery {
                    origin,
                    categories: entities.categories.clone(),
                    text: Some(description(entities, message)),
                    limit: SEMANTIC_LIMIT,
                    num_people,
                    ..RankQuery::default()
                };
                self.places(query).await
            }
            Intent::SemanticSearch | Intent::Unknown => {
                self.semantic(description(entities, message), origin, num_people, SEMANTIC_LIMIT)
                    .await
            }
        }
    }

    async fn rank(&self, query: RankQuery) -> Result<RankedCandidateSet, CoreError> {
        let set = self.ranker.resolve_and_rank(query).await?;
        self.metrics.add_candidates(set.candidates.len());
        if set.is_degraded() {
            self.metrics.record_degraded(set.unavailable_sources.len());
        }
        Ok(set)
    }

    async fn places(&self, query: RankQuery) -> Result<ChatPayload, CoreError> {
        Ok(ChatPayload::Places {
            result: self.rank(query).await?,
        })
    }

    async fn semantic(
        &self,
        text: String,
        origin: Option<Coordinate>,
        num_people: u32,
        limit: usize,
    ) -> Result<ChatPayload, CoreError> {
        self.places(RankQuery {
            origin,
            text: Some(text),
            limit,
            num_people,
            ..RankQuery::default()
        })
        .await
    }

    async fn compare_names(
        &self,
        names: &[String],
        origin: Option<Coordinate>,
    ) -> Result<ComparisonOutcome, CoreError> {
        let mut seen = HashSet::new();
        let names = names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
            .collect::<Vec<_>>();

        let lookups = names.iter().map(|name| {
            self.rank(RankQuery {
                origin,
                text: Some(name.clone()),
                limit: 1,
                ..RankQuery::default()
            })
        });
        let resolved = join_all(lookups).await;

        let mut places = Vec::with_capacity(names.len());
        let mut unresolved = Vec::new();
        let mut ids = HashSet::new();
        for (name, outcome) in names.into_iter().zip(resolved) {
            match outcome?.candidates.into_iter().next() {
                Some(place) if ids.insert(place.place_id.clone()) => places.push(place),
                _ => unresolved.push(name),
            }
        }

        Ok(ComparisonOutcome {
            comparison: self.pricing.compare(&places),
            places,
            unresolved,
        })
    }

    /// Position of the named landmark or location, else the configured default.
    async fn trip_origin(&self, entities: &IntentEntities) -> Coordinate {
        let Some(name) = entities
            .landmark_name
            .as_deref()
            .or(entities.location.as_deref())
        else {
            return self.settings.default_origin;
        };

        let lookup = self.ranker.spatial().query_near_landmark(name, &[], 0.0, 0);
        match timeout(self.settings.source_timeout, lookup).await {
            Ok(Ok(found)) => found
                .landmark
                .map(|landmark| landmark.position)
                .unwrap_or(self.settings.default_origin),
            Ok(Err(error)) => {
                warn!(landmark = name, error = %error, "landmark lookup failed, using default origin");
                self.settings.default_origin
            }
            Err(_) => {
                warn!(landmark = name, "landmark lookup timed out, using default origin");
                self.settings.default_origin
            }
        }
    }

    async fn narrate(
        &self,
        intent: Intent,
        locale: Locale,
        message: &str,
        payload: &ChatPayload,
    ) -> (String, NarrativeSource) {
        let context = json!({
            "intent": intent.as_str(),
            "locale": locale.as_code(),
            "message": message,
            "payload": serde_json::to_value(payload).unwrap_or(Value::Null),
        });

        if let ChatPayload::Clarification { question } = payload {
            return (question.clone(), NarrativeSource::Fallback);
        }

        let prompt = narrative_prompt(intent, locale);
        match timeout(self.settings.narrative_timeout, self.narrator.generate(&prompt, &context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                return (text.trim().to_string(), NarrativeSource::Narrator);
            }
            Ok(Ok(_)) => warn!("narrator returned empty text"),
            Ok(Err(error)) => warn!(error = %error, "narrator failed"),
            Err(_) => warn!(
                timeout_ms = self.settings.narrative_timeout.as_millis() as u64,
                "narrator timed out"
            ),
        }

        self.metrics.inc_narrative_fallback();
        (self.fallback.render(&context), NarrativeSource::Fallback)
    }

    fn settle<T>(&self, started: Instant, outcome: Result<T, CoreError>) -> Result<T> {
        self.metrics.observe_latency(started.elapsed());
        outcome.map_err(|error| {
            self.metrics.inc_request_error();
            warn!(code = error.code(), error = %error, "request failed");
            error.into()
        })
    }
}

fn entity_origin(entities: &IntentEntities) -> Option<Coordinate> {
    match (entities.lat, entities.lon) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)).filter(Coordinate::is_valid),
        _ => None,
    }
}

fn categories_or_default(entities: &IntentEntities) -> Vec<String> {
    if entities.categories.is_empty() {
        DEFAULT_SEARCH_CATEGORIES.iter().map(|c| c.to_string()).collect()
    } else {
        entities.categories.clone()
    }
}

fn description(entities: &IntentEntities, message: &str) -> String {
    entities
        .query_description
        .clone()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| message.to_string())
}

fn narrative_prompt(intent: Intent, locale: Locale) -> String {
    let language = match locale {
        Locale::Vi => "Vietnamese",
        Locale::En => "English",
    };
    format!(
        "You are a Hanoi travel assistant. Reply in {language} in a few friendly sentences. \
         Use only the places, prices, distances and opening states in the context; \
         never invent places. Request type: {}.",
        intent.as_str()
    )
}
