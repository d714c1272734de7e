//! Multi-source candidate fusion.
//!
//! A request fans out to the spatial and semantic indexes concurrently, merges
//! what comes back by `place_id`, enriches every survivor and only then orders
//! and truncates. One failing source degrades the ranking basis; losing every
//! requested source is an error.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tracing::{info, instrument, warn};

use crate::enrich::{EnrichmentContext, ResultEnricher};
use crate::error::{CoreError, IndexError};
use crate::index::{SemanticIndex, SpatialIndex};
use crate::models::{
    BlendWeights, CandidateSource, Coordinate, Landmark, Place, RankQuery, RankedCandidateSet,
    RankingBasis, SemanticHit,
};

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_millis(1_500);
pub const DEFAULT_CANDIDATE_POOL: usize = 50;
/// Hanoi local time.
pub const DEFAULT_UTC_OFFSET_SECONDS: i32 = 7 * 3_600;

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub score_threshold: f32,
    pub source_timeout: Duration,
    /// Minimum number of candidates fetched per source before ranking.
    pub candidate_pool: usize,
    pub blend: BlendWeights,
    pub utc_offset: FixedOffset,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            blend: BlendWeights::default(),
            utc_offset: offset_from_seconds(DEFAULT_UTC_OFFSET_SECONDS),
        }
    }
}

/// Falls back to UTC for out-of-range offsets.
pub fn offset_from_seconds(seconds: i32) -> FixedOffset {
    FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix())
}

struct SpatialBatch {
    places: Vec<Place>,
    landmark: Option<Landmark>,
}

pub struct FusionRanker<S, M> {
    spatial: S,
    semantic: M,
    enricher: ResultEnricher,
    config: FusionConfig,
}

impl<S, M> FusionRanker<S, M>
where
    S: SpatialIndex,
    M: SemanticIndex,
{
    pub fn new(spatial: S, semantic: M, enricher: ResultEnricher, config: FusionConfig) -> Self {
        Self {
            spatial,
            semantic,
            enricher,
            config,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn enricher(&self) -> &ResultEnricher {
        &self.enricher
    }

    pub fn spatial(&self) -> &S {
        &self.spatial
    }

    pub fn semantic(&self) -> &M {
        &self.semantic
    }

    #[instrument(skip_all, fields(limit = query.limit, categories = query.categories.len()))]
    pub async fn resolve_and_rank(&self, query: RankQuery) -> Result<RankedCandidateSet, CoreError> {
        if let Some(origin) = query.origin {
            if !origin.is_valid() {
                return Err(CoreError::InvalidCoordinate(format!(
                    "origin ({}, {}) is outside WGS84 bounds",
                    origin.lat, origin.lon
                )));
            }
        }

        let wants_spatial = query.has_spatial_filter();
        let text = query.semantic_text().map(str::to_string);
        let requested_basis = match (wants_spatial, text.is_some()) {
            (true, true) => RankingBasis::Blended,
            (true, false) => RankingBasis::Distance,
            (false, true) => RankingBasis::Similarity,
            (false, false) => return Err(CoreError::EmptyQuery),
        };

        let limit = query.limit.max(1);
        let pool = limit.max(self.config.candidate_pool);
        let threshold = query
            .score_threshold
            .into_iter()
            .chain([self.config.score_threshold])
            .find(|value| value.is_finite())
            .unwrap_or(DEFAULT_SCORE_THRESHOLD)
            .clamp(0.0, 1.0);
        let categories = normalized_categories(&query.categories);

        let spatial_call = async {
            if wants_spatial {
                Some(self.collect_spatial(&query, &categories, pool).await)
            } else {
                None
            }
        };
        let semantic_call = async {
            match text.as_deref() {
                Some(text) => Some(self.collect_semantic(text, pool, threshold).await),
                None => None,
            }
        };
        let (spatial_outcome, semantic_outcome) = tokio::join!(spatial_call, semantic_call);

        let mut unavailable_sources = Vec::new();
        let mut causes = Vec::new();
        let spatial_batch = settle(
            spatial_outcome,
            CandidateSource::Spatial,
            &mut unavailable_sources,
            &mut causes,
        );
        let semantic_hits = settle(
            semantic_outcome,
            CandidateSource::Semantic,
            &mut unavailable_sources,
            &mut causes,
        );

        let basis = match (&spatial_batch, &semantic_hits) {
            (Some(_), Some(_)) => RankingBasis::Blended,
            (Some(_), None) => RankingBasis::Distance,
            (None, Some(_)) => RankingBasis::Similarity,
            (None, None) => return Err(CoreError::AllSourcesUnavailable(causes)),
        };

        let (spatial_places, landmark) = match spatial_batch {
            Some(batch) => (batch.places, batch.landmark),
            None => (Vec::new(), None),
        };
        let origin = query
            .origin
            .or_else(|| landmark.as_ref().map(|landmark| landmark.position));

        let merged = merge_candidates(spatial_places, semantic_hits.unwrap_or_default());
        let context = EnrichmentContext {
            origin,
            num_people: query.num_people.max(1),
            mode: query.mode,
            reference_time: query
                .reference_time
                .unwrap_or_else(|| Utc::now().with_timezone(&self.config.utc_offset)),
        };
        let mut candidates = self.enricher.enrich_all(merged, &context);

        let weights = query.blend.unwrap_or(self.config.blend).sanitized();
        rank_candidates(&mut candidates, basis, weights);

        let total_before_limit = candidates.len();
        candidates.truncate(limit);

        info!(
            requested_basis = ?requested_basis,
            basis = ?basis,
            degraded = !unavailable_sources.is_empty(),
            total_before_limit,
            returned = candidates.len(),
            "candidates ranked"
        );

        Ok(RankedCandidateSet {
            candidates,
            basis,
            requested_basis,
            unavailable_sources,
            total_before_limit,
            landmark,
        })
    }

    async fn collect_spatial(
        &self,
        query: &RankQuery,
        categories: &[String],
        pool: usize,
    ) -> Result<SpatialBatch, IndexError> {
        tokio::time::timeout(
            self.config.source_timeout,
            self.query_spatial(query, categories, pool),
        )
        .await
        .map_err(|_| IndexError::Timeout(timeout_millis(self.config.source_timeout)))?
    }

    async fn query_spatial(
        &self,
        query: &RankQuery,
        categories: &[String],
        pool: usize,
    ) -> Result<SpatialBatch, IndexError> {
        match (query.origin, query.landmark.as_deref()) {
            (Some(origin), _) => {
                let places = self
                    .spatial
                    .query_by_category(origin, categories, query.radius_meters, pool)
                    .await?;
                Ok(SpatialBatch {
                    places,
                    landmark: None,
                })
            }
            (None, Some(name)) => {
                let found = self
                    .spatial
                    .query_near_landmark(name.trim(), categories, query.radius_meters, pool)
                    .await?;
                Ok(SpatialBatch {
                    places: found.places,
                    landmark: found.landmark,
                })
            }
            (None, None) => Ok(SpatialBatch {
                places: Vec::new(),
                landmark: None,
            }),
        }
    }

    async fn collect_semantic(
        &self,
        text: &str,
        pool: usize,
        threshold: f32,
    ) -> Result<Vec<SemanticHit>, IndexError> {
        let hits = tokio::time::timeout(
            self.config.source_timeout,
            self.semantic.query_similar(text, pool, threshold),
        )
        .await
        .map_err(|_| IndexError::Timeout(timeout_millis(self.config.source_timeout)))??;

        Ok(hits
            .into_iter()
            .filter(|hit| hit.score.is_finite() && hit.score >= threshold)
            .collect())
    }
}

fn settle<T>(
    outcome: Option<Result<T, IndexError>>,
    source: CandidateSource,
    unavailable: &mut Vec<CandidateSource>,
    causes: &mut Vec<String>,
) -> Option<T> {
    match outcome? {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(source = source.as_str(), %error, "candidate source failed; ranking degraded");
            unavailable.push(source);
            causes.push(format!("{}: {error}", source.as_str()));
            None
        }
    }
}

fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

fn normalized_categories(categories: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    categories
        .iter()
        .map(|category| category.trim().to_lowercase())
        .filter(|category| !category.is_empty())
        .filter(|category| seen.insert(category.clone()))
        .collect()
}

/// Spatial candidates come first and own the structured fields; semantic hits
/// contribute score, summary and whatever the spatial record lacks.
fn merge_candidates(spatial: Vec<Place>, mut hits: Vec<SemanticHit>) -> Vec<Place> {
    let mut merged: Vec<Place> = Vec::with_capacity(spatial.len() + hits.len());
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for mut place in spatial {
        place.set_position(place.position);
        if !place.has_position || by_id.contains_key(&place.place_id) {
            continue;
        }
        place.similarity_score = None;
        by_id.insert(place.place_id.clone(), merged.len());
        merged.push(place);
    }

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut seen_hits = HashSet::new();
    for hit in hits {
        if !seen_hits.insert(hit.place_id.clone()) {
            continue;
        }
        match by_id.get(&hit.place_id) {
            Some(&index) => absorb_hit(&mut merged[index], hit),
            None => {
                by_id.insert(hit.place_id.clone(), merged.len());
                merged.push(place_from_hit(hit));
            }
        }
    }

    merged
}

fn absorb_hit(place: &mut Place, hit: SemanticHit) {
    let payload = hit.payload;
    place.similarity_score = Some(hit.score);
    if payload.summary.is_some() {
        place.summary_text = payload.summary;
    }
    if place.name_en.is_none() {
        place.name_en = payload.name_en;
    }
    if place.osm_id.is_none() {
        place.osm_id = payload.osm_id;
    }
    if !place.has_position {
        if let (Some(lat), Some(lon)) = (payload.lat, payload.lon) {
            place.set_position(Some(Coordinate::new(lat, lon)));
        }
    }
}

fn place_from_hit(hit: SemanticHit) -> Place {
    let payload = hit.payload;
    let mut place = Place {
        name: payload
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| hit.place_id.clone()),
        place_id: hit.place_id,
        osm_id: payload.osm_id,
        name_en: payload.name_en,
        address: payload.address,
        categories: payload.categories,
        opening_hours: payload.opening_hours,
        price_info: payload.price_info,
        similarity_score: Some(hit.score),
        summary_text: payload.summary,
        ..Place::default()
    };
    let position = match (payload.lat, payload.lon) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
        _ => None,
    };
    place.set_position(position);
    place
}

fn rank_candidates(candidates: &mut [Place], basis: RankingBasis, weights: BlendWeights) {
    match basis {
        RankingBasis::Distance => {
            let distances = candidates
                .iter()
                .map(|place| place.distance_meters)
                .collect::<Vec<_>>();
            let scores = normalized_ranks(&distances, false);
            for (place, score) in candidates.iter_mut().zip(scores) {
                place.relevance_score = Some(score.unwrap_or(0.0));
            }
            candidates.sort_by(|a, b| {
                compare_missing_last(a.distance_meters, b.distance_meters, false)
                    .then_with(|| a.place_id.cmp(&b.place_id))
            });
        }
        RankingBasis::Similarity => {
            for place in candidates.iter_mut() {
                place.relevance_score = Some(place.similarity_score.map_or(0.0, f64::from));
            }
            candidates.sort_by(|a, b| {
                compare_missing_last(
                    a.similarity_score.map(f64::from),
                    b.similarity_score.map(f64::from),
                    true,
                )
                .then_with(|| a.place_id.cmp(&b.place_id))
            });
        }
        RankingBasis::Blended => {
            let distances = candidates
                .iter()
                .map(|place| place.distance_meters)
                .collect::<Vec<_>>();
            let similarities = candidates
                .iter()
                .map(|place| place.similarity_score.map(f64::from))
                .collect::<Vec<_>>();
            let distance_scores = normalized_ranks(&distances, false);
            let similarity_scores = normalized_ranks(&similarities, true);

            for (index, place) in candidates.iter_mut().enumerate() {
                place.relevance_score = Some(blend(
                    distance_scores[index],
                    similarity_scores[index],
                    weights,
                ));
            }
            candidates.sort_by(|a, b| {
                compare_missing_last(a.relevance_score, b.relevance_score, true)
                    .then_with(|| a.place_id.cmp(&b.place_id))
            });
        }
    }
}

/// Weighted mean over the components that are present.
fn blend(distance: Option<f64>, similarity: Option<f64>, weights: BlendWeights) -> f64 {
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    if let Some(score) = distance {
        weighted += score * weights.distance;
        weight_total += weights.distance;
    }
    if let Some(score) = similarity {
        weighted += score * weights.similarity;
        weight_total += weights.similarity;
    }

    if weight_total > 0.0 {
        weighted / weight_total
    } else {
        0.0
    }
}

/// Competition ranking mapped onto `[0, 1]`, best = 1. Missing values stay missing.
fn normalized_ranks(values: &[Option<f64>], higher_is_better: bool) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied().collect::<Vec<_>>();
    let count = present.len();

    values
        .iter()
        .map(|value| {
            value.map(|value| {
                if count <= 1 {
                    return 1.0;
                }
                let better = present
                    .iter()
                    .filter(|other| {
                        if higher_is_better {
                            **other > value
                        } else {
                            **other < value
                        }
                    })
                    .count();
                (count - 1 - better) as f64 / (count - 1) as f64
            })
        })
        .collect()
}

fn compare_missing_last(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.total_cmp(&a),
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::geo::MapLinks;
    use crate::pricing::PriceEstimator;
    use crate::testing::{hit, place_north, StubSemantic, StubSpatial, ORIGIN};

    fn cafe(id: &str, steps: u32) -> Place {
        place_north(id, "cafe", steps)
    }

    fn ranker(spatial: StubSpatial, semantic: StubSemantic) -> FusionRanker<StubSpatial, StubSemantic> {
        let enricher = ResultEnricher::new(Arc::new(PriceEstimator::default()), MapLinks::default());
        let config = FusionConfig {
            source_timeout: Duration::from_millis(50),
            ..FusionConfig::default()
        };
        FusionRanker::new(spatial, semantic, enricher, config)
    }

    fn combined_query() -> RankQuery {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        RankQuery {
            text: Some("quiet coffee".to_string()),
            reference_time: Some(offset.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap()),
            ..RankQuery::spatial(ORIGIN, ["cafe"])
        }
    }

    fn ids(set: &RankedCandidateSet) -> Vec<&str> {
        set.candidates
            .iter()
            .map(|place| place.place_id.as_str())
            .collect()
    }

    #[tokio::test]
    async fn neither_filter_nor_text_is_empty_query() {
        let ranker = ranker(StubSpatial::default(), StubSemantic::default());
        let query = RankQuery {
            origin: Some(ORIGIN),
            text: Some("   ".to_string()),
            ..RankQuery::default()
        };
        assert_eq!(ranker.resolve_and_rank(query).await.unwrap_err(), CoreError::EmptyQuery);
    }

    #[tokio::test]
    async fn out_of_range_origin_is_rejected() {
        let ranker = ranker(StubSpatial::default(), StubSemantic::default());
        let query = RankQuery::spatial(Coordinate::new(120.0, 105.0), ["cafe"]);
        let error = ranker.resolve_and_rank(query).await.unwrap_err();
        assert!(matches!(error, CoreError::InvalidCoordinate(_)));
    }

    #[tokio::test]
    async fn spatial_only_orders_by_distance_then_id() {
        let spatial = StubSpatial {
            places: vec![cafe("c", 3), cafe("b", 1), cafe("a", 1), cafe("d", 8)],
            ..StubSpatial::default()
        };
        let set = ranker(spatial, StubSemantic::default())
            .resolve_and_rank(RankQuery::spatial(ORIGIN, ["Cafe"]))
            .await
            .unwrap();

        assert_eq!(set.basis, RankingBasis::Distance);
        assert_eq!(ids(&set), ["a", "b", "c", "d"]);
        let distances = set
            .candidates
            .iter()
            .map(|place| place.distance_meters.unwrap())
            .collect::<Vec<_>>();
        assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(set.candidates.iter().all(|place| place.similarity_score.is_none()));
        assert!(set.candidates.iter().all(|place| place.relevance_score.is_some()));
        assert_eq!(set.candidates[0].relevance_score, Some(1.0));
    }

    #[tokio::test]
    async fn semantic_only_applies_threshold_and_order() {
        let semantic = StubSemantic {
            hits: vec![hit("x", 0.91), hit("y", 0.55), hit("w", 0.55), hit("z", 0.12)],
            ..StubSemantic::default()
        };
        let set = ranker(StubSpatial::default(), semantic)
            .resolve_and_rank(RankQuery::semantic("rooftop bar with a view"))
            .await
            .unwrap();

        assert_eq!(set.basis, RankingBasis::Similarity);
        assert_eq!(ids(&set), ["x", "w", "y"]);
        assert!(set
            .candidates
            .iter()
            .all(|place| place.similarity_score.unwrap() >= DEFAULT_SCORE_THRESHOLD));
        assert!(set.candidates.iter().all(|place| !place.has_position));

        let strict = RankQuery {
            score_threshold: Some(0.9),
            ..RankQuery::semantic("rooftop bar with a view")
        };
        let semantic = StubSemantic {
            hits: vec![hit("x", 0.91), hit("y", 0.55)],
            ..StubSemantic::default()
        };
        let set = ranker(StubSpatial::default(), semantic)
            .resolve_and_rank(strict)
            .await
            .unwrap();
        assert_eq!(ids(&set), ["x"]);
    }

    #[tokio::test]
    async fn non_finite_configured_threshold_uses_default() {
        let semantic = StubSemantic {
            hits: vec![hit("x", 0.91), hit("z", 0.12)],
            ..StubSemantic::default()
        };
        let enricher = ResultEnricher::new(Arc::new(PriceEstimator::default()), MapLinks::default());
        let config = FusionConfig {
            score_threshold: f32::NAN,
            ..FusionConfig::default()
        };
        let set = FusionRanker::new(StubSpatial::default(), semantic, enricher, config)
            .resolve_and_rank(RankQuery::semantic("rooftop bar"))
            .await
            .unwrap();
        assert_eq!(ids(&set), ["x"]);
    }

    #[tokio::test]
    async fn duplicates_merge_with_spatial_fields_winning() {
        let mut spatial_record = cafe("p1", 2);
        spatial_record.address = Some("12 Hàng Bạc".to_string());
        let spatial = StubSpatial {
            places: vec![spatial_record],
            ..StubSpatial::default()
        };
        let mut semantic_hit = hit("p1", 0.8);
        semantic_hit.payload.address = Some("somewhere else".to_string());
        semantic_hit.payload.name_en = Some("Cafe One".to_string());
        let semantic = StubSemantic {
            hits: vec![semantic_hit, hit("p1", 0.4)],
            ..StubSemantic::default()
        };

        let set = ranker(spatial, semantic)
            .resolve_and_rank(combined_query())
            .await
            .unwrap();

        assert_eq!(set.candidates.len(), 1);
        let place = &set.candidates[0];
        assert_eq!(place.name, "cafe p1");
        assert_eq!(place.address.as_deref(), Some("12 Hàng Bạc"));
        assert_eq!(place.name_en.as_deref(), Some("Cafe One"));
        assert_eq!(place.similarity_score, Some(0.8));
        assert_eq!(place.summary_text.as_deref(), Some("about p1"));
        assert!(place.distance_meters.is_some());
    }

    #[tokio::test]
    async fn blended_rank_ignores_missing_components() {
        let spatial = StubSpatial {
            places: vec![cafe("a", 1), cafe("b", 5), cafe("c", 9)],
            ..StubSpatial::default()
        };
        let semantic = StubSemantic {
            hits: vec![hit("c", 0.9), hit("d", 0.8), hit("b", 0.6)],
            ..StubSemantic::default()
        };

        let set = ranker(spatial, semantic)
            .resolve_and_rank(combined_query())
            .await
            .unwrap();

        // a: distance 1.0 only; c: (0 + 1) / 2; d: similarity 0.5 only; b: (0.5 + 0) / 2
        assert_eq!(set.basis, RankingBasis::Blended);
        assert_eq!(ids(&set), ["a", "c", "d", "b"]);
        let scores = set
            .candidates
            .iter()
            .map(|place| place.relevance_score.unwrap())
            .collect::<Vec<_>>();
        assert_eq!(scores, [1.0, 0.5, 0.5, 0.25]);
    }

    #[tokio::test]
    async fn request_weights_bias_the_blend() {
        let spatial = StubSpatial {
            places: vec![cafe("a", 1), cafe("c", 9)],
            ..StubSpatial::default()
        };
        let semantic = StubSemantic {
            hits: vec![hit("c", 0.9), hit("a", 0.35)],
            ..StubSemantic::default()
        };
        let query = RankQuery {
            blend: Some(BlendWeights {
                distance: 0.2,
                similarity: 0.8,
            }),
            ..combined_query()
        };

        let set = ranker(spatial, semantic).resolve_and_rank(query).await.unwrap();
        assert_eq!(ids(&set), ["c", "a"]);
    }

    #[tokio::test]
    async fn limit_applies_after_ranking() {
        let spatial = StubSpatial {
            places: vec![cafe("far", 9), cafe("near", 1)],
            ..StubSpatial::default()
        };
        let query = RankQuery {
            limit: 1,
            ..RankQuery::spatial(ORIGIN, ["cafe"])
        };
        let set = ranker(spatial, StubSemantic::default())
            .resolve_and_rank(query)
            .await
            .unwrap();
        assert_eq!(ids(&set), ["near"]);
        assert_eq!(set.total_before_limit, 2);
    }

    #[tokio::test]
    async fn failed_semantic_source_degrades_to_distance() {
        let spatial = StubSpatial {
            places: vec![cafe("a", 2), cafe("b", 1)],
            ..StubSpatial::default()
        };
        let semantic = StubSemantic {
            fail: true,
            ..StubSemantic::default()
        };

        let set = ranker(spatial, semantic)
            .resolve_and_rank(combined_query())
            .await
            .unwrap();
        assert_eq!(set.requested_basis, RankingBasis::Blended);
        assert_eq!(set.basis, RankingBasis::Distance);
        assert_eq!(set.unavailable_sources, [CandidateSource::Semantic]);
        assert!(set.is_degraded());
        assert_eq!(ids(&set), ["b", "a"]);
    }

    #[tokio::test]
    async fn slow_spatial_source_times_out_without_blocking_semantic() {
        let spatial = StubSpatial {
            places: vec![cafe("a", 1)],
            delay: Some(Duration::from_millis(500)),
            ..StubSpatial::default()
        };
        let semantic = StubSemantic {
            hits: vec![hit("s", 0.7)],
            ..StubSemantic::default()
        };

        let set = ranker(spatial, semantic)
            .resolve_and_rank(combined_query())
            .await
            .unwrap();
        assert_eq!(set.basis, RankingBasis::Similarity);
        assert_eq!(set.unavailable_sources, [CandidateSource::Spatial]);
        assert_eq!(ids(&set), ["s"]);
    }

    #[tokio::test]
    async fn every_source_failing_is_an_error() {
        let spatial = StubSpatial {
            fail: true,
            ..StubSpatial::default()
        };
        let semantic = StubSemantic {
            delay: Some(Duration::from_millis(500)),
            ..StubSemantic::default()
        };

        let error = ranker(spatial, semantic)
            .resolve_and_rank(combined_query())
            .await
            .unwrap_err();
        match error {
            CoreError::AllSourcesUnavailable(causes) => {
                assert_eq!(causes.len(), 2);
                assert!(causes[0].starts_with("spatial"));
                assert!(causes[1].contains("timed out"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn landmark_position_becomes_origin() {
        let landmark = Landmark {
            name: "Hồ Gươm".to_string(),
            address: None,
            position: ORIGIN,
        };
        let spatial = StubSpatial {
            places: vec![cafe("a", 4)],
            landmark: Some(landmark.clone()),
            ..StubSpatial::default()
        };
        let query = RankQuery {
            landmark: Some("Hồ Gươm".to_string()),
            categories: vec!["cafe".to_string()],
            ..RankQuery::default()
        };

        let set = ranker(spatial, StubSemantic::default())
            .resolve_and_rank(query)
            .await
            .unwrap();
        assert_eq!(set.landmark, Some(landmark));
        let meters = set.candidates[0].distance_meters.unwrap();
        assert!((meters - 444.78).abs() < 1.0, "got {meters}");
    }
}
