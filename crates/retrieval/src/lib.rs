//! In-memory place catalog serving both index seams of the core.
//!
//! Spatial lookups are exact radius/category scans; semantic lookups blend
//! keyword overlap with embedding cosine similarity when a model is present.

mod catalog;
mod tokenize;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use wayfinder_core::{
    distance, Coordinate, IndexError, Landmark, LandmarkMatch, Place, SemanticHit, SemanticIndex,
    SpatialIndex,
};

pub use catalog::{load_records, CatalogRecord};
pub use tokenize::tokenize;

const KEYWORD_WEIGHT: f32 = 0.65;
const VECTOR_WEIGHT: f32 = 0.35;

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[derive(Debug, Clone)]
struct IndexedPlace {
    record: CatalogRecord,
    place: Place,
    categories: HashSet<String>,
    keywords: HashSet<String>,
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub places_loaded: usize,
    pub positioned: usize,
    pub vector_enabled: bool,
    pub embedding_model: Option<&'static str>,
}

#[derive(Clone)]
pub struct PlaceCatalog {
    entries: Vec<IndexedPlace>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl PlaceCatalog {
    pub fn from_path(
        path: impl AsRef<Path>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Result<Self> {
        let records = load_records(path.as_ref())?;
        Ok(Self::from_records(records, embedder))
    }

    pub fn from_records(
        records: Vec<CatalogRecord>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Self {
        let entries = records
            .into_iter()
            .map(|record| {
                let text = record.search_text();
                IndexedPlace {
                    place: record.to_place(),
                    categories: record
                        .categories
                        .iter()
                        .map(|category| category.trim().to_lowercase())
                        .collect(),
                    keywords: tokenize(&text).into_iter().collect(),
                    embedding: embedder.as_ref().map(|model| model.embed(&text)),
                    record,
                }
            })
            .collect();

        Self { entries, embedder }
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            places_loaded: self.entries.len(),
            positioned: self
                .entries
                .iter()
                .filter(|entry| entry.place.has_position)
                .count(),
            vector_enabled: self.embedder.is_some(),
            embedding_model: self.embedder.as_ref().map(|model| model.model_name()),
        }
    }

    /// Best positioned record whose Vietnamese or English name matches:
    /// exact first, then containment either way, shortest name winning.
    fn landmark_entry(&self, name: &str) -> Option<&IndexedPlace> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let names = |entry: &IndexedPlace| {
            std::iter::once(entry.record.name.to_lowercase())
                .chain(entry.record.name_en.as_ref().map(|value| value.to_lowercase()))
                .collect::<Vec<_>>()
        };
        let positioned = || self.entries.iter().filter(|entry| entry.place.has_position);

        positioned()
            .find(|entry| names(entry).iter().any(|value| *value == wanted))
            .or_else(|| {
                positioned()
                    .filter(|entry| {
                        names(entry)
                            .iter()
                            .any(|value| value.contains(&wanted) || wanted.contains(value.as_str()))
                    })
                    .min_by_key(|entry| entry.record.name.chars().count())
            })
    }

    /// Positioned places within `radius_meters` matching any category,
    /// nearest first.
    pub fn nearby(
        &self,
        origin: Coordinate,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<Place>, IndexError> {
        let wanted = categories
            .iter()
            .map(|category| category.trim().to_lowercase())
            .collect::<HashSet<_>>();

        let mut found = Vec::new();
        for entry in &self.entries {
            let Some(position) = entry.place.usable_position() else {
                continue;
            };
            if exclude == Some(entry.record.place_id.as_str())
                || entry.categories.is_disjoint(&wanted)
            {
                continue;
            }
            let meters = distance(origin, position).map_err(|error| IndexError::Query(error.to_string()))?;
            if meters <= radius_meters {
                let mut place = entry.place.clone();
                place.distance_meters = Some(meters);
                found.push(place);
            }
        }

        found.sort_by(|a, b| {
            a.distance_meters
                .partial_cmp(&b.distance_meters)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.place_id.cmp(&b.place_id))
        });
        found.truncate(limit);
        Ok(found)
    }

    pub fn search(&self, query: &str, top_k: usize, score_threshold: f32) -> Vec<SemanticHit> {
        let query_tokens = tokenize(query).into_iter().collect::<HashSet<_>>();
        let query_embedding = self.embedder.as_ref().map(|model| model.embed(query));

        let mut scored = self
            .entries
            .iter()
            .map(|entry| {
                let keyword_score = keyword_score(&query_tokens, &entry.keywords);
                let vector_score = match (&query_embedding, &entry.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e).max(0.0),
                    _ => 0.0,
                };

                let score = if query_embedding.is_some() {
                    (KEYWORD_WEIGHT * keyword_score) + (VECTOR_WEIGHT * vector_score)
                } else {
                    keyword_score
                };

                (score, entry)
            })
            .filter(|(score, _)| *score > 0.0 && *score >= score_threshold)
            .collect::<Vec<_>>();

        scored.sort_by(|(a, left), (b, right)| {
            b.partial_cmp(a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.record.place_id.cmp(&right.record.place_id))
        });

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| SemanticHit {
                place_id: entry.record.place_id.clone(),
                score: score.min(1.0),
                payload: entry.record.to_payload(),
            })
            .collect()
    }
}

impl SpatialIndex for PlaceCatalog {
    async fn query_by_category(
        &self,
        origin: Coordinate,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> Result<Vec<Place>, IndexError> {
        self.nearby(origin, categories, radius_meters, limit, None)
    }

    async fn query_near_landmark(
        &self,
        landmark: &str,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> Result<LandmarkMatch, IndexError> {
        let Some((entry, position)) = self
            .landmark_entry(landmark)
            .and_then(|entry| Some((entry, entry.place.usable_position()?)))
        else {
            return Ok(LandmarkMatch::default());
        };
        let places = self.nearby(
            position,
            categories,
            radius_meters,
            limit,
            Some(entry.record.place_id.as_str()),
        )?;

        Ok(LandmarkMatch {
            landmark: Some(Landmark {
                name: entry.record.name.clone(),
                address: entry.record.address.clone(),
                position,
            }),
            places,
        })
    }
}

impl SemanticIndex for PlaceCatalog {
    async fn query_similar(
        &self,
        text: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SemanticHit>, IndexError> {
        Ok(self.search(text, top_k, score_threshold))
    }
}

fn keyword_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens
        .iter()
        .filter(|token| doc_tokens.contains(*token))
        .count() as f32;

    overlap / query_tokens.len() as f32
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;

    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOAN_KIEM: Coordinate = Coordinate {
        lat: 21.0285,
        lon: 105.8542,
    };

    fn record(id: &str, name: &str, categories: &[&str], position: Option<(f64, f64)>) -> CatalogRecord {
        CatalogRecord {
            place_id: id.to_string(),
            osm_id: None,
            name: name.to_string(),
            name_en: None,
            address: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            lat: position.map(|(lat, _)| lat),
            lon: position.map(|(_, lon)| lon),
            opening_hours: None,
            price_info: None,
            summary: None,
        }
    }

    fn catalog() -> PlaceCatalog {
        let mut lake = record("lake", "Hồ Gươm", &["lake"], Some((21.0285, 105.8542)));
        lake.name_en = Some("Hoan Kiem Lake".to_string());
        let mut rooftop = record("c2", "Cafe Phố Cổ", &["cafe"], Some((21.0340, 105.8520)));
        rooftop.summary = Some("rooftop cafe with a view over the lake".to_string());
        let records = vec![
            lake,
            record("c1", "Cafe Giảng", &["Cafe"], Some((21.0339, 105.8531))),
            rooftop,
            record("r1", "Phở Thìn", &["restaurant"], Some((21.0178, 105.8546))),
            record("far", "Cafe Tây Hồ", &["cafe"], Some((21.0680, 105.8190))),
            record("ghost", "Cafe Không Địa Chỉ", &["cafe"], None),
        ];
        PlaceCatalog::from_records(records, None)
    }

    #[test]
    fn cosine_sanity() {
        let a = [1.0, 0.0, 1.0];
        let b = [1.0, 0.0, 1.0];
        assert!(cosine_similarity(&a, &b) > 0.99);
    }

    #[tokio::test]
    async fn category_query_is_radius_bounded_and_sorted() {
        let places = catalog()
            .query_by_category(HOAN_KIEM, &["cafe".to_string()], 2_000.0, 10)
            .await
            .unwrap();

        let ids = places.iter().map(|p| p.place_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["c1", "c2"]);
        assert!(places[0].distance_meters <= places[1].distance_meters);
    }

    #[tokio::test]
    async fn landmark_resolves_by_either_name_and_is_excluded() {
        let catalog = catalog();
        let found = catalog
            .query_near_landmark("hoan kiem lake", &["lake".to_string(), "cafe".to_string()], 1_000.0, 10)
            .await
            .unwrap();

        let landmark = found.landmark.unwrap();
        assert_eq!(landmark.name, "Hồ Gươm");
        assert!(found.places.iter().all(|place| place.place_id != "lake"));
        assert!(!found.places.is_empty());

        let missing = catalog
            .query_near_landmark("Atlantis", &["cafe".to_string()], 1_000.0, 10)
            .await
            .unwrap();
        assert!(missing.landmark.is_none());
        assert!(missing.places.is_empty());
    }

    #[tokio::test]
    async fn semantic_search_ranks_and_thresholds() {
        let hits = catalog()
            .query_similar("rooftop cafe view", 5, 0.3)
            .await
            .unwrap();

        assert_eq!(hits[0].place_id, "c2");
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(hits.iter().all(|hit| hit.score >= 0.3));
        assert!(hits.iter().any(|hit| hit.place_id == "ghost"));
        let ghost = hits.iter().find(|hit| hit.place_id == "ghost").unwrap();
        assert!(ghost.payload.lat.is_none());
    }

    #[test]
    fn stats_count_positions() {
        let stats = catalog().stats();
        assert_eq!(stats.places_loaded, 6);
        assert_eq!(stats.positioned, 5);
        assert!(!stats.vector_enabled);
    }
}
