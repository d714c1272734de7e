//! In-memory index doubles for unit tests.

use std::time::Duration;

use crate::error::IndexError;
use crate::index::{SemanticIndex, SpatialIndex};
use crate::models::{Coordinate, Landmark, LandmarkMatch, Place, SemanticHit, SemanticPayload};

pub(crate) const ORIGIN: Coordinate = Coordinate {
    lat: 21.0285,
    lon: 105.8542,
};

#[derive(Default)]
pub(crate) struct StubSpatial {
    pub places: Vec<Place>,
    pub landmark: Option<Landmark>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl SpatialIndex for StubSpatial {
    async fn query_by_category(
        &self,
        _origin: Coordinate,
        categories: &[String],
        _radius_meters: f64,
        limit: usize,
    ) -> Result<Vec<Place>, IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(IndexError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .places
            .iter()
            .filter(|place| place.categories.iter().any(|c| categories.contains(c)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn query_near_landmark(
        &self,
        _landmark: &str,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> Result<LandmarkMatch, IndexError> {
        let Some(landmark) = self.landmark.clone() else {
            return Ok(LandmarkMatch::default());
        };
        let places = self
            .query_by_category(landmark.position, categories, radius_meters, limit)
            .await?;
        Ok(LandmarkMatch {
            landmark: Some(landmark),
            places,
        })
    }
}

#[derive(Default)]
pub(crate) struct StubSemantic {
    pub hits: Vec<SemanticHit>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl SemanticIndex for StubSemantic {
    async fn query_similar(
        &self,
        _text: &str,
        top_k: usize,
        _score_threshold: f32,
    ) -> Result<Vec<SemanticHit>, IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(IndexError::Query("collection missing".to_string()));
        }
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

/// `steps` thousandths of a degree north of [`ORIGIN`], roughly 111 m each.
pub(crate) fn place_north(id: &str, category: &str, steps: u32) -> Place {
    Place::new(id, format!("{category} {id}"))
        .with_position(Coordinate::new(ORIGIN.lat + f64::from(steps) * 0.001, ORIGIN.lon))
        .with_categories([category])
}

pub(crate) fn hit(id: &str, score: f32) -> SemanticHit {
    SemanticHit {
        place_id: id.to_string(),
        score,
        payload: SemanticPayload {
            name: Some(format!("Semantic {id}")),
            summary: Some(format!("about {id}")),
            categories: vec!["cafe".to_string()],
            ..SemanticPayload::default()
        },
    }
}
