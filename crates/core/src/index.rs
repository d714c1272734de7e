//! Collaborator seams consumed by the core.
//!
//! Implementations may be written with `async fn`; the returned futures must be
//! `Send` so rankers can run on a multi-threaded runtime.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{IndexError, NarrativeError};
use crate::models::{Coordinate, LandmarkMatch, Place, SemanticHit};

/// Exact point-radius category lookups. Results are sorted by ascending
/// distance and match any of the given categories.
pub trait SpatialIndex: Send + Sync {
    fn query_by_category(
        &self,
        origin: Coordinate,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Place>, IndexError>> + Send;

    fn query_near_landmark(
        &self,
        landmark: &str,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> impl Future<Output = Result<LandmarkMatch, IndexError>> + Send;
}

/// Approximate text relevance. Hits are sorted by descending score.
pub trait SemanticIndex: Send + Sync {
    fn query_similar(
        &self,
        text: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> impl Future<Output = Result<Vec<SemanticHit>, IndexError>> + Send;
}

/// Best-effort prose from a prompt and a structured context.
pub trait NarrativeGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        context: &Value,
    ) -> impl Future<Output = Result<String, NarrativeError>> + Send;
}

impl<T: SpatialIndex> SpatialIndex for Arc<T> {
    fn query_by_category(
        &self,
        origin: Coordinate,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Place>, IndexError>> + Send {
        self.as_ref()
            .query_by_category(origin, categories, radius_meters, limit)
    }

    fn query_near_landmark(
        &self,
        landmark: &str,
        categories: &[String],
        radius_meters: f64,
        limit: usize,
    ) -> impl Future<Output = Result<LandmarkMatch, IndexError>> + Send {
        self.as_ref()
            .query_near_landmark(landmark, categories, radius_meters, limit)
    }
}

impl<T: SemanticIndex> SemanticIndex for Arc<T> {
    fn query_similar(
        &self,
        text: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> impl Future<Output = Result<Vec<SemanticHit>, IndexError>> + Send {
        self.as_ref().query_similar(text, top_k, score_threshold)
    }
}

impl<T: NarrativeGenerator> NarrativeGenerator for Arc<T> {
    fn generate(
        &self,
        prompt: &str,
        context: &Value,
    ) -> impl Future<Output = Result<String, NarrativeError>> + Send {
        self.as_ref().generate(prompt, context)
    }
}
