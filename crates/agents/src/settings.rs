use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use wayfinder_core::fusion::{
    offset_from_seconds, DEFAULT_CANDIDATE_POOL, DEFAULT_SCORE_THRESHOLD, DEFAULT_UTC_OFFSET_SECONDS,
};
use wayfinder_core::geo::DEFAULT_MAPS_BASE_URL;
use wayfinder_core::itinerary::{DEFAULT_DWELL_MINUTES, DEFAULT_MAX_STOPS};
use wayfinder_core::pricing::DEFAULT_TRANSPORT_BUDGET;
use wayfinder_core::{
    BlendWeights, CategoryPriceProfile, Coordinate, FusionConfig, ItineraryConfig, MapLinks,
    PriceEstimator,
};

/// Hoàn Kiếm, the usual starting point when a message names no location.
pub const DEFAULT_ORIGIN: Coordinate = Coordinate {
    lat: 21.0285,
    lon: 105.8542,
};

/// Process-wide settings, read once from `WAYFINDER_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantSettings {
    pub bind: String,
    pub api_key: String,
    pub catalog_path: PathBuf,
    pub price_profile_path: Option<PathBuf>,
    pub maps_base_url: String,
    pub source_timeout: Duration,
    pub narrative_timeout: Duration,
    pub score_threshold: f32,
    pub candidate_pool: usize,
    pub blend: BlendWeights,
    pub utc_offset_seconds: i32,
    pub default_origin: Coordinate,
    pub embedding_dims: usize,
    pub max_stops: usize,
    pub dwell_minutes: u32,
    pub include_transport: bool,
    pub transport_budget: u64,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub max_body_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AssistantSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let millis = |key: &str, default: u64| {
            Duration::from_millis(
                text(key)
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(default),
            )
        };

        let default_blend = BlendWeights::default();
        let blend = BlendWeights {
            distance: parse_or(text("WAYFINDER_BLEND_DISTANCE"), default_blend.distance),
            similarity: parse_or(text("WAYFINDER_BLEND_SIMILARITY"), default_blend.similarity),
        }
        .sanitized();

        let origin = Coordinate::new(
            parse_or(text("WAYFINDER_DEFAULT_LAT"), DEFAULT_ORIGIN.lat),
            parse_or(text("WAYFINDER_DEFAULT_LON"), DEFAULT_ORIGIN.lon),
        );

        Self {
            bind: text("WAYFINDER_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            api_key: text("WAYFINDER_API_KEY").unwrap_or_else(|| "dev-wayfinder-key".to_string()),
            catalog_path: text("WAYFINDER_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/catalog")),
            price_profile_path: text("WAYFINDER_PRICE_PROFILE").map(PathBuf::from),
            maps_base_url: text("WAYFINDER_MAPS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MAPS_BASE_URL.to_string()),
            source_timeout: millis("WAYFINDER_SOURCE_TIMEOUT_MS", 1_500),
            narrative_timeout: millis("WAYFINDER_NARRATIVE_TIMEOUT_MS", 3_000),
            score_threshold: text("WAYFINDER_SCORE_THRESHOLD")
                .and_then(|value| value.parse::<f32>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(DEFAULT_SCORE_THRESHOLD)
                .clamp(0.0, 1.0),
            candidate_pool: parse_or(text("WAYFINDER_CANDIDATE_POOL"), DEFAULT_CANDIDATE_POOL).max(1),
            blend,
            utc_offset_seconds: parse_or(
                text("WAYFINDER_UTC_OFFSET_SECONDS"),
                DEFAULT_UTC_OFFSET_SECONDS,
            ),
            default_origin: if origin.is_valid() {
                origin
            } else {
                DEFAULT_ORIGIN
            },
            embedding_dims: parse_or(text("WAYFINDER_EMBEDDING_DIMS"), 192),
            max_stops: parse_or(text("WAYFINDER_MAX_STOPS"), DEFAULT_MAX_STOPS).max(1),
            dwell_minutes: parse_or(text("WAYFINDER_DWELL_MINUTES"), DEFAULT_DWELL_MINUTES),
            include_transport: parse_or(text("WAYFINDER_INCLUDE_TRANSPORT"), false),
            transport_budget: parse_or(text("WAYFINDER_TRANSPORT_BUDGET"), DEFAULT_TRANSPORT_BUDGET),
            rate_limit_window: Duration::from_secs(parse_or(
                text("WAYFINDER_RATE_LIMIT_WINDOW_SECONDS"),
                60,
            )),
            rate_limit_max: parse_or(text("WAYFINDER_RATE_LIMIT_MAX"), 120),
            max_body_bytes: parse_or(text("WAYFINDER_MAX_BODY_BYTES"), 64 * 1024),
            allowed_origins: text("WAYFINDER_ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn fusion_config(&self) -> FusionConfig {
        FusionConfig {
            score_threshold: self.score_threshold,
            source_timeout: self.source_timeout,
            candidate_pool: self.candidate_pool,
            blend: self.blend,
            utc_offset: offset_from_seconds(self.utc_offset_seconds),
        }
    }

    pub fn itinerary_config(&self) -> ItineraryConfig {
        ItineraryConfig {
            max_stops: self.max_stops,
            dwell_minutes: self.dwell_minutes,
            include_transport: self.include_transport,
            transport_budget: self.transport_budget,
            ..ItineraryConfig::default()
        }
    }

    pub fn map_links(&self) -> MapLinks {
        MapLinks::new(self.maps_base_url.clone())
    }

    /// Built-in profile unless a JSON profile file is configured.
    pub fn load_pricing(&self) -> Result<PriceEstimator> {
        let Some(path) = &self.price_profile_path else {
            return Ok(PriceEstimator::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading price profile {}", path.display()))?;
        let profile = CategoryPriceProfile::from_json(&raw)
            .with_context(|| format!("invalid price profile {}", path.display()))?;
        Ok(PriceEstimator::new(profile))
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|value| value.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> AssistantSettings {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        AssistantSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let settings = AssistantSettings::default();
        assert_eq!(settings.bind, "0.0.0.0:8080");
        assert_eq!(settings.source_timeout, Duration::from_millis(1_500));
        assert_eq!(settings.blend, BlendWeights::default());
        assert_eq!(settings.default_origin, DEFAULT_ORIGIN);
        assert_eq!(settings.fusion_config().utc_offset.local_minus_utc(), 7 * 3_600);
        assert!(!settings.itinerary_config().include_transport);
    }

    #[test]
    fn overrides_and_bad_values() {
        let settings = settings(&[
            ("WAYFINDER_SOURCE_TIMEOUT_MS", "250"),
            ("WAYFINDER_BLEND_DISTANCE", "0.2"),
            ("WAYFINDER_BLEND_SIMILARITY", "0.8"),
            ("WAYFINDER_SCORE_THRESHOLD", "not-a-number"),
            ("WAYFINDER_DEFAULT_LAT", "120"),
            ("WAYFINDER_INCLUDE_TRANSPORT", "true"),
            ("WAYFINDER_CATALOG_PATH", "  "),
            ("WAYFINDER_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ]);

        assert_eq!(settings.source_timeout, Duration::from_millis(250));
        assert_eq!(settings.blend.distance, 0.2);
        assert_eq!(settings.score_threshold, DEFAULT_SCORE_THRESHOLD);
        assert_eq!(settings.default_origin, DEFAULT_ORIGIN);
        assert!(settings.itinerary_config().include_transport);
        assert_eq!(settings.catalog_path, PathBuf::from("data/catalog"));
        assert_eq!(
            settings.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn non_finite_threshold_uses_default() {
        for raw in ["NaN", "inf", "-inf"] {
            let settings = settings(&[("WAYFINDER_SCORE_THRESHOLD", raw)]);
            assert_eq!(settings.score_threshold, DEFAULT_SCORE_THRESHOLD);
        }
        let settings = settings(&[("WAYFINDER_SCORE_THRESHOLD", "1.7")]);
        assert_eq!(settings.score_threshold, 1.0);
    }

    #[test]
    fn missing_price_profile_is_an_error() {
        let settings = settings(&[("WAYFINDER_PRICE_PROFILE", "/nonexistent/prices.json")]);
        let error = settings.load_pricing().unwrap_err();
        assert!(format!("{error:#}").contains("prices.json"));
    }
}
