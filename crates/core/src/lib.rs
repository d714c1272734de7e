pub mod availability;
pub mod enrich;
pub mod error;
pub mod fusion;
pub mod geo;
pub mod index;
pub mod intent;
pub mod itinerary;
pub mod models;
pub mod pricing;

#[cfg(test)]
pub(crate) mod testing;

pub use availability::{is_open_at, DailyInterval, DaySlot, OpeningSchedule};
pub use enrich::{EnrichmentContext, ResultEnricher};
pub use error::{CoreError, IndexError, NarrativeError};
pub use fusion::{FusionConfig, FusionRanker};
pub use geo::{build_route, distance, estimate_travel_time, suggest_mode, MapLinks};
pub use index::{NarrativeGenerator, SemanticIndex, SpatialIndex};
pub use intent::{
    classify_intent_rules, detect_locale, normalize_text, parse_classifier_output,
    semantic_fallback, Intent, IntentEntities, IntentResult, Locale,
};
pub use itinerary::{ItineraryConfig, ItineraryPlanner};
pub use models::*;
pub use pricing::{CategoryPriceProfile, PriceEstimator};
