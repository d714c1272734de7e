mod embedding;

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;
use wayfinder_core::intent::DEFAULT_MIN_CONFIDENCE;
use wayfinder_core::{
    classify_intent_rules, detect_locale, parse_classifier_output, IntentResult, NarrativeGenerator,
};
use wayfinder_retrieval::EmbeddingModel;

pub use embedding::HashEmbeddingModel;

/// Instruction handed to a generator acting as intent classifier.
pub const CLASSIFIER_PROMPT: &str = "Classify the traveller message into one intent: \
search_places, nearby_landmark, semantic_search, place_info, compare_places, \
plan_itinerary, recommend_places. Reply with JSON only: \
{\"intent\": string, \"confidence\": number, \"entities\": {\"categories\": [string], \
\"landmark_name\": string|null, \"place_names\": [string], \"location\": string|null, \
\"preferences\": {\"companions\": string|null, \"interests\": [string]}, \
\"duration_hours\": number|null, \"query_description\": string|null, \
\"lat\": number|null, \"lon\": number|null, \"radius_meters\": number|null, \
\"budget\": number|null, \"num_people\": number|null}}";

#[derive(Debug, Clone)]
pub struct IntentPrediction {
    pub result: IntentResult,
    pub model: &'static str,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> impl Future<Output = IntentPrediction> + Send;
}

impl<T: IntentClassifier> IntentClassifier for Arc<T> {
    fn classify(&self, message: &str) -> impl Future<Output = IntentPrediction> + Send {
        (**self).classify(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleIntentClassifier;

impl IntentClassifier for RuleIntentClassifier {
    async fn classify(&self, message: &str) -> IntentPrediction {
        IntentPrediction {
            result: classify_intent_rules(message),
            model: "rules",
        }
    }
}

/// Delegates classification to a text generator and validates its reply.
/// Untrustworthy replies fail closed to a semantic search; a generator that
/// cannot answer at all falls back to the offline rules.
pub struct GeneratorIntentClassifier<N> {
    generator: N,
    min_confidence: f32,
}

impl<N: NarrativeGenerator> GeneratorIntentClassifier<N> {
    pub fn new(generator: N) -> Self {
        Self {
            generator,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl<N: NarrativeGenerator> IntentClassifier for GeneratorIntentClassifier<N> {
    async fn classify(&self, message: &str) -> IntentPrediction {
        let locale = detect_locale(None, message);
        let context = json!({ "message": message, "locale": locale.as_code() });

        match self.generator.generate(CLASSIFIER_PROMPT, &context).await {
            Ok(raw) => IntentPrediction {
                result: parse_classifier_output(&raw, message, self.min_confidence),
                model: "generator",
            },
            Err(error) => {
                debug!(error = %error, "intent generator failed, using rules");
                RuleIntentClassifier.classify(message).await
            }
        }
    }
}

/// Models built once at start and shared by every request.
#[derive(Clone)]
pub struct MlStack {
    pub embedder: Arc<dyn EmbeddingModel>,
    pub classifier: RuleIntentClassifier,
}

impl MlStack {
    pub fn new(embedding_dims: usize) -> Self {
        Self {
            embedder: Arc::new(HashEmbeddingModel::new(embedding_dims)),
            classifier: RuleIntentClassifier,
        }
    }

    pub fn load_default() -> Self {
        Self::new(HashEmbeddingModel::DEFAULT_DIMS)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use wayfinder_core::intent::FALLBACK_CONFIDENCE;
    use wayfinder_core::{Intent, NarrativeError};

    use super::*;

    struct Scripted(Result<&'static str, ()>);

    impl NarrativeGenerator for Scripted {
        async fn generate(&self, prompt: &str, context: &Value) -> Result<String, NarrativeError> {
            assert_eq!(prompt, CLASSIFIER_PROMPT);
            assert!(context["message"].is_string());
            self.0
                .map(str::to_string)
                .map_err(|_| NarrativeError::Failed("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn rules_classifier_reports_its_model() {
        let prediction = RuleIntentClassifier.classify("quán cafe gần Hồ Gươm").await;
        assert_eq!(prediction.model, "rules");
        assert_eq!(prediction.result.intent, Intent::NearbyLandmark);
    }

    #[tokio::test]
    async fn generator_reply_is_validated() {
        let classifier = GeneratorIntentClassifier::new(Scripted(Ok(
            "```json\n{\"intent\":\"compare_places\",\"confidence\":0.9,\"entities\":{\"place_names\":[\"A\",\"B\"]}}\n```",
        )));
        let prediction = classifier.classify("A or B?").await;

        assert_eq!(prediction.model, "generator");
        assert_eq!(prediction.result.intent, Intent::ComparePlaces);
        assert_eq!(prediction.result.entities.place_names, ["A", "B"]);
    }

    #[tokio::test]
    async fn malformed_reply_fails_closed() {
        let classifier = GeneratorIntentClassifier::new(Scripted(Ok("sure! here you go")));
        let prediction = classifier.classify("somewhere quiet to read").await;

        assert_eq!(prediction.result.intent, Intent::SemanticSearch);
        assert_eq!(prediction.result.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(
            prediction.result.entities.query_description.as_deref(),
            Some("somewhere quiet to read")
        );
    }

    #[tokio::test]
    async fn generator_failure_uses_rules() {
        let classifier = GeneratorIntentClassifier::new(Scripted(Err(())));
        let prediction = classifier.classify("so sánh Hồ Gươm và Hồ Tây").await;

        assert_eq!(prediction.model, "rules");
        assert_eq!(prediction.result.intent, Intent::ComparePlaces);
    }

    #[test]
    fn stack_uses_hash_embeddings() {
        let stack = MlStack::load_default();
        assert_eq!(stack.embedder.model_name(), "hash-embedding");
        assert_eq!(stack.embedder.embed("phở bò").len(), HashEmbeddingModel::DEFAULT_DIMS);
    }
}
