use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wayfinder_agents::AssistantSettings;
use wayfinder_api::build_app;

const API_KEY: &str = "dev-wayfinder-key";

fn catalog_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/catalog")
}

async fn app() -> Router {
    let settings = AssistantSettings {
        catalog_path: catalog_root(),
        ..AssistantSettings::default()
    };
    build_app(settings).await.expect("app should build")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["status"], "ok");
    assert!(parsed["catalog"]["places_loaded"].as_u64().unwrap() > 10);
}

#[tokio::test]
async fn chat_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({"message": "quán cà phê gần Hồ Gươm"}).to_string()))
        .unwrap();

    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn chat_returns_structured_payload() {
    let response = app()
        .await
        .oneshot(post("/v1/chat", json!({"message": "quán cà phê gần Hồ Gươm"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert!(!parsed["reply_text"].as_str().unwrap().is_empty());
    assert!(!parsed["request_id"].as_str().unwrap().is_empty());
    assert_eq!(parsed["payload"]["kind"], "places");
}

#[tokio::test]
async fn empty_chat_message_is_rejected() {
    let response = app()
        .await
        .oneshot(post("/v1/chat", json!({"message": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_ranks_near_landmark() {
    let response = app()
        .await
        .oneshot(post(
            "/v1/search",
            json!({"landmark": "Hồ Gươm", "categories": ["cafe"], "radius_meters": 1000}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    let candidates = parsed["candidates"].as_array().unwrap();
    assert!(!candidates.is_empty());
    assert!(candidates
        .iter()
        .all(|place| place["place_id"].as_str().unwrap().starts_with("cafe-")));
}

#[tokio::test]
async fn search_without_location_or_text_is_bad_request() {
    let response = app()
        .await
        .oneshot(post("/v1/search", json!({"categories": ["cafe"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "empty_query");
}

#[tokio::test]
async fn plan_itinerary_returns_stops() {
    let response = app()
        .await
        .oneshot(post(
            "/v1/plan_itinerary",
            json!({
                "origin": {"lat": 21.0285, "lon": 105.8522},
                "duration_minutes": 480,
                "interests": ["food"],
                "num_people": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert!(!parsed["stops"].as_array().unwrap().is_empty());
    assert!(parsed["total_duration_minutes"].as_u64().unwrap() <= 480);
}

#[tokio::test]
async fn estimate_scales_with_group() {
    let response = app()
        .await
        .oneshot(post("/v1/estimate", json!({"category": "cafe", "num_people": 2})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert_eq!(parsed["kind"], "category");
    assert_eq!(parsed["estimate"]["total"]["min"], 60_000);
    assert_eq!(parsed["estimate"]["total"]["max"], 200_000);
}

#[tokio::test]
async fn compare_needs_two_names() {
    let response = app()
        .await
        .oneshot(post("/v1/compare_places", json!({"place_names": ["Phở Thìn", " "]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limit_applies_per_ip() {
    let settings = AssistantSettings {
        catalog_path: catalog_root(),
        rate_limit_max: 1,
        ..AssistantSettings::default()
    };
    let app = build_app(settings).await.expect("app should build");

    let first = app
        .clone()
        .oneshot(post("/v1/estimate", json!({"category": "cafe"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post("/v1/estimate", json!({"category": "cafe"})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
}
