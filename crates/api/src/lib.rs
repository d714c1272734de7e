mod error;
mod rate_limit;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use wayfinder_agents::{
    AssistantAgent, AssistantSettings, ChatReply, ChatRequest, ComparisonOutcome, CostEstimate,
    EstimateRequest, TemplateNarrator,
};
use wayfinder_core::{Coordinate, ItineraryPlan, ItineraryRequest, RankQuery, RankedCandidateSet};
use wayfinder_ml::MlStack;
use wayfinder_observability::{AppMetrics, MetricsSnapshot};
use wayfinder_retrieval::{CatalogStats, PlaceCatalog};

pub use crate::error::{status_for, ApiError};
pub use crate::rate_limit::IpRateLimiter;

pub type CatalogAgent = AssistantAgent<Arc<PlaceCatalog>, Arc<PlaceCatalog>>;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<CatalogAgent>,
    pub metrics: Arc<AppMetrics>,
    pub catalog: CatalogStats,
    pub api_key: String,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    catalog: CatalogStats,
}

#[derive(Debug, Deserialize)]
struct CompareRequest {
    place_names: Vec<String>,
    #[serde(default)]
    origin: Option<Coordinate>,
}

/// Loads the catalog and models named by `settings` and wires the router.
pub async fn build_app(settings: AssistantSettings) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let ml_stack = MlStack::new(settings.embedding_dims);

    let catalog = Arc::new(
        PlaceCatalog::from_path(&settings.catalog_path, Some(ml_stack.embedder.clone()))
            .with_context(|| {
                format!("failed to load catalog from {}", settings.catalog_path.display())
            })?,
    );
    let pricing = Arc::new(settings.load_pricing()?);
    let stats = catalog.stats();
    info!(
        places = stats.places_loaded,
        positioned = stats.positioned,
        model = stats.embedding_model.unwrap_or("none"),
        "catalog loaded"
    );

    let state = ApiState {
        agent: Arc::new(AssistantAgent::new(
            catalog.clone(),
            catalog,
            TemplateNarrator,
            ml_stack.classifier,
            pricing,
            metrics.clone(),
            settings.clone(),
        )),
        metrics,
        catalog: stats,
        api_key: settings.api_key.clone(),
        limiter: IpRateLimiter::new(settings.rate_limit_window, settings.rate_limit_max),
        allowed_origins: Arc::new(settings.allowed_origins.clone()),
    };

    Ok(build_router(state, settings.max_body_bytes))
}

pub fn build_router(state: ApiState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/search", post(search))
        .route("/v1/plan_itinerary", post(plan_itinerary))
        .route("/v1/estimate", post(estimate))
        .route("/v1/compare_places", post(compare_places))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        catalog: state.catalog.clone(),
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    Ok(Json(state.agent.handle_chat(request).await?))
}

async fn search(
    State(state): State<ApiState>,
    Json(query): Json<RankQuery>,
) -> Result<Json<RankedCandidateSet>, ApiError> {
    Ok(Json(state.agent.resolve_and_rank(query).await?))
}

async fn plan_itinerary(
    State(state): State<ApiState>,
    Json(request): Json<ItineraryRequest>,
) -> Result<Json<ItineraryPlan>, ApiError> {
    Ok(Json(state.agent.plan_itinerary(request).await?))
}

async fn estimate(
    State(state): State<ApiState>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<CostEstimate>, ApiError> {
    Ok(Json(state.agent.estimate_cost(request)?))
}

async fn compare_places(
    State(state): State<ApiState>,
    Json(request): Json<CompareRequest>,
) -> Response {
    let named = request
        .place_names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .count();
    if named < 2 {
        return ApiError::bad_request("place_names needs at least two names");
    }

    match state
        .agent
        .compare_places(&request.place_names, request.origin)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json::<ComparisonOutcome>(outcome)).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if header_key != state.api_key {
        return error::error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid x-api-key".to_string(),
        );
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if let Err(retry_after) = state.limiter.check(&ip) {
        let mut response = error::error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this IP".to_string(),
        );
        let seconds = retry_after.as_secs().max(1).to_string();
        if let Ok(value) = HeaderValue::from_str(&seconds) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}
