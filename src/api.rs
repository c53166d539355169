use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::models::{Movie, QueryRequest, QueryResponse};
use crate::service::{MovieService, DEFAULT_ENRICH_LIMIT, DEFAULT_RECOMMEND_LIMIT};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MovieService>,
}

#[derive(Debug, Deserialize)]
struct EnrichRequest {
    #[serde(default = "default_enrich_limit")]
    limit: u32,
}

fn default_enrich_limit() -> u32 {
    DEFAULT_ENRICH_LIMIT
}

#[derive(Debug, Deserialize)]
struct RecommendRequest {
    query: String,
    #[serde(default = "default_recommend_limit")]
    limit: usize,
}

fn default_recommend_limit() -> usize {
    DEFAULT_RECOMMEND_LIMIT
}

#[derive(Debug, Serialize)]
struct RecommendationResponse {
    movies: Vec<Movie>,
}

#[derive(Debug, Deserialize)]
struct PredictRatingRequest {
    movieid: i64,
    #[serde(default)]
    preferences: String,
}

#[derive(Debug, Serialize)]
struct RatingPredictionResponse {
    predicted_rating: f64,
    movieid: i64,
}

/// Builds the full application router: the JSON API under `/api`, the health
/// probe, and the static browser frontend for everything else.
pub fn create_app(service: Arc<MovieService>, frontend_dir: &str) -> Router {
    let api = Router::new()
        .route("/query", post(run_query))
        .route("/enrich", post(run_enrich))
        .route("/recommend", post(run_recommend))
        .route("/predict-rating", post(run_predict_rating));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .fallback_service(ServeDir::new(frontend_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let prompt = request.prompt.as_deref().unwrap_or("").trim().to_string();
    if prompt.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse::error("Prompt is required")),
        );
    }

    info!("Received query: {prompt}");
    match state.service.query(&prompt, request.options).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(err) => {
            error!("query failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QueryResponse::error(format!("Error: {err}"))),
            )
        }
    }
}

async fn run_enrich(
    State(state): State<AppState>,
    Json(request): Json<EnrichRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.service.enrich_movies(request.limit).await {
        Ok(count) => Ok(Json(json!({ "enriched": count }))),
        Err(err) => {
            error!("batch enrichment failed: {err}");
            Err(internal_error(&err.to_string()))
        }
    }
}

async fn run_recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendationResponse>, (StatusCode, Json<Value>)> {
    match state.service.recommend(&request.query, request.limit).await {
        Ok(movies) => Ok(Json(RecommendationResponse { movies })),
        Err(err) => {
            error!("recommendation failed: {err}");
            Err(internal_error(&err.to_string()))
        }
    }
}

async fn run_predict_rating(
    State(state): State<AppState>,
    Json(request): Json<PredictRatingRequest>,
) -> Result<Json<RatingPredictionResponse>, (StatusCode, Json<Value>)> {
    match state
        .service
        .predict_rating(request.movieid, &request.preferences)
        .await
    {
        Ok(predicted_rating) => Ok(Json(RatingPredictionResponse {
            predicted_rating,
            movieid: request.movieid,
        })),
        Err(err) => {
            error!("rating prediction failed: {err}");
            Err(internal_error(&err.to_string()))
        }
    }
}

fn internal_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}
