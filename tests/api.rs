use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use movie_query_service::create_app;
use movie_query_service::models::{Enrichment, Movie, Rating};
use movie_query_service::service::MovieService;
use movie_query_service::store::{MovieStore, StoreError};
use serde_json::{json, Value};
use tower::ServiceExt;

/// In-memory store that counts reads, so tests can assert that validation
/// failures never reach the data layer.
#[derive(Default)]
struct CountingStore {
    movies: Vec<Movie>,
    reads: AtomicUsize,
}

#[async_trait]
impl MovieStore for CountingStore {
    async fn movies(&self, limit: u32) -> Result<Vec<Movie>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.movies.iter().take(limit as usize).cloned().collect())
    }

    async fn ratings(&self, _movieid: Option<i64>) -> Result<Vec<Rating>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn upsert_enrichment(
        &self,
        _movieid: i64,
        _enrichment: &Enrichment,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

fn movie(id: i64) -> Movie {
    Movie {
        movieid: id,
        title: Some(format!("Movie {id}")),
        imdbid: None,
        overview: None,
        productioncompanies: None,
        releasedate: None,
        budget: Some(2_000_000.0),
        revenue: Some(9_000_000.0),
        runtime: Some(95.0),
        language: None,
        genres: Some("Drama".to_string()),
        status: None,
    }
}

fn app_without_credential(movie_count: i64) -> (Router, Arc<CountingStore>) {
    let store = Arc::new(CountingStore {
        movies: (1..=movie_count).map(movie).collect(),
        reads: AtomicUsize::new(0),
    });
    let service = Arc::new(MovieService::new(store.clone(), None));
    (create_app(service, "frontend"), store)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app_without_credential(1);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn blank_prompt_is_rejected_without_touching_the_store() {
    for body in [json!({ "prompt": "   " }), json!({ "prompt": "" }), json!({})] {
        let (app, store) = app_without_credential(3);
        let response = app.oneshot(post_json("/api/query", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = read_json(response).await;
        assert_eq!(payload["columns"], json!([]));
        assert_eq!(payload["rows"], json!([]));
        assert_eq!(payload["summary"], "Prompt is required");
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn query_without_credential_returns_the_fallback_table() {
    let (app, _) = app_without_credential(8);
    let response = app
        .oneshot(post_json(
            "/api/query",
            json!({ "prompt": "best dramas", "options": { "genre": "drama", "minRevenue": 1 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["columns"], json!(["title", "revenue", "budget", "genres"]));
    assert_eq!(payload["rows"].as_array().unwrap().len(), 5);
    assert_eq!(payload["rows"][0]["title"], "Movie 1");
    assert_eq!(
        payload["summary"],
        "LLM not configured - set OPENAI_API_KEY environment variable"
    );
}

#[tokio::test]
async fn enrich_defaults_to_one_hundred_movies() {
    let (app, store) = app_without_credential(4);
    let response = app.oneshot(post_json("/api/enrich", json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // Only 4 movies exist, so the default limit of 100 covers them all.
    assert_eq!(read_json(response).await, json!({ "enriched": 4 }));
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn recommend_without_credential_returns_the_head_of_the_set() {
    let (app, _) = app_without_credential(8);
    let response = app
        .oneshot(post_json("/api/recommend", json!({ "query": "anything", "limit": 2 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let movies = payload["movies"].as_array().unwrap();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0]["movieid"], 1);
}

#[tokio::test]
async fn predict_rating_without_credential_returns_the_default() {
    let (app, _) = app_without_credential(3);
    let response = app
        .oneshot(post_json("/api/predict-rating", json!({ "movieid": 2 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({ "predicted_rating": 7.5, "movieid": 2 })
    );
}
