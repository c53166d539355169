use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A movie row as read from the store. Column casing is normalized to
/// lowercase at the store boundary, so every consumer sees these names.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub movieid: i64,
    pub title: Option<String>,
    pub imdbid: Option<String>,
    pub overview: Option<String>,
    pub productioncompanies: Option<String>,
    pub releasedate: Option<String>,
    pub budget: Option<f64>,
    pub revenue: Option<f64>,
    pub runtime: Option<f64>,
    pub language: Option<String>,
    pub genres: Option<String>,
    pub status: Option<String>,
}

/// Per-movie enrichment record. Keyed by movie id at the store; upserted,
/// last write wins. `content_rating` exists in the table but is not populated
/// by either generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub sentiment: String,
    pub budget_tier: String,
    pub revenue_tier: String,
    pub effectiveness_score: f64,
    pub target_audience: String,
    #[serde(default)]
    pub content_rating: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub movieid: i64,
    pub userid: Option<i64>,
    pub rating: Option<f64>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub options: Option<QueryOptions>,
}

/// Structured filters attached to a query. `min_rating` and
/// `sentiment_threshold` are accepted on the wire but are not applied as
/// movie-level filters anywhere; they are kept for request-shape
/// compatibility with the frontend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub genre: Option<String>,
    pub min_revenue: Option<f64>,
    pub min_rating: Option<f64>,
    pub sentiment_threshold: Option<f64>,
}

/// Uniform tabular answer. Every row carries exactly the keys listed in
/// `columns`.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub summary: String,
}

impl QueryResponse {
    /// Empty-table response used for request validation and internal errors.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            summary: summary.into(),
        }
    }
}
