use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::enricher::Enricher;
use crate::llm::{complete_json, CompletionProvider, LlmError};
use crate::models::{Movie, QueryOptions, QueryResponse};
use crate::store::{MovieStore, StoreError};

/// Hard sampling cap on the working set read per query; bounds prompt size
/// and token cost, not a pagination cursor.
const WORKING_SET_CAP: u32 = 200;
/// At most this many filtered movies are embedded in the prompt.
const PROMPT_MOVIE_CAP: usize = 50;
const FALLBACK_ROW_COUNT: usize = 5;
const PREDICTION_LOOKUP_CAP: u32 = 1000;

const QUERY_TEMPERATURE: f64 = 0.4;
const RECOMMEND_TEMPERATURE: f64 = 0.5;
const PREDICTION_TEMPERATURE: f64 = 0.2;

pub const DEFAULT_ENRICH_LIMIT: u32 = 100;
pub const DEFAULT_RECOMMEND_LIMIT: usize = 5;
const DEFAULT_PREDICTED_RATING: f64 = 7.5;

const NO_CREDENTIAL_SUMMARY: &str =
    "LLM not configured - set OPENAI_API_KEY environment variable";
const AUTH_SUMMARY: &str =
    "Invalid API key - please set OPENAI_API_KEY environment variable with a valid key";
const QUOTA_SUMMARY: &str = "OpenAI quota exceeded - please check your account billing";
const NETWORK_SUMMARY: &str = "Network error - please check your internet connection";
const KEY_ABSENT_SUMMARY: &str = "API key not set - please set OPENAI_API_KEY environment variable";
const GENERIC_FAILURE_SUMMARY: &str =
    "LLM call failed - check API key and quota. See server logs for details.";

/// Candidate result columns, in presentation order.
const CANDIDATE_COLUMNS: [&str; 6] = ["title", "revenue", "budget", "runtime", "genres", "overview"];
/// Columns of the deterministic fallback table.
const FALLBACK_COLUMNS: [&str; 4] = ["title", "revenue", "budget", "genres"];

#[derive(Deserialize)]
struct QueryAnswer {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    relevant_movies: Vec<i64>,
}

#[derive(Deserialize)]
struct RecommendationIds {
    #[serde(default)]
    recommendations: Vec<i64>,
}

/// Orchestrates the movie operations: loads a bounded working set, applies
/// the structured filters, delegates interpretation to the LLM provider and
/// reshapes the structured reply into a uniform tabular answer.
pub struct MovieService {
    store: Arc<dyn MovieStore>,
    provider: Option<Arc<dyn CompletionProvider>>,
    enricher: Enricher,
}

impl MovieService {
    pub fn new(store: Arc<dyn MovieStore>, provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        let enricher = Enricher::new(provider.clone());
        Self {
            store,
            provider,
            enricher,
        }
    }

    /// Answers a free-text question over the movie set. Infallible past the
    /// store read: every LLM-side failure resolves to a fallback response
    /// instead of an error.
    pub async fn query(
        &self,
        prompt: &str,
        options: Option<QueryOptions>,
    ) -> Result<QueryResponse, StoreError> {
        let movies = self.store.movies(WORKING_SET_CAP).await?;

        let Some(provider) = &self.provider else {
            return Ok(fallback_response(&movies, NO_CREDENTIAL_SUMMARY));
        };

        let filtered = apply_filters(movies.clone(), &options.unwrap_or_default());
        let sample = &filtered[..filtered.len().min(PROMPT_MOVIE_CAP)];
        let llm_prompt = format!(
            "Answer this query: {prompt}\nMovies: {}\nReturn JSON: {{\"answer\": \"...\", \"relevant_movies\": [movieid1, ...]}}",
            serialize_movies(sample),
        );

        let parsed = complete_json(provider.as_ref(), &llm_prompt, QUERY_TEMPERATURE)
            .await
            .and_then(|value| {
                serde_json::from_value::<QueryAnswer>(value).map_err(|_| LlmError::Malformed)
            });

        let answer = match parsed {
            Ok(answer) if !answer.answer.trim().is_empty() => answer,
            Ok(_) => return Ok(fallback_response(&movies, self.failure_summary(None))),
            Err(err) => return Ok(fallback_response(&movies, self.failure_summary(Some(&err)))),
        };

        // Identifiers the model invented, or that the filters removed, are
        // dropped silently.
        let relevant: Vec<&Movie> = filtered
            .iter()
            .filter(|m| answer.relevant_movies.contains(&m.movieid))
            .collect();

        let columns: Vec<String> = CANDIDATE_COLUMNS
            .iter()
            .filter(|col| relevant.iter().any(|m| !candidate_field(m, col).is_null()))
            .map(|col| col.to_string())
            .collect();
        let rows = relevant
            .iter()
            .map(|m| {
                let mut row = Map::new();
                for col in &columns {
                    row.insert(col.clone(), candidate_field(m, col));
                }
                row
            })
            .collect();

        Ok(QueryResponse {
            columns,
            rows,
            summary: answer.answer,
        })
    }

    /// Runs the enrichment generator over up to `limit` movies, upserting one
    /// record per movie sequentially. Per-movie LLM failures are absorbed by
    /// the generator's own fallback; only a store failure aborts the batch,
    /// with no rollback of records already written.
    pub async fn enrich_movies(&self, limit: u32) -> Result<usize, StoreError> {
        let movies = self.store.movies(limit).await?;
        for movie in &movies {
            let enrichment = self.enricher.enrich(movie).await;
            self.store.upsert_enrichment(movie.movieid, &enrichment).await?;
        }
        info!("enriched {} movies", movies.len());
        Ok(movies.len())
    }

    /// Top-`limit` picks for a free-text request. Without a credential the
    /// first `limit` movies of the working set stand in; an LLM failure
    /// behaves like an empty recommendation list.
    pub async fn recommend(&self, query: &str, limit: usize) -> Result<Vec<Movie>, StoreError> {
        let movies = self.store.movies(WORKING_SET_CAP).await?;
        let Some(provider) = &self.provider else {
            return Ok(movies.into_iter().take(limit).collect());
        };

        let sample = &movies[..movies.len().min(PROMPT_MOVIE_CAP)];
        let prompt = format!(
            "Given these movies and user query, recommend top {limit} movies.\nQuery: {query}\nMovies (JSON array): {}\nReturn JSON: {{\"recommendations\": [movieid1, movieid2, ...]}}",
            serialize_movies(sample),
        );
        let ids = match complete_json(provider.as_ref(), &prompt, RECOMMEND_TEMPERATURE).await {
            Ok(value) => serde_json::from_value::<RecommendationIds>(value)
                .map(|r| r.recommendations)
                .unwrap_or_default(),
            Err(err) => {
                info!("recommendation fell back: {err}");
                Vec::new()
            }
        };

        Ok(movies
            .into_iter()
            .filter(|m| ids.contains(&m.movieid))
            .take(limit)
            .collect())
    }

    /// Predicts a 0-10 rating for one movie, using the count of stored
    /// ratings as a context signal. An unknown movie, a missing credential or
    /// any LLM failure yields the neutral default.
    pub async fn predict_rating(
        &self,
        movieid: i64,
        preferences: &str,
    ) -> Result<f64, StoreError> {
        let movies = self.store.movies(PREDICTION_LOOKUP_CAP).await?;
        let Some(movie) = movies.iter().find(|m| m.movieid == movieid) else {
            return Ok(DEFAULT_PREDICTED_RATING);
        };
        let Some(provider) = &self.provider else {
            return Ok(DEFAULT_PREDICTED_RATING);
        };

        let ratings = self.store.ratings(Some(movieid)).await?;
        let prompt = format!(
            "Predict rating (0-10) for this movie:\nMovie: {title}\nOverview: {overview}\nBudget: ${budget}\nRevenue: ${revenue}\nRatings: {count}\nPreferences: {preferences}\nReturn JSON: {{\"predicted_rating\": 0-10}}",
            title = movie.title.as_deref().unwrap_or(""),
            overview = movie.overview.as_deref().unwrap_or(""),
            budget = movie.budget.unwrap_or(0.0),
            revenue = movie.revenue.unwrap_or(0.0),
            count = ratings.len(),
            preferences = if preferences.trim().is_empty() { "None" } else { preferences },
        );

        let predicted = match complete_json(provider.as_ref(), &prompt, PREDICTION_TEMPERATURE).await
        {
            Ok(value) => value
                .get("predicted_rating")
                .and_then(coerce_f64)
                .unwrap_or(DEFAULT_PREDICTED_RATING),
            Err(_) => DEFAULT_PREDICTED_RATING,
        };
        Ok(predicted)
    }

    /// Selects the user-facing summary for a failed or degenerate LLM
    /// answer, in tag priority order.
    fn failure_summary(&self, err: Option<&LlmError>) -> &'static str {
        match err {
            Some(LlmError::Auth) => AUTH_SUMMARY,
            Some(LlmError::Quota) => QUOTA_SUMMARY,
            Some(LlmError::Network) => NETWORK_SUMMARY,
            _ if self.provider.is_none() => KEY_ABSENT_SUMMARY,
            _ => GENERIC_FAILURE_SUMMARY,
        }
    }
}

/// Movie-level filtering: case-insensitive genre substring match (a movie
/// with no genre never matches) and an inclusive minimum-revenue bound with
/// absent revenue treated as 0. `min_rating` and `sentiment_threshold` are
/// not movie-level filters and are ignored here.
pub fn apply_filters(movies: Vec<Movie>, options: &QueryOptions) -> Vec<Movie> {
    let genre = options.genre.as_ref().map(|g| g.to_lowercase());
    movies
        .into_iter()
        .filter(|m| match &genre {
            Some(wanted) => m
                .genres
                .as_deref()
                .map(|g| g.to_lowercase().contains(wanted))
                .unwrap_or(false),
            None => true,
        })
        .filter(|m| match options.min_revenue {
            Some(min) => m.revenue.unwrap_or(0.0) >= min,
            None => true,
        })
        .collect()
}

/// Deterministic response used whenever the LLM path cannot produce an
/// answer: fixed columns over the first five movies of the unfiltered
/// working set, with `""`/`0` standing in for missing fields.
fn fallback_response(movies: &[Movie], summary: &str) -> QueryResponse {
    let rows = movies
        .iter()
        .take(FALLBACK_ROW_COUNT)
        .map(|m| {
            let mut row = Map::new();
            row.insert("title".to_string(), Value::from(m.title.clone().unwrap_or_default()));
            row.insert("revenue".to_string(), Value::from(m.revenue.unwrap_or(0.0)));
            row.insert("budget".to_string(), Value::from(m.budget.unwrap_or(0.0)));
            row.insert("genres".to_string(), Value::from(m.genres.clone().unwrap_or_default()));
            row
        })
        .collect();
    QueryResponse {
        columns: FALLBACK_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
        summary: summary.to_string(),
    }
}

fn candidate_field(movie: &Movie, column: &str) -> Value {
    fn text(value: &Option<String>) -> Value {
        value.clone().map(Value::from).unwrap_or(Value::Null)
    }
    fn number(value: Option<f64>) -> Value {
        value.map(Value::from).unwrap_or(Value::Null)
    }
    match column {
        "title" => text(&movie.title),
        "revenue" => number(movie.revenue),
        "budget" => number(movie.budget),
        "runtime" => number(movie.runtime),
        "genres" => text(&movie.genres),
        "overview" => text(&movie.overview),
        _ => Value::Null,
    }
}

fn serialize_movies(movies: &[Movie]) -> String {
    serde_json::to_string(movies).unwrap_or_else(|_| "[]".to_string())
}

fn coerce_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
