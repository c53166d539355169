use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::models::{Enrichment, Movie, Rating};

const MAX_CONNECTIONS: u32 = 5;

// Explicit lowercase column lists normalize the datasets' mixed column
// casing once, here; sqlite matches identifiers case-insensitively.
const MOVIES_SQL: &str = "SELECT movieid AS movieid, title AS title, imdbid AS imdbid, \
     overview AS overview, productioncompanies AS productioncompanies, \
     releasedate AS releasedate, budget AS budget, revenue AS revenue, \
     runtime AS runtime, language AS language, genres AS genres, status AS status \
     FROM movies LIMIT ?";
const RATINGS_SQL: &str = "SELECT movieid AS movieid, userid AS userid, \
     rating AS rating, timestamp AS timestamp FROM ratings";
const RATINGS_BY_MOVIE_SQL: &str = "SELECT movieid AS movieid, userid AS userid, \
     rating AS rating, timestamp AS timestamp FROM ratings WHERE movieid = ?";

const CREATE_ENRICHMENT_SQL: &str = "CREATE TABLE IF NOT EXISTS movie_enrichment \
     (movieid INTEGER PRIMARY KEY, sentiment TEXT, budget_tier TEXT, \
      revenue_tier TEXT, effectiveness_score REAL, target_audience TEXT, \
      content_rating TEXT)";
const UPSERT_ENRICHMENT_SQL: &str =
    "INSERT OR REPLACE INTO movie_enrichment VALUES (?, ?, ?, ?, ?, ?, ?)";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read/write surface over the movie datasets: movies and ratings are
/// read-only reference data, enrichment is the single write target.
#[async_trait]
pub trait MovieStore: Send + Sync {
    /// Up to `limit` movies in table order.
    async fn movies(&self, limit: u32) -> Result<Vec<Movie>, StoreError>;

    /// Ratings, optionally restricted to one movie.
    async fn ratings(&self, movieid: Option<i64>) -> Result<Vec<Rating>, StoreError>;

    /// Writes one enrichment record per movie id, last write wins.
    async fn upsert_enrichment(
        &self,
        movieid: i64,
        enrichment: &Enrichment,
    ) -> Result<(), StoreError>;
}

/// SQLite-backed store over the two dataset files (movies + ratings).
/// Connections are checked out of the pool per call and returned when the
/// call finishes, also on early exit.
pub struct SqliteMovieStore {
    movies: SqlitePool,
    ratings: SqlitePool,
}

impl SqliteMovieStore {
    pub async fn connect(movies_url: &str, ratings_url: &str) -> Result<Self, StoreError> {
        let movies = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(movies_url)
            .await?;
        let ratings = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(ratings_url)
            .await?;
        Ok(Self { movies, ratings })
    }

    pub fn from_pools(movies: SqlitePool, ratings: SqlitePool) -> Self {
        Self { movies, ratings }
    }
}

#[async_trait]
impl MovieStore for SqliteMovieStore {
    async fn movies(&self, limit: u32) -> Result<Vec<Movie>, StoreError> {
        let rows = sqlx::query_as::<_, Movie>(MOVIES_SQL)
            .bind(limit)
            .fetch_all(&self.movies)
            .await?;
        Ok(rows)
    }

    async fn ratings(&self, movieid: Option<i64>) -> Result<Vec<Rating>, StoreError> {
        let rows = match movieid {
            Some(id) => {
                sqlx::query_as::<_, Rating>(RATINGS_BY_MOVIE_SQL)
                    .bind(id)
                    .fetch_all(&self.ratings)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Rating>(RATINGS_SQL)
                    .fetch_all(&self.ratings)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn upsert_enrichment(
        &self,
        movieid: i64,
        enrichment: &Enrichment,
    ) -> Result<(), StoreError> {
        // The table is created lazily on first write.
        sqlx::query(CREATE_ENRICHMENT_SQL)
            .execute(&self.movies)
            .await?;
        sqlx::query(UPSERT_ENRICHMENT_SQL)
            .bind(movieid)
            .bind(&enrichment.sentiment)
            .bind(&enrichment.budget_tier)
            .bind(&enrichment.revenue_tier)
            .bind(enrichment.effectiveness_score)
            .bind(&enrichment.target_audience)
            .bind(&enrichment.content_rating)
            .execute(&self.movies)
            .await?;
        Ok(())
    }
}
