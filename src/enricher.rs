use std::sync::Arc;

use tracing::{debug, error};

use crate::llm::{complete_json, truncate, CompletionProvider, LlmError};
use crate::models::{Enrichment, Movie};

const ENRICHMENT_TEMPERATURE: f64 = 0.3;

const HIGH_BUDGET: f64 = 50_000_000.0;
const MEDIUM_BUDGET: f64 = 10_000_000.0;
const HIGH_REVENUE: f64 = 100_000_000.0;
const MEDIUM_REVENUE: f64 = 20_000_000.0;

/// Produces the fixed-shape enrichment for one movie: through the LLM when a
/// credential is configured, through the rule-based fallback otherwise.
pub struct Enricher {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl Enricher {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Never fails: any problem on the LLM path resolves to the rule-based
    /// fallback. Auth and quota failures are routine in misconfigured
    /// environments, so they are logged at debug only.
    pub async fn enrich(&self, movie: &Movie) -> Enrichment {
        let Some(provider) = &self.provider else {
            return rule_based(movie);
        };

        let outcome = complete_json(provider.as_ref(), &enrichment_prompt(movie), ENRICHMENT_TEMPERATURE)
            .await
            .and_then(|value| {
                serde_json::from_value::<Enrichment>(value).map_err(|_| LlmError::Malformed)
            });

        match outcome {
            Ok(enrichment) => enrichment,
            Err(LlmError::Auth) | Err(LlmError::Quota) => {
                debug!(movieid = movie.movieid, "enrichment fell back after auth/quota failure");
                rule_based(movie)
            }
            Err(err) => {
                error!("Enrichment error: {}", truncate(&err.to_string(), 80));
                rule_based(movie)
            }
        }
    }
}

fn enrichment_prompt(movie: &Movie) -> String {
    format!(
        r#"Analyze this movie and return JSON with exactly these 5 attributes:
1. sentiment: sentiment of overview (positive/negative/neutral)
2. budget_tier: categorize budget (low/medium/high) - budget is ${budget}
3. revenue_tier: categorize revenue (low/medium/high) - revenue is ${revenue}
4. effectiveness_score: production effectiveness (0-100) based on budget, revenue, and quality
5. target_audience: primary target audience (e.g., "Family", "Adults", "Teens")

Movie: {title}
Overview: {overview}
Budget: ${budget}
Revenue: ${revenue}
Genres: {genres}

Return only valid JSON: {{"sentiment": "...", "budget_tier": "...", "revenue_tier": "...", "effectiveness_score": 0-100, "target_audience": "..."}}"#,
        title = movie.title.as_deref().unwrap_or(""),
        overview = movie.overview.as_deref().unwrap_or(""),
        budget = movie.budget.unwrap_or(0.0),
        revenue = movie.revenue.unwrap_or(0.0),
        genres = movie.genres.as_deref().unwrap_or(""),
    )
}

/// Deterministic enrichment computed from the movie's overview and numeric
/// fields. Pure, so repeated calls on the same movie give identical output.
pub fn rule_based(movie: &Movie) -> Enrichment {
    let budget = movie.budget.unwrap_or(0.0);
    let revenue = movie.revenue.unwrap_or(0.0);
    let positive = movie
        .overview
        .as_deref()
        .map(|o| o.to_lowercase().contains("love"))
        .unwrap_or(false);
    Enrichment {
        sentiment: if positive { "positive" } else { "neutral" }.to_string(),
        budget_tier: tier(budget, HIGH_BUDGET, MEDIUM_BUDGET),
        revenue_tier: tier(revenue, HIGH_REVENUE, MEDIUM_REVENUE),
        effectiveness_score: (revenue / budget.max(1.0) * 10.0).clamp(0.0, 100.0),
        target_audience: "Adults".to_string(),
        content_rating: None,
    }
}

fn tier(value: f64, high: f64, medium: f64) -> String {
    if value > high {
        "high"
    } else if value > medium {
        "medium"
    } else {
        "low"
    }
    .to_string()
}
