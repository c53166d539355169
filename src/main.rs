use std::sync::Arc;

use anyhow::Context as _;
use movie_query_service::config::{Config, Credential};
use movie_query_service::create_app;
use movie_query_service::llm::{CompletionProvider, OpenAiCompletion};
use movie_query_service::service::MovieService;
use movie_query_service::store::SqliteMovieStore;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env();

    let provider: Option<Arc<dyn CompletionProvider>> = match &config.credential {
        Credential::Configured { key, flagged } => {
            if *flagged {
                warn!("API key does not start with \"sk-\"; its format may be incorrect");
            }
            info!("OpenAI API key detected (length: {}). LLM features enabled.", key.len());
            Some(Arc::new(OpenAiCompletion::new(key)))
        }
        Credential::Absent => {
            warn!("OPENAI_API_KEY not set. LLM features will run in fallback mode.");
            None
        }
    };

    let store = SqliteMovieStore::connect(&config.movies_database_url, &config.ratings_database_url)
        .await
        .context("failed to open the movie databases")?;
    let service = Arc::new(MovieService::new(Arc::new(store), provider));

    let app = create_app(service, &config.frontend_dir);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Movie query service running on http://{}", listener.local_addr()?);
    info!("Available endpoints:");
    info!("  GET  /health              - Health check");
    info!("  POST /api/query           - Natural-language query over the movie set");
    info!("  POST /api/enrich          - Batch enrichment generation");
    info!("  POST /api/recommend       - Movie recommendations");
    info!("  POST /api/predict-rating  - Rating prediction for one movie");

    axum::serve(listener, app).await?;

    Ok(())
}
