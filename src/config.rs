use std::env;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MOVIES_URL: &str = "sqlite:database/db/movies.db";
const DEFAULT_RATINGS_URL: &str = "sqlite:database/db/ratings.db";
const DEFAULT_FRONTEND_DIR: &str = "frontend";

/// The LLM credential after one normalization pass at startup. Both the
/// query path and the enrichment path consume this resolved value; nothing
/// downstream re-sanitizes the raw environment string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A non-empty key. `flagged` marks a key without the provider's usual
    /// `sk-` prefix; it is still used as-is.
    Configured { key: String, flagged: bool },
    Absent,
}

impl Credential {
    /// Trims the raw value and strips one layer of surrounding double and
    /// single quotes, which commonly leak in from shell exports.
    pub fn resolve(raw: Option<String>) -> Self {
        let mut key = raw.unwrap_or_default().trim().to_string();
        for quote in ['"', '\''] {
            if key.len() >= 2 && key.starts_with(quote) && key.ends_with(quote) {
                key = key[1..key.len() - 1].trim().to_string();
            }
        }
        if key.is_empty() {
            return Credential::Absent;
        }
        let flagged = !key.starts_with("sk-");
        Credential::Configured { key, flagged }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Credential::Configured { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub movies_database_url: String,
    pub ratings_database_url: String,
    pub frontend_dir: String,
    pub credential: Credential,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self {
            port,
            movies_database_url: env::var("MOVIES_DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_MOVIES_URL.to_string()),
            ratings_database_url: env::var("RATINGS_DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_RATINGS_URL.to_string()),
            frontend_dir: env::var("FRONTEND_DIR")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_DIR.to_string()),
            credential: Credential::resolve(env::var("OPENAI_API_KEY").ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_blank_keys_resolve_to_absent() {
        assert_eq!(Credential::resolve(None), Credential::Absent);
        assert_eq!(Credential::resolve(Some("   ".to_string())), Credential::Absent);
        assert_eq!(Credential::resolve(Some("\"\"".to_string())), Credential::Absent);
    }

    #[test]
    fn surrounding_quotes_and_whitespace_are_stripped() {
        let resolved = Credential::resolve(Some("  \"sk-abc123\"  ".to_string()));
        assert_eq!(
            resolved,
            Credential::Configured {
                key: "sk-abc123".to_string(),
                flagged: false,
            }
        );

        let resolved = Credential::resolve(Some("'sk-abc123'".to_string()));
        assert_eq!(
            resolved,
            Credential::Configured {
                key: "sk-abc123".to_string(),
                flagged: false,
            }
        );
    }

    #[test]
    fn unexpected_prefix_is_accepted_but_flagged() {
        let resolved = Credential::resolve(Some("not-a-real-key".to_string()));
        assert_eq!(
            resolved,
            Credential::Configured {
                key: "not-a-real-key".to_string(),
                flagged: true,
            }
        );
    }

    #[test]
    fn interior_quotes_are_preserved() {
        let resolved = Credential::resolve(Some("sk-ab\"cd".to_string()));
        assert_eq!(
            resolved,
            Credential::Configured {
                key: "sk-ab\"cd".to_string(),
                flagged: false,
            }
        );
    }
}
