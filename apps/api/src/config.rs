use anyhow::{bail, Context, Result};

const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-09-2025:generateContent";

/// Which document collection backs the lead store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for DocumentBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(DocumentBackend::Postgres),
            "memory" | "mem" => Ok(DocumentBackend::Memory),
            other => bail!("Unknown DOCUMENT_BACKEND '{other}' (expected 'postgres' or 'memory')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Built once in `main` and handed to every component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_url: String,
    pub llm_timeout_secs: u64,
    pub document_backend: DocumentBackend,
    /// Only required when `document_backend` is `Postgres`.
    pub database_url: Option<String>,
    /// Application namespace segment of every collection path.
    pub app_namespace: String,
    /// Bootstrap token the owner identity is derived from. Anonymous session when unset.
    pub owner_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let document_backend = optional_env("DOCUMENT_BACKEND")
            .map(|v| v.parse::<DocumentBackend>())
            .transpose()?
            .unwrap_or(DocumentBackend::Postgres);

        let database_url = optional_env("DATABASE_URL");
        if document_backend == DocumentBackend::Postgres && database_url.is_none() {
            bail!(
                "Required environment variable 'DATABASE_URL' is not set (DOCUMENT_BACKEND=postgres)"
            );
        }

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_api_url: optional_env("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
            llm_timeout_secs: optional_env("LLM_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?
                .unwrap_or(120),
            document_backend,
            database_url,
            app_namespace: optional_env("APP_NAMESPACE")
                .unwrap_or_else(|| "job-finder-app".to_string()),
            owner_token: optional_env("OWNER_TOKEN"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
impl Config {
    /// In-memory configuration used by unit tests.
    pub fn for_tests() -> Self {
        Config {
            gemini_api_key: "test-key".to_string(),
            gemini_api_url: "http://localhost:0/generateContent".to_string(),
            llm_timeout_secs: 5,
            document_backend: DocumentBackend::Memory,
            database_url: None,
            app_namespace: "test-app".to_string(),
            owner_token: None,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
