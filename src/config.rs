use crate::error::{Result, ServiceError};

pub const DEFAULT_PORT: u16 = 3000;

/// Immutable service configuration, loaded once at startup and injected into
/// the components that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openrouter_api_key: String,
    pub tmdb_api_key: String,
    pub port: u16,
}

impl AppConfig {
    /// Reads configuration from the process environment. Missing or empty
    /// API keys abort startup rather than surfacing on the first request.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            openrouter_api_key: require_env("OPENROUTER_API_KEY")?,
            tmdb_api_key: require_env("TMDB_API_KEY")?,
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        })
    }
}

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ServiceError::ConfigMissing(name))
}
