pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod tmdb;
pub mod translator;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, ServiceError, Upstream};
pub use models::{Movie, SearchRequest, SearchResponse, TranslatedQuery};
pub use service::{AppState, build_router, create_app};
pub use tmdb::{MovieSearch, SearchPage, TmdbClient};
pub use translator::{LlmQueryTranslator, QueryTranslator};
