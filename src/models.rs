use serde::{Deserialize, Serialize};

/// Upper bound on accepted query text, enforced before any outbound call.
pub const MAX_QUERY_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Structured search parameters extracted from the user's free text by the
/// language model. Produced by defensive parsing of untrusted model output,
/// so every field beyond the keyword is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslatedQuery {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
}

/// A movie as returned to the client. Attributes come verbatim from TMDB,
/// plus the derived genre names and full image URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f64,
    pub vote_count: i64,
    pub popularity: f64,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub genre_ids: Vec<i64>,
    pub genre_names: Vec<String>,
    pub adult: bool,
    pub original_language: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "tmdb_query")]
    pub translated_query: TranslatedQuery,
    pub movies: Vec<Movie>,
    pub total_count: u64,
    pub response_time_ms: u64,
}
