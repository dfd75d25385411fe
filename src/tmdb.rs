use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, ServiceError, Upstream};
use crate::models::{Movie, TranslatedQuery};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of search results, as returned by TMDB.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub movies: Vec<Movie>,
    pub total_count: u64,
}

/// Searches the external movie catalog with a translated query.
#[async_trait]
pub trait MovieSearch: Send + Sync {
    async fn search(&self, query: &TranslatedQuery) -> Result<SearchPage>;
}

/// TMDB search client. Requests a single page and returns it as-is, apart
/// from genre-name enrichment and the client-side rating filter.
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, TMDB_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Maps a translated query onto TMDB's documented search parameters.
    /// Ordering is fixed so equal queries produce identical requests. The
    /// API key is appended at send time and is never part of this set.
    fn search_params(query: &TranslatedQuery) -> Vec<(&'static str, String)> {
        let mut search_terms = query.keyword.clone();
        if let Some(genre) = &query.genre {
            if !search_terms.to_lowercase().contains(&genre.to_lowercase()) {
                search_terms.push(' ');
                search_terms.push_str(genre);
            }
        }

        let mut params = vec![
            ("query", search_terms),
            ("include_adult", "false".to_string()),
            ("language", "en-US".to_string()),
            ("page", "1".to_string()),
        ];

        // TMDB's search endpoint only takes a single release year.
        if let (Some(from), Some(to)) = (query.year_from, query.year_to) {
            if from == to {
                params.push(("primary_release_year", from.to_string()));
            }
        }

        params
    }

    async fn fetch_genre_names(&self) -> Result<HashMap<i64, String>> {
        let response = self
            .http
            .get(format!("{}/genre/movie/list", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("language", "en-US")])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let list: TmdbGenreList =
            response
                .json()
                .await
                .map_err(|e| ServiceError::UpstreamInvalidResponse {
                    upstream: Upstream::Tmdb,
                    reason: e.without_url().to_string(),
                })?;

        Ok(list.genres.into_iter().map(|g| (g.id, g.name)).collect())
    }
}

#[async_trait]
impl MovieSearch for TmdbClient {
    async fn search(&self, query: &TranslatedQuery) -> Result<SearchPage> {
        let params = Self::search_params(query);
        info!("Searching TMDB with params: {:?}", params);

        let response = self
            .http
            .get(format!("{}/search/movie", self.base_url))
            .query(&[("api_key", self.api_key.as_str())])
            .query(&params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let page: TmdbSearchResponse =
            response
                .json()
                .await
                .map_err(|e| ServiceError::UpstreamInvalidResponse {
                    upstream: Upstream::Tmdb,
                    reason: e.without_url().to_string(),
                })?;

        // Genre names are a display nicety; a failed lookup degrades to ids only.
        let genre_names = match self.fetch_genre_names().await {
            Ok(map) => map,
            Err(e) => {
                warn!("Genre list lookup failed, returning ids only: {}", e);
                HashMap::new()
            }
        };

        let movies = page
            .results
            .into_iter()
            .map(|m| m.into_movie(&genre_names))
            .collect();

        Ok(SearchPage {
            movies: apply_min_rating(movies, query.min_rating),
            total_count: page.total_results,
        })
    }
}

/// The search endpoint has no rating parameter, so a requested minimum
/// rating is applied to the fetched page.
fn apply_min_rating(movies: Vec<Movie>, min_rating: Option<f64>) -> Vec<Movie> {
    match min_rating {
        Some(min) => movies
            .into_iter()
            .filter(|m| m.vote_average >= min)
            .collect(),
        None => movies,
    }
}

fn classify_transport_error(e: reqwest::Error) -> ServiceError {
    // without_url: reqwest errors can embed the request URL, which carries
    // the API key as a query parameter.
    ServiceError::UpstreamUnavailable {
        upstream: Upstream::Tmdb,
        reason: e.without_url().to_string(),
    }
}

fn classify_status(status: StatusCode) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::UpstreamAuthError {
            upstream: Upstream::Tmdb,
        },
        StatusCode::TOO_MANY_REQUESTS => ServiceError::UpstreamRateLimited {
            upstream: Upstream::Tmdb,
        },
        other => ServiceError::UpstreamUnavailable {
            upstream: Upstream::Tmdb,
            reason: format!("unexpected status {other}"),
        },
    }
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
    #[serde(default)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbGenreList {
    #[serde(default)]
    genres: Vec<TmdbGenre>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    id: i64,
    name: String,
}

/// A movie as TMDB serializes it. Most fields are optional on the wire.
#[derive(Debug, Default, Deserialize)]
struct TmdbMovie {
    #[serde(default)]
    id: i64,
    title: Option<String>,
    original_title: Option<String>,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    vote_count: i64,
    #[serde(default)]
    popularity: f64,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    genre_ids: Vec<i64>,
    #[serde(default)]
    adult: bool,
    #[serde(default)]
    original_language: String,
}

impl TmdbMovie {
    fn into_movie(self, genre_names: &HashMap<i64, String>) -> Movie {
        let names = self
            .genre_ids
            .iter()
            .filter_map(|id| genre_names.get(id).cloned())
            .collect();

        Movie {
            id: self.id,
            title: self.title.unwrap_or_else(|| "Unknown Title".to_string()),
            original_title: self.original_title,
            overview: self.overview,
            release_date: self.release_date,
            vote_average: (self.vote_average * 10.0).round() / 10.0,
            vote_count: self.vote_count,
            popularity: self.popularity,
            poster_url: self
                .poster_path
                .as_ref()
                .map(|p| format!("{IMAGE_BASE_URL}/w500{p}")),
            backdrop_url: self
                .backdrop_path
                .as_ref()
                .map(|p| format!("{IMAGE_BASE_URL}/w1280{p}")),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            genre_ids: self.genre_ids,
            genre_names: names,
            adult: self.adult,
            original_language: self.original_language,
        }
    }
}
