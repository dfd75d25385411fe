use axum::{
    Router,
    extract::State,
    response::{Html, Json},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::{Result, ServiceError};
use crate::models::{MAX_QUERY_LEN, SearchRequest, SearchResponse};
use crate::tmdb::{MovieSearch, TmdbClient};
use crate::translator::{LlmQueryTranslator, QueryTranslator};

#[derive(Clone)]
pub struct AppState {
    pub translator: Arc<dyn QueryTranslator>,
    pub movies: Arc<dyn MovieSearch>,
}

/// Builds the application with real upstream clients wired in.
pub fn create_app(config: &AppConfig) -> Router {
    let state = AppState {
        translator: Arc::new(LlmQueryTranslator::new(&config.openrouter_api_key)),
        movies: Arc::new(TmdbClient::new(&config.tmdb_api_key)),
    };
    build_router(state)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/search", post(search))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Html<&'static str> {
    Html(TEST_PAGE)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// The search pipeline: validate, translate, search, assemble. Strictly
/// sequential, since the catalog search depends on the translation.
async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let started = Instant::now();

    let query = request.query.trim();
    if query.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "query must not be empty".to_string(),
        ));
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(ServiceError::InvalidRequest(format!(
            "query exceeds {MAX_QUERY_LEN} characters"
        )));
    }

    info!("Translating movie query: {}", query);
    let translated = state.translator.translate(query).await.map_err(|e| {
        error!("Translation failed for query {:?}: {}", query, e);
        e
    })?;

    info!("Translated query: {:?}", translated);
    let page = state.movies.search(&translated).await.map_err(|e| {
        error!("Catalog search failed for query {:?}: {}", query, e);
        e
    })?;

    Ok(Json(SearchResponse {
        translated_query: translated,
        total_count: page.total_count,
        movies: page.movies,
        response_time_ms: started.elapsed().as_millis() as u64,
    }))
}

const TEST_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>AI Movie Search</title>
    <style>
        body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
        textarea { width: 100%; height: 80px; padding: 10px; }
        button { background: #007bff; color: white; padding: 10px 20px; border: none; border-radius: 5px; cursor: pointer; }
        pre { background: #f8f9fa; border: 1px solid #e9ecef; border-radius: 5px; padding: 15px; white-space: pre-wrap; }
    </style>
</head>
<body>
    <h1>AI Movie Search</h1>
    <p>Describe the movies you are looking for, e.g. "sci-fi films about time travel from the 90s".</p>
    <textarea id="query"></textarea>
    <button onclick="search()">Search</button>
    <pre id="result"></pre>
    <script>
        async function search() {
            const query = document.getElementById('query').value;
            const result = document.getElementById('result');
            result.textContent = 'Searching...';
            try {
                const res = await fetch('/api/search', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({ query })
                });
                result.textContent = JSON.stringify(await res.json(), null, 2);
            } catch (e) {
                result.textContent = 'Request failed: ' + e;
            }
        }
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Upstream;
    use crate::models::{Movie, TranslatedQuery};
    use crate::tmdb::SearchPage;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct FixedTranslator {
        result: TranslatedQuery,
        calls: AtomicUsize,
    }

    impl FixedTranslator {
        fn new(result: TranslatedQuery) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QueryTranslator for FixedTranslator {
        async fn translate(&self, _query: &str) -> Result<TranslatedQuery> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl QueryTranslator for FailingTranslator {
        async fn translate(&self, _query: &str) -> Result<TranslatedQuery> {
            Err(ServiceError::UpstreamUnavailable {
                upstream: Upstream::Translator,
                reason: "connect timeout".to_string(),
            })
        }
    }

    /// Records every query it receives and serves a canned page.
    struct RecordingSearch {
        page: SearchPage,
        seen: std::sync::Mutex<Vec<TranslatedQuery>>,
    }

    impl RecordingSearch {
        fn new(page: SearchPage) -> Self {
            Self {
                page,
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self::new(SearchPage {
                movies: vec![],
                total_count: 0,
            })
        }
    }

    #[async_trait]
    impl MovieSearch for RecordingSearch {
        async fn search(&self, query: &TranslatedQuery) -> Result<SearchPage> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(self.page.clone())
        }
    }

    struct AuthFailingSearch;

    #[async_trait]
    impl MovieSearch for AuthFailingSearch {
        async fn search(&self, _query: &TranslatedQuery) -> Result<SearchPage> {
            Err(ServiceError::UpstreamAuthError {
                upstream: Upstream::Tmdb,
            })
        }
    }

    fn sample_movie() -> Movie {
        Movie {
            id: 603,
            title: "The Matrix".into(),
            original_title: Some("The Matrix".into()),
            overview: "A computer hacker learns the truth.".into(),
            release_date: "1999-03-30".into(),
            vote_average: 8.2,
            vote_count: 26000,
            popularity: 95.5,
            poster_path: Some("/matrix.jpg".into()),
            backdrop_path: None,
            genre_ids: vec![28, 878],
            genre_names: vec!["Action".into(), "Science Fiction".into()],
            adult: false,
            original_language: "en".into(),
            poster_url: Some("https://image.tmdb.org/t/p/w500/matrix.jpg".into()),
            backdrop_url: None,
        }
    }

    fn sample_translation() -> TranslatedQuery {
        TranslatedQuery {
            keyword: "matrix".into(),
            genre: Some("science fiction".into()),
            ..Default::default()
        }
    }

    fn search_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_succeeds_without_upstream_calls() {
        let translator = Arc::new(FixedTranslator::new(sample_translation()));
        let movies = Arc::new(RecordingSearch::empty());
        let app = build_router(AppState {
            translator: translator.clone(),
            movies: movies.clone(),
        });

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        assert!(movies.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn root_serves_the_test_page() {
        let app = build_router(AppState {
            translator: Arc::new(FixedTranslator::new(sample_translation())),
            movies: Arc::new(RecordingSearch::empty()),
        });

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn successful_pipeline_shapes_the_response() {
        let page = SearchPage {
            movies: vec![sample_movie()],
            total_count: 42,
        };
        let app = build_router(AppState {
            translator: Arc::new(FixedTranslator::new(sample_translation())),
            movies: Arc::new(RecordingSearch::new(page)),
        });

        let response = app
            .oneshot(search_request(r#"{"query": "movies like the matrix"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["tmdb_query"]["keyword"], "matrix");
        assert_eq!(body["movies"].as_array().unwrap().len(), 1);
        assert_eq!(body["movies"][0]["title"], "The Matrix");
        assert_eq!(body["total_count"], 42);
        assert!(body["response_time_ms"].is_u64());
    }

    #[tokio::test]
    async fn identical_requests_reach_the_catalog_identically() {
        let translator = Arc::new(FixedTranslator::new(sample_translation()));
        let movies = Arc::new(RecordingSearch::empty());
        let app = build_router(AppState {
            translator,
            movies: movies.clone(),
        });

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(search_request(r#"{"query": "movies like the matrix"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let seen = movies.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_upstream_call() {
        let translator = Arc::new(FixedTranslator::new(sample_translation()));
        let movies = Arc::new(RecordingSearch::empty());
        let app = build_router(AppState {
            translator: translator.clone(),
            movies: movies.clone(),
        });

        let response = app
            .oneshot(search_request(r#"{"query": "   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        assert!(movies.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_query_is_rejected() {
        let app = build_router(AppState {
            translator: Arc::new(FixedTranslator::new(sample_translation())),
            movies: Arc::new(RecordingSearch::empty()),
        });

        let long_query = "a".repeat(MAX_QUERY_LEN + 1);
        let response = app
            .oneshot(search_request(&format!(r#"{{"query": "{long_query}"}}"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn translator_failure_never_reaches_the_catalog() {
        let movies = Arc::new(RecordingSearch::empty());
        let app = build_router(AppState {
            translator: Arc::new(FailingTranslator),
            movies: movies.clone(),
        });

        let response = app
            .oneshot(search_request(r#"{"query": "horror from 2020"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream_unavailable");
        assert!(movies.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_auth_failure_surfaces_without_leaking_credentials() {
        let app = build_router(AppState {
            translator: Arc::new(FixedTranslator::new(sample_translation())),
            movies: Arc::new(AuthFailingSearch),
        });

        let response = app
            .oneshot(search_request(r#"{"query": "movies like the matrix"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream_auth_error");
        let message = body["message"].as_str().unwrap();
        assert!(!message.contains("api_key"));
        assert!(!message.to_lowercase().contains("bearer"));
    }
}
