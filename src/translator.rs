use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::{agent::Agent, providers::openrouter};
use serde_json::Value;
use tracing::info;

use crate::error::{Result, ServiceError, Upstream};
use crate::models::TranslatedQuery;

const TRANSLATION_MODEL: &str = "meta-llama/llama-3.1-8b-instruct:free";

/// Years outside this range in the model output are treated as noise.
const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1870..=2100;

const SYSTEM_PROMPT: &str = r#"You are an expert at converting natural language movie search queries into structured search parameters for The Movie Database (TMDB).

Respond with a single JSON object and nothing else. The object has these fields:
- "keyword" (string, required): the search terms to send to TMDB. Keep it short and concrete; prioritise titles, actors, directors and distinctive keywords.
- "genre" (string, optional): a genre name such as "horror" or "science fiction", only when the query clearly names one.
- "year_from" (integer, optional) and "year_to" (integer, optional): release year bounds. A decade like "the 90s" becomes year_from 1990 and year_to 1999; a single year sets both.
- "min_rating" (number, optional): minimum average rating on a 0-10 scale, only when the query asks for well-rated films.

Examples:
- "Action movies from the 90s" -> {"keyword": "action", "genre": "action", "year_from": 1990, "year_to": 1999}
- "Sci-fi films with time travel" -> {"keyword": "time travel", "genre": "science fiction"}
- "Movies starring Leonardo DiCaprio" -> {"keyword": "Leonardo DiCaprio"}
- "Highly rated romantic comedies" -> {"keyword": "romantic comedy", "genre": "romance", "min_rating": 7}

Return ONLY the JSON object, no prose, no code fences."#;

/// Converts free-text movie queries into structured TMDB search parameters.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, query: &str) -> Result<TranslatedQuery>;
}

/// Translator backed by an OpenRouter-hosted language model.
pub struct LlmQueryTranslator {
    agent: Agent<openrouter::CompletionModel>,
}

impl LlmQueryTranslator {
    pub fn new(api_key: &str) -> Self {
        let client = openrouter::Client::new(api_key);
        let agent = client
            .agent(TRANSLATION_MODEL)
            .preamble(SYSTEM_PROMPT)
            .build();
        Self { agent }
    }
}

#[async_trait]
impl QueryTranslator for LlmQueryTranslator {
    async fn translate(&self, query: &str) -> Result<TranslatedQuery> {
        let prompt = format!("Convert this movie search query: {query}");
        let response =
            self.agent
                .prompt(&prompt)
                .await
                .map_err(|e| ServiceError::UpstreamUnavailable {
                    upstream: Upstream::Translator,
                    reason: e.to_string(),
                })?;

        info!("LLM translation response: {}", response);
        parse_translation(&response)
    }
}

/// Parses the model's textual reply into a `TranslatedQuery`. The output is
/// untrusted: code fences and stray quoting are tolerated, numbers may arrive
/// as strings, and anything without a usable keyword is rejected.
pub(crate) fn parse_translation(raw: &str) -> Result<TranslatedQuery> {
    let cleaned = strip_code_fences(raw.trim());

    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| ServiceError::UpstreamInvalidResponse {
            upstream: Upstream::Translator,
            reason: format!("model output is not valid JSON: {e}"),
        })?;

    let obj = value
        .as_object()
        .ok_or_else(|| ServiceError::UpstreamInvalidResponse {
            upstream: Upstream::Translator,
            reason: "model output is not a JSON object".to_string(),
        })?;

    let keyword = obj
        .get("keyword")
        .and_then(coerce_string)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ServiceError::UpstreamInvalidResponse {
            upstream: Upstream::Translator,
            reason: "model output has no usable keyword".to_string(),
        })?;

    Ok(TranslatedQuery {
        keyword,
        genre: obj.get("genre").and_then(coerce_string).filter(|g| !g.is_empty()),
        year_from: obj.get("year_from").and_then(coerce_year),
        year_to: obj.get("year_to").and_then(coerce_year),
        min_rating: obj.get("min_rating").and_then(coerce_number),
    })
}

fn strip_code_fences(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().trim_matches(['"', '\'', '`']).to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_year(value: &Value) -> Option<i32> {
    let year = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    YEAR_RANGE.contains(&year).then_some(year as i32)
}
