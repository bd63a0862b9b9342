//! HTTP surface: thin axum wiring around the search provider and the
//! summarize pipeline.

use crate::answer::{summarize_search_results, SummarizeConfig};
use answerpipe_core::{FunctionModel, PageExtractor, SearchProvider, SearchQuery, SearchResult};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn SearchProvider>,
    pub model: Arc<dyn FunctionModel>,
    pub extractor: Arc<dyn PageExtractor>,
    pub cfg: SummarizeConfig,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/search", get(search_handler))
        .route("/api/summary", post(summary_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let query = params.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Query is required"})),
        );
    }

    match state.provider.search(&SearchQuery::new(query)).await {
        Ok(results) => (
            StatusCode::OK,
            Json(serde_json::json!({"searchResults": results})),
        ),
        Err(e) => {
            error!(query, error = %e, "search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to fetch search results"})),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    search_results: Option<Vec<SearchResult>>,
}

async fn summary_handler(
    State(state): State<AppState>,
    Json(body): Json<SummaryRequest>,
) -> impl IntoResponse {
    let query = body.query.as_deref().map(str::trim).unwrap_or("");
    let Some(search_results) = body.search_results else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Query and search results are required"})),
        );
    };
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Query and search results are required"})),
        );
    }

    match summarize_search_results(
        state.model.as_ref(),
        state.extractor.as_ref(),
        query,
        &search_results,
        &state.cfg,
    )
    .await
    {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::json!({"summary": summary})),
        ),
        Err(e) => {
            error!(query, error = %e, "summary failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to generate summary"})),
            )
        }
    }
}
