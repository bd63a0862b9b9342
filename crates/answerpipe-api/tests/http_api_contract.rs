use answerpipe::answer::SummarizeConfig;
use answerpipe::http::{app, AppState};
use answerpipe_core::{
    Error, FunctionCallRequest, FunctionModel, PageExtractor, Result, SearchProvider, SearchQuery,
    SearchResult,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

struct StaticProvider {
    results: Option<Vec<SearchResult>>,
}

#[async_trait::async_trait]
impl SearchProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn search(&self, _q: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.results
            .clone()
            .ok_or_else(|| Error::Search("provider down".to_string()))
    }
}

struct ScriptedModel {
    responses: Mutex<VecDeque<serde_json::Value>>,
}

impl ScriptedModel {
    fn new(responses: Vec<serde_json::Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait::async_trait]
impl FunctionModel for ScriptedModel {
    async fn call_function(&self, _req: &FunctionCallRequest) -> Result<serde_json::Value> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Llm("script exhausted".to_string()))
    }
}

struct StaticExtractor;

#[async_trait::async_trait]
impl PageExtractor for StaticExtractor {
    async fn extract(&self, _url: &str) -> Result<String> {
        Ok("Some page content.".to_string())
    }
}

fn sample_results() -> Vec<SearchResult> {
    vec![serde_json::from_value(serde_json::json!({
        "position": 1,
        "title": "Example",
        "link": "https://example.com",
        "snippet": "An example page.",
        "snippet_highlighted_words": ["example"],
    }))
    .unwrap()]
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    addr
}

fn state_with(provider: StaticProvider, model: ScriptedModel) -> AppState {
    AppState {
        provider: Arc::new(provider),
        model: Arc::new(model),
        extractor: Arc::new(StaticExtractor),
        cfg: SummarizeConfig::default(),
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let addr = serve(state_with(
        StaticProvider { results: Some(vec![]) },
        ScriptedModel::new(vec![]),
    ))
    .await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn search_requires_a_query() {
    let addr = serve(state_with(
        StaticProvider { results: Some(vec![]) },
        ScriptedModel::new(vec![]),
    ))
    .await;

    for path in ["/api/search", "/api/search?query=", "/api/search?query=%20"] {
        let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
        assert_eq!(resp.status(), 400, "path: {path}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Query is required");
    }
}

#[tokio::test]
async fn search_returns_wire_format_results() {
    let addr = serve(state_with(
        StaticProvider {
            results: Some(sample_results()),
        },
        ScriptedModel::new(vec![]),
    ))
    .await;

    let resp = reqwest::get(format!("http://{addr}/api/search?query=example"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let results = body["searchResults"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["link"], "https://example.com");
    // SerpApi wire field names pass through untouched.
    assert_eq!(results[0]["snippet_highlighted_words"][0], "example");
}

#[tokio::test]
async fn search_provider_failure_is_500() {
    let addr = serve(state_with(
        StaticProvider { results: None },
        ScriptedModel::new(vec![]),
    ))
    .await;

    let resp = reqwest::get(format!("http://{addr}/api/search?query=example"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Failed to fetch search results");
}

#[tokio::test]
async fn summary_requires_query_and_results() {
    let addr = serve(state_with(
        StaticProvider { results: Some(vec![]) },
        ScriptedModel::new(vec![]),
    ))
    .await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({}),
        serde_json::json!({"query": "example"}),
        serde_json::json!({"searchResults": []}),
        serde_json::json!({"query": "  ", "searchResults": []}),
    ] {
        let resp = client
            .post(format!("http://{addr}/api/summary"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "body: {body}");
        let out: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(out["error"], "Query and search results are required");
    }
}

#[tokio::test]
async fn summary_happy_path_returns_summary() {
    let addr = serve(state_with(
        StaticProvider { results: Some(vec![]) },
        ScriptedModel::new(vec![
            serde_json::json!({"rephrased_query": "What is example?", "search_result_rankings": [0]}),
            serde_json::json!({"answer": "Example is a sample domain.", "requires_more_information": false}),
        ]),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .json(&serde_json::json!({"query": "example", "searchResults": sample_results()}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["summary"], "Example is a sample domain.");
}

#[tokio::test]
async fn summary_internal_failure_is_500() {
    // The scripted model refuses the refine call, which is a hard failure.
    let addr = serve(state_with(
        StaticProvider { results: Some(vec![]) },
        ScriptedModel::new(vec![]),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .json(&serde_json::json!({"query": "example", "searchResults": sample_results()}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Failed to generate summary");
}
