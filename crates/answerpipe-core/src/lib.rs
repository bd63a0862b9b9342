use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("extract failed: {0}")]
    Extract(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("refine failed: {0}")]
    Refine(String),
    #[error("answer failed: {0}")]
    Answer(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    /// Best-effort language hint (provider adapters map it; e.g. Google `hl`).
    pub language: Option<String>,
    /// Best-effort country hint (e.g. Google `gl`).
    pub country: Option<String>,
    /// Timeout for the provider call.
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            language: None,
            country: None,
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// One organic search result, field names matching the SerpApi wire format.
///
/// Everything except `link` is tolerant of absence: the provider returns
/// whatever subset the engine produced for a given result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snippet_highlighted_words: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitelinks: Option<Sitelinks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchResult {
    pub fn title_str(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn snippet_str(&self) -> &str {
        self.snippet.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sitelinks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline: Vec<Sitelink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expanded: Vec<Sitelink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sitelink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            max_bytes: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

/// Readable-text extraction over an HTTP resource.
///
/// Contract: fetch/parse failures are `Err`; a page that parses but carries
/// no content-bearing text is `Ok("")`. Callers decide whether empty text is
/// worth prompting with.
#[async_trait::async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String>;
}

/// A declared function the model is forced to call.
///
/// `parameters` is a JSON schema object (field names and types fixed per
/// call site).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    pub system: String,
    pub prompt: String,
    pub function: FunctionSpec,
    pub timeout_ms: Option<u64>,
}

impl FunctionCallRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Structured function-call seam.
///
/// Implementations return the arguments object of the forced call, already
/// parsed from the provider's wire format. A response that does not invoke
/// the declared function is a hard `Err` — callers never see free text.
#[async_trait::async_trait]
pub trait FunctionModel: Send + Sync {
    async fn call_function(&self, req: &FunctionCallRequest) -> Result<serde_json::Value>;
}

/// Output of the query refiner: the query rephrased as a question plus the
/// candidate results reordered by anticipated utility. May be empty when the
/// model judged no candidate useful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResults {
    pub refined_query: String,
    pub results: Vec<SearchResult>,
}

/// One iteration's outcome in the answer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerAttempt {
    pub answer: String,
    pub requires_more_information: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_tolerates_sparse_json() {
        let v: SearchResult = serde_json::from_str(r#"{"link":"https://example.com"}"#).unwrap();
        assert_eq!(v.link, "https://example.com");
        assert!(v.title.is_none());
        assert!(v.snippet_highlighted_words.is_empty());
        assert_eq!(v.title_str(), "");
    }

    #[test]
    fn search_result_parses_sitelinks() {
        let v: SearchResult = serde_json::from_str(
            r#"{
                "position": 1,
                "title": "Example",
                "link": "https://example.com",
                "snippet": "An example.",
                "snippet_highlighted_words": ["example"],
                "sitelinks": {
                    "inline": [{"title": "Docs", "link": "https://example.com/docs"}]
                },
                "source": "example.com"
            }"#,
        )
        .unwrap();
        assert_eq!(v.position, Some(1));
        let sl = v.sitelinks.unwrap();
        assert_eq!(sl.inline.len(), 1);
        assert_eq!(sl.inline[0].link, "https://example.com/docs");
        assert!(sl.expanded.is_empty());
    }

    #[test]
    fn sparse_result_serializes_without_noise() {
        let v = SearchResult {
            position: None,
            title: None,
            link: "https://example.com".to_string(),
            redirect_link: None,
            displayed_link: None,
            favicon: None,
            snippet: None,
            snippet_highlighted_words: Vec::new(),
            sitelinks: None,
            source: None,
        };
        let s = serde_json::to_string(&v).unwrap();
        assert_eq!(s, r#"{"link":"https://example.com"}"#);
    }
}
