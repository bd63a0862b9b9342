use answerpipe_core::{Error, Result, SearchProvider, SearchQuery, SearchResult};
use serde::Deserialize;
use tracing::warn;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    // Keep a conservative cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

fn serpapi_api_key_from_env() -> Option<String> {
    std::env::var("ANSWERPIPE_SERPAPI_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("SERPAPI_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

fn serpapi_endpoint_from_env() -> Option<String> {
    std::env::var("ANSWERPIPE_SERPAPI_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Google search through SerpApi.
///
/// Docs: https://serpapi.com/search-api
#[derive(Debug, Clone)]
pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerpApiProvider {
    pub fn new(client: reqwest::Client, api_key: String, endpoint: String) -> Self {
        Self {
            client,
            api_key,
            endpoint,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serpapi_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing ANSWERPIPE_SERPAPI_API_KEY (or SERPAPI_API_KEY)".to_string())
        })?;
        let endpoint = serpapi_endpoint_from_env()
            .unwrap_or_else(|| "https://serpapi.com/search.json".to_string());
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiSearchResponse {
    organic_results: Option<Vec<SearchResult>>,
}

#[async_trait::async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<SearchResult>> {
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self
            .client
            .get(&self.endpoint)
            .query(&[("engine", "google"), ("q", q.query.as_str())])
            .query(&[("api_key", self.api_key.as_str())]);

        if let Some(n) = q.max_results {
            req = req.query(&[("num", n.to_string())]);
        }
        if let Some(lang) = q.language.as_deref() {
            req = req.query(&[("hl", lang)]);
        }
        if let Some(country) = q.country.as_deref() {
            req = req.query(&[("gl", country)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serpapi search HTTP {status}")));
        }

        let parsed: SerpApiSearchResponse =
            resp.json().await.map_err(|e| Error::Search(e.to_string()))?;

        // An absent `organic_results` field is not an error: some queries
        // legitimately produce none (knowledge panels only, etc.).
        match parsed.organic_results {
            Some(results) => Ok(results),
            None => {
                warn!(query = %q.query, "no organic results in SerpApi response");
                Ok(Vec::new())
            }
        }
    }
}
