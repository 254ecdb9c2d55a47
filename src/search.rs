//! Web search used by the helper worker.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::SearchConfig;

/// Returned when the search succeeded but matched nothing.
pub const NO_RESULTS: &str = "No results found.";
/// Prefix of the message returned when the request itself failed.
pub const SEARCH_FAILED: &str = "Failed to perform web search";

/// Query in, formatted text out. Never fails: errors become a message the
/// agent can relay.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, count: u32) -> String;
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(rename = "webPages", default)]
    web_pages: Option<WebPages>,
}

#[derive(Debug, Default, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
struct WebPage {
    name: String,
    snippet: String,
    url: String,
}

/// Bing Web Search v7 client.
pub struct BingSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl BingSearch {
    pub fn new(config: &SearchConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("search api key is not configured"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    async fn fetch(&self, query: &str, count: u32) -> reqwest::Result<SearchResponse> {
        let count = count.to_string();
        self.client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl WebSearch for BingSearch {
    async fn search(&self, query: &str, count: u32) -> String {
        match self.fetch(query, count).await {
            Ok(response) => format_results(response),
            Err(e) => {
                warn!(error = %e, "web search failed");
                format!("{}: {}", SEARCH_FAILED, e)
            }
        }
    }
}

fn format_results(response: SearchResponse) -> String {
    let pages = response.web_pages.map(|p| p.value).unwrap_or_default();
    if pages.is_empty() {
        return NO_RESULTS.to_string();
    }
    pages
        .iter()
        .map(|p| format!("Title: {}\nSnippet: {}\nLink: {}", p.name, p.snippet, p.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}
