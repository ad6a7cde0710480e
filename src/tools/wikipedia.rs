use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::sync::Arc;

use super::{ Tool, ToolError };

pub const PAGE_NOT_FOUND: &str = "Unable to load page. Try searching instead.";
pub const NO_SEARCH_RESULTS: &str = "No search results.";

/// Minimal MediaWiki API client for one language edition.
pub struct WikipediaClient {
    http: HttpClient,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(lang: &str) -> Self {
        Self {
            http: HttpClient::new(),
            api_url: format!("https://{}.wikipedia.org/w/api.php", lang),
        }
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<Value, ToolError> {
        let response = self.http
            .get(&self.api_url)
            .query(params)
            .query(&[("format", "json"), ("formatversion", "2")])
            .send().await?;
        if !response.status().is_success() {
            return Err(ToolError::Status { service: "Wikipedia", status: response.status() });
        }
        Ok(response.json().await?)
    }

    /// Plain-text content of `page`, or `None` when it does not exist.
    pub async fn load_page(&self, page: &str) -> Result<Option<String>, ToolError> {
        let payload = self.get(
            &[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", page),
            ]
        ).await?;
        Ok(parse_extract(&payload))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<String>, ToolError> {
        let payload = self.get(
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", "5"),
            ]
        ).await?;
        let titles = parse_search_titles(&payload);
        debug!("Wikipedia search '{}' → {:?}", query, titles);
        Ok(titles)
    }
}

pub fn parse_extract(payload: &Value) -> Option<String> {
    let pages = payload.get("query")?.get("pages")?.as_array()?;
    pages
        .iter()
        .filter(|p| p.get("missing").is_none())
        .find_map(|p| p.get("extract").and_then(|e| e.as_str()))
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

pub fn parse_search_titles(payload: &Value) -> Vec<String> {
    payload
        .get("query")
        .and_then(|q| q.get("search"))
        .and_then(|s| s.as_array())
        .map(|hits| {
            hits.iter()
                .filter_map(|h| h.get("title").and_then(|t| t.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub struct WikipediaLoadTool {
    client: Arc<WikipediaClient>,
}

impl WikipediaLoadTool {
    pub fn new(client: Arc<WikipediaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WikipediaLoadTool {
    fn name(&self) -> &str {
        "wikipedia_load_data"
    }

    fn description(&self) -> &str {
        "Retrieve a Wikipedia page. Input: the exact page title."
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        Ok(self.client.load_page(input).await?.unwrap_or_else(|| PAGE_NOT_FOUND.to_string()))
    }
}

pub struct WikipediaSearchTool {
    client: Arc<WikipediaClient>,
}

impl WikipediaSearchTool {
    pub fn new(client: Arc<WikipediaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WikipediaSearchTool {
    fn name(&self) -> &str {
        "wikipedia_search_data"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for a page related to the given query and return its content. Use it when wikipedia_load_data finds nothing."
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        let titles = self.client.search(input).await?;
        match titles.first() {
            None => Ok(NO_SEARCH_RESULTS.to_string()),
            Some(title) =>
                Ok(self.client.load_page(title).await?.unwrap_or_else(|| PAGE_NOT_FOUND.to_string())),
        }
    }
}
