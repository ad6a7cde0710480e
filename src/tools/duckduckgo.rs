use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::Value;

use super::{ Tool, ToolError };

const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com/";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct DuckDuckGoSearchTool {
    http: HttpClient,
    base_url: String,
    region: String,
    max_results: usize,
}

impl DuckDuckGoSearchTool {
    pub fn new(region: &str, max_results: usize) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: DUCKDUCKGO_API.to_string(),
            region: region.to_string(),
            max_results,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        let response = self.http
            .get(&self.base_url)
            .query(
                &[
                    ("q", query),
                    ("kl", self.region.as_str()),
                    ("format", "json"),
                    ("no_redirect", "1"),
                    ("no_html", "1"),
                ]
            )
            .send().await?;

        if !response.status().is_success() {
            return Err(ToolError::Status { service: "DuckDuckGo", status: response.status() });
        }

        let payload: Value = response.json().await?;
        let mut results = parse_results(&payload);
        results.truncate(self.max_results);
        debug!("DuckDuckGo returned {} results for '{}'", results.len(), query);
        Ok(results)
    }
}

pub fn parse_results(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
        if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
            if !abstract_text.is_empty() && !url.is_empty() {
                let title = payload
                    .get("Heading")
                    .and_then(|v| v.as_str())
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| abstract_text.split(" - ").next().unwrap_or(abstract_text));
                results.push(SearchResult {
                    title: title.to_string(),
                    url: url.to_string(),
                    snippet: abstract_text.to_string(),
                });
            }
        }
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        extract_topics(items, &mut results);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        extract_topics(items, &mut results);
    }
    results
}

fn extract_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        "Search the web with DuckDuckGo. Input: the search query."
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        let results = self.search(input).await?;
        if results.is_empty() {
            return Ok("No search results.".to_string());
        }
        serde_json::to_string_pretty(&results).map_err(|e| ToolError::Engine(e.to_string()))
    }
}
