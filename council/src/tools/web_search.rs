//! Web search tool backed by a SearxNG-style JSON endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolError};

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Query a search endpoint and return the top hits as labeled lines.
pub struct WebSearchTool {
    endpoint: String,
    max_results: usize,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            max_results: 5,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .expect("failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: WebSearchArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", args.query.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Request(format!(
                "search endpoint returned {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        if parsed.results.is_empty() {
            return Ok(format!("no results for `{}`", args.query));
        }

        let lines: Vec<String> = parsed
            .results
            .iter()
            .take(self.max_results)
            .map(|hit| format!("{} ({})\n  {}", hit.title, hit.url, hit.content))
            .collect();
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_shape() {
        let tool = WebSearchTool::new("http://localhost:8888/search");
        let params = tool.parameters();
        assert_eq!(params["required"][0], "query");
        assert_eq!(tool.name(), "web_search");
    }

    #[tokio::test]
    async fn test_invalid_args_rejected() {
        let tool = WebSearchTool::new("http://localhost:8888/search");
        let err = tool
            .execute(serde_json::json!({"search": "wrong key"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }
}
