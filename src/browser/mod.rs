//! # Browser agent
//!
//! A small LLM-driven browsing loop used by the `online_search` tool. The
//! "browser" is an HTTP fetcher: pages are downloaded with `reqwest` and
//! reduced to text, and web search goes through DuckDuckGo's HTML endpoint.
//! JavaScript is never executed.

mod agent;
mod page;

pub use agent::{AgentHistory, BrowserAgent, BrowserSession, BROWSER_AGENT_NAME};
pub use page::{extract_title, html_to_text, parse_search_results, Page, SearchHit};

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::{AgentsError, Result};

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; phone-compare/",
    env!("CARGO_PKG_VERSION"),
    ")"
);
const MAX_SEARCH_HITS: usize = 8;

/// What the browser agent can do on the web.
#[async_trait]
pub trait WebClient: Send + Sync {
    async fn open(&self, url: &str) -> Result<Page>;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// HTTP implementation of [`WebClient`].
#[derive(Debug, Clone)]
pub struct Browser {
    client: reqwest::Client,
    text_limit: usize,
}

impl Browser {
    /// `timeout` bounds each request; `text_limit` caps the characters of
    /// page text handed back to the model.
    pub fn new(timeout: Duration, text_limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, text_limit })
    }
}

#[async_trait]
impl WebClient for Browser {
    async fn open(&self, url: &str) -> Result<Page> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AgentsError::ToolExecutionError {
                message: format!("Refusing to open non-http URL: {}", url),
            });
        }
        debug!(url, "Fetching page");

        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url = response.url().to_string();
        let html = response.text().await?;

        Ok(Page {
            title: extract_title(&html).unwrap_or_else(|| final_url.clone()),
            text: html_to_text(&html, self.text_limit),
            url: final_url,
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        debug!(query, "Searching the web");
        let html = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_search_results(&html, MAX_SEARCH_HITS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_rejects_other_schemes() {
        let browser = Browser::new(Duration::from_secs(1), 100).unwrap();
        let err = browser.open("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, AgentsError::ToolExecutionError { .. }));
    }
}
