//! The `online_search` tool
//!
//! Looks up one phone's specifications through a [`SpecSource`] and records
//! the text in the run's [`ComparisonContext`]. Each lookup is bounded by the
//! search timeout and retried per the retry config.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{Browser, BrowserAgent, WebClient};
use crate::comparison::{ComparisonContext, SlotPolicy};
use crate::config::{AppConfig, RetryConfig, BROWSER_MODEL};
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::model::{ModelProvider, OpenAIProvider};
use crate::retry::{retry_async, with_timeout, RetryPolicy};
use crate::tool::{Tool, ToolResult};

pub const ONLINE_SEARCH_TOOL: &str = "online_search";

/// Where phone specifications come from.
#[async_trait]
pub trait SpecSource: Send + Sync {
    /// Specification text for `query`.
    async fn lookup(&self, query: &str) -> Result<String>;
}

/// Task handed to the browser agent for one phone.
pub fn browser_task(query: &str) -> String {
    format!(
        "Find detailed specifications and features of {} and return structured data.",
        query
    )
}

/// Builds the provider for one browser agent run.
pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn ModelProvider> + Send + Sync>;

/// [`SpecSource`] that runs a fresh [`BrowserAgent`] per lookup, each with
/// its own provider for the browser model.
pub struct BrowserSpecSource {
    web: Arc<dyn WebClient>,
    provider_factory: ProviderFactory,
    max_steps: usize,
}

impl BrowserSpecSource {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let web: Arc<dyn WebClient> =
            Arc::new(Browser::new(config.api_timeout, config.page_text_limit)?);
        let provider_config = config.clone();
        let provider_factory: ProviderFactory = Arc::new(move || {
            Arc::new(OpenAIProvider::from_config(&provider_config, BROWSER_MODEL))
                as Arc<dyn ModelProvider>
        });
        Ok(Self::with_parts(web, provider_factory, config.browser_max_steps))
    }

    pub fn with_parts(
        web: Arc<dyn WebClient>,
        provider_factory: ProviderFactory,
        max_steps: usize,
    ) -> Self {
        Self {
            web,
            provider_factory,
            max_steps,
        }
    }
}

#[async_trait]
impl SpecSource for BrowserSpecSource {
    async fn lookup(&self, query: &str) -> Result<String> {
        let history = BrowserAgent::new(
            browser_task(query),
            (self.provider_factory)(),
            self.web.clone(),
        )
        .with_max_steps(self.max_steps)
        .run()
        .await?;
        Ok(history.extracted_content())
    }
}

/// How `online_search` records and bounds its lookups.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub slot_policy: SlotPolicy,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl SearchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            slot_policy: config.slot_policy,
            timeout: config.search_timeout,
            retry: config.retry.clone(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            slot_policy: SlotPolicy::default(),
            timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OnlineSearchArgs {
    /// The phone model to look up
    pub query: String,
}

pub struct OnlineSearchTool {
    source: Arc<dyn SpecSource>,
    settings: SearchSettings,
}

impl OnlineSearchTool {
    pub fn new(source: Arc<dyn SpecSource>, settings: SearchSettings) -> Self {
        Self { source, settings }
    }

    /// Look `query` up with timeout and retries. Empty results count as
    /// failures.
    pub async fn fetch(&self, query: &str) -> Result<String> {
        let mut policy = RetryPolicy::new(self.settings.retry.clone());
        let source = &self.source;
        retry_async(
            || {
                with_timeout(ONLINE_SEARCH_TOOL, self.settings.timeout, async move {
                    let text = source.lookup(query).await?;
                    if text.trim().is_empty() {
                        return Err(AgentsError::ToolExecutionError {
                            message: format!("No specifications found for '{}'", query),
                        });
                    }
                    Ok(text)
                })
            },
            &mut policy,
        )
        .await
    }
}

impl std::fmt::Debug for OnlineSearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineSearchTool")
            .field("settings", &self.settings)
            .finish()
    }
}

#[async_trait]
impl Tool<ComparisonContext> for OnlineSearchTool {
    fn name(&self) -> &str {
        ONLINE_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Searches online for phone model features and specifications."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(OnlineSearchArgs).schema)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }

    async fn execute(
        &self,
        ctx: &RunContext<ComparisonContext>,
        arguments: Value,
    ) -> Result<ToolResult> {
        let args: OnlineSearchArgs = serde_json::from_value(arguments)?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(AgentsError::ToolExecutionError {
                message: "online_search needs a non-empty query".to_string(),
            });
        }

        info!(query, "Searching online");
        let features = self.fetch(query).await?;
        let slot = ctx.record_features(query, features.clone(), self.settings.slot_policy)?;

        let state = ctx.snapshot()?;
        match slot {
            Some(slot) => info!(
                query,
                slot = %slot,
                phone1 = %ctx.request().phone1,
                phone2 = %ctx.request().phone2,
                phone1_chars = state.phone1.len(),
                phone2_chars = state.phone2.len(),
                "Updated comparison context"
            ),
            None => warn!(
                query,
                phone1 = %ctx.request().phone1,
                phone2 = %ctx.request().phone2,
                "Search matches neither phone and both slots are filled, not recorded"
            ),
        }

        Ok(ToolResult::success(Value::String(features)))
    }
}

/// The `online_search` tool over `source`.
pub fn online_search_tool(
    source: Arc<dyn SpecSource>,
    settings: SearchSettings,
) -> Arc<dyn Tool<ComparisonContext>> {
    Arc::new(OnlineSearchTool::new(source, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Page, SearchHit};
    use crate::comparison::ComparisonRequest;
    use crate::model::MockProvider;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySource {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl SpecSource for FlakySource {
        async fn lookup(&self, query: &str) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(AgentsError::Timeout {
                    operation: "browser".to_string(),
                });
            }
            Ok(format!("specs of {}", query))
        }
    }

    fn quick_settings(max_retries: usize) -> SearchSettings {
        SearchSettings {
            retry: RetryConfig {
                max_retries,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                backoff_multiplier: 1.0,
                jitter: false,
            },
            ..SearchSettings::default()
        }
    }

    fn context() -> RunContext<ComparisonContext> {
        RunContext::new(ComparisonContext::new(ComparisonRequest {
            phone1: "iPhone 13".to_string(),
            phone2: "Samsung S21".to_string(),
        }))
    }

    #[test]
    fn test_browser_task_text() {
        assert_eq!(
            browser_task("Pixel 8"),
            "Find detailed specifications and features of Pixel 8 and return structured data."
        );
    }

    #[test]
    fn test_schema_requires_query() {
        let tool = online_search_tool(
            Arc::new(FlakySource {
                calls: AtomicUsize::new(0),
                failures: 0,
            }),
            SearchSettings::default(),
        );
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["query"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            failures: 2,
        });
        let tool = OnlineSearchTool::new(source.clone(), quick_settings(2));
        let ctx = context();

        let result = tool
            .execute(&ctx, serde_json::json!({"query": " Samsung S21 "}))
            .await
            .unwrap();

        assert_eq!(result.output, Value::String("specs of Samsung S21".into()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.snapshot().unwrap().phone2, "specs of Samsung S21");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_propagates_after_retries() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            failures: 10,
        });
        let tool = OnlineSearchTool::new(source, quick_settings(1));
        let ctx = context();

        let err = tool
            .execute(&ctx, serde_json::json!({"query": "iPhone 13"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentsError::Timeout { .. }));
        assert_eq!(ctx.snapshot().unwrap().phone1, "");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let tool = OnlineSearchTool::new(
            Arc::new(FlakySource {
                calls: AtomicUsize::new(0),
                failures: 0,
            }),
            SearchSettings::default(),
        );
        let err = tool
            .execute(&context(), serde_json::json!({"query": "  "}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentsError::ToolExecutionError { .. }));
    }

    struct StaticWeb;

    #[async_trait]
    impl WebClient for StaticWeb {
        async fn open(&self, url: &str) -> Result<Page> {
            Ok(Page {
                url: url.to_string(),
                title: "specs".to_string(),
                text: "Chip: A15".to_string(),
            })
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_browser_source_uses_fresh_agent_per_lookup() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let factory: ProviderFactory = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(
                MockProvider::new(BROWSER_MODEL)
                    .with_tool_call("done", serde_json::json!({"text": "Chip: A15"})),
            ) as Arc<dyn ModelProvider>
        });
        let source = BrowserSpecSource::with_parts(Arc::new(StaticWeb), factory, 5);

        assert_eq!(source.lookup("iPhone 13").await.unwrap(), "Chip: A15");
        assert_eq!(source.lookup("Samsung S21").await.unwrap(), "Chip: A15");
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }
}
