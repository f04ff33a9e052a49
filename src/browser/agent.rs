use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use super::{Page, WebClient};
use crate::agent::Agent;
use crate::config::BROWSER_MODEL;
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::items::{Message, RunItem};
use crate::model::ModelProvider;
use crate::runner::{RunConfig, Runner};
use crate::tool::{FunctionTool, Tool, ToolResult};
use crate::usage::UsageStats;

pub const BROWSER_AGENT_NAME: &str = "Browser Agent";

const DEFAULT_MAX_STEPS: usize = 15;

const INSTRUCTIONS: &str = "You are a web browsing agent. Complete the task you are given using your tools.
- Use `search_web` to find relevant pages, then `open_page` to read them.
- Prefer dedicated specification sites and the manufacturer's own pages.
- Only report facts you actually read on a page.
- When you have gathered enough, call `done` with the extracted result as structured text (one `Field: value` per line, grouped by category).";

#[derive(Debug, Default, Clone)]
struct SessionLog {
    visited: Vec<String>,
    extracted: Vec<String>,
    done: Option<String>,
}

/// Run context of one browser agent: the web client plus what has been seen.
pub struct BrowserSession {
    web: Arc<dyn WebClient>,
    log: Mutex<SessionLog>,
}

impl BrowserSession {
    pub fn new(web: Arc<dyn WebClient>) -> Self {
        Self {
            web,
            log: Mutex::new(SessionLog::default()),
        }
    }

    pub fn visited_urls(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.visited.clone())
    }

    fn record_page(&self, page: &Page) -> Result<()> {
        let mut log = self.lock()?;
        log.visited.push(page.url.clone());
        log.extracted.push(format!("{}\n{}", page.title, page.text));
        Ok(())
    }

    fn finish(&self, text: String) -> Result<()> {
        self.lock()?.done = Some(text);
        Ok(())
    }

    fn snapshot(&self) -> Result<SessionLog> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionLog>> {
        self.log
            .lock()
            .map_err(|_| AgentsError::Other("browser session lock poisoned".to_string()))
    }
}

impl fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserSession").finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchWebArgs {
    /// Search terms
    query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OpenPageArgs {
    /// Absolute http(s) URL to open
    url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DoneArgs {
    /// The extracted result
    text: String,
}

fn search_web_tool() -> Arc<dyn Tool<BrowserSession>> {
    Arc::new(FunctionTool::typed(
        "search_web",
        "Search the web and list result titles and URLs.",
        |ctx: RunContext<BrowserSession>, args: SearchWebArgs| async move {
            let hits = ctx.web.search(&args.query).await?;
            if hits.is_empty() {
                return Ok(format!("No results for '{}'", args.query));
            }
            Ok(hits
                .iter()
                .enumerate()
                .map(|(i, hit)| format!("{}. {} - {}", i + 1, hit.title, hit.url))
                .collect::<Vec<_>>()
                .join("\n"))
        },
    ))
}

fn open_page_tool() -> Arc<dyn Tool<BrowserSession>> {
    Arc::new(FunctionTool::typed(
        "open_page",
        "Open a URL and return the page's readable text.",
        |ctx: RunContext<BrowserSession>, args: OpenPageArgs| async move {
            let page = ctx.web.open(&args.url).await?;
            ctx.record_page(&page)?;
            Ok(format!("Title: {}\nURL: {}\n\n{}", page.title, page.url, page.text))
        },
    ))
}

/// Ends the browsing run with the extracted result.
#[derive(Debug)]
struct DoneTool;

#[async_trait]
impl Tool<BrowserSession> for DoneTool {
    fn name(&self) -> &str {
        "done"
    }

    fn description(&self) -> &str {
        "Finish the task and return the extracted result."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(DoneArgs).schema)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }

    async fn execute(&self, ctx: &RunContext<BrowserSession>, arguments: Value) -> Result<ToolResult> {
        let args: DoneArgs = serde_json::from_value(arguments)?;
        ctx.finish(args.text.clone())?;
        Ok(ToolResult::final_output(Value::String(args.text)))
    }
}

/// What a browser agent run produced.
#[derive(Debug, Clone)]
pub struct AgentHistory {
    pub task: String,
    pub visited_urls: Vec<String>,
    pub items: Vec<RunItem>,
    pub usage: UsageStats,
    done_text: Option<String>,
    final_text: String,
}

impl AgentHistory {
    /// The result passed to `done`, or the agent's last answer if it stopped
    /// without calling it.
    pub fn extracted_content(&self) -> String {
        self.done_text
            .clone()
            .unwrap_or_else(|| self.final_text.clone())
    }

    /// Whether the agent finished through `done`.
    pub fn is_done(&self) -> bool {
        self.done_text.is_some()
    }
}

/// One browsing task, run once.
pub struct BrowserAgent {
    task: String,
    provider: Arc<dyn ModelProvider>,
    web: Arc<dyn WebClient>,
    max_steps: usize,
}

impl BrowserAgent {
    pub fn new(
        task: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
        web: Arc<dyn WebClient>,
    ) -> Self {
        Self {
            task: task.into(),
            provider,
            web,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Model calls allowed before the run is cut off.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    fn agent(&self) -> Agent<BrowserSession> {
        let done: Arc<dyn Tool<BrowserSession>> = Arc::new(DoneTool);
        Agent::simple(BROWSER_AGENT_NAME, INSTRUCTIONS)
            .with_model(BROWSER_MODEL)
            .with_tools(vec![search_web_tool(), open_page_tool(), done])
    }

    /// Browse until the model calls `done`, answers in plain text, or runs
    /// out of steps. Running out of steps still yields a history when at least
    /// one page was read; its content is the raw text of the pages visited.
    pub async fn run(self) -> Result<AgentHistory> {
        info!(task = %self.task, max_steps = self.max_steps, "Browser agent started");
        let session = RunContext::new(BrowserSession::new(self.web.clone()));
        let config = RunConfig::default()
            .with_model_provider(self.provider.clone())
            .with_max_turns(self.max_steps)
            .with_tool_errors_to_model(true);

        let outcome = Runner::run(
            self.agent(),
            vec![Message::user(self.task.clone())],
            session.clone(),
            config,
        )
        .await;
        let log = session.snapshot()?;

        match outcome {
            Ok(result) => {
                info!(
                    visited = log.visited.len(),
                    done = log.done.is_some(),
                    "Browser agent finished"
                );
                Ok(AgentHistory {
                    task: self.task,
                    visited_urls: log.visited,
                    items: result.items.clone(),
                    usage: result.usage.clone(),
                    done_text: log.done,
                    final_text: result.final_output_text(),
                })
            }
            Err(AgentsError::MaxTurnsExceeded { max_turns }) if !log.extracted.is_empty() => {
                warn!(
                    max_turns,
                    pages = log.extracted.len(),
                    "Browser agent ran out of steps, returning raw page text"
                );
                Ok(AgentHistory {
                    task: self.task,
                    visited_urls: log.visited,
                    items: Vec::new(),
                    usage: UsageStats::new(),
                    done_text: None,
                    final_text: log.extracted.join("\n\n"),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SearchHit;
    use crate::model::MockProvider;
    use pretty_assertions::assert_eq;

    struct FakeWeb;

    #[async_trait]
    impl WebClient for FakeWeb {
        async fn open(&self, url: &str) -> Result<Page> {
            if url.contains("missing") {
                return Err(AgentsError::ToolExecutionError {
                    message: "404".to_string(),
                });
            }
            Ok(Page {
                url: url.to_string(),
                title: "Pixel 8 specs".to_string(),
                text: "Display: 6.2 inch OLED\nBattery: 4575 mAh".to_string(),
            })
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
            Ok(vec![SearchHit {
                title: format!("{} - specifications", query),
                url: "https://specs.example/pixel-8".to_string(),
            }])
        }
    }

    #[tokio::test]
    async fn test_browse_then_done() {
        let provider = Arc::new(
            MockProvider::new(BROWSER_MODEL)
                .with_tool_call("search_web", serde_json::json!({"query": "Pixel 8"}))
                .with_tool_call(
                    "open_page",
                    serde_json::json!({"url": "https://specs.example/pixel-8"}),
                )
                .with_tool_call("done", serde_json::json!({"text": "Display: 6.2 inch OLED"})),
        );

        let history = BrowserAgent::new("Find Pixel 8 specs", provider.clone(), Arc::new(FakeWeb))
            .run()
            .await
            .unwrap();

        assert!(history.is_done());
        assert_eq!(history.extracted_content(), "Display: 6.2 inch OLED");
        assert_eq!(history.visited_urls, vec!["https://specs.example/pixel-8"]);

        let requests = provider.requests();
        assert_eq!(requests[0].tools, vec!["search_web", "open_page", "done"]);
        let search_reply = requests[1].messages.last().unwrap();
        assert_eq!(
            search_reply.content,
            "1. Pixel 8 - specifications - https://specs.example/pixel-8"
        );
    }

    #[tokio::test]
    async fn test_plain_answer_is_extracted_content() {
        let provider = Arc::new(
            MockProvider::new(BROWSER_MODEL)
                .with_tool_call("open_page", serde_json::json!({"url": "https://x/missing"}))
                .with_message("Could not find specifications."),
        );

        let history = BrowserAgent::new("task", provider.clone(), Arc::new(FakeWeb))
            .run()
            .await
            .unwrap();

        assert!(!history.is_done());
        assert_eq!(history.extracted_content(), "Could not find specifications.");
        assert!(history.visited_urls.is_empty());

        // Page errors are reported back to the model rather than aborting.
        let reply = provider.requests()[1].messages.last().cloned().unwrap();
        assert!(reply.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_out_of_steps_returns_page_text() {
        let provider = Arc::new(
            MockProvider::new(BROWSER_MODEL)
                .with_tool_call(
                    "open_page",
                    serde_json::json!({"url": "https://specs.example/pixel-8"}),
                )
                .with_tool_call("search_web", serde_json::json!({"query": "more"})),
        );

        let history = BrowserAgent::new("task", provider, Arc::new(FakeWeb))
            .with_max_steps(2)
            .run()
            .await
            .unwrap();

        assert_eq!(
            history.extracted_content(),
            "Pixel 8 specs\nDisplay: 6.2 inch OLED\nBattery: 4575 mAh"
        );
    }

    #[tokio::test]
    async fn test_out_of_steps_without_pages_is_an_error() {
        let provider = Arc::new(
            MockProvider::new(BROWSER_MODEL)
                .with_tool_call("search_web", serde_json::json!({"query": "a"})),
        );

        let err = BrowserAgent::new("task", provider, Arc::new(FakeWeb))
            .with_max_steps(1)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, AgentsError::MaxTurnsExceeded { max_turns: 1 }));
    }
}
