//! # Message handler
//!
//! Turns one chat message of the form `"X vs Y"` into a streamed markdown
//! comparison. The handler owns validation, the per-request
//! [`ComparisonContext`], and the chat edits; producing the table is left to a
//! [`Comparator`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::agents::comparison_agents;
use crate::chat::{ChatMessage, ChatSink};
use crate::comparison::{parse_comparison, ComparisonContext, ComparisonRequest, FeatureData};
use crate::config::{AppConfig, CHAT_MODEL};
use crate::context::RunContext;
use crate::error::Result;
use crate::flow::ComparisonFlow;
use crate::items::Message;
use crate::model::{ModelProvider, OpenAIProvider};
use crate::runner::{AgentRunner, LlmRunner, RunConfig};
use crate::search::{BrowserSpecSource, SearchSettings, SpecSource};

/// Reply for input that is not `"X vs Y"`.
pub const FORMAT_ERROR: &str =
    "❗ Please enter phone models in the format: `iPhone 13 vs Samsung S21`";

/// Default file for `--save` without a path.
pub const DEFAULT_SAVE_PATH: &str = "comparison.md";

fn placeholder(request: &ComparisonRequest) -> String {
    format!(
        "Fetching specifications for **{}** and **{}**...",
        request.phone1, request.phone2
    )
}

/// Produces the markdown comparison for a validated request.
#[async_trait]
pub trait Comparator: Send + Sync {
    /// `input` is the raw chat text; `ctx` already holds the parsed names.
    async fn compare(&self, input: &str, ctx: RunContext<ComparisonContext>) -> Result<String>;
}

/// Runs the triage agent, which hands off to the online search agent.
pub struct AgentComparator {
    runner: Arc<dyn AgentRunner<ComparisonContext>>,
    triage: Agent<ComparisonContext>,
}

impl AgentComparator {
    pub fn new(
        runner: Arc<dyn AgentRunner<ComparisonContext>>,
        triage: Agent<ComparisonContext>,
    ) -> Self {
        Self { runner, triage }
    }
}

#[async_trait]
impl Comparator for AgentComparator {
    async fn compare(&self, input: &str, ctx: RunContext<ComparisonContext>) -> Result<String> {
        let result = self
            .runner
            .run(&self.triage, vec![Message::user(input)], ctx)
            .await?;
        info!(
            agent = %result.last_agent,
            handoffs = result.handoff_count(),
            tokens = result.usage.total.total_tokens,
            trace_id = %result.trace_id,
            "Comparison run finished"
        );
        Ok(result.final_output_text())
    }
}

/// Runs the fixed fetch, fetch, compose sequence.
pub struct GuidedComparator {
    flow: ComparisonFlow,
}

impl GuidedComparator {
    pub fn new(flow: ComparisonFlow) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl Comparator for GuidedComparator {
    async fn compare(&self, _input: &str, ctx: RunContext<ComparisonContext>) -> Result<String> {
        self.flow.run(&ctx).await
    }
}

/// How comparisons are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ComparisonMode {
    /// The model decides when to hand off and search
    #[default]
    Agents,
    /// Both lookups happen in code, the model only writes the table
    Guided,
}

/// Build the production comparator for `mode`.
pub fn comparator_for(mode: ComparisonMode, config: &AppConfig) -> Result<Arc<dyn Comparator>> {
    let source: Arc<dyn SpecSource> = Arc::new(BrowserSpecSource::new(config)?);
    let settings = SearchSettings::from_config(config);
    let provider: Arc<dyn ModelProvider> =
        Arc::new(OpenAIProvider::from_config(config, CHAT_MODEL));

    Ok(match mode {
        ComparisonMode::Agents => {
            let runner = LlmRunner::new(
                RunConfig::default()
                    .with_model_provider(provider)
                    .with_max_turns(config.max_turns),
            );
            Arc::new(AgentComparator::new(
                Arc::new(runner),
                comparison_agents(source, settings),
            ))
        }
        ComparisonMode::Guided => Arc::new(GuidedComparator::new(ComparisonFlow::new(
            source, settings, provider,
        ))),
    })
}

/// What happened to one chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Not `"X vs Y"`; only the format error was sent.
    Rejected,
    Completed {
        markdown: String,
        request: ComparisonRequest,
        features: FeatureData,
    },
}

pub struct MessageHandler {
    comparator: Arc<dyn Comparator>,
    sink: Arc<dyn ChatSink>,
    stream_delay: Duration,
    save_path: Option<PathBuf>,
}

impl MessageHandler {
    pub fn new(
        comparator: Arc<dyn Comparator>,
        sink: Arc<dyn ChatSink>,
        stream_delay: Duration,
    ) -> Self {
        Self {
            comparator,
            sink,
            stream_delay,
            save_path: None,
        }
    }

    /// Also write each finished table to `path`.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// Handle one incoming chat message.
    ///
    /// Comparator errors are returned after the placeholder was sent; the
    /// placeholder is left as is.
    pub async fn handle(&self, text: &str) -> Result<HandlerOutcome> {
        let request = match parse_comparison(text) {
            Some(request) => request,
            None => {
                warn!(input = text, "Rejected message without ' vs '");
                ChatMessage::new(FORMAT_ERROR, self.sink.clone())
                    .send()
                    .await?;
                return Ok(HandlerOutcome::Rejected);
            }
        };

        info!(phone1 = %request.phone1, phone2 = %request.phone2, "Starting comparison");
        let ctx = RunContext::new(ComparisonContext::new(request.clone()));
        let mut message = ChatMessage::new(placeholder(&request), self.sink.clone());
        message.send().await?;

        let output = self.comparator.compare(text, ctx.clone()).await?;
        let markdown = output.trim().to_string();

        message.clear().await?;
        for line in markdown.lines() {
            message.stream_token(&format!("{}\n", line)).await?;
            tokio::time::sleep(self.stream_delay).await;
        }
        message.update().await?;

        ctx.set_comparison_markdown(markdown.clone())?;
        if let Some(path) = &self.save_path {
            tokio::fs::write(path, &markdown).await?;
            info!(path = %path.display(), "Saved comparison");
        }

        Ok(HandlerOutcome::Completed {
            markdown,
            request,
            features: ctx.snapshot()?,
        })
    }
}

impl std::fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandler")
            .field("stream_delay", &self.stream_delay)
            .field("save_path", &self.save_path)
            .finish()
    }
}
