//! # Phone comparison agents
//!
//! Compares two phones from a chat message such as `"iPhone 13 vs Samsung S21"`.
//! A Triage Agent hands each phone off to an Online Search Agent, whose
//! `online_search` tool drives a small browser agent and records the
//! specifications in a shared [`ComparisonContext`]. The final markdown table
//! is streamed back into the chat line by line.
//!
//! ## Core Concepts
//!
//! - **Agent**: instructions, tools and handoffs for one role in the run
//! - **Handoff**: a tool call that permanently passes control to another agent
//! - **Runner**: drives the model/tool loop until an agent produces text
//! - **RunContext**: the per-run state every tool reads and writes
//! - **MessageHandler**: validates input, runs a [`Comparator`], streams the table
//!
//! ## Getting Started
//!
//! Set `GEMINI_API_KEY` in the environment (or a `.env` file).
//!
//! ```rust,no_run
//! use phone_compare::{comparator_for, AppConfig, ComparisonMode, MessageHandler, TerminalSink};
//! use std::sync::Arc;
//!
//! # async fn example() -> phone_compare::Result<()> {
//! let config = AppConfig::from_env()?;
//! let comparator = comparator_for(ComparisonMode::Agents, &config)?;
//! let handler = MessageHandler::new(comparator, Arc::new(TerminalSink), config.stream_delay);
//!
//! handler.handle("iPhone 13 vs Samsung S21").await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agents;
pub mod browser;
pub mod chat;
pub mod comparison;
pub mod config;
pub mod context;
pub mod error;
pub mod flow;
pub mod handler;
pub mod handoff;
pub mod items;
pub mod model;
pub mod result;
pub mod retry;
pub mod runner;
pub mod search;
pub mod tool;
pub mod usage;

pub use agent::{Agent, AgentConfig};
pub use agents::{comparison_agents, ONLINE_SEARCH_AGENT_NAME, TRIAGE_AGENT_NAME};
pub use chat::{ChatEvent, ChatMessage, ChatSink, MemorySink, TerminalSink};
pub use comparison::{
    parse_comparison, ComparisonContext, ComparisonRequest, FeatureData, FeatureSlot, SlotPolicy,
};
pub use config::{AppConfig, RetryConfig};
pub use context::RunContext;
pub use error::{AgentsError, Result};
pub use flow::{ComparisonFlow, FlowState};
pub use handler::{
    comparator_for, AgentComparator, Comparator, ComparisonMode, GuidedComparator,
    HandlerOutcome, MessageHandler, FORMAT_ERROR,
};
pub use handoff::Handoff;
pub use items::{Message, ModelResponse, Role, RunItem, ToolCall};
pub use model::{MockProvider, ModelProvider, OpenAIProvider};
pub use result::RunResult;
pub use runner::{AgentRunner, LlmRunner, RunConfig, Runner};
pub use search::{online_search_tool, BrowserSpecSource, SearchSettings, SpecSource};
pub use tool::{FunctionTool, Tool, ToolResult};
pub use usage::{Usage, UsageStats};
