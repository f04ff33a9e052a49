//! # Runner
//!
//! The `Runner` coordinates an agent run: it calls the model with the active
//! agent's tools and handoffs, executes tool calls through the tower stack in
//! [`crate::tool`], switches agents on handoff, and collects every step as a
//! [`RunItem`]. The run ends when the model answers with plain content or a
//! tool returns a final output.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::handoff::Handoff;
use crate::items::{Message, RunItem, ToolCall};
use crate::model::ModelProvider;
use crate::result::RunResult;
use crate::tool::{invoke_tool, ToolRequest, ToolResult};
use crate::usage::UsageStats;

const DEFAULT_MAX_TURNS: usize = 10;

fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    } else {
        s.to_string()
    }
}

/// Per-run settings.
#[derive(Clone, Default)]
pub struct RunConfig {
    /// Turn budget (model calls). Falls back to the agent's own budget, then
    /// to 10.
    pub max_turns: Option<usize>,

    /// Provider used for every agent in the run. Required.
    pub model_provider: Option<Arc<dyn ModelProvider>>,

    /// Execute the tool calls of one turn concurrently instead of in order.
    pub parallel_tools: bool,

    /// Upper bound for a single tool call.
    pub tool_timeout: Option<Duration>,

    /// Feed tool failures back to the model as tool messages instead of
    /// aborting the run.
    pub tool_errors_to_model: bool,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_turns", &self.max_turns)
            .field("model_provider", &self.model_provider.is_some())
            .field("parallel_tools", &self.parallel_tools)
            .field("tool_timeout", &self.tool_timeout)
            .field("tool_errors_to_model", &self.tool_errors_to_model)
            .finish()
    }
}

impl RunConfig {
    pub fn with_model_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.model_provider = Some(provider);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Toggle concurrent execution of tool calls within a single turn.
    pub fn with_parallel_tools(mut self, enabled: bool) -> Self {
        self.parallel_tools = enabled;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_tool_errors_to_model(mut self, enabled: bool) -> Self {
        self.tool_errors_to_model = enabled;
        self
    }
}

/// Stateless driver for agent runs.
pub struct Runner;

impl Runner {
    /// Run `agent` on `input` with `context` shared by every tool in the run.
    ///
    /// `input` is the conversation so far; the active agent's system message
    /// is prepended and replaced whenever control is handed off.
    pub async fn run<C>(
        agent: Agent<C>,
        input: Vec<Message>,
        context: RunContext<C>,
        config: RunConfig,
    ) -> Result<RunResult>
    where
        C: Send + Sync + 'static,
    {
        let trace_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("agent_run", trace_id = %trace_id);
        Self::run_loop(agent, input, context, config, trace_id)
            .instrument(span)
            .await
    }

    async fn run_loop<C>(
        mut agent: Agent<C>,
        input: Vec<Message>,
        context: RunContext<C>,
        config: RunConfig,
        trace_id: String,
    ) -> Result<RunResult>
    where
        C: Send + Sync + 'static,
    {
        info!(agent = %agent.name(), "Starting agent run");

        let provider = config
            .model_provider
            .clone()
            .ok_or_else(|| AgentsError::UserError {
                message: "No model provider configured for the run".to_string(),
            })?;
        let max_turns = config
            .max_turns
            .or(agent.config.max_turns)
            .unwrap_or(DEFAULT_MAX_TURNS);

        let mut messages = Vec::with_capacity(input.len() + 1);
        messages.push(agent.build_system_message());
        messages.extend(input);

        let mut items = Vec::new();
        let mut usage_stats = UsageStats::new();
        let mut turn = 0;

        loop {
            turn += 1;
            if turn > max_turns {
                warn!(max_turns, agent = %agent.name(), "Turn budget exhausted");
                return Err(AgentsError::MaxTurnsExceeded { max_turns });
            }
            debug!(turn, agent = %agent.name(), "Starting turn");

            let (response, usage) = provider
                .complete(
                    messages.clone(),
                    agent.advertised_tools(),
                    agent.config.temperature,
                    agent.config.max_tokens,
                )
                .await?;
            usage_stats.record(provider.model_name(), agent.name(), usage);

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(AgentsError::ModelBehaviorError {
                        message: format!(
                            "{} returned neither content nor tool calls",
                            agent.name()
                        ),
                    });
                }
                items.push(RunItem::message(agent.name(), content.clone()));
                info!(
                    agent = %agent.name(),
                    turns = turn,
                    usage = %usage_stats.summary(),
                    "Agent run finished"
                );
                return Ok(RunResult {
                    final_output: Value::String(content),
                    items,
                    last_agent: agent.name().to_string(),
                    usage: usage_stats,
                    trace_id,
                });
            }

            let content = response.content.clone().unwrap_or_default();
            if !content.is_empty() {
                items.push(RunItem::message(agent.name(), content.clone()));
            }
            messages.push(Message::assistant_with_tool_calls(
                content,
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                items.push(RunItem::tool_call(agent.name(), call));
            }

            // A handoff ends the turn; sibling calls are answered but not run.
            if let Some((call, handoff)) = response
                .tool_calls
                .iter()
                .find_map(|c| agent.find_handoff(&c.name).map(|h| (c, h.clone())))
            {
                let reason = Handoff::<C>::reason_from(&call.arguments);
                info!(
                    from = %agent.name(),
                    to = %handoff.agent().name(),
                    reason = reason.as_deref().unwrap_or(""),
                    "Handoff"
                );
                items.push(RunItem::handoff(
                    agent.name(),
                    handoff.agent().name(),
                    reason,
                ));

                for other in &response.tool_calls {
                    let reply = if other.id == call.id {
                        serde_json::json!({ "assistant": handoff.agent().name() })
                    } else {
                        serde_json::json!({
                            "error": format!(
                                "Not executed: control was handed off to {}",
                                handoff.agent().name()
                            )
                        })
                    };
                    messages.push(Message::tool(reply.to_string(), &other.id));
                    items.push(RunItem::tool_output(&other.id, reply, None));
                }

                agent = handoff.agent().clone();
                messages[0] = agent.build_system_message();
                continue;
            }

            let outcomes = if config.parallel_tools {
                join_all(
                    response
                        .tool_calls
                        .iter()
                        .map(|call| execute_call(&agent, &context, call, config.tool_timeout)),
                )
                .await
            } else {
                let mut outcomes = Vec::with_capacity(response.tool_calls.len());
                for call in &response.tool_calls {
                    let outcome = execute_call(&agent, &context, call, config.tool_timeout).await;
                    let failed = outcome.is_err();
                    outcomes.push(outcome);
                    if failed && !config.tool_errors_to_model {
                        break;
                    }
                }
                outcomes
            };

            for (call, outcome) in response.tool_calls.iter().zip(outcomes) {
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) if config.tool_errors_to_model => {
                        warn!(tool = %call.name, "Tool failed, reporting to model: {}", e);
                        ToolResult::error(e.to_string())
                    }
                    Err(e) => {
                        warn!(tool = %call.name, "Tool failed, aborting run: {}", e);
                        return Err(match e {
                            AgentsError::ToolExecutionError { .. } => e,
                            other => AgentsError::ToolExecutionError {
                                message: format!("{}: {}", call.name, other),
                            },
                        });
                    }
                };

                let text = match &result.error {
                    Some(error) => format!("Error: {}", error),
                    None => render_output(&result.output),
                };
                debug!(
                    tool = %call.name,
                    output = %truncate_for_log(&text, 200),
                    "Tool finished"
                );
                messages.push(Message::tool(text, &call.id));
                items.push(RunItem::tool_output(
                    &call.id,
                    result.output.clone(),
                    result.error.clone(),
                ));

                if result.is_final {
                    info!(tool = %call.name, agent = %agent.name(), "Tool ended the run");
                    return Ok(RunResult {
                        final_output: result.output,
                        items,
                        last_agent: agent.name().to_string(),
                        usage: usage_stats,
                        trace_id,
                    });
                }
            }
        }
    }
}

async fn execute_call<C>(
    agent: &Agent<C>,
    context: &RunContext<C>,
    call: &ToolCall,
    timeout: Option<Duration>,
) -> Result<ToolResult>
where
    C: Send + Sync + 'static,
{
    let tool = agent
        .find_tool(&call.name)
        .ok_or_else(|| AgentsError::ToolExecutionError {
            message: format!("Unknown tool: {}", call.name),
        })?;
    let request = ToolRequest {
        tool_call_id: call.id.clone(),
        arguments: call.arguments.clone(),
    };
    invoke_tool(tool, context.clone(), request, timeout).await
}

fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Something that can run an agent to completion.
///
/// The message handler depends on this rather than on [`Runner`] directly so
/// it can be exercised without a model.
#[async_trait]
pub trait AgentRunner<C>: Send + Sync {
    async fn run(
        &self,
        agent: &Agent<C>,
        input: Vec<Message>,
        context: RunContext<C>,
    ) -> Result<RunResult>;
}

/// [`AgentRunner`] backed by [`Runner`] and a fixed [`RunConfig`].
#[derive(Debug, Clone)]
pub struct LlmRunner {
    config: RunConfig,
}

impl LlmRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

#[async_trait]
impl<C> AgentRunner<C> for LlmRunner
where
    C: Send + Sync + 'static,
{
    async fn run(
        &self,
        agent: &Agent<C>,
        input: Vec<Message>,
        context: RunContext<C>,
    ) -> Result<RunResult> {
        Runner::run(agent.clone(), input, context, self.config.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ModelResponse, Role};
    use crate::model::MockProvider;
    use crate::tool::{FunctionTool, Tool};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    type Log = Mutex<Vec<String>>;

    fn record_tool() -> Arc<dyn Tool<Log>> {
        Arc::new(FunctionTool::<Log>::new(
            "record",
            "Records its input",
            serde_json::json!({"type": "object"}),
            |ctx: RunContext<Log>, args: Value| async move {
                let text = args["text"].as_str().unwrap_or_default().to_string();
                ctx.lock().unwrap().push(text.clone());
                Ok(Value::String(format!("recorded {}", text)))
            },
        ))
    }

    fn failing_tool() -> Arc<dyn Tool<Log>> {
        Arc::new(FunctionTool::<Log>::new(
            "explode",
            "Always fails",
            serde_json::json!({"type": "object"}),
            |_ctx, _args| async {
                Err(AgentsError::Other("browser crashed".to_string()))
            },
        ))
    }

    fn config(provider: Arc<MockProvider>) -> RunConfig {
        RunConfig::default().with_model_provider(provider)
    }

    #[tokio::test]
    async fn test_plain_answer_ends_run() {
        let provider = Arc::new(MockProvider::new("mock").with_message("Hello"));
        let agent = Agent::<()>::simple("Echo", "Echo things");

        let result = Runner::run(
            agent,
            vec![Message::user("hi")],
            RunContext::default(),
            config(provider.clone()),
        )
        .await
        .unwrap();

        assert_eq!(result.final_output_text(), "Hello");
        assert_eq!(result.last_agent, "Echo");
        assert_eq!(result.usage.total.request_count, 1);

        let requests = provider.requests();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[1].content, "hi");
    }

    #[tokio::test]
    async fn test_missing_provider_is_an_error() {
        let err = Runner::run(
            Agent::<()>::simple("A", "a"),
            vec![],
            RunContext::default(),
            RunConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentsError::UserError { .. }));
    }

    #[tokio::test]
    async fn test_tool_results_reach_context_and_model() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_tool_call("record", serde_json::json!({"text": "Pixel 8"}))
                .with_message("done"),
        );
        let agent = Agent::simple("Recorder", "Record").with_tool(record_tool());
        let ctx = RunContext::new(Log::default());

        let result = Runner::run(agent, vec![Message::user("go")], ctx.clone(), config(provider.clone()))
            .await
            .unwrap();

        assert_eq!(result.final_output_text(), "done");
        assert_eq!(*ctx.lock().unwrap(), vec!["Pixel 8".to_string()]);

        let requests = provider.requests();
        let second = &requests[1].messages;
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content, "recorded Pixel 8");
    }

    #[tokio::test]
    async fn test_parallel_tools_keep_call_order() {
        let calls = vec![
            ToolCall::new("record", serde_json::json!({"text": "one"})),
            ToolCall::new("record", serde_json::json!({"text": "two"})),
        ];
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_response(ModelResponse::new_tool_calls(calls.clone()))
                .with_message("done"),
        );
        let agent = Agent::simple("Recorder", "Record").with_tool(record_tool());

        Runner::run(
            agent,
            vec![],
            RunContext::new(Log::default()),
            config(provider.clone()).with_parallel_tools(true),
        )
        .await
        .unwrap();

        let requests = provider.requests();
        let second = &requests[1].messages;
        let replies: Vec<_> = second
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(replies, vec![calls[0].id.clone(), calls[1].id.clone()]);
    }

    #[tokio::test]
    async fn test_tool_error_aborts_run() {
        let provider = Arc::new(
            MockProvider::new("mock").with_tool_call("explode", serde_json::json!({})),
        );
        let agent = Agent::simple("Fragile", "Fail").with_tool(failing_tool());

        let err = Runner::run(agent, vec![], RunContext::new(Log::default()), config(provider))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AgentsError::ToolExecutionError { message } if message.contains("browser crashed"))
        );
    }

    #[tokio::test]
    async fn test_tool_error_can_go_to_model() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_tool_call("explode", serde_json::json!({}))
                .with_message("recovered"),
        );
        let agent = Agent::simple("Fragile", "Fail").with_tool(failing_tool());

        let result = Runner::run(
            agent,
            vec![],
            RunContext::new(Log::default()),
            config(provider.clone()).with_tool_errors_to_model(true),
        )
        .await
        .unwrap();

        assert_eq!(result.final_output_text(), "recovered");
        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert!(tool_msg.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error() {
        let provider = Arc::new(MockProvider::new("mock").with_tool_call("nope", Value::Null));
        let err = Runner::run(
            Agent::<()>::simple("A", "a"),
            vec![],
            RunContext::default(),
            config(provider),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentsError::ToolExecutionError { message } if message.contains("Unknown tool")));
    }

    #[tokio::test]
    async fn test_final_output_tool_ends_run() {
        let finisher: Arc<dyn Tool<()>> = Arc::new(FinalTool);
        let provider = Arc::new(MockProvider::new("mock").with_tool_call("finish", Value::Null));
        let agent = Agent::simple("A", "a").with_tool(finisher);

        let result = Runner::run(agent, vec![], RunContext::default(), config(provider.clone()))
            .await
            .unwrap();
        assert_eq!(result.final_output, serde_json::json!({"table": "| x |"}));
        assert_eq!(provider.requests().len(), 1);
    }

    #[derive(Debug)]
    struct FinalTool;

    #[async_trait]
    impl Tool<()> for FinalTool {
        fn name(&self) -> &str {
            "finish"
        }
        fn description(&self) -> &str {
            "Ends the run"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _ctx: &RunContext<()>, _arguments: Value) -> Result<ToolResult> {
            Ok(ToolResult::final_output(serde_json::json!({"table": "| x |"})))
        }
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_tool_call("record", serde_json::json!({"text": "a"}))
                .with_tool_call("record", serde_json::json!({"text": "b"})),
        );
        let agent = Agent::simple("Looper", "Loop").with_tool(record_tool());

        let err = Runner::run(
            agent,
            vec![],
            RunContext::new(Log::default()),
            config(provider).with_max_turns(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentsError::MaxTurnsExceeded { max_turns: 2 }));
    }

    #[tokio::test]
    async fn test_empty_answer_is_model_error() {
        let provider = Arc::new(MockProvider::new("mock").with_message("  "));
        let err = Runner::run(
            Agent::<()>::simple("Mute", "..."),
            vec![],
            RunContext::default(),
            config(provider),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentsError::ModelBehaviorError { .. }));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("ééé", 3), "é…");
    }
}
