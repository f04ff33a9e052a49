//! Tool system for agents
//!
//! Tools are the only way agents touch the outside world. Each tool sees the
//! run's shared context through a [`RunContext`] handle. The runner executes
//! tool calls through a small Tower stack ([`ToolService`] plus an optional
//! timeout layer) so time bounds compose the same way for every tool.

use async_trait::async_trait;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};

use crate::context::RunContext;
use crate::error::{AgentsError, Result};

/// Result from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output from the tool
    pub output: Value,
    /// Whether this result should end the run as its final output
    pub is_final: bool,
    /// Optional error message if the tool failed softly
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            output,
            is_final: false,
            error: None,
        }
    }

    pub fn final_output(output: Value) -> Self {
        Self {
            output,
            is_final: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            is_final: false,
            error: Some(message.into()),
        }
    }
}

/// Function spec advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Trait for all tools that can be used by agents over context `C`
#[async_trait]
pub trait Tool<C>: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, ctx: &RunContext<C>, arguments: Value) -> Result<ToolResult>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type ToolFn<C> = Arc<dyn Fn(RunContext<C>, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A tool backed by an async closure
pub struct FunctionTool<C> {
    name: String,
    description: String,
    parameters_schema: Value,
    function: ToolFn<C>,
}

impl<C> Clone for FunctionTool<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters_schema: self.parameters_schema.clone(),
            function: self.function.clone(),
        }
    }
}

impl<C> std::fmt::Debug for FunctionTool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl<C: Send + Sync + 'static> FunctionTool<C> {
    /// Create a tool from raw JSON arguments to a JSON result.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(RunContext<C>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            function: Arc::new(move |ctx, args| -> BoxFuture<'static, Result<Value>> {
                Box::pin(function(ctx, args))
            }),
        }
    }

    /// Create a tool from a typed handler.
    ///
    /// - `A` is the argument struct; its schema is generated with `schemars`
    /// - `R` is any serializable output
    pub fn typed<A, R, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(RunContext<C>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let schema = schemars::schema_for!(A);
        let parameters_schema = serde_json::to_value(schema.schema)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        let handler = Arc::new(handler);
        Self::new(name, description, parameters_schema, move |ctx, raw| {
            let handler = handler.clone();
            async move {
                let args: A = serde_json::from_value(raw)?;
                let out = (handler.as_ref())(ctx, args).await?;
                Ok(serde_json::to_value(out)?)
            }
        })
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Tool<C> for FunctionTool<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, ctx: &RunContext<C>, arguments: Value) -> Result<ToolResult> {
        let output = (self.function)(ctx.clone(), arguments).await?;
        Ok(ToolResult::success(output))
    }
}

/// A single tool invocation routed through the Tower stack.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool_call_id: String,
    pub arguments: Value,
}

/// Tower service executing one tool against one run context.
pub struct ToolService<C> {
    tool: Arc<dyn Tool<C>>,
    ctx: RunContext<C>,
}

impl<C> ToolService<C> {
    pub fn new(tool: Arc<dyn Tool<C>>, ctx: RunContext<C>) -> Self {
        Self { tool, ctx }
    }
}

impl<C> Clone for ToolService<C> {
    fn clone(&self) -> Self {
        Self {
            tool: self.tool.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> Service<ToolRequest> for ToolService<C> {
    type Response = ToolResult;
    type Error = BoxError;
    type Future = BoxFuture<'static, std::result::Result<ToolResult, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), BoxError>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let tool = self.tool.clone();
        let ctx = self.ctx.clone();
        Box::pin(async move {
            tracing::debug!(tool = %tool.name(), call_id = %req.tool_call_id, "Executing tool");
            tool.execute(&ctx, req.arguments)
                .await
                .map_err(BoxError::from)
        })
    }
}

/// Execute one tool call, optionally bounded by `timeout`.
pub async fn invoke_tool<C: Send + Sync + 'static>(
    tool: Arc<dyn Tool<C>>,
    ctx: RunContext<C>,
    request: ToolRequest,
    timeout: Option<Duration>,
) -> Result<ToolResult> {
    let name = tool.name().to_string();
    let svc = ServiceBuilder::new()
        .option_layer(timeout.map(TimeoutLayer::new))
        .service(ToolService::new(tool, ctx));

    svc.oneshot(request)
        .await
        .map_err(|e| from_box_error(&name, e))
}

fn from_box_error(tool: &str, err: BoxError) -> AgentsError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return AgentsError::Timeout {
            operation: tool.to_string(),
        };
    }
    match err.downcast::<AgentsError>() {
        Ok(inner) => *inner,
        Err(other) => AgentsError::ToolExecutionError {
            message: format!("{}: {}", tool, other),
        },
    }
}
