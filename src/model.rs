//! Model abstraction for LLM interactions
//!
//! Wraps async-openai against any OpenAI-compatible chat-completions endpoint.
//! The comparison agents and the browser agent each get their own provider so
//! they can run different models behind the same credential.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

use crate::config::{AppConfig, RetryConfig, GEMINI_BASE_URL};
use crate::error::{AgentsError, Result};
use crate::items::{Message, ModelResponse, Role, ToolCall};
use crate::retry::{retry_async, with_timeout, RetryPolicy};
use crate::tool::ToolSpec;
use crate::usage::Usage;

/// Trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a completion
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSpec>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<(ModelResponse, Usage)>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Provider for OpenAI-compatible endpoints using async-openai
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl OpenAIProvider {
    /// Provider for `model` on the fixed Gemini endpoint, using the configured
    /// credential, timeout and retry settings.
    pub fn from_config(config: &AppConfig, model: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(GEMINI_BASE_URL);
        Self {
            client: Client::with_config(openai_config),
            model: model.into(),
            timeout: config.api_timeout,
            retry: config.retry.clone(),
        }
    }

    /// Create with a custom client
    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }

    fn convert_message(msg: &Message) -> Result<ChatCompletionRequestMessage> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                let tool_calls = msg.tool_calls.as_deref().unwrap_or_default();
                if !msg.content.is_empty() || tool_calls.is_empty() {
                    builder.content(msg.content.clone());
                }
                if !tool_calls.is_empty() {
                    let openai_calls: Vec<ChatCompletionMessageToolCall> = tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(openai_calls);
                }
                builder.build()?.into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }

    fn convert_tools(tools: &[ToolSpec]) -> Result<Vec<ChatCompletionTool>> {
        tools
            .iter()
            .map(|tool| {
                let function = FunctionObjectArgs::default()
                    .name(tool.name.clone())
                    .description(tool.description.clone())
                    .parameters(tool.parameters.clone())
                    .build()?;
                Ok(ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()?)
            })
            .collect()
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSpec>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<(ModelResponse, Usage)> {
        let openai_messages = messages
            .iter()
            .map(Self::convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(openai_messages);

        if !tools.is_empty() {
            request.tools(Self::convert_tools(&tools)?);
        }

        if let Some(temp) = temperature {
            request.temperature(temp);
        }

        if let Some(max) = max_tokens {
            #[allow(deprecated)]
            request.max_tokens(max);
        }

        let request = request.build()?;
        let client = &self.client;
        let mut policy = RetryPolicy::new(self.retry.clone());
        let response = retry_async(
            || {
                let request = request.clone();
                with_timeout("chat completion", self.timeout, async move {
                    Ok(client.chat().create(request).await?)
                })
            },
            &mut policy,
        )
        .await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentsError::ModelBehaviorError {
                message: "No choices in response".to_string(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                    warn!(tool = %tc.function.name, "Unparseable tool arguments: {}", e);
                    Value::Null
                }),
            })
            .collect();

        let model_response = ModelResponse {
            id: response.id.clone(),
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            created_at: chrono::Utc::now(),
        };

        let usage = match &response.usage {
            Some(usage) => Usage::new(
                usage.prompt_tokens as usize,
                usage.completion_tokens as usize,
            ),
            None => Usage::empty(),
        };

        Ok((model_response, usage))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// What a [`MockProvider`] saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

enum Scripted {
    Response(ModelResponse),
    Failure(String),
}

/// Scripted provider for tests and offline runs.
///
/// Replays queued responses in order and records every request. Once the
/// queue is drained it answers with `"Default response"`.
pub struct MockProvider {
    model: String,
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.push(Scripted::Response(response));
        self
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.with_response(ModelResponse::new_message(content))
    }

    pub fn with_tool_call(self, tool_name: impl Into<String>, args: Value) -> Self {
        self.with_response(ModelResponse::new_tool_calls(vec![ToolCall::new(
            tool_name, args,
        )]))
    }

    /// Queue a failed completion.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Failure(message.into()));
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn push(&self, item: Scripted) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(item);
        }
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSpec>,
        _temperature: Option<f32>,
        _max_tokens: Option<u32>,
    ) -> Result<(ModelResponse, Usage)> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages,
                tools: tools.into_iter().map(|t| t.name).collect(),
            });
        }

        let next = self
            .responses
            .lock()
            .map_err(|_| AgentsError::Other("mock provider poisoned".to_string()))?
            .pop_front();

        match next {
            Some(Scripted::Response(response)) => Ok((response, Usage::new(10, 5))),
            Some(Scripted::Failure(message)) => Err(AgentsError::ModelBehaviorError { message }),
            None => Ok((
                ModelResponse::new_message("Default response"),
                Usage::new(10, 5),
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
