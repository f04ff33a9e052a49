//! # Agent
//!
//! An `Agent` is a configured participant in a run: a name, instructions, the
//! tools it may call and the agents it may hand off to. Agents are generic over
//! the run context `C` their tools operate on, and are cheap to clone.

use std::sync::Arc;

use crate::handoff::Handoff;
use crate::items::Message;
use crate::tool::{Tool, ToolSpec};

/// Defines the complete configuration for an [`Agent`].
pub struct AgentConfig<C> {
    /// The name of the agent, used for identification and in logs.
    pub name: String,

    /// The system instructions that guide the agent's behavior.
    pub instructions: String,

    /// Used when this agent is a handoff target for another agent.
    pub handoff_description: Option<String>,

    /// Tools the agent can call.
    pub tools: Vec<Arc<dyn Tool<C>>>,

    /// Agents this agent can hand off control to.
    pub handoffs: Vec<Handoff<C>>,

    /// Model identifier sent with each completion request.
    pub model: String,

    /// Turn budget when the run config does not set one.
    pub max_turns: Option<usize>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

impl<C> Clone for AgentConfig<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            instructions: self.instructions.clone(),
            handoff_description: self.handoff_description.clone(),
            tools: self.tools.clone(),
            handoffs: self.handoffs.clone(),
            model: self.model.clone(),
            max_turns: self.max_turns,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl<C> Default for AgentConfig<C> {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            instructions: "You are a helpful assistant.".to_string(),
            handoff_description: None,
            tools: vec![],
            handoffs: vec![],
            model: crate::config::CHAT_MODEL.to_string(),
            max_turns: Some(10),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// An LLM-backed agent over run context `C`.
///
/// ```rust
/// use phone_compare::{Agent, Handoff};
///
/// let search = Agent::<()>::simple("Online Search Agent", "Look things up.")
///     .with_handoff_description("Searches the web");
/// let triage = Agent::simple("Triage Agent", "Route requests.")
///     .with_handoff(Handoff::new(search));
///
/// assert_eq!(triage.handoffs()[0].name, "transfer_to_online_search_agent");
/// ```
pub struct Agent<C> {
    pub config: AgentConfig<C>,
}

impl<C> Clone for Agent<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl<C> Agent<C> {
    pub fn new(config: AgentConfig<C>) -> Self {
        Self { config }
    }

    /// Creates an agent with just a name and instructions; everything else
    /// uses the [`AgentConfig`] defaults.
    pub fn simple(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self::new(AgentConfig {
            name: name.into(),
            instructions: instructions.into(),
            ..Default::default()
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool<C>>) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool<C>>>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff<C>) -> Self {
        self.config.handoffs.push(handoff);
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.config.handoff_description = Some(description.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.config.max_turns = Some(max_turns);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn instructions(&self) -> &str {
        &self.config.instructions
    }

    pub fn tools(&self) -> &[Arc<dyn Tool<C>>] {
        &self.config.tools
    }

    pub fn handoffs(&self) -> &[Handoff<C>] {
        &self.config.handoffs
    }

    pub fn find_tool(&self, name: &str) -> Option<Arc<dyn Tool<C>>> {
        self.config.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn find_handoff(&self, name: &str) -> Option<&Handoff<C>> {
        self.config.handoffs.iter().find(|h| h.name == name)
    }

    /// Everything the model may call this turn: tools first, then handoffs.
    pub fn advertised_tools(&self) -> Vec<ToolSpec> {
        self.config
            .tools
            .iter()
            .map(|t| t.spec())
            .chain(self.config.handoffs.iter().map(Handoff::spec))
            .collect()
    }

    /// Constructs the system message from the instructions plus a listing of
    /// available tools and handoff targets.
    pub fn build_system_message(&self) -> Message {
        let mut content = self.config.instructions.clone();

        if !self.config.tools.is_empty() {
            content.push_str("\n\nYou have access to the following tools:\n");
            for tool in &self.config.tools {
                content.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }

        if !self.config.handoffs.is_empty() {
            content.push_str("\n\nYou can hand off to the following agents:\n");
            for handoff in &self.config.handoffs {
                content.push_str(&format!("- {}: {}\n", handoff.name, handoff.description));
            }
        }

        Message::system(content)
    }
}

impl<C> std::fmt::Debug for Agent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .field("tools_count", &self.config.tools.len())
            .field("handoffs_count", &self.config.handoffs.len())
            .finish()
    }
}
