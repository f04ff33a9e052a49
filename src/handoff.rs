//! # Agent handoffs
//!
//! A handoff lets one agent transfer the conversation to another. It is
//! advertised to the model as an ordinary function named
//! `transfer_to_<agent_name>`; when the model calls it, the runner switches the
//! active agent instead of executing anything. Control stays with the target
//! for the rest of the run.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::agent::Agent;
use crate::tool::ToolSpec;

/// A potential handoff target.
pub struct Handoff<C> {
    /// Function name the model calls to trigger this handoff.
    pub name: String,

    /// Shown to the delegating model to help it decide when to hand off.
    pub description: String,

    /// The agent that takes over.
    pub agent: Arc<Agent<C>>,
}

impl<C> Handoff<C> {
    /// Hand off to `agent`. The function name is derived from the agent name,
    /// and the description from its handoff description when it has one.
    pub fn new(agent: Agent<C>) -> Self {
        let name = transfer_tool_name(agent.name());
        let description = agent
            .config
            .handoff_description
            .clone()
            .unwrap_or_else(|| format!("Handoff to the {} agent to handle the request.", agent.name()));
        Self {
            name,
            description,
            agent: Arc::new(agent),
        }
    }

    /// Override the description advertised to the model.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn agent(&self) -> &Agent<C> {
        &self.agent
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Reason for handoff"}
                }
            }),
        }
    }

    /// Reason supplied by the model, if any.
    pub fn reason_from(arguments: &Value) -> Option<String> {
        arguments
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl<C> Clone for Handoff<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            agent: self.agent.clone(),
        }
    }
}

impl<C> fmt::Debug for Handoff<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// `"Online Search Agent"` becomes `"transfer_to_online_search_agent"`.
pub fn transfer_tool_name(agent_name: &str) -> String {
    let mut snake = String::with_capacity(agent_name.len());
    for word in agent_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if !snake.is_empty() {
            snake.push('_');
        }
        snake.push_str(&word.to_ascii_lowercase());
    }
    format!("transfer_to_{}", snake)
}
