//! Result types for agent execution

use serde_json::Value;

use crate::items::RunItem;
use crate::usage::UsageStats;

/// The result of running an agent.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The final output: the last assistant text, or the value of a tool that
    /// ended the run
    pub final_output: Value,
    /// Everything that happened during the run, in order
    pub items: Vec<RunItem>,
    /// Name of the agent that produced the final output
    pub last_agent: String,
    pub usage: UsageStats,
    pub trace_id: String,
}

impl RunResult {
    /// The final output as text. String outputs are returned as-is, anything
    /// else is rendered as JSON.
    pub fn final_output_text(&self) -> String {
        match &self.final_output {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Number of handoffs taken during the run.
    pub fn handoff_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, RunItem::Handoff(_)))
            .count()
    }
}
