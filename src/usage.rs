//! Token usage accounting for a run
//!
//! A comparison touches three agents (triage, online search, and one browser
//! agent per lookup), so usage is broken down per agent and per model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Add;

/// Token usage for a single completion call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    /// Number of API requests folded into this value.
    pub request_count: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            request_count: 1,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.request_count += other.request_count;
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.add_usage(&other);
        self
    }
}

/// Aggregated usage across a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total: Usage,
    pub by_model: HashMap<String, Usage>,
    pub by_agent: HashMap<String, Usage>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new `Usage`, updating the total and the breakdowns.
    pub fn record(&mut self, model: &str, agent: &str, usage: Usage) {
        self.total.add_usage(&usage);

        self.by_model
            .entry(model.to_string())
            .and_modify(|u| u.add_usage(&usage))
            .or_insert(usage.clone());

        self.by_agent
            .entry(agent.to_string())
            .and_modify(|u| u.add_usage(&usage))
            .or_insert(usage);
    }

    /// One-line summary suitable for a log field.
    pub fn summary(&self) -> String {
        let mut agents: Vec<_> = self.by_agent.iter().collect();
        agents.sort_by(|a, b| a.0.cmp(b.0));
        let per_agent: Vec<String> = agents
            .into_iter()
            .map(|(name, u)| format!("{}={}", name, u.total_tokens))
            .collect();
        format!(
            "{} tokens over {} requests [{}]",
            self.total.total_tokens,
            self.total.request_count,
            per_agent.join(", ")
        )
    }
}
