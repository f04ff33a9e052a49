//! The two comparison agents
//!
//! The Triage Agent owns the conversation and hands off to the Online Search
//! Agent, which is the only one with a tool.

use std::sync::Arc;

use crate::agent::Agent;
use crate::comparison::ComparisonContext;
use crate::config::CHAT_MODEL;
use crate::handoff::Handoff;
use crate::search::{online_search_tool, SearchSettings, SpecSource};
use crate::tool::Tool;

pub const TRIAGE_AGENT_NAME: &str = "Triage Agent";
pub const ONLINE_SEARCH_AGENT_NAME: &str = "Online Search Agent";

const ONLINE_SEARCH_INSTRUCTIONS: &str = "You are an Online Search Agent. Your goal is to fetch detailed specifications for a phone model.
# Routine:
1. Use the `online_search` tool to get specifications for the given phone model.
2. Save the retrieved information in the context.
3. Once every phone in the request has been searched, return the proper comparison in table form in markdown format string.";

const TRIAGE_INSTRUCTIONS: &str = "You are a Triage Agent. Your goal is to coordinate the process of phone model comparison. You have to delegate tasks to the Online Search Agent.
# Sequence:
1. Receive two phone model names from the user.
2. Handoff the first phone model to the `Online Search Agent`.
3. Handoff the second phone model to the `Online Search Agent`.
4. Return the proper comparison in table form in markdown format string.";

/// The agent that calls `online_search`.
pub fn online_search_agent(search: Arc<dyn Tool<ComparisonContext>>) -> Agent<ComparisonContext> {
    Agent::simple(ONLINE_SEARCH_AGENT_NAME, ONLINE_SEARCH_INSTRUCTIONS)
        .with_handoff_description("An agent that searches for phone specifications online.")
        .with_model(CHAT_MODEL)
        .with_tool(search)
}

/// The entry agent. It has no tools of its own.
pub fn triage_agent(online_search: Agent<ComparisonContext>) -> Agent<ComparisonContext> {
    Agent::simple(TRIAGE_AGENT_NAME, TRIAGE_INSTRUCTIONS)
        .with_handoff_description("An agent that delegates tasks to the correct sub-agents.")
        .with_model(CHAT_MODEL)
        .with_handoff(Handoff::new(online_search))
}

/// The full hierarchy over `source`, returned as its entry point.
pub fn comparison_agents(
    source: Arc<dyn SpecSource>,
    settings: SearchSettings,
) -> Agent<ComparisonContext> {
    triage_agent(online_search_agent(online_search_tool(source, settings)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct NoSource;

    #[async_trait]
    impl SpecSource for NoSource {
        async fn lookup(&self, _query: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_hierarchy_wiring() {
        let triage = comparison_agents(Arc::new(NoSource), SearchSettings::default());

        assert_eq!(triage.name(), TRIAGE_AGENT_NAME);
        assert!(triage.tools().is_empty());
        assert_eq!(triage.config.model, "gemini-2.0-flash");
        assert_eq!(
            triage.config.handoff_description.as_deref(),
            Some("An agent that delegates tasks to the correct sub-agents.")
        );

        let handoff = &triage.handoffs()[0];
        assert_eq!(handoff.name, "transfer_to_online_search_agent");
        assert_eq!(
            handoff.description,
            "An agent that searches for phone specifications online."
        );

        let search = handoff.agent();
        assert_eq!(search.name(), ONLINE_SEARCH_AGENT_NAME);
        assert_eq!(search.tools()[0].name(), "online_search");
        assert!(search.handoffs().is_empty());
    }

    #[test]
    fn test_triage_instructions_list_sequence() {
        let triage = comparison_agents(Arc::new(NoSource), SearchSettings::default());
        let system = triage.build_system_message().content;
        assert!(system.contains("2. Handoff the first phone model"));
        assert!(system.contains("3. Handoff the second phone model"));
        assert!(system.contains("transfer_to_online_search_agent"));
    }
}
