//! Guided comparison flow
//!
//! The same job as the agent hierarchy, with the sequence enforced in code:
//! fetch phone 1, fetch phone 2, then one completion call to compose the
//! table. Lookups reuse the `online_search` timeout and retry settings.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::comparison::{ComparisonContext, FeatureSlot};
use crate::config::CHAT_MODEL;
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::items::Message;
use crate::model::ModelProvider;
use crate::search::{OnlineSearchTool, SearchSettings, SpecSource};

const COMPOSE_INSTRUCTIONS: &str = "You compare two phones. You are given raw specification text for each. \
Return only a markdown table with one row per specification and one column per phone. \
Use the exact phone names as column headers and write N/A where a value is unknown.";

/// Model for the compose step.
pub const COMPOSE_MODEL: &str = CHAT_MODEL;

/// Where a guided comparison stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowState {
    FetchPhone1,
    FetchPhone2,
    Compose,
    Done,
}

impl FlowState {
    /// The only state reachable from `self`.
    pub fn next(self) -> Option<FlowState> {
        match self {
            FlowState::FetchPhone1 => Some(FlowState::FetchPhone2),
            FlowState::FetchPhone2 => Some(FlowState::Compose),
            FlowState::Compose => Some(FlowState::Done),
            FlowState::Done => None,
        }
    }
}

pub struct ComparisonFlow {
    search: OnlineSearchTool,
    provider: Arc<dyn ModelProvider>,
}

impl ComparisonFlow {
    pub fn new(
        source: Arc<dyn SpecSource>,
        settings: SearchSettings,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            search: OnlineSearchTool::new(source, settings),
            provider,
        }
    }

    /// Run the flow to completion and return the markdown table, which is
    /// also stored in the context.
    pub async fn run(&self, ctx: &RunContext<ComparisonContext>) -> Result<String> {
        let mut state = FlowState::FetchPhone1;
        let mut markdown = String::new();

        loop {
            debug!(state = ?state, "Comparison flow step");
            let next = match state {
                FlowState::FetchPhone1 => {
                    self.fetch(ctx, FeatureSlot::Phone1).await?;
                    FlowState::FetchPhone2
                }
                FlowState::FetchPhone2 => {
                    self.fetch(ctx, FeatureSlot::Phone2).await?;
                    FlowState::Compose
                }
                FlowState::Compose => {
                    markdown = self.compose(ctx).await?;
                    ctx.set_comparison_markdown(markdown.clone())?;
                    FlowState::Done
                }
                FlowState::Done => return Ok(markdown),
            };
            state = advance(state, next)?;
        }
    }

    async fn fetch(&self, ctx: &RunContext<ComparisonContext>, slot: FeatureSlot) -> Result<()> {
        let phone = ctx.phone(slot);
        info!(phone, slot = %slot, "Fetching specifications");
        let features = self.search.fetch(phone).await?;
        ctx.set_features(slot, features)
    }

    async fn compose(&self, ctx: &RunContext<ComparisonContext>) -> Result<String> {
        let data = ctx.snapshot()?;
        let request = ctx.request();
        let prompt = format!(
            "Phone 1: {}\n{}\n\nPhone 2: {}\n{}",
            request.phone1, data.phone1, request.phone2, data.phone2
        );
        let (response, usage) = self
            .provider
            .complete(
                vec![Message::system(COMPOSE_INSTRUCTIONS), Message::user(prompt)],
                Vec::new(),
                None,
                None,
            )
            .await?;
        info!(
            model = %self.provider.model_name(),
            tokens = usage.total_tokens,
            "Composed comparison"
        );

        let markdown = response.content.unwrap_or_default().trim().to_string();
        if markdown.is_empty() {
            return Err(AgentsError::ModelBehaviorError {
                message: "empty comparison table".to_string(),
            });
        }
        Ok(markdown)
    }
}

impl std::fmt::Debug for ComparisonFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonFlow")
            .field("search", &self.search)
            .field("model", &self.provider.model_name())
            .finish()
    }
}

fn advance(from: FlowState, to: FlowState) -> Result<FlowState> {
    if from.next() == Some(to) {
        Ok(to)
    } else {
        Err(AgentsError::Other(format!(
            "invalid flow transition {:?} -> {:?}",
            from, to
        )))
    }
}
