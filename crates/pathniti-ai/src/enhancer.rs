use crate::llm_provider::{GenerationConfig, LLMProvider};
use crate::prompt::build_enhancement_prompt;
use crate::response_parser::merge_response;
use pathniti_core::{Enhanceable, RecommendationKind, RequestBudget, UsageDenied, UserProfile};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a list was returned without AI commentary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnhancementSkipped {
    #[error("no AI provider configured")]
    NotConfigured,

    #[error("usage budget exhausted: {0}")]
    QuotaExhausted(UsageDenied),

    #[error("provider call failed: {0}")]
    ProviderFailed(String),
}

/// Optional AI pass over a heuristic list.
#[derive(Clone)]
pub struct AiEnhancer {
    provider: Option<Arc<dyn LLMProvider>>,
    budget: Arc<dyn RequestBudget>,
    generation: GenerationConfig,
}

impl AiEnhancer {
    pub fn new(
        provider: Option<Arc<dyn LLMProvider>>,
        budget: Arc<dyn RequestBudget>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            budget,
            generation,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn budget(&self) -> &Arc<dyn RequestBudget> {
        &self.budget
    }

    /// Ask the provider to annotate `recommendations`.
    ///
    /// Scores, order and length of the list are never changed. The budget is
    /// charged only when the provider answered.
    pub async fn enhance<R: Enhanceable + Send>(
        &self,
        kind: RecommendationKind,
        profile: &UserProfile,
        recommendations: Vec<R>,
    ) -> Result<Vec<R>, EnhancementSkipped> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(EnhancementSkipped::NotConfigured)?;

        self.budget
            .check()
            .map_err(EnhancementSkipped::QuotaExhausted)?;

        let prompt = build_enhancement_prompt(kind, profile, &recommendations);
        debug!(
            "Requesting {} enhancement for {} records from {}",
            kind,
            recommendations.len(),
            provider.model_name()
        );

        let response = provider
            .generate_with_config(&prompt, &self.generation)
            .await
            .map_err(|e| {
                warn!("Gemini enhancement failed: {:#}", e);
                EnhancementSkipped::ProviderFailed(format!("{:#}", e))
            })?;

        self.budget.record_request();
        let stats = self.budget.usage_stats();
        info!(
            "Gemini API usage: {}/{} requests today, {}",
            stats.requests_today,
            stats.daily_limit,
            response.token_summary()
        );
        if self.budget.is_approaching_limit() {
            warn!(
                "Approaching daily Gemini API limit ({} remaining)",
                self.budget.remaining_requests_today()
            );
        }

        Ok(merge_response(&response.content, recommendations))
    }
}
