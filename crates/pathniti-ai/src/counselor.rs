//! Free-form guidance questions answered by the provider.
//!
//! Unlike the recommendation engine, failures here are reported to the
//! caller: there is no heuristic answer to fall back on.

use crate::llm_factory::LLMProviderFactory;
use crate::llm_provider::{GenerationConfig, LLMProvider};
use crate::prompt::{self, CounselTemplate};
use chrono::{DateTime, Utc};
use pathniti_core::{LLMConfig, PathNitiError, RequestBudget, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounselTopic {
    #[default]
    General,
    CareerAdvice,
    StreamSelection,
    CollegeGuidance,
}

impl CounselTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounselTopic::General => "general",
            CounselTopic::CareerAdvice => "career_advice",
            CounselTopic::StreamSelection => "stream_selection",
            CounselTopic::CollegeGuidance => "college_guidance",
        }
    }

    fn template(&self) -> Option<&'static CounselTemplate> {
        match self {
            CounselTopic::General => None,
            CounselTopic::CareerAdvice => Some(&prompt::CAREER_ADVICE),
            CounselTopic::StreamSelection => Some(&prompt::STREAM_SELECTION),
            CounselTopic::CollegeGuidance => Some(&prompt::COLLEGE_GUIDANCE),
        }
    }
}

impl fmt::Display for CounselTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounselTopic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "general" => Ok(CounselTopic::General),
            "career_advice" => Ok(CounselTopic::CareerAdvice),
            "stream_selection" => Ok(CounselTopic::StreamSelection),
            "college_guidance" => Ok(CounselTopic::CollegeGuidance),
            other => Err(format!("unknown counsel topic: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounselRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default, rename = "type")]
    pub topic: CounselTopic,
}

/// Budget figures returned alongside each answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub requests_today: u32,
    pub remaining_today: u32,
    pub is_approaching_limit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounselReply {
    pub response: String,
    #[serde(rename = "type")]
    pub topic: CounselTopic,
    pub timestamp: DateTime<Utc>,
    pub usage: UsageSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<usize>,
}

pub struct Counselor {
    provider: Option<Arc<dyn LLMProvider>>,
    budget: Arc<dyn RequestBudget>,
    generation: GenerationConfig,
}

impl Counselor {
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

    pub fn from_config(config: &LLMConfig, budget: Arc<dyn RequestBudget>) -> Result<Self> {
        let provider = LLMProviderFactory::create_from_config(config)
            .map_err(|e| PathNitiError::Config(format!("{:#}", e)))?;
        let generation = GenerationConfig {
            json_response: false,
            ..LLMProviderFactory::generation_config(config)
        };
        Ok(Self::new(provider, budget, generation))
    }

    pub async fn ask(&self, request: CounselRequest) -> Result<CounselReply> {
        if request.prompt.trim().is_empty() {
            return Err(PathNitiError::InvalidInput("Prompt is required".to_string()));
        }

        let provider = self.provider.as_ref().ok_or_else(|| {
            PathNitiError::NotConfigured("Gemini API key not configured".to_string())
        })?;

        if let Err(reason) = self.budget.check() {
            return Err(PathNitiError::UsageLimit {
                reason,
                stats: self.budget.usage_stats(),
            });
        }

        let text = prompt::build_counsel_prompt(
            request.topic.template(),
            &request.prompt,
            request.context.as_deref(),
        );

        let response = provider
            .generate_with_config(&text, &self.generation)
            .await
            .map_err(|e| {
                warn!("Gemini API error: {:#}", e);
                PathNitiError::Provider(format!("{:#}", e))
            })?;

        self.budget.record_request();
        let stats = self.budget.usage_stats();
        info!(
            "Gemini API usage: {}/{} requests today, {}",
            stats.requests_today,
            stats.daily_limit,
            response.token_summary()
        );

        Ok(CounselReply {
            response: response.content,
            topic: request.topic,
            timestamp: Utc::now(),
            usage: UsageSnapshot {
                requests_today: stats.requests_today,
                remaining_today: self.budget.remaining_requests_today(),
                is_approaching_limit: self.budget.is_approaching_limit(),
            },
            tokens_used: response.total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathniti_core::UsageMonitor;

    #[test]
    fn test_topic_parsing() {
        assert_eq!(
            "career-advice".parse::<CounselTopic>(),
            Ok(CounselTopic::CareerAdvice)
        );
        assert_eq!(
            "STREAM_SELECTION".parse::<CounselTopic>(),
            Ok(CounselTopic::StreamSelection)
        );
        assert!("astrology".parse::<CounselTopic>().is_err());
        assert_eq!(CounselTopic::default(), CounselTopic::General);
    }

    #[test]
    fn test_request_json_uses_type_field() {
        let request: CounselRequest =
            serde_json::from_str(r#"{"prompt": "hi", "type": "college_guidance"}"#).unwrap();
        assert_eq!(request.topic, CounselTopic::CollegeGuidance);
        assert!(request.context.is_none());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_provider_check() {
        let counselor = Counselor::new(
            None,
            Arc::new(UsageMonitor::default()),
            GenerationConfig::default(),
        );
        let err = counselor
            .ask(CounselRequest {
                prompt: "   ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PathNitiError::InvalidInput(_)));

        let err = counselor
            .ask(CounselRequest {
                prompt: "Which stream?".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PathNitiError::NotConfigured(_)));
    }
}
