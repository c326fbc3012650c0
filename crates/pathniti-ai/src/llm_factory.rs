use crate::gemini_provider::{GeminiConfig, GeminiProvider};
use crate::llm_provider::*;
use anyhow::{anyhow, Result};
use pathniti_core::config_manager::LLMConfig;
use std::sync::Arc;
use tracing::warn;

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration.
    ///
    /// A missing API key is not an error: it yields `Ok(None)` and the engine
    /// runs heuristic-only.
    pub fn create_from_config(config: &LLMConfig) -> Result<Option<Arc<dyn LLMProvider>>> {
        let provider_name = config.provider.to_lowercase();

        match provider_name.as_str() {
            "gemini" => {
                if !config.has_api_key() {
                    warn!(
                        "GEMINI_API_KEY not found. AI features will use fallback recommendations."
                    );
                    return Ok(None);
                }
                Self::create_gemini_provider(config).map(Some)
            }
            _ => Err(anyhow!(
                "Unsupported LLM provider: {}. Available providers: {}",
                provider_name,
                Self::supported_providers().join(", ")
            )),
        }
    }

    fn create_gemini_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let gemini_config = GeminiConfig {
            api_key: config.gemini_api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            base_url: config.gemini_base_url.clone(),
            timeout_secs: config.timeout_secs,
        };

        Ok(Arc::new(GeminiProvider::new(gemini_config)?))
    }

    /// Generation parameters for the enhancement pass
    pub fn generation_config(config: &LLMConfig) -> GenerationConfig {
        GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: Some(config.max_output_tokens),
            json_response: config.structured_output,
        }
    }

    /// Get a list of supported providers
    pub fn supported_providers() -> Vec<&'static str> {
        vec!["gemini"]
    }
}
