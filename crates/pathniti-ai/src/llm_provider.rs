use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for LLM operations
pub type LLMResult<T> = anyhow::Result<T>;

/// Configuration for generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_output_tokens: Option<usize>,
    /// Ask for a JSON document rather than prose
    pub json_response: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: Some(1000),
            json_response: false,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text content
    pub content: String,
    /// Total tokens used in the request
    pub total_tokens: Option<usize>,
    /// Tokens used in the prompt
    pub prompt_tokens: Option<usize>,
    /// Tokens generated in the completion
    pub completion_tokens: Option<usize>,
    /// Finish reason (e.g., "STOP", "MAX_TOKENS")
    pub finish_reason: Option<String>,
    /// Model used for generation
    pub model: String,
}

impl LLMResponse {
    /// Token counts for log lines, e.g. `14 tokens (10 prompt, 4 completion)`.
    pub fn token_summary(&self) -> String {
        let part = |n: Option<usize>| n.map_or_else(|| "?".to_string(), |n| n.to_string());
        match self.total_tokens {
            Some(total) => format!(
                "{} tokens ({} prompt, {} completion)",
                total,
                part(self.prompt_tokens),
                part(self.completion_tokens)
            ),
            None => "token usage not reported".to_string(),
        }
    }
}

/// Text-completion service consumed by the enhancement pass and counselor
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let messages = vec![Message {
            role: MessageRole::User,
            content: prompt.to_string(),
        }];
        self.generate_chat(&messages, config).await
    }

    /// Generate a chat completion with message history
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse>;

    /// Get the name of this provider
    fn provider_name(&self) -> &str;

    /// Get the model identifier
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(
        total: Option<usize>,
        prompt: Option<usize>,
        completion: Option<usize>,
    ) -> LLMResponse {
        LLMResponse {
            content: "ok".to_string(),
            total_tokens: total,
            prompt_tokens: prompt,
            completion_tokens: completion,
            finish_reason: None,
            model: "gemini-1.5-flash".to_string(),
        }
    }

    #[test]
    fn test_token_summary() {
        assert_eq!(
            response(Some(14), Some(10), Some(4)).token_summary(),
            "14 tokens (10 prompt, 4 completion)"
        );
        assert_eq!(
            response(Some(9), None, Some(9)).token_summary(),
            "9 tokens (? prompt, 9 completion)"
        );
        assert_eq!(
            response(None, None, None).token_summary(),
            "token usage not reported"
        );
    }
}
