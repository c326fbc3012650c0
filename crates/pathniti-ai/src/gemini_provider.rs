use crate::llm_provider::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Configuration for the Google Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key for Gemini
    pub api_key: String,
    /// Model to use (e.g., "gemini-1.5-flash")
    pub model: String,
    /// REST base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Google Gemini `generateContent` provider.
///
/// A single attempt per call: a failed request surfaces immediately so the
/// caller can degrade to its heuristic path.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!(
                "Gemini API key is required. Set GEMINI_API_KEY environment variable."
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(messages: &[Message], config: &GenerationConfig) -> GeminiRequest {
        let system_instruction = messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            });

        let contents = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        MessageRole::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: Some(config.temperature),
                max_output_tokens: config.max_output_tokens,
                response_mime_type: config
                    .json_response
                    .then(|| "application/json".to_string()),
            },
        }
    }

    async fn send_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<GeminiResponse> {
        let request = Self::build_request(messages, config);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to send request to Gemini API")?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to parse Gemini API response")
    }
}

/// Flatten the first candidate into an `LLMResponse`, joining its parts.
fn into_llm_response(response: GeminiResponse, fallback_model: &str) -> Result<LLMResponse> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

    let content = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if content.is_empty() {
        return Err(anyhow!(
            "Gemini returned an empty candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }

    let usage = response.usage_metadata.unwrap_or_default();

    Ok(LLMResponse {
        content,
        total_tokens: usage.total_token_count,
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        finish_reason: candidate.finish_reason,
        model: response
            .model_version
            .unwrap_or_else(|| fallback_model.to_string()),
    })
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let response = self.send_request(messages, config).await?;
        into_llm_response(response, &self.config.model)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Gemini API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation_requires_api_key() {
        let config = GeminiConfig {
            api_key: "  ".to_string(),
            ..Default::default()
        };
        assert!(GeminiProvider::new(config).is_err());
    }

    #[test]
    fn test_endpoint_uses_model() {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: "test-key".to_string(),
            base_url: "http://localhost:9999/v1beta/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![
            Message {
                role: MessageRole::System,
                content: "be brief".to_string(),
            },
            Message {
                role: MessageRole::User,
                content: "hello".to_string(),
            },
        ];
        let config = GenerationConfig {
            json_response: true,
            ..Default::default()
        };
        let value =
            serde_json::to_value(GeminiProvider::build_request(&messages, &config)).unwrap();

        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1000);
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 10,
                "candidatesTokenCount": 4,
                "totalTokenCount": 14
            }
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        let response = into_llm_response(parsed, "gemini-1.5-flash").unwrap();

        assert_eq!(response.content, "{\"a\":1}");
        assert_eq!(response.total_tokens, Some(14));
        assert_eq!(response.prompt_tokens, Some(10));
        assert_eq!(response.completion_tokens, Some(4));
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_empty_candidate_is_an_error() {
        let raw = r#"{"candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        let err = into_llm_response(parsed, "m").unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_no_candidates_is_an_error() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let err = into_llm_response(parsed, "m").unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }

    #[test]
    fn test_default_config_has_no_key() {
        assert!(GeminiConfig::default().api_key.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: "SECRET123KEY".to_string(),
            base_url: "http://127.0.0.1:1/v1beta".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let err = provider
            .generate_with_config("hello", &GenerationConfig::default())
            .await
            .unwrap_err();
        let text = format!("{:#} {:?}", err, err);
        assert!(!text.contains("SECRET123KEY"), "key leaked: {}", text);
    }
}
