pub mod counselor;
pub mod engine;
pub mod enhancer;
pub mod gemini_provider;
pub mod llm_factory;
pub mod llm_provider;
pub mod prompt;
pub mod response_parser;

pub use counselor::{CounselReply, CounselRequest, CounselTopic, Counselor, UsageSnapshot};
pub use engine::{RecommendationEngine, DEFAULT_LIMIT};
pub use enhancer::{AiEnhancer, EnhancementSkipped};
pub use gemini_provider::{GeminiConfig, GeminiProvider};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
