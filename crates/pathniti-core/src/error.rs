use crate::usage_monitor::{UsageDenied, UsageStats};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathNitiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("AI provider not configured: {0}")]
    NotConfigured(String),

    #[error("API usage limit reached ({reason}). Please try again later.")]
    UsageLimit {
        reason: UsageDenied,
        stats: UsageStats,
    },

    #[error("AI provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, PathNitiError>;
