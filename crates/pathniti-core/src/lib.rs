pub mod ab_testing;
pub mod config_manager;
pub mod error;
pub mod feedback;
pub mod profile;
pub mod quiz;
pub mod recommendation;
pub mod reference;
pub mod scoring;
pub mod usage_monitor;

pub use ab_testing::*;
pub use config_manager::{
    CatalogConfig, ConfigError, ConfigManager, LLMConfig, LoggingConfig, PathNitiConfig,
    StorageConfig, UsageConfig,
};
pub use error::*;
pub use feedback::*;
pub use profile::*;
pub use quiz::*;
pub use recommendation::*;
pub use reference::*;
pub use scoring::*;
pub use usage_monitor::*;
