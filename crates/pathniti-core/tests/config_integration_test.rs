use pathniti_core::{ConfigError, ConfigManager, PathNitiConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_config_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    ConfigManager::create_default_config(&config_path).unwrap();
    assert!(config_path.exists());

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("gemini-1.5-flash"));
    assert!(!content.contains("gemini_api_key"));

    let parsed: PathNitiConfig = toml::from_str(&content).unwrap();
    assert_eq!(parsed.scoring, PathNitiConfig::default().scoring);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("pathniti.toml");
    fs::write(
        &config_path,
        r#"
[scoring]
confidence_divisor = 20.0
personality_threshold = 4.0

[logging]
format = "json"
"#,
    )
    .unwrap();

    let manager = ConfigManager::from_file(&config_path).unwrap();
    let config = manager.config();
    assert_eq!(config.scoring.confidence_divisor, 20.0);
    assert_eq!(config.scoring.personality_threshold, 4.0);
    assert_eq!(config.scoring.quiz_weight, 0.8);
    assert_eq!(config.logging.format, "json");
    assert_eq!(manager.config_path(), Some(config_path.as_path()));
}

#[test]
fn test_invalid_values_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(
        &config_path,
        r#"
[logging]
format = "xml"
"#,
    )
    .unwrap();

    assert!(matches!(
        ConfigManager::from_file(&config_path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_missing_and_malformed_files() {
    let temp_dir = TempDir::new().unwrap();
    assert!(matches!(
        ConfigManager::from_file(&temp_dir.path().join("absent.toml")),
        Err(ConfigError::NotFound(_))
    ));

    let broken = temp_dir.path().join("broken.toml");
    fs::write(&broken, "[scoring\nquiz_weight = ").unwrap();
    assert!(matches!(
        ConfigManager::from_file(&broken),
        Err(ConfigError::ParseError(_))
    ));
}
