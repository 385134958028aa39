/*!
 * Tests for application configuration functionality
 */

use aphasia_exercises::app_config::{Config, LogLevel, ProviderKind};
use aphasia_exercises::generation::PromptSettings;
use tempfile::TempDir;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.llm.provider, ProviderKind::Azure);
    assert_eq!(config.log_level, LogLevel::Info);

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["llm"]["api_version"], "2024-12-01-preview");
    assert_eq!(written["prompts"]["personalization"]["max_tokens"], 3000);
}

#[test]
fn test_loadOrCreate_withExistingFile_shouldKeepValues() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{
            "llm": {"provider": "openai", "model": "gpt-4o-mini", "api_key": "sk-test"},
            "database_path": "/tmp/afasia.db",
            "prompts": {"vnest": {"temperature": 0.1, "max_tokens": 500}}
        }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.llm.provider, ProviderKind::OpenAI);
    assert_eq!(config.llm.get_endpoint(), "https://api.openai.com/v1");
    assert_eq!(config.database_path.as_deref(), Some("/tmp/afasia.db"));
    assert_eq!(config.prompts.vnest, PromptSettings::new(0.1, 500));
    assert_eq!(config.prompts.sr, PromptSettings::sr());
    assert!(config.validate().is_ok());
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load_or_create(&path).unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_validate_withInvalidEndpoint_shouldFail() {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::OpenAI;
    config.llm.api_key = "sk-test".to_string();
    config.llm.endpoint = "not a url".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroMaxTokens_shouldFail() {
    let mut config = Config::default();
    config.prompts.personalization.max_tokens = 0;

    let err = config.validate_settings().unwrap_err();

    assert!(err.to_string().contains("personalization"));
}

#[test]
fn test_save_shouldRoundTrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Ollama;
    config.log_level = LogLevel::Trace;

    config.save(&path).unwrap();
    let loaded = Config::load_or_create(&path).unwrap();

    assert_eq!(loaded.llm, config.llm);
    assert_eq!(loaded.log_level, LogLevel::Trace);
}
