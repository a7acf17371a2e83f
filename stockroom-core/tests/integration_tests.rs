//! Integration tests for stockroom-core infrastructure

use stockroom_core::{
    config_error, init_logging, storage_error, validation_error, ErrorContext, LogFormat,
    LoggingConfig, StockroomConfig, StockroomError,
};
use tempfile::TempDir;

#[test]
fn test_error_handling() {
    let error = storage_error!("Durable store unreadable", "auth");

    match &error {
        StockroomError::Storage {
            message,
            key,
            context,
            ..
        } => {
            assert_eq!(message, "Durable store unreadable");
            assert_eq!(key.as_deref(), Some("auth"));
            assert_eq!(context.component, "storage");
        }
        _ => panic!("Expected Storage error"),
    }

    // Should not panic without a subscriber
    error.log();

    let network_error = StockroomError::Network {
        message: "Connection refused".to_string(),
        source: None,
        context: ErrorContext::new("http_client").with_detail("attempt", 1),
    };
    assert!(network_error.is_transient());
    assert_eq!(network_error.context().unwrap().details["attempt"], "1");

    let config_error = config_error!("Invalid config");
    assert!(!config_error.is_transient());
    assert_eq!(config_error.suggestions().len(), 2);

    let validation = validation_error!("api.base_url", "bad");
    assert_eq!(validation.to_string(), "Invalid value for api.base_url: bad");
    assert!(validation.suggestions()[0].contains("api.base_url"));
}

#[test]
fn test_logging_initialization() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("stockroom.log");

    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        source_location: false,
        thread_ids: false,
        file: Some(log_path.clone()),
        filter_directives: vec!["stockroom_core=debug".to_string()],
    };

    // A global subscriber can only be installed once per process; the first
    // call in this test binary must succeed and create the file.
    init_logging(&config).unwrap();
    assert!(log_path.exists());
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_config_roundtrip_through_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    let mut config = StockroomConfig::default();
    config.api.base_url = "https://depo.example.com/api".to_string();
    config.auth.admin_role_ids = vec![1, 7];
    config.save_to_file(&path).unwrap();

    let loaded = StockroomConfig::from_file(&path).unwrap();
    assert_eq!(loaded.api.base_url, "https://depo.example.com/api");
    assert_eq!(loaded.auth.admin_role_ids, vec![1, 7]);
    loaded.validate().unwrap();
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    let config = StockroomConfig::load_or_default(temp.path().join("absent.toml")).unwrap();
    assert_eq!(config.auth.sign_in_path, "/sign-in");

    let broken = temp.path().join("broken.toml");
    std::fs::write(&broken, "[api\nbase_url = ").unwrap();
    assert!(matches!(
        StockroomConfig::load_or_default(&broken),
        Err(StockroomError::Config { .. })
    ));
}
