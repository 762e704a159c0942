use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tokenvault_common::logging::{
    self, log_contract, log_storage, log_transaction, log_wallet, sanitize_for_logging,
    sanitize_params, LogConfig, LogLevel,
};

#[test]
fn test_sanitize_for_logging() {
    assert_eq!(sanitize_for_logging(""), "");
    assert_eq!(sanitize_for_logging("short"), "*****");
    assert_eq!(sanitize_for_logging("12345678"), "*****");
    assert_eq!(
        sanitize_for_logging("9dcbf5a86b4e70be97fc5c953ad4111dfe0a94ea6768286e5efd6c35fd9ec9d1"),
        "9dcb...c9d1"
    );
    // Multi-byte characters are not split
    assert_eq!(sanitize_for_logging("ééééxxxxéééé"), "éééé...éééé");
}

#[test]
fn test_sanitize_params_truncates_identifiers_only() {
    let params = json!({
        "txid": "9dcbf5a86b4e70be97fc5c953ad4111dfe0a94ea6768286e5efd6c35fd9ec9d1",
        "color_id": "c150ad685ec8638543b2356cb1071cf834fb1c84f5fa3a71699c3ed7167dfcdbb3",
        "role": "Funding",
        "kind": "reissuable",
        "amount": 1000,
    });

    let sanitized = sanitize_params(params);
    assert_eq!(sanitized["txid"], "9dcb...c9d1");
    assert_eq!(sanitized["color_id"], "c150...dbb3");
    assert_eq!(sanitized["role"], "Funding");
    assert_eq!(sanitized["kind"], "reissuable");
    assert_eq!(sanitized["amount"], 1000);

    // Non-object params are left alone
    assert_eq!(sanitize_params(json!("Funding")), json!("Funding"));
}

#[test]
fn test_log_config_default() {
    let config = LogConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert!(config.log_file.is_none());
    assert!(config.include_timestamps);
    assert!(!config.include_source_location);
    assert!(!config.json_format);
}

#[test]
fn test_init_and_log_to_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let log_path = temp_dir.path().join("tokenvault.log");
    let config = LogConfig {
        level: LogLevel::Debug,
        log_file: Some(log_path.to_string_lossy().to_string()),
        include_timestamps: false,
        include_source_location: false,
        json_format: true,
    };

    logging::init(&config).expect("Failed to initialize logging");
    // Repeated initialization is a no-op
    logging::init(&LogConfig::default()).expect("Second init should succeed");

    log_contract(LogLevel::Info, "issue planned", Some(json!({ "amount": 1000 })));
    log_wallet(
        LogLevel::Info,
        "broadcast",
        Some(json!({ "wallet": "alice-wallet-identifier" })),
    );
    log_transaction(LogLevel::Warn, "rejected", None);
    log_storage(LogLevel::Debug, "saved", Some(json!({ "color": "c150ad685ec8" })));
    log::logger().flush();

    let contents = fs::read_to_string(&log_path).unwrap_or_default();
    if !contents.is_empty() {
        assert!(contents.contains("[Contract] issue planned"));
        // Identifiers are truncated
        assert!(!contents.contains("alice-wallet-identifier"));
        assert!(contents.contains("alic...fier"));
    }

    logging::set_log_level(LogLevel::Trace);
    assert_eq!(log::max_level(), log::LevelFilter::Trace);
    logging::set_log_level(LogLevel::Error);
    assert_eq!(log::max_level(), log::LevelFilter::Error);
}
