// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use burst_capture::{BurstConfig, BurstError, ConfigError};

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = BurstConfig::default();

    // Check sensible defaults
    assert_eq!(config.max_parallel_captures, 2);
    assert_eq!(config.max_total_captures, 8);
    assert_eq!(config.min_capture_interval_ms, 250);
    assert_eq!(config.poll_interval_ms, 50);
    assert_eq!(config.worker_threads, 2);
    assert_eq!(config.memory_pressure_threshold, 0.80);
    assert_eq!(config.buffer_pool.small_max_bytes, 16 * 1024);
    assert_eq!(config.buffer_pool.medium_max_bytes, 1024 * 1024);
    assert_eq!(config.buffer_pool.max_pool_size, 5);
}

#[test]
fn test_config_json_roundtrip_preserves_overrides() {
    let json = r#"{
        "max_parallel_captures": 3,
        "max_total_captures": 10,
        "min_capture_interval_ms": 300,
        "buffer_pool": { "max_pool_size": 2 }
    }"#;

    let config = BurstConfig::from_json(json).unwrap();
    assert_eq!(config.max_parallel_captures, 3);
    assert_eq!(config.max_total_captures, 10);
    assert_eq!(config.min_capture_interval_ms, 300);
    assert_eq!(config.buffer_pool.max_pool_size, 2);
    // Untouched nested fields keep defaults
    assert_eq!(config.buffer_pool.small_max_bytes, 16 * 1024);

    let reparsed = BurstConfig::from_json(&serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(reparsed, config);
}

#[test]
fn test_config_invalid_values_rejected() {
    let result = BurstConfig::from_json(r#"{ "max_parallel_captures": 0 }"#);
    assert!(matches!(
        result,
        Err(BurstError::Config(ConfigError::OutOfRange {
            field: "max_parallel_captures",
            ..
        }))
    ));
}

#[test]
fn test_config_load_missing_file() {
    let result = BurstConfig::load(std::path::Path::new("/nonexistent/burst.json"));
    assert!(matches!(result, Err(BurstError::Io(_))));
}

#[test]
fn test_config_load_from_file() {
    let path = std::env::temp_dir().join(format!("burst-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "worker_threads": 3 }"#).unwrap();

    let config = BurstConfig::load(&path);
    let _ = std::fs::remove_file(&path);

    assert_eq!(config.unwrap().worker_threads, 3);
}
