//! Configuration files on disk: the shipped sample, reloads and the
//! pipeline rebuild that follows them.

use braid::{BraidConfig, BraidConfigManager, ServiceHandle};
use braid::types::SourceId;
use braid::utils::toml_config::ConfigError;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const SAMPLE: &str = include_str!("../braid.toml");

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file.flush().expect("flush config");
    file
}

#[test]
fn test_shipped_sample_is_valid() {
    let config = BraidConfig::from_toml(SAMPLE).expect("sample config parses");

    assert_eq!(config.sources.len(), 4);
    assert_eq!(config.enabled_sources().count(), 4);
    assert_eq!(config.sources[&SourceId::Image].max_items, 12);
    assert!(config.synthesis.base_url.is_none());
}

#[test]
fn test_missing_file_is_reported() {
    let result = BraidConfig::load("/definitely/not/here/braid.toml");
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let file = write_config("[server\nport = 1");
    assert!(matches!(
        BraidConfig::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_manual_reload_bumps_generation() {
    let file = write_config("[server]\nport = 4000\n");
    let manager = BraidConfigManager::new(file.path()).unwrap();
    assert_eq!(manager.config().server.port, 4000);
    assert_eq!(manager.generation(), 0);

    std::fs::write(file.path(), "[server]\nport = 4001\n").unwrap();
    manager.reload().unwrap();

    assert_eq!(manager.config().server.port, 4001);
    assert_eq!(manager.generation(), 1);
}

#[test]
fn test_failed_reload_keeps_previous_config() {
    let file = write_config("[server]\nport = 4000\n");
    let manager = BraidConfigManager::new(file.path()).unwrap();

    std::fs::write(file.path(), "[synthesis]\nword_budget = 0\n").unwrap();
    assert!(manager.reload().is_err());

    assert_eq!(manager.config().server.port, 4000);
    assert_eq!(manager.generation(), 0);
}

#[test]
fn test_service_handle_rebuilds_after_reload() {
    let file = write_config("[cache]\nenabled = false\n");
    let manager = Arc::new(BraidConfigManager::new(file.path()).unwrap());
    let handle = ServiceHandle::from_manager(Arc::clone(&manager)).unwrap();

    let before = handle.service();
    assert!(Arc::ptr_eq(&before, &handle.service()));
    assert!(before.orchestrator().sources().is_empty());

    std::fs::write(
        file.path(),
        "[sources.video]\nendpoint = \"http://127.0.0.1:9/video\"\n",
    )
    .unwrap();
    manager.reload().unwrap();

    let after = handle.service();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.orchestrator().sources(), vec![SourceId::Video]);
    assert!(after.orchestrator().cache().is_some());
}

#[tokio::test]
async fn test_file_watcher_picks_up_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("braid.toml");
    std::fs::write(&path, "[server]\nport = 5000\n").unwrap();

    let mut manager = BraidConfigManager::new(&path).unwrap();
    manager.start_watching().unwrap();

    // Let the watcher settle past the debounce window
    tokio::time::sleep(Duration::from_millis(700)).await;
    std::fs::write(&path, "[server]\nport = 5001\n").unwrap();

    let mut reloaded = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if manager.config().server.port == 5001 {
            reloaded = true;
            break;
        }
    }
    manager.stop_watching();

    assert!(reloaded, "config was not hot-reloaded");
    assert!(manager.generation() >= 1);
}
