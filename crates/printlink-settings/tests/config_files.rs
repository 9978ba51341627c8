use printlink_settings::{Config, SettingsError};
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_toml_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.device.path = PathBuf::from("/dev/ttyACM0");
    config.device.baud_rate = Some(250_000);
    config.gateway.port = 9090;
    config.session.reply_timeout_ms = 0;

    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "device": { "path": "/tmp/klipper" }, "session": { "poll_interval_ms": 2500 } }"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.device.path, PathBuf::from("/tmp/klipper"));
    assert_eq!(config.device.baud_rate, None);
    assert_eq!(config.session.poll_interval_ms, 2500);
    assert_eq!(config.gateway.port, 3000);
}

#[test]
fn test_unknown_extension_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "device: {}").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::LoadError(_))
    ));
}

#[test]
fn test_invalid_file_values_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[session]\npoll_interval_ms = 0\n").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { .. })
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    assert!(Config::load_from_file(&dir.path().join("absent.toml")).is_err());
}
