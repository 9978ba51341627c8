use clap::Parser;
use printlink::cli::Cli;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_file_then_flags() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("printlink.toml");
    std::fs::write(
        &path,
        "[device]\npath = \"/tmp/klipper\"\n\n[gateway]\nport = 7125\npath = \"/printer\"\n",
    )
    .unwrap();

    let cli = Cli::parse_from([
        "printlink",
        "--config",
        path.to_str().unwrap(),
        "--port",
        "9000",
    ]);
    let config = cli.load_config().unwrap();

    assert_eq!(config.device.path, PathBuf::from("/tmp/klipper"));
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.path, "/printer");
    assert_eq!(config.session.handshake_command, "M20");
}

#[test]
fn test_invalid_override_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("printlink.json");
    std::fs::write(&path, "{}").unwrap();

    let cli = Cli::parse_from(["printlink", "--config", path.to_str().unwrap(), "--baud", "0"]);
    assert!(cli.load_config().is_err());
}
