use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::{Settings, load_config};

#[test]
fn default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 5672);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.request_ttl_secs, 30);
    assert_eq!(settings.broker.shutdown_grace_secs, 5);
    assert_eq!(settings.broker.multicast_prefix, "topic/");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // Run from a temporary directory so load_config picks up our
    // config/default.toml and nothing else.
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 15672

        [broker]
        request_ttl_secs = 3
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let settings = load_config().expect("load config");
    env::set_current_dir(orig).expect("restore current dir");

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 15672);
    assert_eq!(settings.broker.request_ttl_secs, 3);
    // untouched values keep their defaults
    assert_eq!(settings.broker.max_connections, 1000);
}

#[test]
#[serial]
fn load_config_from_environment() {
    temp_env::with_vars(
        [("SERVER_HOST", Some("10.0.0.1")), ("SERVER_PORT", Some("15673"))],
        || {
            let settings = load_config().expect("load config");
            assert_eq!(settings.server.host, "10.0.0.1");
            assert_eq!(settings.server.port, 15673);
            assert_eq!(settings.broker.max_connections, 1000);
        },
    );
}
