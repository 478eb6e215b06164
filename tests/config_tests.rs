//! Environment overrides for `KeysmithConfig`.
//!
//! These tests mutate process environment variables, so they run serially.

use std::env;

use serial_test::serial;

use keysmith::config::KeysmithConfig;

const VARS: &[&str] = &[
    "PORT",
    "DATABASE_URL",
    "ADMIN_API_KEY",
    "KEYSMITH_SERVER_HOST",
    "KEYSMITH_SERVER_PORT",
    "KEYSMITH_DATABASE_URL",
    "KEYSMITH_DATABASE_MAX_CONNECTIONS",
    "KEYSMITH_AUTH_MODE",
    "KEYSMITH_ADMIN_API_KEY",
    "KEYSMITH_JWT_SECRET",
    "KEYSMITH_LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_apply_without_env() {
    clear_env();

    let config = KeysmithConfig::load().unwrap();
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.database.url, "sqlite://keysmith.db");
    assert_eq!(config.auth.mode, "api-key");

    // No admin secret configured: startup must refuse.
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn plain_env_names_are_honored() {
    clear_env();
    env::set_var("PORT", "8088");
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("ADMIN_API_KEY", "plain-secret");

    let config = KeysmithConfig::load().unwrap();
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.database.url, "sqlite::memory:");
    assert_eq!(config.auth.admin_api_key, "plain-secret");
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn prefixed_env_names_win_over_plain_ones() {
    clear_env();
    env::set_var("PORT", "8088");
    env::set_var("KEYSMITH_SERVER_PORT", "9099");
    env::set_var("ADMIN_API_KEY", "plain-secret");
    env::set_var("KEYSMITH_ADMIN_API_KEY", "prefixed-secret");
    env::set_var("KEYSMITH_LOG_LEVEL", "debug");

    let config = KeysmithConfig::load().unwrap();
    assert_eq!(config.server.port, 9099);
    assert_eq!(config.auth.admin_api_key, "prefixed-secret");
    assert_eq!(config.logging.level, "debug");

    clear_env();
}

#[test]
#[serial]
fn empty_env_values_are_ignored() {
    clear_env();
    env::set_var("KEYSMITH_DATABASE_URL", "");
    env::set_var("DATABASE_URL", "sqlite://other.db");

    let config = KeysmithConfig::load().unwrap();
    assert_eq!(config.database.url, "sqlite://other.db");

    clear_env();
}

#[test]
#[serial]
fn non_numeric_port_falls_back_to_default() {
    clear_env();
    env::set_var("PORT", "eighty");

    let config = KeysmithConfig::load().unwrap();
    assert_eq!(config.server.port, 3000);

    clear_env();
}

#[test]
#[serial]
fn missing_explicit_config_file_is_an_error() {
    clear_env();
    assert!(KeysmithConfig::load_from("definitely/not/here.toml").is_err());
}
