//! Unit tests for secret loading.
//!
//! These tests mutate process-global env vars and must run serially.

use goat_notify::config::GlobalConfig;

fn make_config() -> GlobalConfig {
    GlobalConfig::from_toml_str("db_path = 'goat.db'").expect("config parses")
}

/// Env vars are used when the keychain has no entries for the service.
#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn env_var_credentials_are_loaded() {
    let mut config = make_config();

    unsafe {
        std::env::set_var("TELEGRAM_BOT_TOKEN", "123:bot-token");
        std::env::set_var("GOAT_INTERNAL_TOKEN", "internal-token");
    }

    config.load_credentials().await;

    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:bot-token"));
    assert_eq!(config.internal_token.as_deref(), Some("internal-token"));

    unsafe {
        std::env::remove_var("TELEGRAM_BOT_TOKEN");
        std::env::remove_var("GOAT_INTERNAL_TOKEN");
    }
}

/// Missing secrets disable features instead of failing.
#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_credentials_leave_features_disabled() {
    let mut config = make_config();

    unsafe {
        std::env::remove_var("TELEGRAM_BOT_TOKEN");
        std::env::remove_var("GOAT_INTERNAL_TOKEN");
    }

    config.load_credentials().await;

    assert!(config.telegram.bot_token.is_none());
    assert!(config.internal_token.is_none());
}

/// Whitespace-only env values count as unset.
#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn blank_env_var_is_treated_as_missing() {
    let mut config = make_config();

    unsafe {
        std::env::set_var("TELEGRAM_BOT_TOKEN", "   ");
    }

    config.load_credentials().await;
    assert!(config.telegram.bot_token.is_none());

    unsafe {
        std::env::remove_var("TELEGRAM_BOT_TOKEN");
    }
}
