//! Startup configuration from the environment

use phone_compare::config::API_KEY_ENV;
use phone_compare::{AgentsError, AppConfig};
use std::time::Duration;

// Environment variables are process-wide, so everything touching them lives
// in one test.
#[test]
fn api_key_is_required_and_tunables_are_read() {
    std::env::remove_var(API_KEY_ENV);
    let err = AppConfig::from_env().unwrap_err();
    assert!(
        matches!(&err, AgentsError::ConfigError { message } if message.contains(API_KEY_ENV)),
        "{:?}",
        err
    );

    std::env::set_var(API_KEY_ENV, "   ");
    assert!(AppConfig::from_env().is_err());

    std::env::set_var(API_KEY_ENV, "test-key");
    std::env::set_var("PHONE_COMPARE_STREAM_DELAY_MS", "25");
    std::env::set_var("PHONE_COMPARE_MAX_TURNS", "not a number");
    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.api_key, "test-key");
    assert_eq!(config.stream_delay, Duration::from_millis(25));
    assert_eq!(config.max_turns, AppConfig::new("x").max_turns);
}
