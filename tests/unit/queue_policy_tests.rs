use std::time::Duration;

use goat_notify::config::QueueConfig;
use goat_notify::queue::RetryPolicy;

fn policy(base: u64, max: u64) -> RetryPolicy {
    RetryPolicy::from_config(&QueueConfig {
        retry_base_seconds: base,
        retry_max_seconds: max,
        ..QueueConfig::default()
    })
}

#[test]
fn delay_doubles_per_attempt() {
    let policy = policy(30, 3600);
    assert_eq!(policy.delay_after(1), Duration::from_secs(30));
    assert_eq!(policy.delay_after(2), Duration::from_secs(60));
    assert_eq!(policy.delay_after(3), Duration::from_secs(120));
}

#[test]
fn delay_is_capped() {
    let policy = policy(30, 100);
    assert_eq!(policy.delay_after(3), Duration::from_secs(100));
    assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(100));
}

#[test]
fn zero_attempts_uses_base_delay() {
    assert_eq!(policy(5, 60).delay_after(0), Duration::from_secs(5));
}

#[test]
fn default_policy_matches_default_config() {
    let config = QueueConfig::default();
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, config.max_attempts);
    assert_eq!(policy.lease, Duration::from_secs(config.lease_seconds));
}
