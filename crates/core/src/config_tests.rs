// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use yare::parameterized;

#[test]
fn defaults_match_documented_values() {
    let config = BrokerConfig::default();
    assert_eq!(config.snapshot_period().unwrap(), DEFAULT_SNAPSHOT_PERIOD);
    assert!(config.disk_usage_monitoring_enabled);
    assert_eq!(config.disk_usage_replication_watermark, DEFAULT_REPLICATION_WATERMARK);
    assert!(config.gateway_enabled);
}

#[test]
fn empty_document_uses_defaults() {
    let config = BrokerConfig::from_toml("").unwrap();
    assert_eq!(config.snapshot_period().unwrap(), DEFAULT_SNAPSHOT_PERIOD);
}

#[test]
fn recognized_keys_are_applied() {
    let config = BrokerConfig::from_toml(
        r#"
        snapshot_period = "30s"
        disk_usage_monitoring_enabled = false
        disk_usage_replication_watermark = 0.85
        gateway_enabled = false
        "#,
    )
    .unwrap();
    assert_eq!(config.snapshot_period().unwrap(), Duration::from_secs(30));
    assert!(!config.disk_usage_monitoring_enabled);
    assert_eq!(config.disk_usage_replication_watermark, 0.85);
    assert!(!config.gateway_enabled);
}

#[test]
fn unknown_key_is_rejected() {
    let err = BrokerConfig::from_toml("snapshot_intervall = \"10m\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "got: {err}");
}

#[parameterized(
    zero = { 0.0 },
    negative = { -0.5 },
    above_one = { 1.5 },
)]
fn out_of_range_watermark_is_rejected(watermark: f64) {
    let input = format!("disk_usage_replication_watermark = {watermark}");
    let err = BrokerConfig::from_toml(&input).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidWatermark(_)), "got: {err}");
}

#[test]
fn invalid_duration_is_rejected_at_load() {
    let err = BrokerConfig::from_toml("snapshot_period = \"soon\"").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDuration { .. }), "got: {err}");
}

#[parameterized(
    bare_seconds = { "45", Duration::from_secs(45) },
    seconds = { "30s", Duration::from_secs(30) },
    millis = { "250ms", Duration::from_millis(250) },
    minutes = { "15m", Duration::from_secs(900) },
    hours = { "2h", Duration::from_secs(7200) },
    days = { "1d", Duration::from_secs(86400) },
    padded = { " 5 min ", Duration::from_secs(300) },
)]
fn durations_parse(input: &str, expected: Duration) {
    assert_eq!(parse_duration(input).unwrap(), expected);
}

#[parameterized(
    empty = { "" },
    no_number = { "ms" },
    bad_suffix = { "10parsecs" },
)]
fn bad_durations_fail(input: &str) {
    assert!(parse_duration(input).is_err());
}
