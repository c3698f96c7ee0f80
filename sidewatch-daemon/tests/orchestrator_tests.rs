//! Orchestrator lifecycle tests.

use std::time::Duration;

use sidewatch_core::config::SidewatchConfig;
use sidewatch_core::event::EventClass;
use sidewatch_daemon::orchestrator::{ExitReason, Orchestrator};

fn unreachable_upstream(max_retries: u32, retry_delay_secs: u64) -> SidewatchConfig {
    let mut config = SidewatchConfig::default();
    config.upstream.address = "127.0.0.1".to_owned();
    config.upstream.port = 1;
    config.upstream.max_retries = max_retries;
    config.upstream.retry_delay_secs = retry_delay_secs;
    config.upstream.connect_timeout_secs = 1;
    config.http.listen_addr = "127.0.0.1".to_owned();
    config.http.port = 0;
    config.sinks.stdout.enabled = true;
    config.general.shutdown_timeout_secs = 1;
    config
}

#[tokio::test]
async fn connect_exhaustion_fails_and_rolls_back() {
    // Given: an upstream nobody listens on
    let mut orchestrator =
        Orchestrator::build_from_config(unreachable_upstream(2, 0)).expect("should build");

    // When
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run_until(std::future::pending::<anyhow::Result<&'static str>>()),
    )
    .await
    .expect("run should give up in time");

    // Then: fatal error, and watchers are unregistered again
    let err = result.expect_err("connect exhaustion is fatal");
    assert!(
        format!("{err:#}").contains("after 2 attempts"),
        "unexpected error: {err:#}"
    );
    assert_eq!(orchestrator.hub().subscriber_count(EventClass::Alert), 0);
    assert_eq!(orchestrator.hub().subscriber_count(EventClass::Log), 0);
}

#[tokio::test]
async fn signal_during_connect_retry_stops_cleanly() {
    // Given: long retry delay so startup would otherwise take a minute
    let mut orchestrator =
        Orchestrator::build_from_config(unreachable_upstream(6, 10)).expect("should build");

    // When: a signal arrives shortly after start
    let signal = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok::<_, anyhow::Error>("SIGTERM")
    };
    let reason = tokio::time::timeout(Duration::from_secs(10), orchestrator.run_until(signal))
        .await
        .expect("run should stop in time")
        .expect("signal is a clean exit");

    // Then
    assert_eq!(reason, ExitReason::Signal("SIGTERM"));
    assert_eq!(reason.exit_code(), 0);
    assert_eq!(orchestrator.hub().subscriber_count(EventClass::Alert), 0);
}

#[tokio::test]
async fn watch_logs_false_starts_alert_watchers_only() {
    // Given
    let mut config = unreachable_upstream(6, 10);
    config.upstream.watch_logs = false;
    let mut orchestrator = Orchestrator::build_from_config(config).expect("should build");
    let hub = orchestrator.hub().clone();

    // When: observe the hub while startup is retrying
    let signal = async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hub.subscriber_count(EventClass::Alert), 1);
        assert_eq!(hub.subscriber_count(EventClass::Log), 0);
        Ok::<_, anyhow::Error>("SIGINT")
    };

    // Then
    let reason = orchestrator.run_until(signal).await.expect("clean exit");
    assert_eq!(reason, ExitReason::Signal("SIGINT"));
}

#[test]
fn invalid_config_is_rejected_at_build() {
    let mut config = SidewatchConfig::default();
    config.buffers.subscriber = 0;
    let err = Orchestrator::build_from_config(config).err().expect("should fail");
    assert!(err.to_string().contains("config validation failed"));
}
