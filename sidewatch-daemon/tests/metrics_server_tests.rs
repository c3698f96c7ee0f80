//! Integration tests for metrics server functionality.

use sidewatch_core::config::MetricsConfig;
use sidewatch_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn rejects_unsupported_endpoint() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19101,
        endpoint: "/custom".to_owned(),
    };

    let result = metrics_server::install_metrics_recorder(&config);

    assert!(result.is_err(), "only /metrics is served");
}

#[test]
#[serial]
fn rejects_invalid_address() {
    // Given: an invalid IP
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9100,
        endpoint: "/metrics".to_owned(),
    };

    // When
    let result = metrics_server::install_metrics_recorder(&config);

    // Then
    let err = result.expect_err("address should not parse");
    assert!(err.to_string().contains("invalid metrics listen address"));
}

#[tokio::test]
#[serial]
async fn installs_recorder_with_valid_config() {
    // Given
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19100,
        endpoint: "/metrics".to_owned(),
    };

    // When
    let result = metrics_server::install_metrics_recorder(&config);

    // Then
    assert!(result.is_ok(), "install should succeed: {:?}", result.err());
}
