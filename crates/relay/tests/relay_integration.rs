//! relay 수집기 통합 테스트
//!
//! - 연결 재시도 소진 시 ConnectExhausted로 시작 실패
//! - mock 스트림 → 정규화 → 허브 구독자까지의 전체 흐름
//! - 스트림 종료 시 완료 신호
//! - watch_logs 비활성 시 로그 루프 미기동
//! - 정지 후 재시작 거부

use std::time::Duration;

use sidewatch_core::config::{BufferConfig, EnrichmentConfig, UpstreamConfig};
use sidewatch_core::error::{PipelineError, SidewatchError, UpstreamError};
use sidewatch_core::event::{EventClass, FieldValue, Priority};
use sidewatch_core::pipeline::Pipeline;
use sidewatch_fanout::{BroadcastHub, Enricher, RunFlags};
use sidewatch_relay::proto::{Alert, Log};
use sidewatch_relay::{Canonicalizer, RelayIngest, StaticResolver};
use tokio::sync::mpsc;
use tokio::time::timeout;

type AlertTx = mpsc::Sender<Result<Alert, tonic::Status>>;
type LogTx = mpsc::Sender<Result<Log, tonic::Status>>;

fn alert(policy: &str, severity: &str) -> Alert {
    Alert {
        policy_name: policy.to_owned(),
        severity: severity.to_owned(),
        namespace_name: "payments".to_owned(),
        pod_name: "api-5f9".to_owned(),
        message: format!("{policy} matched"),
        ..Default::default()
    }
}

fn mock_streams() -> (
    AlertTx,
    mpsc::Receiver<Result<Alert, tonic::Status>>,
    LogTx,
    mpsc::Receiver<Result<Log, tonic::Status>>,
) {
    let (alert_tx, alert_rx) = mpsc::channel(16);
    let (log_tx, log_rx) = mpsc::channel(16);
    (alert_tx, alert_rx, log_tx, log_rx)
}

#[tokio::test]
async fn start_fails_with_connect_exhausted_when_relay_is_down() {
    // Given: 아무도 듣지 않는 포트, 재시도 2회, 대기 없음
    let upstream = UpstreamConfig {
        address: "127.0.0.1".to_owned(),
        port: 1,
        max_retries: 2,
        retry_delay_secs: 0,
        connect_timeout_secs: 2,
        watch_logs: true,
    };
    let mut ingest = RelayIngest::builder(upstream)
        .hub(BroadcastHub::new(8))
        .build()
        .unwrap();

    // When
    let err = timeout(Duration::from_secs(10), ingest.start())
        .await
        .expect("start should give up in time")
        .unwrap_err();

    // Then
    match err {
        SidewatchError::Upstream(UpstreamError::ConnectExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 2);
            assert!(!last_error.is_empty());
        }
        other => panic!("expected ConnectExhausted, got {other}"),
    }
    assert!(!ingest.health_check().await.is_healthy());
}

#[tokio::test]
async fn empty_address_counts_as_failed_attempts() {
    let upstream = UpstreamConfig {
        max_retries: 3,
        retry_delay_secs: 0,
        ..UpstreamConfig::default()
    };
    let mut ingest = RelayIngest::builder(upstream)
        .resolver(StaticResolver::new("", 32767))
        .hub(BroadcastHub::new(8))
        .build()
        .unwrap();

    let err = ingest.start().await.unwrap_err();
    assert!(err.to_string().contains("after 3 attempts"), "{err}");
    assert!(err.to_string().contains("upstream address is empty"), "{err}");
}

#[tokio::test]
async fn streams_flow_through_canonicalizer_to_hub() {
    // Given: 보강 설정과 구독자가 있는 허브
    let hub = BroadcastHub::new(32);
    let mut alerts_sub = hub.register("probe-alert", EventClass::Alert).unwrap();
    let mut logs_sub = hub.register("probe-log", EventClass::Log).unwrap();

    let mut enrichment = EnrichmentConfig::default();
    enrichment
        .custom_fields
        .insert("Environment".to_owned(), "production".to_owned());
    let flags = RunFlags::new();
    let mut ingest = RelayIngest::builder(UpstreamConfig::default())
        .canonicalizer(Canonicalizer::new(Enricher::from_config(&enrichment).unwrap()))
        .hub(hub.clone())
        .flags(flags.clone())
        .build()
        .unwrap();

    let (alert_tx, alert_rx, log_tx, log_rx) = mock_streams();
    ingest.attach(alert_rx, Some(log_rx)).unwrap();
    assert!(ingest.health_check().await.is_healthy());

    // When: 알림 하나, 로그 하나 수신
    alert_tx.send(Ok(alert("block-shadow", "9"))).await.unwrap();
    log_tx
        .send(Ok(Log {
            r#type: "ContainerLog".to_owned(),
            operation: "Process".to_owned(),
            ..Default::default()
        }))
        .await
        .unwrap();

    // Then: 정규화/보강된 이벤트가 구독자에게 도착
    let event = timeout(Duration::from_secs(2), alerts_sub.recv())
        .await
        .expect("alert should arrive")
        .expect("queue open");
    assert_eq!(event.rule, "block-shadow");
    assert_eq!(event.priority, Priority::Critical);
    assert_eq!(event.output_fields["Environment"], FieldValue::from("production"));

    let event = timeout(Duration::from_secs(2), logs_sub.recv())
        .await
        .expect("log should arrive")
        .expect("queue open");
    assert_eq!(event.rule, "ContainerLog");
    assert_eq!(event.priority, Priority::Informational);

    // 정지하면 플래그가 내려감
    ingest.stop().await.unwrap();
    assert!(!flags.is_running(EventClass::Alert));
    assert!(!flags.is_running(EventClass::Log));
    assert!(!ingest.health_check().await.is_healthy());
    assert!(!ingest.upstream_ended().is_cancelled());
}

#[tokio::test]
async fn closed_upstream_stream_signals_completion() {
    let mut ingest = RelayIngest::builder(UpstreamConfig::default())
        .hub(BroadcastHub::new(8))
        .build()
        .unwrap();
    let (alert_tx, alert_rx, _log_tx, log_rx) = mock_streams();
    ingest.attach(alert_rx, Some(log_rx)).unwrap();
    let ended = ingest.upstream_ended();

    // When: relay가 알림 스트림을 닫음
    drop(alert_tx);

    // Then
    timeout(Duration::from_secs(2), ended.cancelled())
        .await
        .expect("completion signal should fire");
    assert!(!ingest.health_check().await.is_healthy());
    ingest.stop().await.unwrap();
}

#[tokio::test]
async fn log_loop_is_not_started_without_log_stream() {
    let hub = BroadcastHub::new(8);
    let mut ingest = RelayIngest::builder(UpstreamConfig {
        watch_logs: false,
        ..UpstreamConfig::default()
    })
    .hub(hub.clone())
    .buffers(BufferConfig {
        alerts: 4,
        logs: 4,
        subscriber: 8,
    })
    .build()
    .unwrap();

    let (_alert_tx, alert_rx, _log_tx, _log_rx) = mock_streams();
    ingest
        .attach(alert_rx, None::<mpsc::Receiver<Result<Log, tonic::Status>>>)
        .unwrap();

    assert_eq!(ingest.dropped(EventClass::Log), 0);
    assert!(ingest.attach(
        mpsc::channel::<Result<Alert, tonic::Status>>(1).1,
        None::<mpsc::Receiver<Result<Log, tonic::Status>>>,
    )
    .is_err());
    ingest.stop().await.unwrap();
}

#[tokio::test]
async fn stopped_ingest_refuses_to_restart() {
    // Given: 한 번 시작했다가 정지한 수집기
    let mut ingest = RelayIngest::builder(UpstreamConfig::default())
        .hub(BroadcastHub::new(8))
        .build()
        .unwrap();
    let (_alert_tx, alert_rx, _log_tx, log_rx) = mock_streams();
    ingest.attach(alert_rx, Some(log_rx)).unwrap();
    ingest.stop().await.unwrap();
    assert!(!ingest.flags().is_running(EventClass::Alert));

    // When: 같은 인스턴스를 다시 시작
    let (_alert_tx, alert_rx, _log_tx, log_rx) = mock_streams();
    let attach_err = ingest.attach(alert_rx, Some(log_rx)).unwrap_err();
    let start_err = ingest.start().await.unwrap_err();

    // Then: 즉시 끝나는 루프를 띄우는 대신 에러를 반환
    for err in [attach_err, start_err] {
        assert!(matches!(
            err,
            SidewatchError::Pipeline(PipelineError::AlreadyStopped)
        ));
    }
}
