//! sink 어댑터 통합 테스트
//!
//! 로컬 소켓과 로컬 HTTP 서버를 상대로 실제 전송을 검증합니다.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::any;
use sidewatch_core::config::WebhookSinkConfig;
use sidewatch_core::error::SinkError;
use sidewatch_core::event::{CanonicalEvent, EventClass, FieldValue, Priority};
use sidewatch_core::sink::Sink;
use sidewatch_sinks::{SyslogFormat, SyslogProtocol, SyslogSink, WebhookSink};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::timeout;

fn alert() -> CanonicalEvent {
    let mut event = CanonicalEvent::new(EventClass::Alert, Priority::Critical, "block-shell");
    event.timestamp = 1_700_000_000;
    event.output = "shell spawned in api pod".to_owned();
    event
        .output_fields
        .insert("PodName".to_owned(), FieldValue::from("api-5f9"));
    event
}

fn body_of(frame: &str) -> &str {
    let start = frame.find("]: ").expect("frame should carry a tag header") + 3;
    frame[start..].trim_end_matches('\n')
}

// ─── syslog ──────────────────────────────────────────────────────────

#[tokio::test]
async fn syslog_udp_sends_one_json_datagram() {
    // Given: 로컬 UDP 수신 소켓
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver.local_addr().unwrap();
    let sink = SyslogSink::new(addr.to_string(), SyslogProtocol::Udp, SyslogFormat::Json);

    // When
    let event = alert();
    sink.send(&event).await.unwrap();

    // Then: PRI 9 헤더와 JSON 본문
    let mut buf = vec![0u8; 65_536];
    let (n, _) = timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .expect("datagram should arrive")
        .unwrap();
    let frame = String::from_utf8_lossy(&buf[..n]).to_string();
    assert!(frame.starts_with("<9>"), "unexpected frame: {frame}");
    assert!(frame.ends_with('\n'));

    let json: serde_json::Value = serde_json::from_str(body_of(&frame)).unwrap();
    assert_eq!(json["uuid"], event.uuid.as_str());
    assert_eq!(json["rule"], "block-shell");
}

#[tokio::test]
async fn syslog_tcp_sends_cef_line() {
    // Given: 로컬 TCP 리스너
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = SyslogSink::new(addr.to_string(), SyslogProtocol::Tcp, SyslogFormat::Cef);

    let reader = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut frame = String::new();
        stream.read_to_string(&mut frame).await.unwrap();
        frame
    });

    // When
    sink.send(&alert()).await.unwrap();

    // Then
    let frame = timeout(Duration::from_secs(2), reader)
        .await
        .expect("frame should arrive")
        .unwrap();
    assert!(frame.starts_with("<9>"));
    assert_eq!(
        body_of(&frame),
        "CEF:0|Accuknox|Kubearmor|1.0|Kubearmor Event|Alert|uid= start=2023-11-14T22:13:20Z \
         Alert=PodName:api-5f9"
    );
}

#[tokio::test]
async fn syslog_tcp_connection_refused_is_send_error() {
    // 바인드 후 바로 닫아 사용되지 않는 포트를 얻음
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let sink = SyslogSink::new(addr.to_string(), SyslogProtocol::Tcp, SyslogFormat::Json);
    let err = sink.send(&alert()).await.unwrap_err();
    assert!(matches!(err, SinkError::Send { .. }));
}

// ─── webhook ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Captured {
    method: Method,
    headers: HeaderMap,
    body: String,
}

type Seen = Arc<Mutex<Vec<Captured>>>;

async fn capture(
    State(seen): State<Seen>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    seen.lock().unwrap().push(Captured {
        method,
        headers,
        body,
    });
    StatusCode::OK
}

async fn fail() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn serve() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/hook", any(capture))
        .route("/fail", any(fail))
        .with_state(Arc::clone(&seen));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn webhook(url: String, method: &str) -> WebhookSink {
    let mut config = WebhookSinkConfig {
        address: url,
        method: method.to_owned(),
        ..WebhookSinkConfig::default()
    };
    config
        .custom_headers
        .insert("X-Api-Key".to_owned(), "s3cret".to_owned());
    WebhookSink::from_config(&config).unwrap()
}

#[tokio::test]
async fn webhook_puts_json_with_custom_headers() {
    // Given
    let (base, seen) = serve().await;
    let sink = webhook(format!("{base}/hook"), "put");

    // When
    let event = alert();
    sink.send(&event).await.unwrap();

    // Then
    let captured = seen.lock().unwrap().clone();
    assert_eq!(captured.len(), 1);
    let request = &captured[0];
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.headers["x-api-key"], "s3cret");
    assert!(
        request.headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    let json: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(json["uuid"], event.uuid.as_str());
    assert_eq!(json["outputFields"]["PodName"], "api-5f9");
}

#[tokio::test]
async fn webhook_non_2xx_is_rejected() {
    let (base, _seen) = serve().await;
    let sink = webhook(format!("{base}/fail"), "POST");
    let err = sink.send(&alert()).await.unwrap_err();
    assert!(matches!(err, SinkError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn webhook_unreachable_is_connection_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let sink = webhook(format!("http://{addr}/hook"), "POST");
    let err = sink.send(&alert()).await.unwrap_err();
    assert!(matches!(err, SinkError::Connection { .. }));
}
