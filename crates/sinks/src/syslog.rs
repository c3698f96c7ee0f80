//! syslog sink
//!
//! 이벤트마다 새 연결(TCP) 또는 새 소켓(UDP)으로 syslog 메시지 한 건을 보냅니다.
//!
//! # 프레임
//! ```text
//! <PRI>2024-01-01T00:00:00Z host kubearmor[1234]: <본문>\n
//! ```
//! - PRI: facility user(1) × 8 + severity (알림 LOG_ALERT=1, 로그 LOG_INFO=6)
//! - 본문: `json`이면 camelCase JSON, `cef`이면 CEF 한 줄

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sidewatch_core::config::SyslogSinkConfig;
use sidewatch_core::error::{ConfigError, SinkError};
use sidewatch_core::event::{CanonicalEvent, EventClass, local_hostname};
use sidewatch_core::sink::Sink;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// sink 이름
pub const SYSLOG_SINK: &str = "syslog";

/// syslog 태그
pub const SYSLOG_TAG: &str = "kubearmor";

const FACILITY_USER: u8 = 1;
const SEVERITY_ALERT: u8 = 1;
const SEVERITY_INFO: u8 = 6;

/// 전송 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogProtocol {
    Udp,
    Tcp,
}

impl FromStr for SyslogProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            _ => Err(invalid("sinks.syslog.protocol", s)),
        }
    }
}

/// 본문 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogFormat {
    Json,
    Cef,
}

impl FromStr for SyslogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "cef" => Ok(Self::Cef),
            _ => Err(invalid("sinks.syslog.format", s)),
        }
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: format!("unsupported value '{value}'"),
    }
}

/// syslog sink
#[derive(Debug, Clone)]
pub struct SyslogSink {
    endpoint: String,
    protocol: SyslogProtocol,
    format: SyslogFormat,
    hostname: String,
}

impl SyslogSink {
    /// 설정에서 sink를 생성합니다.
    pub fn from_config(config: &SyslogSinkConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            format!("{}:{}", config.host.trim(), config.port),
            config.protocol.parse()?,
            config.format.parse()?,
        ))
    }

    /// 엔드포인트(`host:port`)와 프로토콜/형식으로 sink를 생성합니다.
    pub fn new(endpoint: impl Into<String>, protocol: SyslogProtocol, format: SyslogFormat) -> Self {
        Self {
            endpoint: endpoint.into(),
            protocol,
            format,
            hostname: local_hostname(),
        }
    }

    fn render(&self, event: &CanonicalEvent) -> Result<String, SinkError> {
        let body = match self.format {
            SyslogFormat::Json => serde_json::to_string(event).map_err(|e| SinkError::Encode {
                sink: SYSLOG_SINK.to_owned(),
                reason: e.to_string(),
            })?,
            SyslogFormat::Cef => cef_line(event),
        };
        Ok(frame(event.event_class(), &self.hostname, &body, Utc::now()))
    }

    async fn transmit(&self, payload: &[u8]) -> std::io::Result<()> {
        match self.protocol {
            SyslogProtocol::Udp => {
                let socket = UdpSocket::bind(if self.endpoint.starts_with('[') {
                    "[::]:0"
                } else {
                    "0.0.0.0:0"
                })
                .await?;
                socket.send_to(payload, &self.endpoint).await?;
            }
            SyslogProtocol::Tcp => {
                let mut stream = TcpStream::connect(&self.endpoint).await?;
                stream.write_all(payload).await?;
                stream.shutdown().await?;
            }
        }
        Ok(())
    }
}

impl Sink for SyslogSink {
    fn name(&self) -> &str {
        SYSLOG_SINK
    }

    async fn send(&self, event: &CanonicalEvent) -> Result<(), SinkError> {
        let message = self.render(event)?;
        self.transmit(message.as_bytes())
            .await
            .map_err(|e| SinkError::Send {
                sink: SYSLOG_SINK.to_owned(),
                reason: format!("{}: {e}", self.endpoint),
            })
    }
}

/// 클래스별 syslog PRI 값
pub fn priority_value(class: EventClass) -> u8 {
    let severity = match class {
        EventClass::Alert => SEVERITY_ALERT,
        EventClass::Log => SEVERITY_INFO,
    };
    FACILITY_USER * 8 + severity
}

fn frame(class: EventClass, hostname: &str, body: &str, now: DateTime<Utc>) -> String {
    format!(
        "<{}>{} {} {}[{}]: {}\n",
        priority_value(class),
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        hostname,
        SYSLOG_TAG,
        std::process::id(),
        body.trim_end_matches('\n')
    )
}

/// CEF 한 줄을 만듭니다.
///
/// `CEF:0|Accuknox|Kubearmor|1.0|Kubearmor Event|<클래스>|uid=<UID> start=<RFC3339> <클래스>=k:v k:v`
/// 빈 문자열 값은 건너뜁니다.
pub fn cef_line(event: &CanonicalEvent) -> String {
    let class = event.event_class();
    let uid = event
        .output_fields
        .get("UID")
        .map(ToString::to_string)
        .unwrap_or_default();
    let start = DateTime::from_timestamp(event.timestamp, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| event.timestamp.to_string());

    let mut line =
        format!("CEF:0|Accuknox|Kubearmor|1.0|Kubearmor Event|{class}|uid={uid} start={start} {class}=");
    for (key, value) in &event.output_fields {
        if value.is_empty_text() {
            continue;
        }
        let _ = write!(line, "{key}:{value} ");
    }
    line.truncate(line.trim_end().len());
    line
}

#[cfg(test)]
mod tests {
    use sidewatch_core::event::{FieldValue, Priority};

    use super::*;

    fn event(class: EventClass) -> CanonicalEvent {
        let mut event = CanonicalEvent::new(class, Priority::Warning, "policy");
        event.timestamp = 1_700_000_000;
        event.output_fields.insert("UID".to_owned(), FieldValue::Integer(0));
        event.output_fields.insert("PodName".to_owned(), FieldValue::from("api-5f9"));
        event.output_fields.insert("Labels".to_owned(), FieldValue::from(""));
        event
    }

    #[test]
    fn pri_uses_user_facility() {
        assert_eq!(priority_value(EventClass::Alert), 9);
        assert_eq!(priority_value(EventClass::Log), 14);
    }

    #[test]
    fn cef_line_skips_empty_strings() {
        let line = cef_line(&event(EventClass::Alert));
        assert_eq!(
            line,
            "CEF:0|Accuknox|Kubearmor|1.0|Kubearmor Event|Alert|uid=0 start=2023-11-14T22:13:20Z \
             Alert=PodName:api-5f9 UID:0"
        );
    }

    #[test]
    fn frame_has_header_and_single_newline() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let framed = frame(EventClass::Log, "node-3", "body\n", now);
        assert!(framed.starts_with("<14>2023-11-14T22:13:20Z node-3 kubearmor["));
        assert!(framed.ends_with("]: body\n"));
    }

    #[test]
    fn parses_protocol_and_format() {
        assert_eq!("UDP".parse::<SyslogProtocol>().unwrap(), SyslogProtocol::Udp);
        assert_eq!("cef".parse::<SyslogFormat>().unwrap(), SyslogFormat::Cef);
        assert!("http".parse::<SyslogProtocol>().is_err());
    }
}
