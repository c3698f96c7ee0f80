//! 설정 관리: sidewatch.toml 파싱 및 런타임 설정
//!
//! [`SidewatchConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SIDEWATCH_UPSTREAM_ADDRESS=10.0.0.5` 형식)
//! 3. 설정 파일 (`sidewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sidewatch_core::error::SidewatchError> {
//! use sidewatch_core::config::SidewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SidewatchConfig::load("sidewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SidewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SidewatchError};
use crate::event::{DEFAULT_TEST_RULE, Priority};

/// Sidewatch 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 업스트림(KubeArmor relay) 연결 설정
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// 큐 용량 설정
    #[serde(default)]
    pub buffers: BufferConfig,
    /// 필드 보강 설정
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// HTTP 직접 수집 경로 설정
    #[serde(default)]
    pub http: HttpConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// sink별 설정
    #[serde(default)]
    pub sinks: SinksConfig,
}

impl SidewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SidewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SidewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SidewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SidewatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SidewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            SidewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SIDEWATCH_{SECTION}_{FIELD}`
    /// 맵 필드는 `key:value,key:value` 형식을 사용합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SIDEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SIDEWATCH_GENERAL_LOG_FORMAT");
        override_bool(&mut self.general.debug, "SIDEWATCH_GENERAL_DEBUG");
        override_string(&mut self.general.test_rule, "SIDEWATCH_GENERAL_TEST_RULE");
        override_u64(
            &mut self.general.shutdown_timeout_secs,
            "SIDEWATCH_GENERAL_SHUTDOWN_TIMEOUT_SECS",
        );

        // Upstream
        override_string(&mut self.upstream.address, "SIDEWATCH_UPSTREAM_ADDRESS");
        override_u16(&mut self.upstream.port, "SIDEWATCH_UPSTREAM_PORT");
        override_u32(&mut self.upstream.max_retries, "SIDEWATCH_UPSTREAM_MAX_RETRIES");
        override_u64(
            &mut self.upstream.retry_delay_secs,
            "SIDEWATCH_UPSTREAM_RETRY_DELAY_SECS",
        );
        override_u64(
            &mut self.upstream.connect_timeout_secs,
            "SIDEWATCH_UPSTREAM_CONNECT_TIMEOUT_SECS",
        );
        override_bool(&mut self.upstream.watch_logs, "SIDEWATCH_UPSTREAM_WATCH_LOGS");

        // Buffers
        override_usize(&mut self.buffers.alerts, "SIDEWATCH_BUFFERS_ALERTS");
        override_usize(&mut self.buffers.logs, "SIDEWATCH_BUFFERS_LOGS");
        override_usize(&mut self.buffers.subscriber, "SIDEWATCH_BUFFERS_SUBSCRIBER");

        // Enrichment
        override_kv(
            &mut self.enrichment.custom_fields,
            "SIDEWATCH_ENRICHMENT_CUSTOM_FIELDS",
        );
        override_kv(
            &mut self.enrichment.templated_fields,
            "SIDEWATCH_ENRICHMENT_TEMPLATED_FIELDS",
        );
        override_string(
            &mut self.enrichment.bracket_replacer,
            "SIDEWATCH_ENRICHMENT_BRACKET_REPLACER",
        );

        // HTTP
        override_string(&mut self.http.listen_addr, "SIDEWATCH_HTTP_LISTEN_ADDR");
        override_u16(&mut self.http.port, "SIDEWATCH_HTTP_PORT");

        // Metrics
        override_bool(&mut self.metrics.enabled, "SIDEWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SIDEWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SIDEWATCH_METRICS_PORT");

        // Sinks
        let stdout = &mut self.sinks.stdout;
        override_bool(&mut stdout.enabled, "SIDEWATCH_SINKS_STDOUT_ENABLED");
        override_string(
            &mut stdout.minimum_priority,
            "SIDEWATCH_SINKS_STDOUT_MINIMUM_PRIORITY",
        );

        let webhook = &mut self.sinks.webhook;
        override_string(&mut webhook.address, "SIDEWATCH_SINKS_WEBHOOK_ADDRESS");
        override_string(&mut webhook.method, "SIDEWATCH_SINKS_WEBHOOK_METHOD");
        override_kv(
            &mut webhook.custom_headers,
            "SIDEWATCH_SINKS_WEBHOOK_CUSTOM_HEADERS",
        );
        override_string(
            &mut webhook.minimum_priority,
            "SIDEWATCH_SINKS_WEBHOOK_MINIMUM_PRIORITY",
        );

        let syslog = &mut self.sinks.syslog;
        override_string(&mut syslog.host, "SIDEWATCH_SINKS_SYSLOG_HOST");
        override_u16(&mut syslog.port, "SIDEWATCH_SINKS_SYSLOG_PORT");
        override_string(&mut syslog.protocol, "SIDEWATCH_SINKS_SYSLOG_PROTOCOL");
        override_string(&mut syslog.format, "SIDEWATCH_SINKS_SYSLOG_FORMAT");
        override_string(
            &mut syslog.minimum_priority,
            "SIDEWATCH_SINKS_SYSLOG_MINIMUM_PRIORITY",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SidewatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.test_rule.is_empty() {
            return Err(invalid("general.test_rule", "must not be empty"));
        }

        if self.upstream.port == 0 {
            return Err(invalid("upstream.port", "must be greater than 0"));
        }

        if self.upstream.max_retries == 0 {
            return Err(invalid("upstream.max_retries", "must be at least 1"));
        }

        if self.upstream.connect_timeout_secs == 0 {
            return Err(invalid(
                "upstream.connect_timeout_secs",
                "must be greater than 0",
            ));
        }

        for (field, capacity) in [
            ("buffers.alerts", self.buffers.alerts),
            ("buffers.logs", self.buffers.logs),
            ("buffers.subscriber", self.buffers.subscriber),
        ] {
            if capacity == 0 {
                return Err(invalid(field, "capacity must be greater than 0"));
            }
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid("metrics.endpoint", "only '/metrics' is supported"));
        }

        // sink별 검증
        parse_minimum_priority(
            "sinks.stdout.minimum_priority",
            &self.sinks.stdout.minimum_priority,
        )?;
        parse_minimum_priority(
            "sinks.webhook.minimum_priority",
            &self.sinks.webhook.minimum_priority,
        )?;
        parse_minimum_priority(
            "sinks.syslog.minimum_priority",
            &self.sinks.syslog.minimum_priority,
        )?;

        if self.sinks.webhook.is_enabled() {
            let method = self.sinks.webhook.method.to_ascii_uppercase();
            if method != "POST" && method != "PUT" {
                return Err(invalid("sinks.webhook.method", "must be one of: POST, PUT"));
            }
        }

        if self.sinks.syslog.is_enabled() {
            let protocol = self.sinks.syslog.protocol.to_ascii_lowercase();
            let valid_protocols = ["udp", "tcp"];
            if !valid_protocols.contains(&protocol.as_str()) {
                return Err(invalid(
                    "sinks.syslog.protocol",
                    format!("must be one of: {}", valid_protocols.join(", ")),
                ));
            }
            let format = self.sinks.syslog.format.to_ascii_lowercase();
            let valid_formats = ["json", "cef"];
            if !valid_formats.contains(&format.as_str()) {
                return Err(invalid(
                    "sinks.syslog.format",
                    format!("must be one of: {}", valid_formats.join(", ")),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SidewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 최소 우선순위 문자열을 파싱합니다. 빈 문자열은 임계값 없음입니다.
pub fn parse_minimum_priority(field: &str, value: &str) -> Result<Option<Priority>, SidewatchError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    value.parse::<Priority>().map(Some).map_err(|e| {
        invalid(
            field,
            format!(
                "{e}; expected one of: debug, informational, notice, warning, error, critical, alert, emergency"
            ),
        )
    })
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 정규화된 모든 이벤트를 info 레벨(`canonical event`)로 출력
    pub debug: bool,
    /// 우선순위 임계값을 무시하는 테스트 룰 이름
    pub test_rule: String,
    /// 종료 시 업스트림 완료 신호를 기다리는 최대 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            debug: false,
            test_rule: DEFAULT_TEST_RULE.to_owned(),
            shutdown_timeout_secs: 5,
        }
    }
}

/// 업스트림 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// relay 서비스 주소 (호스트 또는 IP)
    pub address: String,
    /// relay gRPC 포트
    pub port: u16,
    /// 최초 연결 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub retry_delay_secs: u64,
    /// 시도별 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 로그 스트림 구독 여부
    pub watch_logs: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_owned(),
            port: 32767,
            max_retries: 6,
            retry_delay_secs: 10,
            connect_timeout_secs: 30,
            watch_logs: true,
        }
    }
}

/// 큐 용량 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 알림 수집 버퍼 용량
    pub alerts: usize,
    /// 로그 수집 버퍼 용량
    pub logs: usize,
    /// 구독자별 전달 큐 용량
    pub subscriber: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            alerts: 1_000,
            logs: 10_000,
            subscriber: 1_000,
        }
    }
}

/// 필드 보강 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// 정적 필드 (충돌 시 덮어씀)
    pub custom_fields: BTreeMap<String, String>,
    /// 템플릿 필드 (`{{ .Key }}` 형식)
    pub templated_fields: BTreeMap<String, String>,
    /// 키의 `[`를 대체할 문자열 (비어 있으면 비활성)
    pub bracket_replacer: String,
}

/// HTTP 직접 수집 경로 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_owned(),
            port: 2801,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// sink 설정 모음
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// 표준 출력 sink
    pub stdout: StdoutSinkConfig,
    /// HTTP webhook sink
    pub webhook: WebhookSinkConfig,
    /// syslog sink
    pub syslog: SyslogSinkConfig,
}

/// 표준 출력 sink 설정
///
/// 연결 필드가 없으므로 명시적 `enabled` 플래그를 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StdoutSinkConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 최소 우선순위 (비어 있으면 모두 전달)
    pub minimum_priority: String,
    /// 알림 구독 여부
    pub watch_alerts: bool,
    /// 로그 구독 여부
    pub watch_logs: bool,
}

impl Default for StdoutSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            minimum_priority: String::new(),
            watch_alerts: true,
            watch_logs: true,
        }
    }
}

/// HTTP webhook sink 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSinkConfig {
    /// 대상 URL (비어 있으면 비활성)
    pub address: String,
    /// HTTP 메서드 (POST, PUT)
    pub method: String,
    /// 추가 요청 헤더
    pub custom_headers: BTreeMap<String, String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 최소 우선순위
    pub minimum_priority: String,
    /// 알림 구독 여부
    pub watch_alerts: bool,
    /// 로그 구독 여부
    pub watch_logs: bool,
}

impl WebhookSinkConfig {
    /// 필수 연결 필드가 설정되었는지 여부
    pub fn is_enabled(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

impl Default for WebhookSinkConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            method: "POST".to_owned(),
            custom_headers: BTreeMap::new(),
            timeout_secs: 10,
            minimum_priority: String::new(),
            watch_alerts: true,
            watch_logs: true,
        }
    }
}

/// syslog sink 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogSinkConfig {
    /// syslog 서버 호스트 (비어 있으면 비활성)
    pub host: String,
    /// syslog 서버 포트
    pub port: u16,
    /// 전송 프로토콜 (udp, tcp)
    pub protocol: String,
    /// 메시지 형식 (json, cef)
    pub format: String,
    /// 최소 우선순위
    pub minimum_priority: String,
    /// 알림 구독 여부
    pub watch_alerts: bool,
    /// 로그 구독 여부
    pub watch_logs: bool,
}

impl SyslogSinkConfig {
    /// 필수 연결 필드가 설정되었는지 여부
    pub fn is_enabled(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

impl Default for SyslogSinkConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 514,
            protocol: "udp".to_owned(),
            format: "json".to_owned(),
            minimum_priority: String::new(),
            watch_alerts: true,
            watch_logs: true,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

/// `key:value,key:value` 형식을 맵으로 덮어씁니다. `:`이 없는 항목은 무시합니다.
fn override_kv(target: &mut BTreeMap<String, String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let mut parsed = BTreeMap::new();
        for pair in val.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once(':') {
                Some((k, v)) if !k.trim().is_empty() => {
                    parsed.insert(k.trim().to_owned(), v.trim().to_owned());
                }
                _ => warn!(env_key, entry = pair, "malformed key:value entry, ignoring"),
            }
        }
        *target = parsed;
    }
}
