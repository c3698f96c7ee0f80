//! 정규화 이벤트 모델: 모든 컴포넌트 사이를 오가는 레코드
//!
//! 업스트림 스트림(알림/로그)과 HTTP 직접 수집 경로에서 들어온 모든 이벤트는
//! 정규화 단계를 정확히 한 번 거쳐 [`CanonicalEvent`]가 됩니다.
//! Broadcast Hub에 넘겨진 이후에는 `Arc<CanonicalEvent>`로 공유되며 변경되지 않습니다.
//!
//! # 직렬화 형식
//! sink 어댑터는 camelCase JSON을 사용합니다:
//! ```text
//! {"eventClass":"Alert","timestamp":1700000000,"updatedTime":"...","clusterName":"...",
//!  "hostname":"...","priority":"Warning","rule":"...","output":"...","source":"kubearmor",
//!  "outputFields":{...},"tags":[...],"uuid":"..."}
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 테스트 이벤트를 표시하는 기본 룰 이름
///
/// 이 이름을 가진 이벤트는 sink별 최소 우선순위와 관계없이 항상 전달됩니다.
pub const DEFAULT_TEST_RULE: &str = "Test rule";

/// 업스트림 이벤트의 기본 source 값
pub const UPSTREAM_SOURCE: &str = "kubearmor";

/// HTTP 수집 경로에서 source가 비어 있을 때 사용하는 값
pub const DEFAULT_HTTP_SOURCE: &str = "syscalls";

/// 현재 호스트 이름
///
/// `HOSTNAME` 환경변수, `/proc/sys/kernel/hostname`, `/etc/hostname` 순서로 찾고
/// 모두 실패하면 `localhost`를 반환합니다.
pub fn local_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_owned();
        }
    }
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|name| name.trim().to_owned())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

/// `outputFields` 맵 타입
///
/// 키는 유일하며, 충돌 시 마지막 쓰기가 이깁니다.
pub type OutputFields = BTreeMap<String, FieldValue>;

// ─── EventClass ──────────────────────────────────────────────────────

/// 이벤트 클래스
///
/// 알림(정책 위반)과 로그(원시 감사 레코드)는 별도의 버퍼와 레지스트리를 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventClass {
    /// 정책 위반 알림
    Alert,
    /// 원시 감사 로그
    Log,
}

impl EventClass {
    /// 메트릭 레이블 및 로그 필드용 소문자 이름
    pub fn label(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "Alert"),
            Self::Log => write!(f, "Log"),
        }
    }
}

// ─── Priority ────────────────────────────────────────────────────────

/// 이벤트 우선순위
///
/// 전순서: Debug < Informational < Notice < Warning < Error < Critical < Alert < Emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    /// 디버그
    Debug,
    /// 정보
    Informational,
    /// 주의
    Notice,
    /// 경고
    Warning,
    /// 오류
    Error,
    /// 심각
    Critical,
    /// 즉시 조치 필요
    Alert,
    /// 비상
    Emergency,
}

impl Priority {
    /// 모든 우선순위 (오름차순)
    pub const ALL: [Priority; 8] = [
        Self::Debug,
        Self::Informational,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Alert,
        Self::Emergency,
    ];

    /// 소문자 이름을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Informational => "informational",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "Debug",
            Self::Informational => "Informational",
            Self::Notice => "Notice",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::Alert => "Alert",
            Self::Emergency => "Emergency",
        };
        f.write_str(name)
    }
}

/// 알 수 없는 우선순위 문자열
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority '{0}'")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    /// 대소문자를 구분하지 않으며 `info`는 `informational`의 별칭입니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "informational" | "info" => Ok(Self::Informational),
            "notice" => Ok(Self::Notice),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            _ => Err(UnknownPriority(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = UnknownPriority;

    fn try_from(value: String) -> Result<Self, <Priority as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.to_string()
    }
}

// ─── FieldValue ──────────────────────────────────────────────────────

/// `outputFields`의 값 (문자열, 숫자, 불리언, 리스트)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 문자열
    Text(String),
    /// 정수
    Integer(i64),
    /// 실수
    Float(f64),
    /// 불리언
    Bool(bool),
    /// 리스트
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// 임의의 JSON 값을 필드 값으로 변환합니다.
    ///
    /// `null`은 `None`, 중첩 객체는 JSON 문자열로 변환됩니다.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s)),
            Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            obj @ Value::Object(_) => Some(Self::Text(obj.to_string())),
        }
    }

    /// 빈 문자열 여부
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(Self::Text).collect())
    }
}

// ─── CanonicalEvent ──────────────────────────────────────────────────

/// 정규화된 보안 이벤트
///
/// `event_class`는 생성 후 변경되지 않으므로 비공개 필드로 두고 접근자만 제공합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    event_class: EventClass,
    /// 업스트림 타임스탬프 (unix 초)
    pub timestamp: i64,
    /// 업스트림 갱신 시각 (RFC3339 문자열)
    pub updated_time: String,
    /// 클러스터 이름
    pub cluster_name: String,
    /// 호스트 이름
    pub hostname: String,
    /// 파생 우선순위
    pub priority: Priority,
    /// 이벤트를 생성한 룰/정책 이름
    pub rule: String,
    /// 사람이 읽을 수 있는 한 줄 요약
    pub output: String,
    /// 이벤트 출처
    pub source: String,
    /// 상세 필드 + 보강 필드
    pub output_fields: OutputFields,
    /// 자유 형식 태그
    pub tags: Vec<String>,
    /// 정규화 시점에 생성된 상관관계 ID
    pub uuid: String,
}

impl CanonicalEvent {
    /// 새 이벤트를 생성합니다. UUID는 이 시점에 한 번 생성됩니다.
    pub fn new(event_class: EventClass, priority: Priority, rule: impl Into<String>) -> Self {
        Self {
            event_class,
            timestamp: 0,
            updated_time: String::new(),
            cluster_name: String::new(),
            hostname: String::new(),
            priority,
            rule: rule.into(),
            output: String::new(),
            source: String::new(),
            output_fields: OutputFields::new(),
            tags: Vec::new(),
            uuid: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 이벤트 클래스
    pub fn event_class(&self) -> EventClass {
        self.event_class
    }

    /// 주어진 테스트 룰 이름과 일치하는지 확인합니다.
    pub fn is_test_event(&self, test_rule: &str) -> bool {
        self.rule == test_rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_total_order() {
        for pair in Priority::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} should be below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn priority_parse_is_case_insensitive_with_info_alias() {
        assert_eq!("Warning".parse::<Priority>().unwrap(), Priority::Warning);
        assert_eq!("CRITICAL".parse::<Priority>().unwrap(), Priority::Critical);
        assert_eq!("info".parse::<Priority>().unwrap(), Priority::Informational);
        assert_eq!(" debug ".parse::<Priority>().unwrap(), Priority::Debug);
        assert!("verbose".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_serde_uses_display_name() {
        let json = serde_json::to_string(&Priority::Notice).unwrap();
        assert_eq!(json, "\"Notice\"");
        let parsed: Priority = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(parsed, Priority::Emergency);
        assert!(serde_json::from_str::<Priority>("\"loud\"").is_err());
    }

    #[test]
    fn event_class_serializes_as_original_names() {
        assert_eq!(serde_json::to_string(&EventClass::Alert).unwrap(), "\"Alert\"");
        assert_eq!(EventClass::Log.label(), "log");
    }

    #[test]
    fn field_value_from_json_drops_null_and_flattens_objects() {
        assert_eq!(FieldValue::from_json(serde_json::Value::Null), None);
        assert_eq!(
            FieldValue::from_json(serde_json::json!(42)),
            Some(FieldValue::Integer(42))
        );
        assert_eq!(
            FieldValue::from_json(serde_json::json!(1.5)),
            Some(FieldValue::Float(1.5))
        );
        assert_eq!(
            FieldValue::from_json(serde_json::json!(["a", null, "b"])),
            Some(FieldValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            FieldValue::from_json(serde_json::json!({"k": 1})),
            Some(FieldValue::Text("{\"k\":1}".to_owned()))
        );
    }

    #[test]
    fn field_value_display_joins_lists() {
        let v = FieldValue::from(vec!["x".to_owned(), "y".to_owned()]);
        assert_eq!(v.to_string(), "x,y");
        assert_eq!(FieldValue::Integer(7).to_string(), "7");
    }

    #[test]
    fn new_event_gets_unique_uuid() {
        let a = CanonicalEvent::new(EventClass::Alert, Priority::Warning, "r");
        let b = CanonicalEvent::new(EventClass::Alert, Priority::Warning, "r");
        assert_ne!(a.uuid, b.uuid);
        assert_eq!(a.event_class(), EventClass::Alert);
    }

    #[test]
    fn canonical_event_serializes_camel_case() {
        let mut event = CanonicalEvent::new(EventClass::Log, Priority::Informational, "ContainerLog");
        event.cluster_name = "prod".to_owned();
        event
            .output_fields
            .insert("PodName".to_owned(), FieldValue::from("nginx"));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventClass"], "Log");
        assert_eq!(value["clusterName"], "prod");
        assert_eq!(value["priority"], "Informational");
        assert_eq!(value["outputFields"]["PodName"], "nginx");
    }

    #[test]
    fn test_event_detection() {
        let event = CanonicalEvent::new(EventClass::Alert, Priority::Debug, DEFAULT_TEST_RULE);
        assert!(event.is_test_event(DEFAULT_TEST_RULE));
        assert!(!event.is_test_event("Other rule"));
    }
}
