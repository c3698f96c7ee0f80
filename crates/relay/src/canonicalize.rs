//! 업스트림 메시지 정규화
//!
//! relay의 [`Alert`] / [`Log`]를 [`CanonicalEvent`]로 바꾸고 보강을 적용합니다.
//! `outputFields` 키는 relay 필드 이름을 그대로 사용합니다.
//!
//! | 항목 | 알림 | 로그 |
//! |------|------|------|
//! | priority | `Severity`에서 파생 | Informational |
//! | rule | `PolicyName` | `Type` |
//! | output | `Message`, 없으면 `Operation Resource Result` | `Operation Resource Result` |
//! | tags | `Tags`를 쉼표로 분리 | 없음 |

use sidewatch_core::event::{
    CanonicalEvent, EventClass, FieldValue, OutputFields, Priority, UPSTREAM_SOURCE,
};
use sidewatch_fanout::Enricher;

use crate::proto::{Alert, Log};

/// 두 메시지 타입이 공유하는 필드를 `outputFields`에 넣습니다.
macro_rules! insert_shared_fields {
    ($fields:expr, $msg:expr) => {{
        let fields: &mut OutputFields = $fields;
        let msg = $msg;

        fields.insert("Timestamp".to_owned(), FieldValue::Integer(msg.timestamp));
        fields.insert("UpdatedTime".to_owned(), text(&msg.updated_time));
        fields.insert("ClusterName".to_owned(), text(&msg.cluster_name));
        fields.insert("Hostname".to_owned(), text(&msg.host_name));

        if let Some(owner) = &msg.owner {
            fields.insert("OwnerRef".to_owned(), text(&owner.r#ref));
            fields.insert("OwnerName".to_owned(), text(&owner.name));
            fields.insert("OwnerNamespace".to_owned(), text(&owner.namespace));
        }

        fields.insert("NamespaceName".to_owned(), text(&msg.namespace_name));
        fields.insert("PodName".to_owned(), text(&msg.pod_name));
        fields.insert("Labels".to_owned(), text(&msg.labels));
        fields.insert("ContainerID".to_owned(), text(&msg.container_id));
        fields.insert("ContainerName".to_owned(), text(&msg.container_name));
        fields.insert("ContainerImage".to_owned(), text(&msg.container_image));

        fields.insert("HostPPID".to_owned(), FieldValue::from(msg.host_ppid));
        fields.insert("HostPID".to_owned(), FieldValue::from(msg.host_pid));
        fields.insert("PPID".to_owned(), FieldValue::from(msg.ppid));
        fields.insert("PID".to_owned(), FieldValue::from(msg.pid));
        fields.insert("UID".to_owned(), FieldValue::from(msg.uid));
        fields.insert("ParentProcessName".to_owned(), text(&msg.parent_process_name));
        fields.insert("ProcessName".to_owned(), text(&msg.process_name));

        fields.insert("Source".to_owned(), text(&msg.source));
        fields.insert("Operation".to_owned(), text(&msg.operation));
        fields.insert("Resource".to_owned(), text(&msg.resource));
        fields.insert("Data".to_owned(), text(&msg.data));
        fields.insert("Result".to_owned(), text(&msg.result));
    }};
}

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_owned())
}

/// 업스트림 메시지 정규화기
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    enricher: Enricher,
}

impl Canonicalizer {
    /// 보강기를 받아 정규화기를 생성합니다.
    pub fn new(enricher: Enricher) -> Self {
        Self { enricher }
    }

    /// 보강기
    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// 알림을 정규화합니다.
    pub fn alert(&self, alert: Alert) -> CanonicalEvent {
        let mut event = CanonicalEvent::new(
            EventClass::Alert,
            severity_priority(&alert.severity),
            alert.policy_name.clone(),
        );
        fill_header(&mut event, &alert.updated_time, &alert.cluster_name, &alert.host_name);
        event.timestamp = alert.timestamp;

        event.output = if alert.message.trim().is_empty() {
            summary(&alert.operation, &alert.resource, &alert.result)
        } else {
            alert.message.clone()
        };
        event.tags = split_tags(&alert.tags);

        insert_shared_fields!(&mut event.output_fields, &alert);
        let fields = &mut event.output_fields;
        fields.insert("PolicyName".to_owned(), text(&alert.policy_name));
        fields.insert("Severity".to_owned(), text(&alert.severity));
        fields.insert("Tags".to_owned(), text(&alert.tags));
        fields.insert("ATags".to_owned(), FieldValue::from(alert.a_tags));
        fields.insert("Message".to_owned(), FieldValue::Text(alert.message));
        fields.insert("Enforcer".to_owned(), FieldValue::Text(alert.enforcer));

        self.enricher.apply(&mut event.output_fields);
        event
    }

    /// 로그를 정규화합니다.
    pub fn log(&self, log: Log) -> CanonicalEvent {
        let mut event = CanonicalEvent::new(
            EventClass::Log,
            Priority::Informational,
            log.r#type.clone(),
        );
        fill_header(&mut event, &log.updated_time, &log.cluster_name, &log.host_name);
        event.timestamp = log.timestamp;
        event.output = summary(&log.operation, &log.resource, &log.result);

        insert_shared_fields!(&mut event.output_fields, &log);
        event
            .output_fields
            .insert("Type".to_owned(), FieldValue::Text(log.r#type));

        self.enricher.apply(&mut event.output_fields);
        event
    }
}

fn fill_header(event: &mut CanonicalEvent, updated_time: &str, cluster_name: &str, hostname: &str) {
    event.updated_time = updated_time.to_owned();
    event.cluster_name = cluster_name.to_owned();
    event.hostname = hostname.to_owned();
    event.source = UPSTREAM_SOURCE.to_owned();
}

/// 알림 `Severity`에서 우선순위를 파생합니다.
///
/// 숫자 1..=10 또는 `low`/`medium`/`high`/`critical`을 인식하며
/// 그 외 값은 Warning입니다.
pub fn severity_priority(severity: &str) -> Priority {
    let severity = severity.trim();
    if let Ok(level) = severity.parse::<u8>() {
        return match level {
            1 | 2 => Priority::Informational,
            3 | 4 => Priority::Notice,
            5 | 6 => Priority::Warning,
            7 | 8 => Priority::Error,
            9 => Priority::Critical,
            10 => Priority::Alert,
            _ => Priority::Warning,
        };
    }
    match severity.to_ascii_lowercase().as_str() {
        "low" => Priority::Notice,
        "medium" => Priority::Warning,
        "high" => Priority::Error,
        "critical" => Priority::Critical,
        _ => Priority::Warning,
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

fn summary(operation: &str, resource: &str, result: &str) -> String {
    [operation, resource, result]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
