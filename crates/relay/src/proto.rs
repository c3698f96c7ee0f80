//! `feeder` 패키지 protobuf 메시지
//!
//! KubeArmor relay가 노출하는 `feeder.LogService`의 요청/응답 메시지 중
//! 수집기가 읽는 필드만 정의합니다. 태그 번호는 relay의 `kubearmor.proto`와 같아야 하며,
//! 정의하지 않은 필드는 디코딩 시 무시됩니다.

use prost::Message;

/// 알림 스트림 RPC 경로
pub const WATCH_ALERTS_PATH: &str = "/feeder.LogService/WatchAlerts";

/// 로그 스트림 RPC 경로
pub const WATCH_LOGS_PATH: &str = "/feeder.LogService/WatchLogs";

/// 모든 이벤트를 구독하는 필터 값
pub const FILTER_ALL: &str = "all";

/// 스트림 구독 요청
#[derive(Clone, PartialEq, Message)]
pub struct RequestMessage {
    #[prost(string, tag = "1")]
    pub filter: String,
}

impl RequestMessage {
    /// 모든 이벤트를 구독하는 요청
    pub fn all() -> Self {
        Self {
            filter: FILTER_ALL.to_owned(),
        }
    }
}

/// 워크로드 소유자 (Deployment, DaemonSet 등)
#[derive(Clone, PartialEq, Message)]
pub struct Podowner {
    #[prost(string, tag = "1")]
    pub r#ref: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub namespace: String,
}

/// 정책 위반 알림
#[allow(clippy::struct_field_names)]
#[derive(Clone, PartialEq, Message)]
pub struct Alert {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(string, tag = "2")]
    pub updated_time: String,
    #[prost(string, tag = "3")]
    pub cluster_name: String,
    #[prost(string, tag = "4")]
    pub host_name: String,
    #[prost(string, tag = "5")]
    pub namespace_name: String,
    #[prost(message, optional, tag = "31")]
    pub owner: Option<Podowner>,
    #[prost(string, tag = "6")]
    pub pod_name: String,
    #[prost(string, tag = "29")]
    pub labels: String,
    #[prost(string, tag = "7")]
    pub container_id: String,
    #[prost(string, tag = "8")]
    pub container_name: String,
    #[prost(string, tag = "24")]
    pub container_image: String,
    #[prost(int32, tag = "27")]
    pub host_ppid: i32,
    #[prost(int32, tag = "9")]
    pub host_pid: i32,
    #[prost(int32, tag = "10")]
    pub ppid: i32,
    #[prost(int32, tag = "11")]
    pub pid: i32,
    #[prost(int32, tag = "12")]
    pub uid: i32,
    #[prost(string, tag = "25")]
    pub parent_process_name: String,
    #[prost(string, tag = "26")]
    pub process_name: String,
    #[prost(string, tag = "13")]
    pub policy_name: String,
    #[prost(string, tag = "14")]
    pub severity: String,
    #[prost(string, tag = "15")]
    pub tags: String,
    #[prost(string, repeated, tag = "30")]
    pub a_tags: Vec<String>,
    #[prost(string, tag = "16")]
    pub message: String,
    #[prost(string, tag = "17")]
    pub r#type: String,
    #[prost(string, tag = "18")]
    pub source: String,
    #[prost(string, tag = "19")]
    pub operation: String,
    #[prost(string, tag = "20")]
    pub resource: String,
    #[prost(string, tag = "21")]
    pub data: String,
    #[prost(string, tag = "28")]
    pub enforcer: String,
    #[prost(string, tag = "22")]
    pub action: String,
    #[prost(string, tag = "23")]
    pub result: String,
}

/// 원시 감사 로그
#[allow(clippy::struct_field_names)]
#[derive(Clone, PartialEq, Message)]
pub struct Log {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(string, tag = "2")]
    pub updated_time: String,
    #[prost(string, tag = "3")]
    pub cluster_name: String,
    #[prost(string, tag = "4")]
    pub host_name: String,
    #[prost(string, tag = "5")]
    pub namespace_name: String,
    #[prost(message, optional, tag = "25")]
    pub owner: Option<Podowner>,
    #[prost(string, tag = "6")]
    pub pod_name: String,
    #[prost(string, tag = "24")]
    pub labels: String,
    #[prost(string, tag = "7")]
    pub container_id: String,
    #[prost(string, tag = "8")]
    pub container_name: String,
    #[prost(string, tag = "21")]
    pub container_image: String,
    #[prost(int32, tag = "22")]
    pub host_ppid: i32,
    #[prost(int32, tag = "9")]
    pub host_pid: i32,
    #[prost(int32, tag = "10")]
    pub ppid: i32,
    #[prost(int32, tag = "11")]
    pub pid: i32,
    #[prost(int32, tag = "12")]
    pub uid: i32,
    #[prost(string, tag = "19")]
    pub parent_process_name: String,
    #[prost(string, tag = "20")]
    pub process_name: String,
    #[prost(string, tag = "13")]
    pub r#type: String,
    #[prost(string, tag = "14")]
    pub source: String,
    #[prost(string, tag = "15")]
    pub operation: String,
    #[prost(string, tag = "16")]
    pub resource: String,
    #[prost(string, tag = "17")]
    pub data: String,
    #[prost(string, tag = "18")]
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_filter_encodes_as_field_one() {
        let bytes = RequestMessage::all().encode_to_vec();
        // field 1, wire type 2 (length-delimited), len 3, "all"
        assert_eq!(bytes, vec![0x0a, 0x03, b'a', b'l', b'l']);
    }

    #[test]
    fn alert_decodes_owner_and_repeated_tags() {
        let alert = Alert {
            policy_name: "block-shadow".to_owned(),
            owner: Some(Podowner {
                r#ref: "Deployment".to_owned(),
                name: "api".to_owned(),
                namespace: "payments".to_owned(),
            }),
            a_tags: vec!["MITRE".to_owned(), "T1003".to_owned()],
            ..Default::default()
        };
        let decoded = Alert::decode(alert.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, alert);
    }
}
