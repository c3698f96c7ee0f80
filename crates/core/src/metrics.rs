//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sidewatch_`
//! - 컴포넌트명: `upstream_`, `ingest_`, `hub_`, `watcher_`, `http_`, `sink_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use sidewatch_core::metrics as m;
//!
//! metrics::counter!(m::HUB_EVENTS_PUBLISHED_TOTAL, m::LABEL_CLASS => "alert").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 클래스 레이블 키 (alert, log)
pub const LABEL_CLASS: &str = "class";

/// sink 이름 레이블 키
pub const LABEL_SINK: &str = "sink";

/// 결과 레이블 키 (ok, error)
pub const LABEL_STATUS: &str = "status";

/// 거부 사유 레이블 키 (nobody, badmethod, invalidjson)
pub const LABEL_REASON: &str = "reason";

// ─── Upstream ───────────────────────────────────────────────────────

/// 업스트림 연결 시도 수 (counter, label: status)
pub const UPSTREAM_CONNECT_ATTEMPTS_TOTAL: &str = "sidewatch_upstream_connect_attempts_total";

/// 업스트림에서 수신한 메시지 수 (counter, label: class)
pub const UPSTREAM_MESSAGES_RECEIVED_TOTAL: &str = "sidewatch_upstream_messages_received_total";

/// 종료된 수신 루프 수 (counter, label: class)
pub const UPSTREAM_STREAMS_ENDED_TOTAL: &str = "sidewatch_upstream_streams_ended_total";

// ─── Ingestion Buffer ───────────────────────────────────────────────

/// 수집 버퍼가 가득 차 버려진 메시지 수 (counter, label: class)
pub const INGEST_DROPPED_TOTAL: &str = "sidewatch_ingest_dropped_total";

// ─── Broadcast Hub ──────────────────────────────────────────────────

/// 발행된 이벤트 수 (counter, label: class)
pub const HUB_EVENTS_PUBLISHED_TOTAL: &str = "sidewatch_hub_events_published_total";

/// 구독자 큐가 가득 차 누락된 전달 수 (counter, label: class)
pub const HUB_DELIVERIES_DROPPED_TOTAL: &str = "sidewatch_hub_deliveries_dropped_total";

/// 등록된 구독자 수 (gauge, label: class)
pub const HUB_SUBSCRIBERS: &str = "sidewatch_hub_subscribers";

// ─── Watcher / Dispatch ─────────────────────────────────────────────

/// 우선순위 게이트를 통과하지 못한 이벤트 수 (counter, label: sink)
pub const WATCHER_EVENTS_GATED_TOTAL: &str = "sidewatch_watcher_events_gated_total";

/// sink 전송 결과 (counter, labels: sink, status)
pub const SINK_SENDS_TOTAL: &str = "sidewatch_sink_sends_total";

// ─── HTTP ingestion ─────────────────────────────────────────────────

/// HTTP 수집 요청 수 (counter)
pub const HTTP_REQUESTS_TOTAL: &str = "sidewatch_http_requests_total";

/// 수락된 HTTP 이벤트 수 (counter)
pub const HTTP_ACCEPTED_TOTAL: &str = "sidewatch_http_accepted_total";

/// 거부된 HTTP 요청 수 (counter, label: reason)
pub const HTTP_REJECTED_TOTAL: &str = "sidewatch_http_rejected_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 레코더에 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        UPSTREAM_CONNECT_ATTEMPTS_TOTAL,
        "Upstream relay connect attempts by outcome"
    );
    describe_counter!(
        UPSTREAM_MESSAGES_RECEIVED_TOTAL,
        "Raw messages received from the upstream relay"
    );
    describe_counter!(
        UPSTREAM_STREAMS_ENDED_TOTAL,
        "Upstream receive loops that terminated"
    );
    describe_counter!(
        INGEST_DROPPED_TOTAL,
        "Raw messages dropped because the ingestion buffer was full"
    );
    describe_counter!(
        HUB_EVENTS_PUBLISHED_TOTAL,
        "Canonical events published to the broadcast hub"
    );
    describe_counter!(
        HUB_DELIVERIES_DROPPED_TOTAL,
        "Per-subscriber deliveries skipped because the subscriber queue was full"
    );
    describe_gauge!(HUB_SUBSCRIBERS, "Currently registered hub subscribers");
    describe_counter!(
        WATCHER_EVENTS_GATED_TOTAL,
        "Events withheld from a sink by its minimum priority"
    );
    describe_counter!(SINK_SENDS_TOTAL, "Sink send calls by outcome");
    describe_counter!(HTTP_REQUESTS_TOTAL, "Direct HTTP ingestion requests");
    describe_counter!(HTTP_ACCEPTED_TOTAL, "Direct HTTP ingestion requests accepted");
    describe_counter!(
        HTTP_REJECTED_TOTAL,
        "Direct HTTP ingestion requests rejected by reason"
    );
}
