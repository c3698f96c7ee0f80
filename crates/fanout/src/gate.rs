//! 우선순위 게이트와 sink 라우트
//!
//! 게이트 규칙: `event.priority >= minimum` 이거나 `event.rule == test_rule`.
//! 최소 우선순위가 없으면 모든 이벤트가 통과합니다.

use std::sync::Arc;

use sidewatch_core::event::{CanonicalEvent, EventClass, Priority};
use sidewatch_core::sink::DynSink;

/// sink별 우선순위 임계값 검사기
#[derive(Debug, Clone)]
pub struct PriorityGate {
    minimum: Option<Priority>,
    test_rule: Arc<str>,
}

impl PriorityGate {
    /// 최소 우선순위와 테스트 룰 이름으로 게이트를 생성합니다.
    pub fn new(minimum: Option<Priority>, test_rule: impl Into<Arc<str>>) -> Self {
        Self {
            minimum,
            test_rule: test_rule.into(),
        }
    }

    /// 설정된 최소 우선순위
    pub fn minimum(&self) -> Option<Priority> {
        self.minimum
    }

    /// 이벤트를 sink로 전달해도 되는지 판단합니다.
    pub fn admits(&self, event: &CanonicalEvent) -> bool {
        if event.is_test_event(&self.test_rule) {
            return true;
        }
        match self.minimum {
            Some(min) => event.priority >= min,
            None => true,
        }
    }
}

/// 활성화된 sink 하나와 그 전달 조건
///
/// 알림/로그 watcher와 HTTP 경로가 같은 `Arc<dyn DynSink>`를 공유합니다.
#[derive(Clone)]
pub struct SinkRoute {
    /// sink 어댑터
    pub sink: Arc<dyn DynSink>,
    /// 우선순위 게이트
    pub gate: PriorityGate,
    /// 알림 스트림 구독 여부
    pub alerts: bool,
    /// 로그 스트림 구독 여부
    pub logs: bool,
}

impl SinkRoute {
    /// 두 클래스 모두 구독하는 라우트를 생성합니다.
    pub fn new(sink: Arc<dyn DynSink>, gate: PriorityGate) -> Self {
        Self {
            sink,
            gate,
            alerts: true,
            logs: true,
        }
    }

    /// 구독 클래스를 지정합니다.
    pub fn with_classes(mut self, alerts: bool, logs: bool) -> Self {
        self.alerts = alerts;
        self.logs = logs;
        self
    }

    /// sink 이름
    pub fn name(&self) -> &str {
        self.sink.name()
    }

    /// 해당 클래스 스트림을 구독하는지 여부
    pub fn watches(&self, class: EventClass) -> bool {
        match class {
            EventClass::Alert => self.alerts,
            EventClass::Log => self.logs,
        }
    }
}

impl std::fmt::Debug for SinkRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRoute")
            .field("sink", &self.sink.name())
            .field("gate", &self.gate)
            .field("alerts", &self.alerts)
            .field("logs", &self.logs)
            .finish()
    }
}
