//! 클래스별 running 플래그
//!
//! 플래그 하나는 [`CancellationToken`] 하나입니다. 생성 시점에 두 플래그 모두
//! "실행 중"이며, 한 번 내려간 플래그는 다시 올라가지 않습니다.
//! 수신 루프, hand-off 루프, watcher는 큐와 토큰을 `select!`로 함께 기다리므로
//! 플래그가 내려가면 다음 반복에서 곧바로 종료합니다.

use sidewatch_core::event::EventClass;
use tokio_util::sync::CancellationToken;

/// 알림/로그 running 플래그 쌍
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    alerts: CancellationToken,
    logs: CancellationToken,
}

impl RunFlags {
    /// 두 플래그가 모두 올라간 상태로 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 클래스의 정지 토큰을 반환합니다.
    pub fn token(&self, class: EventClass) -> CancellationToken {
        match class {
            EventClass::Alert => self.alerts.clone(),
            EventClass::Log => self.logs.clone(),
        }
    }

    /// 클래스가 실행 중인지 여부
    pub fn is_running(&self, class: EventClass) -> bool {
        match class {
            EventClass::Alert => !self.alerts.is_cancelled(),
            EventClass::Log => !self.logs.is_cancelled(),
        }
    }

    /// 한 클래스의 플래그를 내립니다.
    pub fn stop(&self, class: EventClass) {
        match class {
            EventClass::Alert => self.alerts.cancel(),
            EventClass::Log => self.logs.cancel(),
        }
    }

    /// 두 플래그를 모두 내립니다.
    pub fn stop_all(&self) {
        self.alerts.cancel();
        self.logs.cancel();
    }
}
