//! 파이프라인 trait: 장기 실행 컴포넌트의 생명주기

use std::future::Future;
use std::pin::Pin;

use crate::error::SidewatchError;

/// dyn-compatible trait에서 사용하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 건강 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 일부 기능 저하 (사유)
    Degraded(String),
    /// 비정상 (사유)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// 시작/정지가 가능한 장기 실행 컴포넌트
///
/// 업스트림 수집기처럼 백그라운드 태스크를 소유하는 컴포넌트가 구현합니다.
pub trait Pipeline: Send + Sync {
    /// 컴포넌트를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), SidewatchError>> + Send;

    /// 컴포넌트를 정지합니다. 정지 실패는 로그로만 남기고 재시도하지 않습니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), SidewatchError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
