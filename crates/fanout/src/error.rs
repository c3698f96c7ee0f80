//! 팬아웃 에러 타입
//!
//! `From<FanoutError> for SidewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use sidewatch_core::error::{ConfigError, PipelineError, SidewatchError};
use sidewatch_core::event::EventClass;

/// 팬아웃 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// 같은 ID의 구독자가 이미 등록되어 있음
    #[error("subscriber '{id}' already registered for {class} events")]
    DuplicateSubscriber {
        /// 구독자 ID
        id: String,
        /// 이벤트 클래스
        class: EventClass,
    },

    /// 템플릿 컴파일 실패
    #[error("template for field '{field}' is invalid: {reason}")]
    Template {
        /// 보강 필드 이름
        field: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<FanoutError> for SidewatchError {
    fn from(err: FanoutError) -> Self {
        match err {
            FanoutError::Template { field, reason } => ConfigError::InvalidValue {
                field: format!("enrichment.templated_fields.{field}"),
                reason,
            }
            .into(),
            other => PipelineError::InitFailed(other.to_string()).into(),
        }
    }
}
