//! relay 수집기 에러 타입
//!
//! `From<RelayError> for SidewatchError` 변환으로 상위 레이어에서 `?`로 전파합니다.

use std::time::Duration;

use sidewatch_core::error::{SidewatchError, UpstreamError};

/// relay 연결/스트림 에러
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// 엔드포인트 해석 실패
    #[error("resolve failed: {0}")]
    Resolve(String),

    /// 엔드포인트 URI가 유효하지 않음
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// 해석된 엔드포인트
        endpoint: String,
        /// 실패 사유
        reason: String,
    },

    /// 연결 타임아웃
    #[error("connect to {endpoint} timed out after {timeout:?}")]
    Timeout {
        /// 대상 엔드포인트
        endpoint: String,
        /// 적용된 타임아웃
        timeout: Duration,
    },

    /// 전송 계층 에러
    #[error("transport error: {0}")]
    Transport(String),

    /// RPC 호출이 실패 상태를 반환
    #[error("rpc {method} failed: {status}")]
    Rpc {
        /// 호출한 메서드 경로
        method: &'static str,
        /// gRPC 상태
        status: String,
    },
}

impl From<RelayError> for SidewatchError {
    fn from(err: RelayError) -> Self {
        SidewatchError::Upstream(UpstreamError::Stream(err.to_string()))
    }
}
