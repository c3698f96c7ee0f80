//! 에러 타입: 도메인별 에러 정의

/// Sidewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SidewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 업스트림 연결/스트림 에러
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// sink 전송 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 정지된 파이프라인은 다시 시작할 수 없음 (running 플래그가 이미 내려감)
    #[error("pipeline already stopped and cannot be restarted")]
    AlreadyStopped,
}

/// 업스트림 에러
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// 재시도 한도 소진 (프로세스 종료 사유)
    #[error("after {attempts} attempts, last error: {last_error}")]
    ConnectExhausted { attempts: u32, last_error: String },

    /// 스트림 수신 실패
    #[error("stream failed: {0}")]
    Stream(String),
}

/// sink 전송 에러
///
/// 코어는 전송 실패 여부만 관찰하며 재시도하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 목적지 연결 실패
    #[error("{sink}: connection failed: {reason}")]
    Connection { sink: String, reason: String },

    /// 목적지가 실패 응답을 반환
    #[error("{sink}: rejected with status {status}")]
    Rejected { sink: String, status: u16 },

    /// 페이로드 직렬화 실패
    #[error("{sink}: encode failed: {reason}")]
    Encode { sink: String, reason: String },

    /// 기타 전송 실패
    #[error("{sink}: send failed: {reason}")]
    Send { sink: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_exhausted_display_carries_last_error() {
        let err = UpstreamError::ConnectExhausted {
            attempts: 6,
            last_error: "connection refused".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "after 6 attempts, last error: connection refused"
        );
    }

    #[test]
    fn sink_error_converts_to_top_level() {
        let err: SidewatchError = SinkError::Rejected {
            sink: "webhook".to_owned(),
            status: 503,
        }
        .into();
        assert!(matches!(err, SidewatchError::Sink(_)));
        assert!(err.to_string().contains("503"));
    }
}
