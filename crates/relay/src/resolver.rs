//! relay 엔드포인트 해석
//!
//! 연결 시도마다 한 번씩 호출됩니다. 해석 실패는 실패한 시도로 계산됩니다.

use std::future::Future;

use sidewatch_core::config::UpstreamConfig;

use crate::error::RelayError;

/// relay 기본 gRPC 포트
pub const DEFAULT_RELAY_PORT: u16 = 32767;

/// `host:port` 형태의 relay 엔드포인트를 해석합니다.
pub trait EndpointResolver: Send + Sync {
    /// 연결할 `host:port`를 반환합니다.
    fn resolve(&self) -> impl Future<Output = Result<String, RelayError>> + Send;
}

/// 설정된 주소와 포트를 그대로 사용하는 해석기
#[derive(Debug, Clone)]
pub struct StaticResolver {
    address: String,
    port: u16,
}

impl StaticResolver {
    /// 주소와 포트로 해석기를 생성합니다.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// 업스트림 설정에서 해석기를 생성합니다.
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.address.clone(), config.port)
    }
}

impl EndpointResolver for StaticResolver {
    async fn resolve(&self) -> Result<String, RelayError> {
        let host = self.address.trim();
        if host.is_empty() {
            return Err(RelayError::Resolve("upstream address is empty".to_owned()));
        }
        if self.port == 0 {
            return Err(RelayError::Resolve("upstream port is 0".to_owned()));
        }
        // IPv6 리터럴은 대괄호로 감쌈
        if host.contains(':') && !host.starts_with('[') {
            return Ok(format!("[{host}]:{}", self.port));
        }
        Ok(format!("{host}:{}", self.port))
    }
}
