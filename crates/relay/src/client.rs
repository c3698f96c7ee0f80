//! relay gRPC 클라이언트와 연결 재시도
//!
//! 평문 HTTP/2로 `feeder.LogService`에 연결하여 서버 스트리밍 RPC
//! `WatchAlerts` / `WatchLogs`를 엽니다.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use sidewatch_core::config::UpstreamConfig;
use sidewatch_core::error::UpstreamError;
use sidewatch_core::metrics as m;
use tonic::client::Grpc;
use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use crate::error::RelayError;
use crate::proto::{Alert, Log, RequestMessage, WATCH_ALERTS_PATH, WATCH_LOGS_PATH};

/// 최초 연결 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 실패한 시도 사이의 대기 시간
    pub delay: Duration,
    /// 시도별 연결 타임아웃
    pub connect_timeout: Duration,
}

impl RetryPolicy {
    /// 업스트림 설정에서 정책을 생성합니다.
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            delay: Duration::from_secs(config.retry_delay_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default())
    }
}

/// `attempt`를 최대 `policy.max_attempts`번 호출합니다.
///
/// 실패한 시도마다 `retry attempt N failed`를 기록하고 `policy.delay`만큼 기다립니다.
/// 마지막 시도 뒤에는 기다리지 않습니다. 모두 실패하면 마지막 에러를 담은
/// [`UpstreamError::ConnectExhausted`]를 반환합니다.
pub async fn connect_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, UpstreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = String::new();

    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Ok(value) => {
                metrics::counter!(m::UPSTREAM_CONNECT_ATTEMPTS_TOTAL, m::LABEL_STATUS => "ok")
                    .increment(1);
                if n > 1 {
                    info!(attempt = n, "connected to upstream relay after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                metrics::counter!(m::UPSTREAM_CONNECT_ATTEMPTS_TOTAL, m::LABEL_STATUS => "error")
                    .increment(1);
                last_error = e.to_string();
                warn!(
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    error = %last_error,
                    "retry attempt {n} failed"
                );
                if n < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(UpstreamError::ConnectExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

/// 연결된 relay 클라이언트
///
/// 스트림은 같은 HTTP/2 연결을 공유합니다. 클라이언트와 열린 스트림을 모두
/// drop하면 연결이 닫힙니다.
#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: String,
    grpc: Grpc<Channel>,
}

impl RelayClient {
    /// `host:port`에 평문 HTTP/2로 연결합니다.
    ///
    /// 연결 수립 전체에 `timeout`이 적용됩니다.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, RelayError> {
        let builder = Endpoint::from_shared(format!("http://{endpoint}"))
            .map_err(|e| RelayError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            })?
            .connect_timeout(timeout);

        let channel = tokio::time::timeout(timeout, builder.connect())
            .await
            .map_err(|_| RelayError::Timeout {
                endpoint: endpoint.to_owned(),
                timeout,
            })?
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        info!(endpoint, "connected to upstream relay");
        Ok(Self {
            endpoint: endpoint.to_owned(),
            grpc: Grpc::new(channel),
        })
    }

    /// 연결된 엔드포인트
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 알림 스트림을 엽니다.
    pub async fn watch_alerts(&mut self) -> Result<Streaming<Alert>, RelayError> {
        self.open(WATCH_ALERTS_PATH).await
    }

    /// 로그 스트림을 엽니다.
    pub async fn watch_logs(&mut self) -> Result<Streaming<Log>, RelayError> {
        self.open(WATCH_LOGS_PATH).await
    }

    async fn open<T>(&mut self, method: &'static str) -> Result<Streaming<T>, RelayError>
    where
        T: prost::Message + Default + Send + Sync + 'static,
    {
        self.grpc
            .ready()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let codec: ProstCodec<RequestMessage, T> = ProstCodec::default();
        let response = self
            .grpc
            .server_streaming(
                tonic::Request::new(RequestMessage::all()),
                PathAndQuery::from_static(method),
                codec,
            )
            .await
            .map_err(|status| RelayError::Rpc {
                method,
                status: status.to_string(),
            })?;

        info!(endpoint = %self.endpoint, method, "upstream stream opened");
        Ok(response.into_inner())
    }
}
