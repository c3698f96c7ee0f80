//! relay 수집기: [`Pipeline`] trait 구현
//!
//! # 시작 순서
//! 1. 엔드포인트 해석 + 연결 (재시도 정책 적용)
//! 2. `WatchAlerts` 스트림, `watch_logs`이면 `WatchLogs` 스트림 열기
//! 3. 클래스마다 수신 루프와 hand-off 루프 스폰
//!
//! 어느 수신 루프든 업스트림 쪽 사유로 끝나면 [`RelayIngest::upstream_ended`] 토큰이
//! 취소됩니다. 상위 감독자는 이 토큰을 프로세스 종료 사유로 사용합니다.
//!
//! 한 번 정지한 수집기는 다시 시작할 수 없습니다. 새로 빌드하세요.

use std::sync::Arc;
use std::time::Duration;

use sidewatch_core::config::{BufferConfig, UpstreamConfig};
use sidewatch_core::error::{PipelineError, SidewatchError};
use sidewatch_core::event::{CanonicalEvent, EventClass};
use sidewatch_core::pipeline::{HealthStatus, Pipeline};
use sidewatch_fanout::{BroadcastHub, RunFlags};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::buffer::{IngestSender, ingestion_buffer};
use crate::canonicalize::Canonicalizer;
use crate::client::{RelayClient, RetryPolicy, connect_with_retry};
use crate::proto::{Alert, Log};
use crate::receiver::{MessageStream, handoff_loop, receive_loop};
use crate::resolver::{EndpointResolver, StaticResolver};

/// 수집기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestState {
    Initialized,
    Running,
    Stopped,
}

/// 업스트림 relay 수집기
pub struct RelayIngest<R = StaticResolver> {
    upstream: UpstreamConfig,
    buffers: BufferConfig,
    debug_events: bool,
    shutdown_timeout: Duration,
    resolver: R,
    canonicalizer: Arc<Canonicalizer>,
    hub: Arc<BroadcastHub>,
    flags: RunFlags,
    state: IngestState,
    client: Option<RelayClient>,
    alert_buffer: Option<IngestSender<Alert>>,
    log_buffer: Option<IngestSender<Log>>,
    tasks: Vec<JoinHandle<()>>,
    ended: CancellationToken,
}

impl RelayIngest<StaticResolver> {
    /// 업스트림 설정으로 빌더를 생성합니다.
    pub fn builder(upstream: UpstreamConfig) -> RelayIngestBuilder<StaticResolver> {
        RelayIngestBuilder::new(upstream)
    }
}

impl<R: EndpointResolver> RelayIngest<R> {
    /// 업스트림 스트림이 끝나면 취소되는 토큰
    pub fn upstream_ended(&self) -> CancellationToken {
        self.ended.clone()
    }

    /// running 플래그
    pub fn flags(&self) -> &RunFlags {
        &self.flags
    }

    /// 클래스별로 버려진 메시지 수
    pub fn dropped(&self, class: EventClass) -> u64 {
        match class {
            EventClass::Alert => self.alert_buffer.as_ref().map_or(0, IngestSender::dropped),
            EventClass::Log => self.log_buffer.as_ref().map_or(0, IngestSender::dropped),
        }
    }

    /// 이미 열린 스트림으로 수신/hand-off 루프를 시작합니다.
    ///
    /// `logs`가 `None`이면 로그 루프를 띄우지 않습니다.
    pub fn attach<A, L>(&mut self, alerts: A, logs: Option<L>) -> Result<(), SidewatchError>
    where
        A: MessageStream<Alert> + 'static,
        L: MessageStream<Log> + 'static,
    {
        self.ensure_startable()?;

        self.alert_buffer = Some(self.spawn_class(
            EventClass::Alert,
            alerts,
            self.buffers.alerts,
            Canonicalizer::alert,
        ));
        if let Some(logs) = logs {
            self.log_buffer = Some(self.spawn_class(
                EventClass::Log,
                logs,
                self.buffers.logs,
                Canonicalizer::log,
            ));
        }

        self.state = IngestState::Running;
        info!(
            alerts = true,
            logs = self.log_buffer.is_some(),
            "relay ingest loops started"
        );
        Ok(())
    }

    fn ensure_startable(&self) -> Result<(), SidewatchError> {
        match self.state {
            IngestState::Initialized => Ok(()),
            IngestState::Running => Err(PipelineError::AlreadyRunning.into()),
            IngestState::Stopped => Err(PipelineError::AlreadyStopped.into()),
        }
    }

    fn spawn_class<T, S>(
        &mut self,
        class: EventClass,
        stream: S,
        capacity: usize,
        canonicalize: fn(&Canonicalizer, T) -> CanonicalEvent,
    ) -> IngestSender<T>
    where
        T: Send + 'static,
        S: MessageStream<T> + 'static,
    {
        let (tx, rx) = ingestion_buffer(class, capacity);

        let recv_tx = tx.clone();
        let stop = self.flags.token(class);
        let ended = self.ended.clone();
        self.tasks.push(tokio::spawn(async move {
            if receive_loop(stream, recv_tx, stop).await.is_upstream_end() {
                ended.cancel();
            }
        }));

        let canonicalizer = Arc::clone(&self.canonicalizer);
        let hub = Arc::clone(&self.hub);
        let stop = self.flags.token(class);
        let debug_events = self.debug_events;
        self.tasks.push(tokio::spawn(async move {
            handoff_loop(rx, hub, stop, debug_events, move |message| {
                canonicalize(&canonicalizer, message)
            })
            .await;
        }));

        tx
    }

    async fn connect(&self) -> Result<RelayClient, SidewatchError> {
        let policy = RetryPolicy::from_config(&self.upstream);
        let resolver = &self.resolver;
        let connect_timeout = policy.connect_timeout;

        let client = connect_with_retry(&policy, move |_attempt| async move {
            let endpoint = resolver.resolve().await?;
            RelayClient::connect(&endpoint, connect_timeout).await
        })
        .await?;
        Ok(client)
    }
}

impl<R: EndpointResolver> Pipeline for RelayIngest<R> {
    async fn start(&mut self) -> Result<(), SidewatchError> {
        self.ensure_startable()?;

        info!(
            address = %self.upstream.address,
            port = self.upstream.port,
            watch_logs = self.upstream.watch_logs,
            "starting relay ingest"
        );

        let mut client = self.connect().await?;
        let alerts = client.watch_alerts().await?;
        let logs = if self.upstream.watch_logs {
            Some(client.watch_logs().await?)
        } else {
            None
        };
        self.client = Some(client);
        self.attach(alerts, logs)
    }

    async fn stop(&mut self) -> Result<(), SidewatchError> {
        if self.state != IngestState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping relay ingest");

        // 1. 플래그를 내리고 연결을 닫음
        self.flags.stop_all();
        self.client = None;
        self.alert_buffer = None;
        self.log_buffer = None;

        // 2. 루프 종료를 제한 시간 안에서 기다림
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let mut abandoned = 0_usize;
        for mut task in self.tasks.drain(..) {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!(
                abandoned,
                timeout_secs = self.shutdown_timeout.as_secs(),
                "relay ingest loops did not finish in time"
            );
        }

        self.state = IngestState::Stopped;
        info!("relay ingest stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            IngestState::Running => {
                if self.ended.is_cancelled() {
                    return HealthStatus::Unhealthy("upstream stream ended".to_owned());
                }
                let alerts = self.alert_buffer.as_ref().map_or(0.0, IngestSender::utilization);
                let logs = self.log_buffer.as_ref().map_or(0.0, IngestSender::utilization);
                let utilization = alerts.max(logs);
                if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "ingestion buffer utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            IngestState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            IngestState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// relay 수집기 빌더
pub struct RelayIngestBuilder<R = StaticResolver> {
    upstream: UpstreamConfig,
    buffers: BufferConfig,
    debug_events: bool,
    shutdown_timeout: Duration,
    resolver: R,
    canonicalizer: Canonicalizer,
    hub: Option<Arc<BroadcastHub>>,
    flags: Option<RunFlags>,
}

impl RelayIngestBuilder<StaticResolver> {
    /// 업스트림 설정으로 빌더를 생성합니다. 해석기는 설정 주소를 그대로 사용합니다.
    pub fn new(upstream: UpstreamConfig) -> Self {
        let resolver = StaticResolver::from_config(&upstream);
        Self {
            upstream,
            buffers: BufferConfig::default(),
            debug_events: false,
            shutdown_timeout: Duration::from_secs(5),
            resolver,
            canonicalizer: Canonicalizer::default(),
            hub: None,
            flags: None,
        }
    }
}

impl<R: EndpointResolver> RelayIngestBuilder<R> {
    /// 엔드포인트 해석기를 교체합니다.
    pub fn resolver<R2: EndpointResolver>(self, resolver: R2) -> RelayIngestBuilder<R2> {
        RelayIngestBuilder {
            upstream: self.upstream,
            buffers: self.buffers,
            debug_events: self.debug_events,
            shutdown_timeout: self.shutdown_timeout,
            resolver,
            canonicalizer: self.canonicalizer,
            hub: self.hub,
            flags: self.flags,
        }
    }

    /// 수집 버퍼 용량
    pub fn buffers(mut self, buffers: BufferConfig) -> Self {
        self.buffers = buffers;
        self
    }

    /// 정규화된 이벤트를 모두 로그로 남길지 여부
    pub fn debug_events(mut self, enabled: bool) -> Self {
        self.debug_events = enabled;
        self
    }

    /// 정지 시 루프 종료를 기다리는 최대 시간
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// 정규화기 (보강 포함)
    pub fn canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// 발행 대상 허브
    pub fn hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// watcher와 공유하는 running 플래그
    pub fn flags(mut self, flags: RunFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// 수집기를 생성합니다. 허브는 필수입니다.
    pub fn build(self) -> Result<RelayIngest<R>, SidewatchError> {
        let hub = self
            .hub
            .ok_or_else(|| PipelineError::InitFailed("relay ingest requires a hub".to_owned()))?;

        Ok(RelayIngest {
            upstream: self.upstream,
            buffers: self.buffers,
            debug_events: self.debug_events,
            shutdown_timeout: self.shutdown_timeout,
            resolver: self.resolver,
            canonicalizer: Arc::new(self.canonicalizer),
            hub,
            flags: self.flags.unwrap_or_default(),
            state: IngestState::Initialized,
            client: None,
            alert_buffer: None,
            log_buffer: None,
            tasks: Vec::new(),
            ended: CancellationToken::new(),
        })
    }
}
