//! 수신 루프와 hand-off 루프
//!
//! 수신 루프는 스트림에서 메시지를 받아 수집 버퍼에 non-blocking으로 넣고,
//! hand-off 루프는 버퍼에서 꺼내 정규화한 뒤 허브에 발행합니다.
//! 두 루프 모두 클래스의 정지 토큰과 `select!`로 함께 기다립니다.

use std::future::Future;
use std::sync::Arc;

use sidewatch_core::event::CanonicalEvent;
use sidewatch_core::metrics as m;
use sidewatch_fanout::BroadcastHub;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::buffer::{IngestReceiver, IngestSender};

/// 업스트림 메시지 스트림
///
/// 운영에서는 [`tonic::Streaming`]이, 테스트에서는 mpsc 수신기가 구현합니다.
pub trait MessageStream<T>: Send {
    /// 다음 메시지. 스트림이 정상 종료되면 `Ok(None)`.
    fn next_message(&mut self) -> impl Future<Output = Result<Option<T>, tonic::Status>> + Send;
}

impl<T: Send + 'static> MessageStream<T> for tonic::Streaming<T> {
    async fn next_message(&mut self) -> Result<Option<T>, tonic::Status> {
        self.message().await
    }
}

impl<T: Send> MessageStream<T> for mpsc::Receiver<Result<T, tonic::Status>> {
    async fn next_message(&mut self) -> Result<Option<T>, tonic::Status> {
        self.recv().await.transpose()
    }
}

/// 수신 루프 종료 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// 정지 토큰에 의해 종료
    Stopped,
    /// 업스트림이 스트림을 닫음
    Closed,
    /// 수신 에러
    Failed(String),
}

impl StreamEnd {
    /// 업스트림 쪽 사유로 끝났는지 여부
    pub fn is_upstream_end(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// 스트림이 끝나거나 `stop`이 취소될 때까지 메시지를 버퍼에 넣습니다.
pub async fn receive_loop<T, S>(
    mut stream: S,
    buffer: IngestSender<T>,
    stop: CancellationToken,
) -> StreamEnd
where
    S: MessageStream<T>,
{
    let class = buffer.class();
    info!(class = class.label(), "upstream receive loop started");

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => break StreamEnd::Stopped,
            next = stream.next_message() => next,
        };

        match next {
            Ok(Some(message)) => {
                metrics::counter!(m::UPSTREAM_MESSAGES_RECEIVED_TOTAL, m::LABEL_CLASS => class.label())
                    .increment(1);
                buffer.try_offer(message);
            }
            Ok(None) => break StreamEnd::Closed,
            Err(status) => break StreamEnd::Failed(status.to_string()),
        }
    };

    metrics::counter!(m::UPSTREAM_STREAMS_ENDED_TOTAL, m::LABEL_CLASS => class.label()).increment(1);
    match &end {
        StreamEnd::Stopped => info!(class = class.label(), "upstream receive loop stopped"),
        StreamEnd::Closed => warn!(class = class.label(), "upstream stream closed by relay"),
        StreamEnd::Failed(reason) => warn!(
            class = class.label(),
            error = %reason,
            "upstream stream failed"
        ),
    }
    end
}

/// 버퍼에서 메시지를 꺼내 정규화하고 허브에 발행합니다.
///
/// `stop`이 취소되거나 모든 수신 루프가 끝나 버퍼가 비면 종료하며, 발행한 이벤트 수를 반환합니다.
/// `debug_events`가 켜져 있으면 정규화된 이벤트를 모두 info 레벨로 기록합니다.
pub async fn handoff_loop<T, F>(
    mut buffer: IngestReceiver<T>,
    hub: Arc<BroadcastHub>,
    stop: CancellationToken,
    debug_events: bool,
    canonicalize: F,
) -> u64
where
    F: Fn(T) -> CanonicalEvent,
{
    let class = buffer.class();
    let mut published = 0_u64;

    loop {
        let message = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = buffer.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        let event = canonicalize(message);
        if debug_events {
            info!(
                class = class.label(),
                uuid = %event.uuid,
                priority = %event.priority,
                rule = %event.rule,
                output = %event.output,
                "canonical event"
            );
        }
        hub.publish(event);
        published += 1;
    }

    info!(class = class.label(), published, "hand-off loop stopped");
    published
}
