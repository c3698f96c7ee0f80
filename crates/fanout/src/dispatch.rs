//! 게이트 평가 + sink 전송, 그리고 HTTP 경로용 직접 디스패처
//!
//! [`deliver`]는 watcher와 [`Dispatcher`]가 공유하는 단일 전달 단계입니다.
//! 실패한 전송은 재시도하지 않으며 결과는 메트릭과 로그로만 남습니다.

use std::sync::Arc;

use sidewatch_core::event::CanonicalEvent;
use sidewatch_core::metrics as m;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gate::SinkRoute;

/// 전달 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// sink가 수락함
    Delivered,
    /// 우선순위 게이트에서 걸러짐
    Gated,
    /// sink가 에러를 반환함
    Failed,
}

/// 게이트를 평가하고 통과하면 sink로 전송합니다.
pub async fn deliver(route: &SinkRoute, event: &CanonicalEvent) -> DeliveryOutcome {
    let sink = route.name();
    if !route.gate.admits(event) {
        debug!(
            sink,
            priority = %event.priority,
            minimum = ?route.gate.minimum(),
            "event below sink minimum priority"
        );
        metrics::counter!(m::WATCHER_EVENTS_GATED_TOTAL, m::LABEL_SINK => sink.to_owned())
            .increment(1);
        return DeliveryOutcome::Gated;
    }

    match route.sink.send(event).await {
        Ok(()) => {
            metrics::counter!(
                m::SINK_SENDS_TOTAL,
                m::LABEL_SINK => sink.to_owned(),
                m::LABEL_STATUS => "ok"
            )
            .increment(1);
            DeliveryOutcome::Delivered
        }
        Err(e) => {
            warn!(sink, uuid = %event.uuid, error = %e, "sink send failed");
            metrics::counter!(
                m::SINK_SENDS_TOTAL,
                m::LABEL_SINK => sink.to_owned(),
                m::LABEL_STATUS => "error"
            )
            .increment(1);
            DeliveryOutcome::Failed
        }
    }
}

/// 허브를 거치지 않는 직접 팬아웃
///
/// 이벤트 하나당 활성화된 sink마다 독립된 태스크를 하나씩 띄웁니다.
/// 버퍼나 레지스트리를 사용하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    routes: Arc<[SinkRoute]>,
}

impl Dispatcher {
    /// 활성화된 sink 라우트 목록으로 디스패처를 생성합니다.
    pub fn new(routes: Vec<SinkRoute>) -> Self {
        Self {
            routes: routes.into(),
        }
    }

    /// 등록된 sink 수
    pub fn sink_count(&self) -> usize {
        self.routes.len()
    }

    /// 이벤트를 모든 sink로 디스패치합니다.
    ///
    /// 호출자는 반환된 핸들을 기다리지 않아도 됩니다.
    pub fn dispatch(&self, event: CanonicalEvent) -> Vec<JoinHandle<DeliveryOutcome>> {
        let event = Arc::new(event);
        self.routes
            .iter()
            .cloned()
            .map(|route| {
                let event = Arc::clone(&event);
                tokio::spawn(async move { deliver(&route, &event).await })
            })
            .collect()
    }
}
