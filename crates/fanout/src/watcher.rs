//! Sink Watcher: (sink, 이벤트 클래스) 쌍마다 하나의 태스크
//!
//! 생성 시 허브에 새 전달 큐를 등록하고, 해당 클래스의 running 플래그가
//! 내려갈 때까지 큐에서 이벤트를 받아 게이트 평가 후 sink로 전송합니다.
//! 루프가 끝나면 [`Subscription`]이 drop되며 등록이 해제됩니다.

use std::sync::Arc;

use sidewatch_core::event::EventClass;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::{DeliveryOutcome, deliver};
use crate::error::FanoutError;
use crate::gate::SinkRoute;
use crate::hub::{BroadcastHub, Subscription};
use crate::lifecycle::RunFlags;

/// watcher 종료 시 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherReport {
    /// sink가 수락한 이벤트 수
    pub delivered: u64,
    /// 게이트에서 걸러진 이벤트 수
    pub gated: u64,
    /// 전송 실패 수
    pub failed: u64,
}

/// 하나의 sink를 하나의 클래스 스트림에 연결하는 watcher
pub struct SinkWatcher {
    route: SinkRoute,
    subscription: Subscription,
    stop: CancellationToken,
}

impl SinkWatcher {
    /// 허브에 고유 ID로 등록된 watcher를 생성합니다.
    ///
    /// 등록은 이 시점에 끝나므로, 반환 이후 발행된 이벤트는 모두 이 watcher의 큐에 제안됩니다.
    pub fn new(
        hub: &Arc<BroadcastHub>,
        route: SinkRoute,
        class: EventClass,
        flags: &RunFlags,
    ) -> Result<Self, FanoutError> {
        let id = subscriber_id(route.name(), class);
        let subscription = hub.register(id, class)?;
        Ok(Self {
            route,
            subscription,
            stop: flags.token(class),
        })
    }

    /// 구독자 ID
    pub fn id(&self) -> &str {
        self.subscription.id()
    }

    /// 플래그가 내려가거나 큐가 닫힐 때까지 이벤트를 전달합니다.
    pub async fn run(mut self) -> WatcherReport {
        let class = self.subscription.class();
        let mut report = WatcherReport::default();
        info!(
            sink = self.route.name(),
            subscriber = self.subscription.id(),
            class = class.label(),
            "sink watcher started"
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                next = self.subscription.recv() => match next {
                    Some(event) => event,
                    None => {
                        warn!(subscriber = self.subscription.id(), "delivery queue closed");
                        break;
                    }
                },
            };

            match deliver(&self.route, &event).await {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::Gated => report.gated += 1,
                DeliveryOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            sink = self.route.name(),
            class = class.label(),
            delivered = report.delivered,
            gated = report.gated,
            failed = report.failed,
            "sink watcher stopped"
        );
        report
    }

    /// 태스크로 실행합니다.
    pub fn spawn(self) -> JoinHandle<WatcherReport> {
        tokio::spawn(self.run())
    }
}

/// `{sink}-{class}-{uuid}` 형식의 고유 구독자 ID
fn subscriber_id(sink: &str, class: EventClass) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{sink}-{}-{}", class.label(), &suffix[..8])
}

/// 활성화된 모든 라우트에 대해 watcher를 등록하고 실행합니다.
///
/// `classes`에 포함된 클래스 중 라우트가 구독하는 클래스마다 watcher 하나를 띄웁니다.
/// 등록 중 하나라도 실패하면 이미 띄운 watcher를 남기지 않도록 아무것도 실행하지 않습니다.
pub fn spawn_watchers(
    hub: &Arc<BroadcastHub>,
    routes: &[SinkRoute],
    classes: &[EventClass],
    flags: &RunFlags,
) -> Result<Vec<JoinHandle<WatcherReport>>, FanoutError> {
    let mut watchers = Vec::new();
    for route in routes {
        for &class in classes {
            if route.watches(class) {
                watchers.push(SinkWatcher::new(hub, route.clone(), class, flags)?);
            }
        }
    }
    info!(count = watchers.len(), "spawning sink watchers");
    Ok(watchers.into_iter().map(SinkWatcher::spawn).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use sidewatch_core::error::SinkError;
    use sidewatch_core::event::{CanonicalEvent, DEFAULT_TEST_RULE, Priority};
    use sidewatch_core::sink::Sink;
    use tokio::time::timeout;

    use super::*;
    use crate::gate::PriorityGate;

    #[derive(Default)]
    struct Recorder {
        uuids: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.uuids.lock().unwrap().len()
        }
    }

    impl Sink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn send(&self, event: &CanonicalEvent) -> Result<(), SinkError> {
            self.uuids.lock().unwrap().push(event.uuid.clone());
            Ok(())
        }
    }

    fn route(sink: Arc<Recorder>, min: Option<Priority>) -> SinkRoute {
        SinkRoute::new(sink, PriorityGate::new(min, DEFAULT_TEST_RULE))
    }

    async fn wait_for(recorder: &Recorder, n: usize) {
        timeout(Duration::from_secs(2), async {
            while recorder.count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sink should receive events in time");
    }

    #[tokio::test]
    async fn watcher_delivers_and_unregisters_on_stop() {
        // Given: 하나의 alert watcher
        let hub = BroadcastHub::new(16);
        let flags = RunFlags::new();
        let recorder = Arc::new(Recorder::default());
        let watcher =
            SinkWatcher::new(&hub, route(recorder.clone(), None), EventClass::Alert, &flags)
                .unwrap();
        let handle = watcher.spawn();

        // When: 알림을 발행
        hub.publish(CanonicalEvent::new(EventClass::Alert, Priority::Error, "p"));
        wait_for(&recorder, 1).await;

        // Then: 플래그를 내리면 종료하고 등록이 해제됨
        flags.stop(EventClass::Alert);
        let report = timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher should stop")
            .expect("watcher should not panic");
        assert_eq!(report.delivered, 1);
        assert_eq!(hub.subscriber_count(EventClass::Alert), 0);
    }

    #[tokio::test]
    async fn watcher_counts_gated_events() {
        let hub = BroadcastHub::new(16);
        let flags = RunFlags::new();
        let recorder = Arc::new(Recorder::default());
        let handle = SinkWatcher::new(
            &hub,
            route(recorder.clone(), Some(Priority::Critical)),
            EventClass::Alert,
            &flags,
        )
        .unwrap()
        .spawn();

        hub.publish(CanonicalEvent::new(EventClass::Alert, Priority::Notice, "low"));
        hub.publish(CanonicalEvent::new(EventClass::Alert, Priority::Debug, DEFAULT_TEST_RULE));
        wait_for(&recorder, 1).await;

        flags.stop_all();
        let report = handle.await.unwrap();
        assert_eq!(report, WatcherReport { delivered: 1, gated: 1, failed: 0 });
    }

    #[tokio::test]
    async fn spawn_watchers_respects_route_classes() {
        let hub = BroadcastHub::new(16);
        let flags = RunFlags::new();
        let alerts_only = route(Arc::new(Recorder::default()), None).with_classes(true, false);
        let both = route(Arc::new(Recorder::default()), None);

        let handles = spawn_watchers(
            &hub,
            &[alerts_only, both],
            &[EventClass::Alert, EventClass::Log],
            &flags,
        )
        .unwrap();

        assert_eq!(handles.len(), 3);
        assert_eq!(hub.subscriber_count(EventClass::Alert), 2);
        assert_eq!(hub.subscriber_count(EventClass::Log), 1);

        flags.stop_all();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(hub.subscriber_count(EventClass::Alert), 0);
        assert_eq!(hub.subscriber_count(EventClass::Log), 0);
    }

    #[test]
    fn subscriber_ids_are_distinct() {
        let a = subscriber_id("syslog", EventClass::Alert);
        let b = subscriber_id("syslog", EventClass::Alert);
        assert!(a.starts_with("syslog-alert-"));
        assert_ne!(a, b);
    }
}
