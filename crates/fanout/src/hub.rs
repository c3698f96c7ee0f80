//! Broadcast Hub: 클래스별 동적 구독자 레지스트리
//!
//! 알림/로그 각각 하나의 레지스트리를 가지며, 레지스트리는 등록 맵만을
//! 보호하는 reader/writer 락 하나로 관리됩니다.
//!
//! # 발행 규칙
//! - 발행은 read 락으로 현재 구독자 스냅샷을 복사한 뒤 락을 해제하고 전달합니다.
//! - 각 구독자 큐에 non-blocking으로 제안하며, 가득 찬 큐는 해당 구독자만 이벤트를 놓칩니다.
//! - 하나의 구독자 큐 안에서는 발행 순서(FIFO)가 유지됩니다.
//!
//! # 등록 해제
//! [`Subscription`]이 drop되면 자동으로 등록이 해제됩니다.
//! watcher가 에러나 panic으로 종료해도 등록이 남지 않습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use sidewatch_core::event::{CanonicalEvent, EventClass};
use sidewatch_core::metrics as m;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::error::FanoutError;

/// 구독자 큐의 기본 용량
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1_000;

/// 구독자 큐를 통해 전달되는 이벤트 (수신자 간 공유, 불변)
pub type SharedEvent = Arc<CanonicalEvent>;

/// 등록된 구독자 한 건
struct Entry {
    /// 등록 세대 (같은 ID 재등록 시 이전 guard가 새 등록을 지우지 않도록 구분)
    generation: u64,
    tx: mpsc::Sender<SharedEvent>,
}

/// 클래스 하나의 구독자 레지스트리
struct Registry {
    class: EventClass,
    subscribers: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    fn new(class: EventClass) -> Self {
        Self {
            class,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// 한 번의 발행 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// 큐에 들어간 구독자 수
    pub delivered: usize,
    /// 큐가 가득 차 이벤트를 놓친 구독자 수
    pub dropped: usize,
}

/// 동적 구독자 레지스트리 기반 브로드캐스트 허브
///
/// 서비스 인스턴스마다 하나 생성하여 `Arc`로 watcher와 수집기에 넘깁니다.
pub struct BroadcastHub {
    alerts: Registry,
    logs: Registry,
    capacity: usize,
    next_generation: AtomicU64,
}

impl BroadcastHub {
    /// 구독자 큐 용량을 지정하여 허브를 생성합니다.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            alerts: Registry::new(EventClass::Alert),
            logs: Registry::new(EventClass::Log),
            capacity: capacity.max(1),
            next_generation: AtomicU64::new(1),
        })
    }

    fn registry(&self, class: EventClass) -> &Registry {
        match class {
            EventClass::Alert => &self.alerts,
            EventClass::Log => &self.logs,
        }
    }

    /// 구독자 큐 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 새 전달 큐를 등록합니다.
    ///
    /// 같은 클래스에 같은 ID가 이미 있으면 에러를 반환합니다.
    pub fn register(
        self: &Arc<Self>,
        id: impl Into<String>,
        class: EventClass,
    ) -> Result<Subscription, FanoutError> {
        let id = id.into();
        let registry = self.registry(class);
        let (tx, rx) = mpsc::channel(self.capacity);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut map = registry
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if map.contains_key(&id) {
                return Err(FanoutError::DuplicateSubscriber { id, class });
            }
            map.insert(id.clone(), Entry { generation, tx });
            metrics::gauge!(m::HUB_SUBSCRIBERS, m::LABEL_CLASS => class.label())
                .set(map.len() as f64);
        }

        info!(subscriber = %id, class = class.label(), "added a new subscriber");

        Ok(Subscription {
            id,
            class,
            generation,
            rx,
            hub: Arc::clone(self),
        })
    }

    /// 구독자를 등록 해제합니다. 등록되지 않은 ID는 무시합니다.
    pub fn unregister(&self, id: &str, class: EventClass) -> bool {
        self.remove_if(id, class, |_| true)
    }

    fn remove_if(&self, id: &str, class: EventClass, pred: impl Fn(&Entry) -> bool) -> bool {
        let registry = self.registry(class);
        let mut map = registry
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = match map.get(id) {
            Some(entry) if pred(entry) => map.remove(id).is_some(),
            _ => false,
        };
        if removed {
            metrics::gauge!(m::HUB_SUBSCRIBERS, m::LABEL_CLASS => class.label())
                .set(map.len() as f64);
            debug!(subscriber = id, class = class.label(), "removed subscriber");
        }
        removed
    }

    /// 클래스별 등록된 구독자 수
    pub fn subscriber_count(&self, class: EventClass) -> usize {
        self.registry(class).len()
    }

    /// 이벤트를 해당 클래스의 모든 구독자에게 non-blocking으로 제안합니다.
    pub fn publish(&self, event: CanonicalEvent) -> PublishReport {
        self.publish_shared(Arc::new(event))
    }

    /// 이미 공유된 이벤트를 발행합니다.
    pub fn publish_shared(&self, event: SharedEvent) -> PublishReport {
        let registry = self.registry(event.event_class());

        // 스냅샷만 read 락 안에서 만들고, 전달은 락 밖에서 수행
        let targets: Vec<(String, mpsc::Sender<SharedEvent>)> = registry
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (id.clone(), entry.tx.clone()))
            .collect();

        let class = registry.class.label();
        let mut report = PublishReport::default();
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    debug!(subscriber = %id, class, "subscriber queue full, event dropped");
                }
                // 스냅샷 이후 해제된 구독자
                Err(TrySendError::Closed(_)) => {}
            }
        }

        metrics::counter!(m::HUB_EVENTS_PUBLISHED_TOTAL, m::LABEL_CLASS => class).increment(1);
        if report.dropped > 0 {
            metrics::counter!(m::HUB_DELIVERIES_DROPPED_TOTAL, m::LABEL_CLASS => class)
                .increment(report.dropped as u64);
        }
        report
    }
}

/// 허브에 등록된 전달 큐의 수신 측
///
/// drop 시 자신이 만든 등록만 해제합니다.
pub struct Subscription {
    id: String,
    class: EventClass,
    generation: u64,
    rx: mpsc::Receiver<SharedEvent>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    /// 구독자 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 구독 클래스
    pub fn class(&self) -> EventClass {
        self.class
    }

    /// 다음 이벤트를 기다립니다.
    pub async fn recv(&mut self) -> Option<SharedEvent> {
        self.rx.recv().await
    }

    /// 큐에 이벤트가 있으면 즉시 꺼냅니다.
    pub fn try_recv(&mut self) -> Option<SharedEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let generation = self.generation;
        self.hub
            .remove_if(&self.id, self.class, |entry| entry.generation == generation);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}
