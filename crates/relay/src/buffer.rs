//! 클래스별 수집 버퍼
//!
//! 수신 루프와 hand-off 루프 사이의 bounded 큐입니다. 버퍼가 가득 차면
//! 새로 들어온 메시지를 버리고 수신 루프는 막히지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sidewatch_core::event::EventClass;
use sidewatch_core::metrics as m;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// 용량 `capacity`의 수집 버퍼를 생성합니다.
///
/// # Panics
/// `capacity`가 0이면 panic합니다. 설정 검증에서 0을 거부합니다.
pub fn ingestion_buffer<T>(class: EventClass, capacity: usize) -> (IngestSender<T>, IngestReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let sender = IngestSender {
        tx,
        class,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, IngestReceiver { rx, class })
}

/// 수신 루프 쪽 핸들
#[derive(Debug)]
pub struct IngestSender<T> {
    tx: mpsc::Sender<T>,
    class: EventClass,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for IngestSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            class: self.class,
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T> IngestSender<T> {
    /// 버퍼 클래스
    pub fn class(&self) -> EventClass {
        self.class
    }

    /// 메시지를 non-blocking으로 제안합니다.
    ///
    /// 버퍼가 가득 찼거나 hand-off 루프가 종료되었으면 메시지를 버리고 `false`를 반환합니다.
    pub fn try_offer(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::counter!(m::INGEST_DROPPED_TOTAL, m::LABEL_CLASS => self.class.label())
                    .increment(1);
                // 1, 2, 4, 8... 번째 드롭에서만 기록
                if dropped.is_power_of_two() {
                    warn!(
                        class = self.class.label(),
                        dropped,
                        capacity = self.tx.max_capacity(),
                        "ingestion buffer full, dropped newest message"
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// 지금까지 버려진 메시지 수
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 버퍼 사용률 (0.0 ~ 1.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        let max = self.tx.max_capacity();
        let used = max.saturating_sub(self.tx.capacity());
        used as f64 / max as f64
    }
}

/// hand-off 루프 쪽 핸들
#[derive(Debug)]
pub struct IngestReceiver<T> {
    rx: mpsc::Receiver<T>,
    class: EventClass,
}

impl<T> IngestReceiver<T> {
    /// 버퍼 클래스
    pub fn class(&self) -> EventClass {
        self.class
    }

    /// 다음 메시지를 기다립니다. 모든 sender가 drop되고 버퍼가 비면 `None`.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}
