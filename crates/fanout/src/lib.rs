//! Sidewatch 팬아웃 엔진
//!
//! 정규화된 이벤트를 sink로 내보내는 모든 조정 로직을 담습니다.
//!
//! # 아키텍처
//! ```text
//! publish ──▶ BroadcastHub ──▶ Subscription (큐) ──▶ SinkWatcher ──▶ PriorityGate ──▶ Sink
//!                (alert/log 레지스트리)
//!
//! HTTP 이벤트 ──▶ Dispatcher ──▶ (sink마다 태스크) ──▶ PriorityGate ──▶ Sink
//! ```
//!
//! 모든 큐는 bounded이며 가득 차면 가장 새로운 항목을 버립니다.

pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod gate;
pub mod hub;
pub mod lifecycle;
pub mod template;
pub mod watcher;

pub use dispatch::{DeliveryOutcome, Dispatcher, deliver};
pub use enrich::Enricher;
pub use error::FanoutError;
pub use gate::{PriorityGate, SinkRoute};
pub use hub::{BroadcastHub, PublishReport, SharedEvent, Subscription};
pub use lifecycle::RunFlags;
pub use watcher::{SinkWatcher, WatcherReport, spawn_watchers};
