//! Sidewatch 공통 크레이트
//!
//! 정규화 이벤트 모델, sink 어댑터 trait, 에러 타입, 설정, 메트릭 이름을 제공합니다.
//! 다른 모든 크레이트는 이 크레이트에만 의존하여 서로 느슨하게 연결됩니다.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod sink;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, SidewatchError, SinkError, UpstreamError};

// 설정
pub use config::SidewatchConfig;

// 이벤트
pub use event::{CanonicalEvent, EventClass, FieldValue, OutputFields, Priority};

// 파이프라인 / sink trait
pub use pipeline::{BoxFuture, HealthStatus, Pipeline};
pub use sink::{DynSink, Sink};
