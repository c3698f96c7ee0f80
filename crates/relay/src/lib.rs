//! Sidewatch 업스트림 수집기
//!
//! KubeArmor relay의 `feeder.LogService`에 연결하여 알림/로그 스트림을 받아
//! 정규화한 뒤 [`BroadcastHub`](sidewatch_fanout::BroadcastHub)에 발행합니다.
//!
//! # 모듈 구성
//!
//! - [`proto`]: `feeder` 패키지의 protobuf 메시지
//! - [`resolver`]: relay 엔드포인트 해석
//! - [`client`]: gRPC 연결, 재시도, 스트림 열기
//! - [`buffer`]: 클래스별 bounded 수집 버퍼
//! - [`receiver`]: 수신 루프와 hand-off 루프
//! - [`canonicalize`]: 업스트림 메시지 → [`CanonicalEvent`](sidewatch_core::CanonicalEvent)
//! - [`ingest`]: 전체 수집기 (Pipeline trait 구현)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! relay ──gRPC──▶ receive loop ──try_offer──▶ IngestionBuffer ──▶ hand-off loop ──▶ hub
//!                  (클래스별)                  (1000 / 10000)       canonicalize + enrich
//! ```

pub mod buffer;
pub mod canonicalize;
pub mod client;
pub mod error;
pub mod ingest;
pub mod proto;
pub mod receiver;
pub mod resolver;

pub use buffer::{IngestReceiver, IngestSender, ingestion_buffer};
pub use canonicalize::Canonicalizer;
pub use client::{RelayClient, RetryPolicy, connect_with_retry};
pub use error::RelayError;
pub use ingest::{RelayIngest, RelayIngestBuilder};
pub use receiver::{MessageStream, StreamEnd, handoff_loop, receive_loop};
pub use resolver::{DEFAULT_RELAY_PORT, EndpointResolver, StaticResolver};
