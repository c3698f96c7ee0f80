//! sink 어댑터 trait: 코어가 호출하는 유일한 외부 경계
//!
//! 각 어댑터는 "이벤트를 목적지 전용 페이로드로 렌더링한 뒤 한 번의 외부 호출"을
//! 수행합니다. 인증, 재시도, 자체 메트릭은 어댑터 책임이며 코어는
//! `send`의 성공/실패만 관찰합니다.
//!
//! [`Sink`]는 RPITIT를 사용하므로 `dyn Sink`가 불가합니다.
//! 코어는 blanket impl로 자동 구현되는 [`DynSink`]를 `Arc<dyn DynSink>`로 보관하여
//! 알림/로그 watcher와 HTTP 경로가 같은 클라이언트 핸들을 공유합니다.
//!
//! # 구현 예시
//! ```ignore
//! struct Console;
//!
//! impl Sink for Console {
//!     fn name(&self) -> &str { "console" }
//!
//!     async fn send(&self, event: &CanonicalEvent) -> Result<(), SinkError> {
//!         println!("{}", event.output);
//!         Ok(())
//!     }
//! }
//! ```

use std::future::Future;

use crate::error::SinkError;
use crate::event::CanonicalEvent;
use crate::pipeline::BoxFuture;

/// 모든 sink 어댑터가 구현하는 trait
pub trait Sink: Send + Sync {
    /// sink 고유 이름 (메트릭 레이블, 구독자 ID 접두어로 사용)
    fn name(&self) -> &str;

    /// 이벤트 하나를 목적지로 전송합니다.
    ///
    /// 코어는 이 호출에 타임아웃을 두지 않습니다.
    fn send(&self, event: &CanonicalEvent) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// dyn-compatible sink trait
pub trait DynSink: Send + Sync {
    /// sink 고유 이름
    fn name(&self) -> &str;

    /// 이벤트 하나를 목적지로 전송합니다.
    fn send<'a>(&'a self, event: &'a CanonicalEvent) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Sink를 구현한 타입은 자동으로 DynSink도 구현됩니다.
impl<T: Sink> DynSink for T {
    fn name(&self) -> &str {
        Sink::name(self)
    }

    fn send<'a>(&'a self, event: &'a CanonicalEvent) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(Sink::send(self, event))
    }
}
