//! Sidewatch sink 어댑터
//!
//! 각 어댑터는 [`Sink`](sidewatch_core::Sink)를 구현하며 이벤트 하나당 외부 호출 한 번을
//! 수행합니다. 재시도는 하지 않습니다.
//!
//! - [`stdout`]: 이벤트당 JSON 한 줄
//! - [`webhook`]: HTTP POST/PUT
//! - [`syslog`]: UDP/TCP syslog (JSON 또는 CEF 본문)
//! - [`routes`]: 설정에서 활성 sink 라우트 목록 구성

pub mod routes;
pub mod stdout;
pub mod syslog;
pub mod webhook;

pub use routes::build_routes;
pub use stdout::StdoutSink;
pub use syslog::{SyslogFormat, SyslogProtocol, SyslogSink};
pub use webhook::WebhookSink;
