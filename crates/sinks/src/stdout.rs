//! 표준 출력 sink: 이벤트당 camelCase JSON 한 줄

use sidewatch_core::error::SinkError;
use sidewatch_core::event::CanonicalEvent;
use sidewatch_core::sink::Sink;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// sink 이름
pub const STDOUT_SINK: &str = "stdout";

/// JSON lines 출력 sink
pub struct StdoutSink {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl StdoutSink {
    /// 프로세스 표준 출력에 쓰는 sink
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }

    /// 임의의 writer에 쓰는 sink
    pub fn with_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StdoutSink {
    fn name(&self) -> &str {
        STDOUT_SINK
    }

    async fn send(&self, event: &CanonicalEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(event).map_err(|e| SinkError::Encode {
            sink: STDOUT_SINK.to_owned(),
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(&line).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| SinkError::Send {
            sink: STDOUT_SINK.to_owned(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use sidewatch_core::event::{EventClass, Priority};
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn writes_one_json_line_per_event() {
        let (writer, mut reader) = tokio::io::duplex(64 * 1024);
        let sink = StdoutSink::with_writer(writer);

        let mut event = CanonicalEvent::new(EventClass::Alert, Priority::Warning, "policy");
        event.output = "first".to_owned();
        sink.send(&event).await.unwrap();
        event.output = "second".to_owned();
        sink.send(&event).await.unwrap();
        drop(sink);

        let mut text = String::new();
        reader.read_to_string(&mut text).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["eventClass"], "Alert");
        assert_eq!(first["priority"], "Warning");
        assert_eq!(first["output"], "first");
    }

    #[tokio::test]
    async fn closed_writer_is_a_send_error() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let sink = StdoutSink::with_writer(writer);

        let event = CanonicalEvent::new(EventClass::Log, Priority::Informational, "ContainerLog");
        let err = sink.send(&event).await.unwrap_err();
        assert!(matches!(err, SinkError::Send { .. }));
    }
}
