//! HTTP webhook sink
//!
//! 이벤트를 camelCase JSON 본문으로 설정된 URL에 POST(또는 PUT)합니다.
//! 2xx가 아닌 응답은 전송 실패입니다.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sidewatch_core::config::WebhookSinkConfig;
use sidewatch_core::error::SinkError;
use sidewatch_core::event::CanonicalEvent;
use sidewatch_core::sink::Sink;
use tracing::debug;

/// sink 이름
pub const WEBHOOK_SINK: &str = "webhook";

/// HTTP webhook sink
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    method: Method,
    headers: HeaderMap,
}

impl WebhookSink {
    /// 설정에서 sink를 생성합니다.
    ///
    /// 메서드가 POST/PUT이 아니거나 헤더가 유효하지 않으면 에러입니다.
    pub fn from_config(config: &WebhookSinkConfig) -> Result<Self, SinkError> {
        let method = match config.method.to_ascii_uppercase().as_str() {
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            other => return Err(encode_error(format!("unsupported method '{other}'"))),
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &config.custom_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| encode_error(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| encode_error(format!("invalid header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SinkError::Connection {
                sink: WEBHOOK_SINK.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: config.address.trim().to_owned(),
            method,
            headers,
        })
    }

    /// 대상 URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn encode_error(reason: String) -> SinkError {
    SinkError::Encode {
        sink: WEBHOOK_SINK.to_owned(),
        reason,
    }
}

impl Sink for WebhookSink {
    fn name(&self) -> &str {
        WEBHOOK_SINK
    }

    async fn send(&self, event: &CanonicalEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| SinkError::Connection {
                sink: WEBHOOK_SINK.to_owned(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                sink: WEBHOOK_SINK.to_owned(),
                status: status.as_u16(),
            });
        }

        debug!(url = %self.url, status = status.as_u16(), uuid = %event.uuid, "webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(method: &str) -> WebhookSinkConfig {
        WebhookSinkConfig {
            address: "http://127.0.0.1:9/hook".to_owned(),
            method: method.to_owned(),
            ..WebhookSinkConfig::default()
        }
    }

    #[test]
    fn accepts_post_and_put_case_insensitively() {
        assert_eq!(WebhookSink::from_config(&config("post")).unwrap().method, Method::POST);
        assert_eq!(WebhookSink::from_config(&config("PUT")).unwrap().method, Method::PUT);
    }

    #[test]
    fn rejects_other_methods() {
        assert!(matches!(
            WebhookSink::from_config(&config("DELETE")),
            Err(SinkError::Encode { .. })
        ));
    }

    #[test]
    fn rejects_invalid_header_names() {
        let mut cfg = config("POST");
        cfg.custom_headers
            .insert("bad header".to_owned(), "x".to_owned());
        assert!(WebhookSink::from_config(&cfg).is_err());
    }
}
