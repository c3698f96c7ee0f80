//! Direct HTTP ingestion path.
//!
//! Accepts one Falco-style JSON event per request, canonicalizes and enriches
//! it, then hands it to the [`Dispatcher`], which spawns one delivery task per
//! enabled sink. Nothing is buffered and the handler does not wait for sinks.
//!
//! # Routes
//!
//! | route | behavior |
//! |-------|----------|
//! | `/` | POST one event |
//! | `/test` | POST, synthesizes a test-rule event |
//! | `/ping` | `pong` |
//! | `/healthz` | `{"status":"ok"}` |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sidewatch_core::event::{
    CanonicalEvent, DEFAULT_HTTP_SOURCE, EventClass, FieldValue, Priority, local_hostname,
};
use sidewatch_core::metrics as m;
use sidewatch_fanout::{Dispatcher, Enricher};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Output text of the synthesized `/test` event.
pub const TEST_EVENT_OUTPUT: &str = "This is a test from sidewatch";

/// Machine-readable rejection reason, used as the metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BadMethod,
    NoBody,
    InvalidJson,
}

impl RejectReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::BadMethod => "badmethod",
            Self::NoBody => "nobody",
            Self::InvalidJson => "invalidjson",
        }
    }
}

/// A rejected ingestion request. Always answered with `400 Bad Request`.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Please send with post http method")]
    BadMethod,

    #[error("Please send a valid request body")]
    NoBody,

    /// The body did not decode or failed validation. The detail is logged only.
    #[error("Please send a valid request body")]
    InvalidJson(String),
}

impl IngestError {
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::BadMethod => RejectReason::BadMethod,
            Self::NoBody => RejectReason::NoBody,
            Self::InvalidJson(_) => RejectReason::InvalidJson,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Ingestion counters. Mirrored to Prometheus when a recorder is installed.
#[derive(Debug, Default)]
pub struct IngestStats {
    total: AtomicU64,
    accepted: AtomicU64,
    bad_method: AtomicU64,
    no_body: AtomicU64,
    invalid_json: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub total: u64,
    pub accepted: u64,
    pub bad_method: u64,
    pub no_body: u64,
    pub invalid_json: u64,
}

impl IngestStats {
    fn record_request(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::HTTP_REQUESTS_TOTAL).increment(1);
    }

    fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::HTTP_ACCEPTED_TOTAL).increment(1);
    }

    fn record_rejected(&self, reason: RejectReason) {
        let counter = match reason {
            RejectReason::BadMethod => &self.bad_method,
            RejectReason::NoBody => &self.no_body,
            RejectReason::InvalidJson => &self.invalid_json,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::HTTP_REJECTED_TOTAL, m::LABEL_REASON => reason.label()).increment(1);
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            total: self.total.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            bad_method: self.bad_method.load(Ordering::Relaxed),
            no_body: self.no_body.load(Ordering::Relaxed),
            invalid_json: self.invalid_json.load(Ordering::Relaxed),
        }
    }
}

/// Shared state of the ingestion router.
#[derive(Clone)]
pub struct HttpState {
    dispatcher: Dispatcher,
    enricher: Arc<Enricher>,
    test_rule: Arc<str>,
    hostname: Arc<str>,
    debug_events: bool,
    stats: Arc<IngestStats>,
}

impl HttpState {
    pub fn new(dispatcher: Dispatcher, enricher: Enricher, test_rule: impl Into<Arc<str>>) -> Self {
        Self {
            dispatcher,
            enricher: Arc::new(enricher),
            test_rule: test_rule.into(),
            hostname: local_hostname().into(),
            debug_events: false,
            stats: Arc::default(),
        }
    }

    /// Log every accepted event.
    pub fn with_debug_events(mut self, enabled: bool) -> Self {
        self.debug_events = enabled;
        self
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }
}

/// Build the ingestion router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/", any(ingest))
        .route("/test", any(test_event))
        .route("/ping", get(ping))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
        .await
}

// ─── Payload ─────────────────────────────────────────────────────────

/// Falco-compatible event body. camelCase aliases are accepted.
#[derive(Debug, Default, Deserialize)]
struct HttpPayload {
    #[serde(default)]
    output: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    rule: String,
    #[serde(default)]
    time: Option<DateTime<Utc>>,
    #[serde(default, alias = "outputFields")]
    output_fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    hostname: String,
    #[serde(default, alias = "updatedTime")]
    updated_time: String,
    #[serde(default, alias = "clusterName")]
    cluster_name: String,
    #[serde(default, alias = "eventClass")]
    event_class: Option<EventClass>,
}

impl HttpPayload {
    fn test(rule: &str, hostname: &str) -> Self {
        let mut output_fields = BTreeMap::new();
        output_fields.insert("proc.name".to_owned(), "sidewatch".into());
        output_fields.insert("user.name".to_owned(), "sidewatch".into());
        Self {
            output: TEST_EVENT_OUTPUT.to_owned(),
            priority: Priority::Debug.as_str().to_owned(),
            rule: rule.to_owned(),
            time: Some(Utc::now()),
            output_fields,
            tags: vec!["test".to_owned(), "example".to_owned()],
            hostname: hostname.to_owned(),
            ..Self::default()
        }
    }

    fn canonicalize(self, enricher: &Enricher) -> Result<CanonicalEvent, IngestError> {
        if self.rule.trim().is_empty() {
            return Err(IngestError::InvalidJson("rule is empty".to_owned()));
        }
        let priority: Priority = self
            .priority
            .parse()
            .map_err(|e| IngestError::InvalidJson(format!("{e}")))?;

        let mut event = CanonicalEvent::new(
            self.event_class.unwrap_or(EventClass::Alert),
            priority,
            self.rule,
        );
        event.timestamp = self.time.unwrap_or_else(Utc::now).timestamp();
        event.updated_time = self.updated_time;
        event.cluster_name = self.cluster_name;
        event.hostname = self.hostname;
        event.output = self.output;
        event.source = if self.source.is_empty() {
            DEFAULT_HTTP_SOURCE.to_owned()
        } else {
            self.source
        };
        event.tags = self.tags;
        event.output_fields = self
            .output_fields
            .into_iter()
            .filter_map(|(k, v)| FieldValue::from_json(v).map(|v| (k, v)))
            .collect();
        enricher.apply(&mut event.output_fields);
        Ok(event)
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn ingest(State(state): State<HttpState>, method: Method, body: Bytes) -> Response {
    state.stats.record_request();
    let result = decode(&method, &body).and_then(|payload| payload.canonicalize(&state.enricher));
    respond(&state, result)
}

async fn test_event(State(state): State<HttpState>, method: Method) -> Response {
    state.stats.record_request();
    let result = if method == Method::POST {
        HttpPayload::test(&state.test_rule, &state.hostname).canonicalize(&state.enricher)
    } else {
        Err(IngestError::BadMethod)
    };
    respond(&state, result)
}

async fn ping() -> &'static str {
    "pong\n"
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Method, then empty body, then decode.
fn decode(method: &Method, body: &[u8]) -> Result<HttpPayload, IngestError> {
    if *method != Method::POST {
        return Err(IngestError::BadMethod);
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestError::NoBody);
    }
    serde_json::from_slice(body).map_err(|e| IngestError::InvalidJson(e.to_string()))
}

fn respond(state: &HttpState, result: Result<CanonicalEvent, IngestError>) -> Response {
    match result {
        Ok(event) => {
            if state.debug_events {
                tracing::info!(
                    uuid = %event.uuid,
                    rule = %event.rule,
                    priority = %event.priority,
                    event = %serde_json::to_string(&event).unwrap_or_default(),
                    "canonical event"
                );
            }
            state.stats.record_accepted();
            let tasks = state.dispatcher.dispatch(event);
            tracing::debug!(sinks = tasks.len(), "http event dispatched");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            let reason = e.reason();
            match &e {
                IngestError::InvalidJson(detail) => {
                    tracing::warn!(reason = reason.label(), detail = %detail, "http event rejected");
                }
                _ => tracing::warn!(reason = reason.label(), "http event rejected"),
            }
            state.stats.record_rejected(reason);
            e.into_response()
        }
    }
}
