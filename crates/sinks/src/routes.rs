//! 설정에서 활성 sink 라우트 목록을 구성합니다.
//!
//! 필수 연결 필드가 비어 있는 sink는 비활성이며 라우트에 포함되지 않습니다.
//! 최소 우선순위 문자열은 여기서 한 번만 파싱되어 [`PriorityGate`]에 담깁니다.

use std::sync::Arc;

use sidewatch_core::SidewatchConfig;
use sidewatch_core::config::parse_minimum_priority;
use sidewatch_core::error::SidewatchError;
use sidewatch_fanout::{PriorityGate, SinkRoute};
use tracing::info;

use crate::stdout::StdoutSink;
use crate::syslog::SyslogSink;
use crate::webhook::WebhookSink;

/// 활성화된 sink마다 라우트 하나를 만듭니다.
pub fn build_routes(config: &SidewatchConfig) -> Result<Vec<SinkRoute>, SidewatchError> {
    let test_rule = config.general.test_rule.as_str();
    let sinks = &config.sinks;
    let mut routes = Vec::new();

    if sinks.stdout.enabled {
        let minimum =
            parse_minimum_priority("sinks.stdout.minimum_priority", &sinks.stdout.minimum_priority)?;
        routes.push(
            SinkRoute::new(Arc::new(StdoutSink::new()), PriorityGate::new(minimum, test_rule))
                .with_classes(sinks.stdout.watch_alerts, sinks.stdout.watch_logs),
        );
    }

    if sinks.webhook.is_enabled() {
        let minimum = parse_minimum_priority(
            "sinks.webhook.minimum_priority",
            &sinks.webhook.minimum_priority,
        )?;
        let sink = WebhookSink::from_config(&sinks.webhook)?;
        routes.push(
            SinkRoute::new(Arc::new(sink), PriorityGate::new(minimum, test_rule))
                .with_classes(sinks.webhook.watch_alerts, sinks.webhook.watch_logs),
        );
    }

    if sinks.syslog.is_enabled() {
        let minimum =
            parse_minimum_priority("sinks.syslog.minimum_priority", &sinks.syslog.minimum_priority)?;
        let sink = SyslogSink::from_config(&sinks.syslog)?;
        routes.push(
            SinkRoute::new(Arc::new(sink), PriorityGate::new(minimum, test_rule))
                .with_classes(sinks.syslog.watch_alerts, sinks.syslog.watch_logs),
        );
    }

    let names: Vec<&str> = routes.iter().map(SinkRoute::name).collect();
    info!(count = routes.len(), sinks = ?names, "enabled sinks");
    Ok(routes)
}
