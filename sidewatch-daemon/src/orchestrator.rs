//! Lifecycle supervision -- assembly, ordered startup and shutdown.
//!
//! The [`Orchestrator`] owns the running flags, the broadcast hub and the
//! sink routes, and drives the upstream relay ingest and the HTTP server.
//!
//! # Startup Order (consumers before producers)
//!
//! 1. Running flags and broadcast hub
//! 2. Sink watchers (one per enabled sink and event class)
//! 3. HTTP ingestion server
//! 4. Upstream connect (bounded retry), then receive and hand-off loops
//!
//! # Shutdown Order
//!
//! 1. Running flags off (watchers and hand-off loops exit)
//! 2. Upstream connection closed, loops awaited up to `shutdown_timeout_secs`
//! 3. HTTP server stopped
//! 4. Watchers awaited

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sidewatch_core::config::SidewatchConfig;
use sidewatch_core::event::EventClass;
use sidewatch_core::pipeline::Pipeline;
use sidewatch_fanout::{
    BroadcastHub, Dispatcher, Enricher, RunFlags, SinkRoute, WatcherReport, spawn_watchers,
};
use sidewatch_relay::{Canonicalizer, RelayIngest};

use crate::http::{self, HttpState, IngestStats};
use crate::metrics_server;

/// Why the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// SIGTERM or SIGINT.
    Signal(&'static str),
    /// An upstream receive loop ended. The deployment is expected to restart us.
    UpstreamEnded,
}

impl ExitReason {
    /// Process exit code for this reason.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Signal(_) => 0,
            Self::UpstreamEnded => 1,
        }
    }
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: SidewatchConfig,
    flags: RunFlags,
    hub: Arc<BroadcastHub>,
    routes: Vec<SinkRoute>,
    enricher: Enricher,
    http_state: HttpState,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed or
    /// validated, or if any enabled sink fails to initialize.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SidewatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: SidewatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let enricher = Enricher::from_config(&config.enrichment)
            .map_err(|e| anyhow::anyhow!("invalid enrichment config: {}", e))?;
        let routes = sidewatch_sinks::build_routes(&config)
            .map_err(|e| anyhow::anyhow!("failed to build sinks: {}", e))?;
        if routes.is_empty() {
            tracing::warn!("no sink is enabled; events will be received and discarded");
        }

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let flags = RunFlags::new();
        let hub = BroadcastHub::new(config.buffers.subscriber);
        let http_state = HttpState::new(
            Dispatcher::new(routes.clone()),
            enricher.clone(),
            config.general.test_rule.as_str(),
        )
        .with_debug_events(config.general.debug);

        tracing::info!(
            sinks = routes.len(),
            watch_logs = config.upstream.watch_logs,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            flags,
            hub,
            routes,
            enricher,
            http_state,
        })
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SidewatchConfig {
        &self.config
    }

    /// Shared broadcast hub.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// HTTP ingestion counters.
    pub fn http_stats(&self) -> Arc<IngestStats> {
        self.http_state.stats()
    }

    /// HTTP ingestion router, wired to the configured sinks.
    pub fn http_router(&self) -> axum::Router {
        http::router(self.http_state.clone())
    }

    /// Run until SIGTERM/SIGINT or until the upstream stream ends.
    pub async fn run(&mut self) -> Result<ExitReason> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Run until `signal` resolves or the upstream stream ends.
    ///
    /// A connect failure after all retries is returned as an error once every
    /// already-started component has been stopped.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<ExitReason>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let mut classes = vec![EventClass::Alert];
        if self.config.upstream.watch_logs {
            classes.push(EventClass::Log);
        }

        let watchers = spawn_watchers(&self.hub, &self.routes, &classes, &self.flags)?;

        let http_stop = CancellationToken::new();
        let http_task = match self.start_http(http_stop.clone()).await {
            Ok(task) => task,
            Err(e) => {
                self.flags.stop_all();
                join_watchers(watchers, self.shutdown_timeout()).await;
                return Err(e);
            }
        };

        let mut ingest = RelayIngest::builder(self.config.upstream.clone())
            .buffers(self.config.buffers.clone())
            .debug_events(self.config.general.debug)
            .shutdown_timeout(self.shutdown_timeout())
            .canonicalizer(Canonicalizer::new(self.enricher.clone()))
            .hub(Arc::clone(&self.hub))
            .flags(self.flags.clone())
            .build()?;
        let upstream_ended = ingest.upstream_ended();

        tokio::pin!(signal);

        // The connect retry loop can take minutes; a signal during it aborts startup.
        let started = tokio::select! {
            result = ingest.start() => result.map_err(anyhow::Error::from),
            signal = &mut signal => {
                self.shutdown(None, http_stop, http_task, watchers).await;
                let name = signal?;
                tracing::info!(signal = name, "shutdown signal received during startup");
                return Ok(ExitReason::Signal(name));
            }
        };
        if let Err(e) = started {
            tracing::error!(error = %e, "upstream startup failed, rolling back");
            self.shutdown(None, http_stop, http_task, watchers).await;
            return Err(e);
        }

        tracing::info!("sidewatch running");
        let reason = tokio::select! {
            signal = &mut signal => match signal {
                Ok(name) => {
                    tracing::info!(signal = name, "shutdown signal received");
                    ExitReason::Signal(name)
                }
                Err(e) => {
                    self.shutdown(Some(&mut ingest), http_stop, http_task, watchers).await;
                    return Err(e);
                }
            },
            _ = upstream_ended.cancelled() => {
                tracing::error!("upstream stream ended, shutting down");
                ExitReason::UpstreamEnded
            }
        };

        self.shutdown(Some(&mut ingest), http_stop, http_task, watchers)
            .await;
        Ok(reason)
    }

    fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.config.general.shutdown_timeout_secs)
    }

    async fn start_http(&self, stop: CancellationToken) -> Result<JoinHandle<()>> {
        let addr = format!("{}:{}", self.config.http.listen_addr, self.config.http.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind http listener {}: {}", addr, e))?;
        let local = listener.local_addr()?;
        tracing::info!(listen_addr = %local, "http ingestion listening");

        let router = self.http_router();
        Ok(tokio::spawn(async move {
            if let Err(e) = http::serve(listener, router, stop).await {
                tracing::error!(error = %e, "http server failed");
            }
        }))
    }

    async fn shutdown(
        &self,
        ingest: Option<&mut RelayIngest>,
        http_stop: CancellationToken,
        http_task: JoinHandle<()>,
        watchers: Vec<JoinHandle<WatcherReport>>,
    ) {
        tracing::info!("stopping sidewatch");
        self.flags.stop_all();

        if let Some(ingest) = ingest {
            if let Err(e) = ingest.stop().await {
                tracing::error!(error = %e, "failed to stop relay ingest");
            }
        }

        http_stop.cancel();
        if tokio::time::timeout(self.shutdown_timeout(), http_task)
            .await
            .is_err()
        {
            tracing::warn!("http server did not stop in time");
        }

        join_watchers(watchers, self.shutdown_timeout()).await;
        tracing::info!("sidewatch stopped");
    }
}

async fn join_watchers(watchers: Vec<JoinHandle<WatcherReport>>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    for mut watcher in watchers {
        match tokio::time::timeout_at(deadline, &mut watcher).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "sink watcher task failed"),
            Err(_) => {
                // a hung Send only delays its own watcher
                watcher.abort();
                tracing::warn!("sink watcher did not stop in time");
            }
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitReason::Signal("SIGTERM").exit_code(), 0);
        assert_eq!(ExitReason::UpstreamEnded.exit_code(), 1);
    }

    #[test]
    fn build_rejects_broken_template() {
        let mut config = SidewatchConfig::default();
        config
            .enrichment
            .templated_fields
            .insert("Bad".to_owned(), "{{ range . }}".to_owned());
        let err = Orchestrator::build_from_config(config).err().unwrap();
        assert!(err.to_string().contains("invalid enrichment config"));
    }
}
