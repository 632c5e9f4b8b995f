use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bt_agents::discussion::DiscussionEngine;
use bt_agents::{OrchestratorOptions, TeamOrchestrator};
use bt_bridge::event_bus::EventBus;
use bt_bridge::protocol::TeamEvent;
use bt_core::config::Config;
use bt_core::store::{JsonFileStore, StateStore};
use bt_core::types::NotificationSettings;
use bt_harness::http::HttpSkillExecutor;
use bt_harness::shutdown::{ShutdownListener, ShutdownSignal};
use bt_harness::skill::{ConversationalExecutor, SkillExecutor};
use bt_telemetry::metrics::MetricsCollector;
use tracing::{debug, info, warn};

/// Configuration for daemon loop intervals.
#[derive(Debug, Clone)]
pub struct DaemonIntervals {
    /// How often team stats are logged and published (default: 300s).
    pub stats_secs: u64,
    /// How long shutdown waits for loops to confirm they stopped (default: 10s).
    pub drain_timeout_secs: u64,
}

impl Default for DaemonIntervals {
    fn default() -> Self {
        Self {
            stats_secs: 300,
            drain_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Map a team event to an operator notification, honouring the team's
/// notification flags.
pub fn notification(event: &TeamEvent, settings: &NotificationSettings) -> Option<Notification> {
    let (level, message) = match event {
        TeamEvent::TaskCompleted(outcome) if settings.on_complete => (
            NotificationLevel::Info,
            format!("{} finished: {}", outcome.task.description, outcome.summary),
        ),
        TeamEvent::ChainCompleted {
            completed_steps,
            total_files_fixed,
            ..
        } if settings.on_complete => (
            NotificationLevel::Info,
            format!("chain finished: {completed_steps} step(s), {total_files_fixed} file(s) fixed"),
        ),
        TeamEvent::DelegationCompleted { synthesis, .. } if settings.on_complete => (
            NotificationLevel::Info,
            format!("delegation finished: {synthesis}"),
        ),
        TeamEvent::TaskFailed { task, error, .. } if settings.on_error => (
            NotificationLevel::Warn,
            format!("{} failed: {error}", task.description),
        ),
        TeamEvent::ChainFailed { error, .. } if settings.on_error => {
            (NotificationLevel::Warn, format!("chain failed: {error}"))
        }
        TeamEvent::DelegationFailed { error, .. } if settings.on_error => {
            (NotificationLevel::Warn, format!("delegation failed: {error}"))
        }
        _ => return None,
    };
    Some(Notification { level, message })
}

fn is_notifiable(event: &TeamEvent) -> bool {
    matches!(
        event,
        TeamEvent::TaskCompleted(_)
            | TeamEvent::TaskFailed { .. }
            | TeamEvent::ChainCompleted { .. }
            | TeamEvent::ChainFailed { .. }
            | TeamEvent::DelegationCompleted { .. }
            | TeamEvent::DelegationFailed { .. }
    )
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// The botteam background daemon.
///
/// Owns the orchestrator and discussion engine, runs the scheduler, the
/// discussion loops and the stats/notification loop, and shuts them all
/// down when the `ShutdownSignal` is triggered.
pub struct Daemon {
    config: Config,
    orchestrator: Arc<TeamOrchestrator>,
    discussion: Arc<DiscussionEngine>,
    intervals: DaemonIntervals,
    metrics_path: Option<PathBuf>,
    shutdown: ShutdownSignal,
}

impl Daemon {
    /// Build a daemon around explicit store and executor implementations.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn StateStore>,
        executor: Arc<dyn SkillExecutor>,
        converser: Arc<dyn ConversationalExecutor>,
    ) -> Result<Self> {
        let orchestrator = TeamOrchestrator::new(
            executor,
            store,
            EventBus::new(),
            Arc::new(MetricsCollector::new()),
            OrchestratorOptions::from_config(&config),
        )
        .context("failed to initialize orchestrator")?;
        let discussion = DiscussionEngine::new(
            Arc::clone(&orchestrator),
            converser,
            config.discussion.clone(),
        )
        .context("failed to load discussion log")?;
        let intervals = DaemonIntervals {
            stats_secs: config.daemon.stats_interval_secs,
            ..DaemonIntervals::default()
        };
        Ok(Self {
            metrics_path: config.daemon.resolved_metrics_path(),
            config,
            orchestrator,
            discussion: Arc::new(discussion),
            intervals,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Build a daemon from config: a JSON file store under `store.path` and
    /// the HTTP Skill Executor for both skill runs and conversation.
    pub fn new(config: Config) -> Result<Self> {
        let state_dir = config.store.resolved_path();
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("failed to create state directory {}", state_dir.display()))?;
        info!(path = %state_dir.display(), "using state directory");
        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(state_dir));

        let http = Arc::new(
            HttpSkillExecutor::new(
                config.executor.base_url.as_str(),
                Duration::from_secs(config.executor.timeout_secs),
            )
            .with_api_key_env(&config.executor.api_key_env),
        );
        info!(base_url = %http.base_url(), "skill executor configured");
        Self::with_parts(config, store, http.clone(), http)
    }

    /// Override the default loop intervals.
    pub fn set_intervals(&mut self, intervals: DaemonIntervals) {
        self.intervals = intervals;
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<TeamOrchestrator> {
        &self.orchestrator
    }

    pub fn discussion(&self) -> &Arc<DiscussionEngine> {
        &self.discussion
    }

    /// Spawn every background loop. Returns how many loops hold a drain
    /// guard, for [`ShutdownSignal::wait_for_drain`].
    pub async fn start(&self) -> usize {
        let mut loops = 0usize;
        if self.orchestrator.spawn_scheduler(&self.shutdown).await.is_some() {
            loops += 1;
        }
        loops += self.discussion.spawn(&self.shutdown).len();

        let orchestrator = Arc::clone(&self.orchestrator);
        let events = self.orchestrator.bus().subscribe();
        let intervals = self.intervals.clone();
        let metrics_path = self.metrics_path.clone();
        let listener = self.shutdown.listener();
        let guard = self.shutdown.guard();
        tokio::spawn(async move {
            Self::run_loops(orchestrator, events, intervals, metrics_path, listener).await;
            drop(guard);
        });
        loops + 1
    }

    /// Stats and notification loop.
    async fn run_loops(
        orchestrator: Arc<TeamOrchestrator>,
        events: flume::Receiver<TeamEvent>,
        intervals: DaemonIntervals,
        metrics_path: Option<PathBuf>,
        mut shutdown: ShutdownListener,
    ) {
        let mut stats_interval =
            tokio::time::interval(Duration::from_secs(intervals.stats_secs.max(1)));
        // Consume the first immediate tick.
        stats_interval.tick().await;

        loop {
            tokio::select! {
                _ = stats_interval.tick() => {
                    let stats = orchestrator.team_stats().await;
                    info!(
                        total = stats.total_bots,
                        active = stats.active_bots,
                        working = stats.working_bots,
                        paused = stats.paused_bots,
                        tasks_completed = stats.tasks_completed,
                        tasks_failed = stats.tasks_failed,
                        success_rate = stats.success_rate,
                        unhealthy = stats.unhealthy_bots.len(),
                        "team stats"
                    );
                    orchestrator.bus().publish(TeamEvent::TeamStats(stats));
                    export_metrics(orchestrator.metrics(), metrics_path.as_deref()).await;
                }
                event = events.recv_async() => match event {
                    Ok(event) if is_notifiable(&event) => {
                        let settings = orchestrator.config().await.notifications;
                        match notification(&event, &settings) {
                            Some(Notification { level: NotificationLevel::Info, message }) => {
                                info!(event = event.name(), bot_id = ?event.bot_id(), %message, "notification");
                            }
                            Some(Notification { level: NotificationLevel::Warn, message }) => {
                                warn!(event = event.name(), bot_id = ?event.bot_id(), %message, "notification");
                            }
                            None => {}
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
                _ = shutdown.wait() => {
                    info!("shutdown signal received, stopping background loops");
                    break;
                }
            }
        }
    }

    /// Run until shutdown is triggered, then wait for every loop to drain.
    pub async fn run(&self) -> Result<()> {
        let loops = self.start().await;
        let stats = self.orchestrator.team_stats().await;
        info!(
            loops,
            bots = stats.total_bots,
            stats_secs = self.intervals.stats_secs,
            "daemon running"
        );

        let mut listener = self.shutdown.listener();
        listener.wait().await;

        let drain = self
            .shutdown
            .wait_for_drain(loops, Duration::from_secs(self.intervals.drain_timeout_secs))
            .await;
        if !drain.is_complete() {
            warn!(?drain, "daemon stopped before every loop drained");
        }
        if let Err(e) = self.discussion.flush() {
            warn!(error = %e, "failed to flush discussion log");
        }
        export_metrics(self.orchestrator.metrics(), self.metrics_path.as_deref()).await;
        info!("daemon stopped");
        Ok(())
    }
}

/// Log the metrics as JSON and rewrite the Prometheus text file, if any.
async fn export_metrics(metrics: &MetricsCollector, path: Option<&Path>) {
    debug!(metrics = %metrics.export_json(), "metrics snapshot");
    let Some(path) = path else {
        return;
    };
    if let Err(e) = tokio::fs::write(path, metrics.export_prometheus()).await {
        warn!(path = %path.display(), error = %e, "failed to write metrics file");
    }
}
