use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bt_bridge::event_bus::EventBus;
use bt_bridge::protocol::TeamEvent;
use bt_core::config::Config;
use bt_core::state_machine::{BotEvent, BotStatus};
use bt_core::store::{self, StateStore, KEY_CONFIG};
use bt_core::types::{
    BotOverrides, BotUpdate, BotWorkLogEntry, Specialization, TeamBot, TeamConfig,
    TeamConfigPatch, TeamStats, WorkLogAction,
};
use bt_harness::shutdown::ShutdownSignal;
use bt_harness::skill::SkillExecutor;
use bt_telemetry::metrics::MetricsCollector;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::ChainRun;
use crate::error::{OrchestratorError, Result};
use crate::governor::ConcurrencyGovernor;
use crate::profiles::profile;
use crate::registry::BotRegistry;
use crate::scheduler::{Scheduler, SchedulerHandle};

/// Construction-time policy that is not part of the persisted [`TeamConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Model assigned to new bots when the caller does not pick one.
    pub default_model: String,
    pub allow_duplicate_specializations: bool,
    /// Used on first run only; afterwards the persisted config wins.
    pub seed_config: TeamConfig,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            default_model: "claude-sonnet".to_string(),
            allow_duplicate_specializations: true,
            seed_config: TeamConfig::default(),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_model: config.team.default_model.clone(),
            allow_duplicate_specializations: config.team.allow_duplicate_specializations,
            seed_config: config.team.to_team_config(),
        }
    }
}

/// Owns the roster, the team config, the schedule and the admission set.
///
/// Lock order is config before registry. Neither lock is held across a
/// remote call.
pub struct TeamOrchestrator {
    pub(crate) registry: Arc<RwLock<BotRegistry>>,
    pub(crate) config: RwLock<TeamConfig>,
    pub(crate) governor: ConcurrencyGovernor,
    pub(crate) executor: Arc<dyn SkillExecutor>,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) bus: EventBus,
    pub(crate) metrics: Arc<MetricsCollector>,
    pub(crate) chains: Mutex<VecDeque<ChainRun>>,
    scheduler: SchedulerHandle,
    pending_scheduler: Mutex<Option<Scheduler>>,
    options: OrchestratorOptions,
}

impl TeamOrchestrator {
    /// Load the roster and team config from `store` and build the
    /// orchestrator. The scheduler loop is not running until
    /// [`spawn_scheduler`](Self::spawn_scheduler) is called.
    pub fn new(
        executor: Arc<dyn SkillExecutor>,
        store: Arc<dyn StateStore>,
        bus: EventBus,
        metrics: Arc<MetricsCollector>,
        options: OrchestratorOptions,
    ) -> Result<Arc<Self>> {
        let registry = BotRegistry::load(store.as_ref())?;
        let config = match store::load_json::<TeamConfig>(store.as_ref(), KEY_CONFIG)? {
            Some(saved) => saved,
            None => {
                store::save_json(store.as_ref(), KEY_CONFIG, &options.seed_config)?;
                options.seed_config.clone()
            }
        };
        info!(
            bots = registry.len(),
            enabled = config.enabled,
            max_concurrent_bots = config.max_concurrent_bots,
            "orchestrator initialized"
        );

        let (scheduler, handle) = Scheduler::new();
        Ok(Arc::new(Self {
            registry: Arc::new(RwLock::new(registry)),
            config: RwLock::new(config),
            governor: ConcurrencyGovernor::new(),
            executor,
            store,
            bus,
            metrics,
            chains: Mutex::new(VecDeque::new()),
            scheduler: handle,
            pending_scheduler: Mutex::new(Some(scheduler)),
            options,
        }))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn running_count(&self) -> usize {
        self.governor.running_count()
    }

    // -----------------------------------------------------------------------
    // Scheduler
    // -----------------------------------------------------------------------

    /// Start the scheduler loop and re-arm every `active` bot. Returns `None`
    /// if the loop was already spawned.
    pub async fn spawn_scheduler(self: &Arc<Self>, shutdown: &ShutdownSignal) -> Option<JoinHandle<()>> {
        let scheduler = self
            .pending_scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;

        if self.config.read().await.enabled {
            let reg = self.registry.read().await;
            let mut armed = 0usize;
            for bot in reg.iter().filter(|b| b.status == BotStatus::Active) {
                self.scheduler.arm(bot.id, bot.preferences.schedule_minutes);
                armed += 1;
            }
            info!(armed, "resumed bot schedules");
        }

        let weak = Arc::downgrade(self);
        let on_tick = move |bot_id: Uuid| {
            if let Some(orchestrator) = weak.upgrade() {
                tokio::spawn(async move { orchestrator.tick(bot_id).await });
            }
        };
        let listener = shutdown.listener();
        let guard = shutdown.guard();
        Some(tokio::spawn(async move {
            scheduler.run(on_tick, listener).await;
            drop(guard);
        }))
    }

    /// A timer fired for `bot_id`. Runs only if the team is enabled and the
    /// bot is `active`; anything else is skipped, not queued.
    pub async fn tick(&self, bot_id: Uuid) {
        let enabled = self.config.read().await.enabled;
        let status = self.registry.read().await.get(bot_id).map(|b| b.status);
        match status {
            Some(BotStatus::Active) if enabled => {}
            other => {
                debug!(bot_id = %bot_id, status = ?other, enabled, "scheduled tick skipped");
                return;
            }
        }
        if let Err(e) = self.execute(bot_id).await {
            warn!(bot_id = %bot_id, error = %e, "scheduled execution failed");
        }
    }

    // -----------------------------------------------------------------------
    // Registry operations
    // -----------------------------------------------------------------------

    /// Create a bot in `idle` from its specialization template, with
    /// `overrides` applied on top.
    pub async fn create_bot(&self, spec: Specialization, overrides: BotOverrides) -> Result<TeamBot> {
        let template = profile(spec);
        let mut reg = self.registry.write().await;
        if !self.options.allow_duplicate_specializations && reg.has_specialization(spec) {
            return Err(OrchestratorError::DuplicateSpecialization(spec));
        }

        let name = overrides
            .name
            .clone()
            .unwrap_or_else(|| template.display_name.to_string());
        let model = overrides
            .model
            .clone()
            .unwrap_or_else(|| self.options.default_model.clone());
        let preferences = template.default_preferences().merged(&overrides);

        let mut bot = TeamBot::new(name, spec, model, preferences);
        bot.log(BotWorkLogEntry::new(
            WorkLogAction::Created,
            format!("{} joined the team", bot.name),
        ));
        reg.insert(bot.clone());
        self.persist_roster(&reg)?;
        drop(reg);

        info!(bot_id = %bot.id, specialization = %spec, name = %bot.name, "bot created");
        self.bus.publish(TeamEvent::BotCreated(bot.clone()));
        Ok(bot)
    }

    /// One bot per specialization, skipping any specialization already on
    /// the roster.
    pub async fn create_default_team(&self, model: Option<String>) -> Result<Vec<TeamBot>> {
        let mut created = Vec::new();
        for spec in Specialization::ALL {
            if self.registry.read().await.has_specialization(spec) {
                debug!(specialization = %spec, "already on the team, skipping");
                continue;
            }
            let overrides = BotOverrides {
                model: model.clone(),
                ..BotOverrides::default()
            };
            created.push(self.create_bot(spec, overrides).await?);
        }
        info!(count = created.len(), "default team created");
        Ok(created)
    }

    pub async fn get_bot(&self, bot_id: Uuid) -> Result<TeamBot> {
        self.registry
            .read()
            .await
            .get(bot_id)
            .cloned()
            .ok_or(OrchestratorError::BotNotFound(bot_id))
    }

    pub async fn list_bots(&self) -> Vec<TeamBot> {
        self.registry.read().await.list()
    }

    pub async fn work_log(&self, bot_id: Uuid) -> Result<Vec<BotWorkLogEntry>> {
        Ok(self.get_bot(bot_id).await?.work_log)
    }

    pub async fn update_bot(&self, bot_id: Uuid, update: BotUpdate) -> Result<TeamBot> {
        if update.status == Some(BotStatus::Working) {
            return Err(OrchestratorError::InvalidRequest(
                "working is set by the execution pipeline only".into(),
            ));
        }
        let enabled = self.config.read().await.enabled;
        let mut reg = self.registry.write().await;
        let bot = reg
            .get_mut(bot_id)
            .ok_or(OrchestratorError::BotNotFound(bot_id))?;

        let old_schedule = bot.preferences.schedule_minutes;
        bot.apply_overrides(&update.overrides);
        let status_changed = match update.status {
            Some(status) if status != bot.status => {
                bot.status = status;
                bot.resume_on_enable = false;
                true
            }
            _ => false,
        };

        if status_changed {
            if bot.status == BotStatus::Active && enabled {
                self.scheduler.arm(bot.id, bot.preferences.schedule_minutes);
            } else {
                self.scheduler.disarm(bot.id);
            }
        } else if bot.preferences.schedule_minutes != old_schedule && bot.status == BotStatus::Active && enabled {
            debug!(bot_id = %bot.id, minutes = bot.preferences.schedule_minutes, "schedule changed, re-arming");
            self.scheduler.arm(bot.id, bot.preferences.schedule_minutes);
        }

        let updated = bot.clone();
        self.persist_roster(&reg)?;
        drop(reg);

        self.bus.publish(TeamEvent::BotUpdated(updated.clone()));
        if status_changed {
            self.publish_status(&updated);
        }
        Ok(updated)
    }

    /// Remove a bot. An execution already in flight finishes and its result
    /// is dropped.
    pub async fn delete_bot(&self, bot_id: Uuid) -> Result<TeamBot> {
        self.scheduler.disarm(bot_id);
        let mut reg = self.registry.write().await;
        let removed = reg
            .remove(bot_id)
            .ok_or(OrchestratorError::BotNotFound(bot_id))?;
        self.persist_roster(&reg)?;
        drop(reg);

        info!(bot_id = %bot_id, name = %removed.name, "bot deleted");
        self.bus.publish(TeamEvent::BotDeleted { bot_id });
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Activate a bot, arm its timer and trigger one execution right away.
    ///
    /// A `working` bot is left alone. While the team is disabled the bot is
    /// only flagged to resume when the team is enabled again.
    pub async fn start(self: &Arc<Self>, bot_id: Uuid) -> Result<TeamBot> {
        let enabled = self.config.read().await.enabled;
        let mut reg = self.registry.write().await;
        let bot = reg
            .get_mut(bot_id)
            .ok_or(OrchestratorError::BotNotFound(bot_id))?;

        if bot.status == BotStatus::Working {
            debug!(bot_id = %bot_id, "start ignored, bot is working");
            return Ok(bot.clone());
        }

        if !enabled {
            bot.status = BotStatus::Paused;
            bot.resume_on_enable = true;
            bot.updated_at = Utc::now();
            let snapshot = bot.clone();
            self.persist_roster(&reg)?;
            drop(reg);
            info!(bot_id = %bot_id, "team disabled, bot will start when it is enabled");
            self.publish_status(&snapshot);
            return Ok(snapshot);
        }

        if bot.status != BotStatus::Active {
            bot.status = bot.status.apply(BotEvent::Start)?;
        }
        bot.resume_on_enable = false;
        bot.log(BotWorkLogEntry::new(
            WorkLogAction::Started,
            format!("Started, running every {} min", bot.preferences.schedule_minutes),
        ));
        self.scheduler.arm(bot.id, bot.preferences.schedule_minutes);
        let snapshot = bot.clone();
        self.persist_roster(&reg)?;
        drop(reg);

        info!(bot_id = %bot_id, name = %snapshot.name, "bot started");
        self.publish_status(&snapshot);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.execute(bot_id).await {
                warn!(bot_id = %bot_id, error = %e, "initial execution failed");
            }
        });
        Ok(snapshot)
    }

    /// Clear the bot's timer and pause it. An execution in flight runs to
    /// completion and leaves the bot `paused`.
    pub async fn stop(&self, bot_id: Uuid) -> Result<TeamBot> {
        self.scheduler.disarm(bot_id);
        let mut reg = self.registry.write().await;
        let bot = reg
            .get_mut(bot_id)
            .ok_or(OrchestratorError::BotNotFound(bot_id))?;

        bot.status = bot.status.apply(BotEvent::Stop)?;
        bot.resume_on_enable = false;
        bot.log(BotWorkLogEntry::new(WorkLogAction::Stopped, "Stopped"));
        let snapshot = bot.clone();
        self.persist_roster(&reg)?;
        drop(reg);

        info!(bot_id = %bot_id, "bot stopped");
        self.publish_status(&snapshot);
        Ok(snapshot)
    }

    pub async fn start_all(self: &Arc<Self>) -> Result<usize> {
        let ids: Vec<Uuid> = self.list_bots().await.into_iter().map(|b| b.id).collect();
        for id in &ids {
            self.start(*id).await?;
        }
        Ok(ids.len())
    }

    pub async fn stop_all(&self) -> Result<usize> {
        let ids: Vec<Uuid> = self.list_bots().await.into_iter().map(|b| b.id).collect();
        for id in &ids {
            self.stop(*id).await?;
        }
        Ok(ids.len())
    }

    // -----------------------------------------------------------------------
    // Team config and stats
    // -----------------------------------------------------------------------

    pub async fn config(&self) -> TeamConfig {
        self.config.read().await.clone()
    }

    /// Apply `patch`. Flipping `enabled` off pauses every running bot and
    /// clears all timers; flipping it back on resumes exactly the bots that
    /// were paused by the switch.
    pub async fn update_config(&self, patch: TeamConfigPatch) -> Result<TeamConfig> {
        if patch.max_concurrent_bots == Some(0) {
            return Err(OrchestratorError::InvalidRequest(
                "max_concurrent_bots must be >= 1".into(),
            ));
        }

        let mut config = self.config.write().await;
        let was_enabled = config.enabled;
        if let Some(enabled) = patch.enabled {
            config.enabled = enabled;
        }
        if let Some(max) = patch.max_concurrent_bots {
            config.max_concurrent_bots = max;
        }
        if let Some(notifications) = patch.notifications {
            config.notifications = notifications;
        }
        if let Some(path) = patch.project_path {
            config.project_path = Some(path);
        }

        let mut changed: Vec<TeamBot> = Vec::new();
        {
            let mut reg = self.registry.write().await;
            if was_enabled && !config.enabled {
                self.scheduler.disarm_all();
                for bot in reg.iter_mut() {
                    if matches!(bot.status, BotStatus::Active | BotStatus::Idle | BotStatus::Working) {
                        bot.status = BotStatus::Paused;
                        bot.resume_on_enable = true;
                        bot.log(BotWorkLogEntry::new(WorkLogAction::Stopped, "Paused, team disabled"));
                        changed.push(bot.clone());
                    }
                }
                info!(paused = changed.len(), "team disabled");
            } else if !was_enabled && config.enabled {
                for bot in reg.iter_mut().filter(|b| b.resume_on_enable) {
                    bot.status = BotStatus::Active;
                    bot.resume_on_enable = false;
                    bot.log(BotWorkLogEntry::new(WorkLogAction::Resumed, "Resumed, team enabled"));
                    self.scheduler.arm(bot.id, bot.preferences.schedule_minutes);
                    changed.push(bot.clone());
                }
                info!(resumed = changed.len(), "team enabled");
            }
            if !changed.is_empty() {
                self.persist_roster(&reg)?;
            }
        }

        store::save_json(self.store.as_ref(), KEY_CONFIG, &*config)?;
        let snapshot = config.clone();
        drop(config);

        self.bus.publish(TeamEvent::ConfigUpdated(snapshot.clone()));
        for bot in &changed {
            self.publish_status(bot);
        }
        Ok(snapshot)
    }

    pub async fn team_stats(&self) -> TeamStats {
        let reg = self.registry.read().await;
        TeamStats::from_bots(reg.iter())
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    pub(crate) fn persist_roster(&self, reg: &BotRegistry) -> Result<()> {
        reg.persist(self.store.as_ref())?;
        Ok(())
    }

    /// Persist on paths that must finish their bookkeeping regardless.
    pub(crate) fn persist_roster_logged(&self, reg: &BotRegistry) {
        if let Err(e) = reg.persist(self.store.as_ref()) {
            warn!(error = %e, "failed to persist roster");
        }
    }

    pub(crate) fn publish_status(&self, bot: &TeamBot) {
        self.bus.publish(TeamEvent::BotStatusChanged {
            bot_id: bot.id,
            status: bot.status,
        });
    }
}

/// Bring a bot out of `working` once its run is over: back to `paused` if it
/// was paused before the run, otherwise `active`. A status set while the run
/// was in flight is left as is.
pub(crate) fn restore_status(bot: &mut TeamBot, previous: BotStatus) {
    if bot.status != BotStatus::Working {
        return;
    }
    let event = if previous == BotStatus::Paused {
        BotEvent::Stop
    } else {
        BotEvent::Finish
    };
    if let Ok(next) = bot.status.apply(event) {
        bot.status = next;
        bot.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::profile;

    fn bot(status: BotStatus) -> TeamBot {
        let p = profile(Specialization::Debugger);
        let mut b = TeamBot::new("d", Specialization::Debugger, "m", p.default_preferences());
        b.status = status;
        b
    }

    #[test]
    fn restore_returns_working_to_active() {
        let mut b = bot(BotStatus::Working);
        restore_status(&mut b, BotStatus::Active);
        assert_eq!(b.status, BotStatus::Active);
    }

    #[test]
    fn restore_keeps_manual_run_on_paused_bot_paused() {
        let mut b = bot(BotStatus::Working);
        restore_status(&mut b, BotStatus::Paused);
        assert_eq!(b.status, BotStatus::Paused);
    }

    #[test]
    fn restore_leaves_midflight_stop_alone() {
        let mut b = bot(BotStatus::Paused);
        restore_status(&mut b, BotStatus::Active);
        assert_eq!(b.status, BotStatus::Paused);
    }
}
