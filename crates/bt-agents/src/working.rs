//! Status recovery for runs that end without reaching their bookkeeping.
//!
//! Every admitted run (single execution, chain or delegation) holds a
//! [`WorkingGuard`] next to its admission permit. The normal exit path calls
//! [`WorkingGuard::release`]. If the guard is dropped first, because the
//! caller's future was cancelled or the executor panicked, the participants
//! are brought back out of `working` and only then is the slot released.

use std::sync::Arc;

use bt_bridge::event_bus::EventBus;
use bt_bridge::protocol::TeamEvent;
use bt_core::state_machine::BotStatus;
use bt_core::store::StateStore;
use bt_core::types::{BotWorkLogEntry, WorkLogAction};
use bt_telemetry::metrics::{names, MetricsCollector};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use crate::governor::AdmissionPermit;
use crate::orchestrator::{restore_status, TeamOrchestrator};
use crate::registry::BotRegistry;

const INTERRUPTED: &str = "run interrupted before completion";

pub(crate) struct WorkingGuard {
    permit: Option<AdmissionPermit>,
    pending: Option<Abandoned>,
}

/// Everything needed to restore participants without the orchestrator.
struct Abandoned {
    registry: Arc<RwLock<BotRegistry>>,
    store: Arc<dyn StateStore>,
    bus: EventBus,
    metrics: Arc<MetricsCollector>,
    previous: Vec<(Uuid, BotStatus)>,
    task_id: Option<Uuid>,
}

impl WorkingGuard {
    /// `previous` lists each participant with its status before the run.
    /// `task_id` is set for single executions, whose task is failed on abort.
    pub(crate) fn new(
        orchestrator: &TeamOrchestrator,
        permit: AdmissionPermit,
        previous: Vec<(Uuid, BotStatus)>,
        task_id: Option<Uuid>,
    ) -> Self {
        Self {
            permit: Some(permit),
            pending: Some(Abandoned {
                registry: Arc::clone(&orchestrator.registry),
                store: Arc::clone(&orchestrator.store),
                bus: orchestrator.bus.clone(),
                metrics: Arc::clone(&orchestrator.metrics),
                previous,
                task_id,
            }),
        }
    }

    /// Bookkeeping is done: release the slot without touching any status.
    pub(crate) fn release(mut self) {
        self.pending = None;
        self.permit = None;
    }
}

impl Drop for WorkingGuard {
    fn drop(&mut self) {
        let Some(abandoned) = self.pending.take() else {
            return;
        };
        let permit = self.permit.take();
        abandoned
            .metrics
            .add_gauge(names::BOTS_WORKING, -(abandoned.previous.len() as i64));
        warn!(
            bots = abandoned.previous.len(),
            task_id = ?abandoned.task_id,
            "run ended before its bookkeeping, restoring status"
        );

        // The permit goes last so the slot is not handed out while a
        // participant still shows `working`.
        if let Ok(mut reg) = abandoned.registry.try_write() {
            abandoned.restore(&mut reg);
            drop(reg);
            drop(permit);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut reg = abandoned.registry.write().await;
                    abandoned.restore(&mut reg);
                    drop(reg);
                    drop(permit);
                });
            }
            Err(_) => {
                error!("no runtime to restore bot status on, participants stay working until restart");
            }
        }
    }
}

impl Abandoned {
    fn restore(&self, reg: &mut BotRegistry) {
        let mut changed = Vec::with_capacity(self.previous.len());
        for (id, before) in &self.previous {
            let Some(bot) = reg.get_mut(*id) else {
                continue;
            };
            if bot.status != BotStatus::Working {
                continue;
            }
            if let Some(task_id) = self.task_id {
                if let Some(task) = bot.task_queue.iter_mut().find(|t| t.id == task_id) {
                    task.fail(INTERRUPTED);
                }
                bot.stats.tasks_failed += 1;
                bot.stats.record_failure();
            }
            bot.log(BotWorkLogEntry::new(WorkLogAction::TaskFailed, "Run interrupted").with_details(INTERRUPTED));
            restore_status(bot, *before);
            changed.push((bot.id, bot.status));
        }
        if let Err(e) = reg.persist(self.store.as_ref()) {
            warn!(error = %e, "failed to persist roster after interrupted run");
        }
        for (bot_id, status) in changed {
            self.bus.publish(TeamEvent::BotStatusChanged { bot_id, status });
        }
    }
}
