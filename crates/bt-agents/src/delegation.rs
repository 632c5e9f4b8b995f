use std::collections::HashMap;

use bt_bridge::protocol::TeamEvent;
use bt_core::state_machine::BotStatus;
use bt_core::types::{BotWorkLogEntry, Specialization, TeamBot, WorkLogAction};
use bt_harness::skill::{
    DelegateMember, DelegateResult, DelegateStatus, DelegationPlan, DelegationRequest,
    DelegationStats,
};
use bt_telemetry::metrics::names;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::orchestrator::{restore_status, TeamOrchestrator};
use crate::profiles::profile;
use crate::working::WorkingGuard;

/// Hooks surfaced while a delegation runs. All default to no-ops.
pub trait DelegationCallbacks: Send + Sync {
    fn on_plan(&self, _plan: &DelegationPlan) {}
    fn on_synthesis(&self, _synthesis: &str) {}
    fn on_error(&self, _error: &str) {}
}

pub struct NoopCallbacks;

impl DelegationCallbacks for NoopCallbacks {}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegationOutcome {
    pub delegation_id: Uuid,
    pub lead_id: Uuid,
    pub plan: DelegationPlan,
    pub results: Vec<DelegateResult>,
    pub synthesis: String,
    pub stats: DelegationStats,
    /// Team bots whose stats were updated from a completed result.
    pub updated_bots: usize,
}

fn member(bot: &TeamBot) -> DelegateMember {
    let template = profile(bot.specialization);
    DelegateMember {
        id: bot.id,
        name: bot.name.clone(),
        specialization: bot.specialization,
        skill: template.skill.to_string(),
        role: template.role.to_string(),
        capabilities: template.capability_list(),
    }
}

impl TeamOrchestrator {
    /// Hand `task` to the CEO bot, which plans, dispatches to the rest of the
    /// team and synthesizes the results in one executor call.
    ///
    /// Needs exactly one CEO and at least one other bot that is neither
    /// paused nor in error. On failure `on_error` is called, participants
    /// are only reset out of `working`, and
    /// [`OrchestratorError::DelegationFailed`] is returned.
    pub async fn delegate_task(
        &self,
        task: &str,
        callbacks: &dyn DelegationCallbacks,
    ) -> Result<DelegationOutcome> {
        let task = task.trim();
        if task.is_empty() {
            return Err(OrchestratorError::InvalidRequest("delegated task is empty".into()));
        }
        let project_path = self.config.read().await.project_path.clone();

        let mut reg = self.registry.write().await;
        let leads = reg.bots_with(Specialization::Ceo);
        let lead = match leads.as_slice() {
            [lead] => (*lead).clone(),
            [] => return Err(fail_early(callbacks, "no CEO bot on the team".into())),
            many => {
                return Err(fail_early(
                    callbacks,
                    format!("expected exactly one CEO bot, found {}", many.len()),
                ))
            }
        };
        let mut team: Vec<TeamBot> = reg
            .iter()
            .filter(|b| b.specialization != Specialization::Ceo)
            .filter(|b| !matches!(b.status, BotStatus::Paused | BotStatus::Error))
            .cloned()
            .collect();
        if team.is_empty() {
            return Err(fail_early(callbacks, "no eligible team bots to delegate to".into()));
        }
        team.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut ids = vec![lead.id];
        ids.extend(team.iter().map(|b| b.id));
        let permit = match self.governor.try_claim_group(&ids) {
            Ok(permit) => permit,
            Err(rejected) => {
                callbacks.on_error(&rejected.to_string());
                return Err(rejected.into());
            }
        };

        let mut previous: HashMap<Uuid, BotStatus> = HashMap::with_capacity(ids.len());
        let mut working = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(bot) = reg.get_mut(*id) {
                previous.insert(*id, bot.status);
                bot.status = BotStatus::Working;
                working.push(bot.clone());
            }
        }
        let guard = WorkingGuard::new(
            self,
            permit,
            previous.iter().map(|(id, status)| (*id, *status)).collect(),
            None,
        );
        self.persist_roster_logged(&reg);
        drop(reg);

        let delegation_id = Uuid::new_v4();
        let participants = ids.len() as i64;
        self.metrics.add_gauge(names::BOTS_WORKING, participants);
        info!(%delegation_id, lead_id = %lead.id, team = team.len(), "delegation started");
        self.bus.publish(TeamEvent::DelegationStarted {
            delegation_id,
            lead_id: lead.id,
            bot_ids: team.iter().map(|b| b.id).collect(),
            task: task.to_string(),
        });
        for bot in &working {
            self.publish_status(bot);
        }

        let request = DelegationRequest {
            delegation_id,
            task: task.to_string(),
            model: lead.model.clone(),
            lead: member(&lead),
            team: team.iter().map(member).collect(),
            project_path,
        };
        let result = match self.executor.execute_delegation(&request).await {
            Ok(response) => match response.error.clone() {
                Some(error) => Err(error),
                None => Ok(response),
            },
            Err(e) => Err(e.to_string()),
        };

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                callbacks.on_error(&error);
                let status_events = self.restore_participants(&previous).await;
                guard.release();
                self.metrics.add_gauge(names::BOTS_WORKING, -participants);
                self.metrics
                    .increment_counter(names::DELEGATIONS_TOTAL, &[("outcome", "failed")]);
                warn!(%delegation_id, %error, "delegation failed");
                self.bus.publish(TeamEvent::DelegationFailed {
                    delegation_id,
                    lead_id: lead.id,
                    error: error.clone(),
                });
                for event in status_events {
                    self.bus.publish(event);
                }
                return Err(OrchestratorError::DelegationFailed(error));
            }
        };

        callbacks.on_plan(&response.plan);

        let mut updated_bots = 0usize;
        {
            let mut reg = self.registry.write().await;
            if let Some(bot) = reg.get_mut(lead.id) {
                bot.stats.tasks_completed += 1;
                bot.log(
                    BotWorkLogEntry::new(
                        WorkLogAction::Delegation,
                        format!("Delegated \"{task}\" to {} bot(s)", response.plan.assignments.len()),
                    )
                    .with_details(response.plan.summary.clone())
                    .with_counts(response.stats.total_issues, response.stats.total_suggestions),
                );
            }
            for result in &response.full_results {
                if result.status != DelegateStatus::Completed || result.bot_id == lead.id {
                    continue;
                }
                if !team.iter().any(|b| b.id == result.bot_id) {
                    continue;
                }
                if let Some(bot) = reg.get_mut(result.bot_id) {
                    bot.stats.tasks_completed += 1;
                    bot.stats.record_success();
                    bot.stats.issues_found += u64::from(result.issues_found);
                    bot.stats.suggestions_given += u64::from(result.suggestions_given);
                    bot.log(
                        BotWorkLogEntry::new(WorkLogAction::Delegation, result.summary.clone())
                            .with_files(result.files_affected.clone())
                            .with_counts(result.issues_found, result.suggestions_given),
                    );
                    updated_bots += 1;
                }
            }
        }

        callbacks.on_synthesis(&response.synthesis);

        let status_events = self.restore_participants(&previous).await;
        guard.release();
        self.metrics.add_gauge(names::BOTS_WORKING, -participants);
        self.metrics
            .increment_counter(names::DELEGATIONS_TOTAL, &[("outcome", "completed")]);
        info!(%delegation_id, updated_bots, "delegation completed");
        self.bus.publish(TeamEvent::DelegationCompleted {
            delegation_id,
            lead_id: lead.id,
            synthesis: response.synthesis.clone(),
        });
        for event in status_events {
            self.bus.publish(event);
        }

        Ok(DelegationOutcome {
            delegation_id,
            lead_id: lead.id,
            plan: response.plan,
            results: response.full_results,
            synthesis: response.synthesis,
            stats: response.stats,
            updated_bots,
        })
    }

    async fn restore_participants(&self, previous: &HashMap<Uuid, BotStatus>) -> Vec<TeamEvent> {
        let mut reg = self.registry.write().await;
        let mut events = Vec::with_capacity(previous.len());
        for (id, before) in previous {
            if let Some(bot) = reg.get_mut(*id) {
                restore_status(bot, *before);
                events.push(TeamEvent::BotStatusChanged {
                    bot_id: *id,
                    status: bot.status,
                });
            }
        }
        self.persist_roster_logged(&reg);
        events
    }
}

fn fail_early(callbacks: &dyn DelegationCallbacks, message: String) -> OrchestratorError {
    warn!(%message, "delegation refused");
    callbacks.on_error(&message);
    OrchestratorError::DelegationFailed(message)
}
