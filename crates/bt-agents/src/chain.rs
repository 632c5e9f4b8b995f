use std::collections::HashMap;

use bt_bridge::protocol::TeamEvent;
use bt_core::state_machine::BotStatus;
use bt_core::types::{BotWorkLogEntry, TeamBot, WorkLogAction};
use bt_harness::skill::{ChainRequest, ChainResponse, ChainStepRequest};
use bt_telemetry::metrics::names;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::orchestrator::{restore_status, TeamOrchestrator};
use crate::pipeline::skill_request;
use crate::registry::BotRegistry;
use crate::working::WorkingGuard;

/// Chains kept in memory for [`TeamOrchestrator::get_chain`].
pub const MAX_CHAIN_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    pub bot_id: Uuid,
    pub status: StepStatus,
    pub summary: Option<String>,
    #[serde(default)]
    pub files_fixed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRun {
    pub id: Uuid,
    pub bot_ids: Vec<Uuid>,
    pub status: ChainStatus,
    pub steps: Vec<ChainStep>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ChainRun {
    fn new(bot_ids: &[Uuid]) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_ids: bot_ids.to_vec(),
            status: ChainStatus::Running,
            steps: bot_ids
                .iter()
                .map(|id| ChainStep {
                    bot_id: *id,
                    status: StepStatus::Pending,
                    summary: None,
                    files_fixed: Vec::new(),
                })
                .collect(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    fn finish(&mut self, error: Option<String>) {
        self.status = if error.is_none() {
            ChainStatus::Completed
        } else {
            ChainStatus::Failed
        };
        self.error = error;
        self.completed_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub chain: ChainRun,
    pub total_files_fixed: usize,
    pub completed_steps: usize,
}

impl TeamOrchestrator {
    /// Run `bot_ids` as an ordered chain through one batched executor call.
    ///
    /// Every participant is `working` for the duration of the call. If the
    /// call itself fails, the chain is failed as a whole, no step touches
    /// any stats, and [`OrchestratorError::ChainAborted`] is returned. A step
    /// that reports an error fails the chain; the steps after it are
    /// skipped.
    pub async fn execute_chain(&self, bot_ids: &[Uuid]) -> Result<ChainOutcome> {
        if bot_ids.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "a chain needs at least one bot".into(),
            ));
        }
        let project_path = self.config.read().await.project_path.clone();

        let mut reg = self.registry.write().await;
        if let Some(missing) = bot_ids.iter().find(|id| !reg.contains(**id)) {
            return Err(OrchestratorError::BotNotFound(*missing));
        }
        let permit = self.governor.try_claim_group(bot_ids)?;

        let mut chain = ChainRun::new(bot_ids);
        let mut previous: HashMap<Uuid, BotStatus> = HashMap::new();
        let mut steps = Vec::with_capacity(bot_ids.len());
        for id in bot_ids {
            if let Some(bot) = reg.get_mut(*id) {
                previous.entry(*id).or_insert(bot.status);
                bot.status = BotStatus::Working;
                steps.push(ChainStepRequest {
                    bot_id: *id,
                    request: skill_request(bot, project_path.clone()),
                });
            }
        }
        let working: Vec<TeamBot> = permit
            .bot_ids()
            .iter()
            .filter_map(|id| reg.get(*id).cloned())
            .collect();
        let participants = permit.bot_ids().len() as i64;
        let guard = WorkingGuard::new(
            self,
            permit,
            previous.iter().map(|(id, status)| (*id, *status)).collect(),
            None,
        );
        self.persist_roster_logged(&reg);
        drop(reg);

        self.metrics.add_gauge(names::BOTS_WORKING, participants);
        self.record_chain(chain.clone());
        info!(chain_id = %chain.id, steps = bot_ids.len(), "chain started");
        self.bus.publish(TeamEvent::ChainStarted {
            chain_id: chain.id,
            bot_ids: bot_ids.to_vec(),
        });
        for bot in &working {
            self.publish_status(bot);
        }

        let request = ChainRequest {
            chain_id: chain.id,
            steps,
        };
        let result = self.executor.execute_chain(&request).await;

        let mut events = Vec::new();
        let mut status_events = Vec::new();
        let mut completed_steps = 0usize;
        let mut total_files_fixed = 0usize;
        let aborted = {
            let mut reg = self.registry.write().await;
            let aborted = match result {
                Err(e) => {
                    let reason = e.to_string();
                    for step in &mut chain.steps {
                        step.status = StepStatus::Skipped;
                    }
                    chain.finish(Some(reason.clone()));
                    Some(reason)
                }
                Ok(response) => {
                    let failure = apply_step_results(
                        &mut reg,
                        &mut chain,
                        &response,
                        &mut events,
                        &mut completed_steps,
                        &mut total_files_fixed,
                    );
                    chain.finish(failure);
                    None
                }
            };

            for (id, before) in &previous {
                if let Some(bot) = reg.get_mut(*id) {
                    restore_status(bot, *before);
                    status_events.push(TeamEvent::BotStatusChanged {
                        bot_id: *id,
                        status: bot.status,
                    });
                }
            }
            self.persist_roster_logged(&reg);
            aborted
        };
        guard.release();
        self.metrics.add_gauge(names::BOTS_WORKING, -participants);
        self.record_chain(chain.clone());

        let outcome_label = match (&aborted, chain.status) {
            (Some(_), _) => "aborted",
            (None, ChainStatus::Completed) => "completed",
            (None, _) => "failed",
        };
        self.metrics
            .increment_counter(names::CHAIN_RUNS_TOTAL, &[("outcome", outcome_label)]);

        let summary_event = match chain.status {
            ChainStatus::Completed => TeamEvent::ChainCompleted {
                chain_id: chain.id,
                bot_ids: chain.bot_ids.clone(),
                completed_steps,
                total_files_fixed,
            },
            _ => TeamEvent::ChainFailed {
                chain_id: chain.id,
                bot_ids: chain.bot_ids.clone(),
                error: chain.error.clone().unwrap_or_default(),
            },
        };
        for event in events {
            self.bus.publish(event);
        }
        self.bus.publish(summary_event);
        for event in status_events {
            self.bus.publish(event);
        }

        if let Some(reason) = aborted {
            warn!(chain_id = %chain.id, %reason, "chain aborted");
            return Err(OrchestratorError::ChainAborted {
                chain_id: chain.id,
                reason,
            });
        }
        info!(
            chain_id = %chain.id,
            status = ?chain.status,
            completed_steps,
            total_files_fixed,
            "chain finished"
        );
        Ok(ChainOutcome {
            chain,
            total_files_fixed,
            completed_steps,
        })
    }

    /// Recent chains, oldest first.
    pub fn chains(&self) -> Vec<ChainRun> {
        self.chains
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn get_chain(&self, chain_id: Uuid) -> Result<ChainRun> {
        self.chains
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.id == chain_id)
            .cloned()
            .ok_or(OrchestratorError::ChainNotFound(chain_id))
    }

    fn record_chain(&self, run: ChainRun) {
        let mut chains = self.chains.lock().unwrap_or_else(|e| e.into_inner());
        match chains.iter_mut().find(|c| c.id == run.id) {
            Some(existing) => *existing = run,
            None => {
                chains.push_back(run);
                while chains.len() > MAX_CHAIN_HISTORY {
                    chains.pop_front();
                }
            }
        }
    }
}

/// Walk the per-step results in order, updating each bot. Returns the
/// failure message if any step failed or never reported back.
fn apply_step_results(
    reg: &mut BotRegistry,
    chain: &mut ChainRun,
    response: &ChainResponse,
    events: &mut Vec<TeamEvent>,
    completed_steps: &mut usize,
    total_files_fixed: &mut usize,
) -> Option<String> {
    let chain_id = chain.id;
    let mut failure: Option<String> = None;

    for (idx, step) in chain.steps.iter_mut().enumerate() {
        if failure.is_some() {
            step.status = StepStatus::Skipped;
            continue;
        }
        let result = match response.steps.get(idx) {
            Some(result) if result.bot_id == step.bot_id => result,
            _ => {
                step.status = StepStatus::Skipped;
                failure = Some(format!("step {} returned no result", idx + 1));
                continue;
            }
        };
        let bot = reg.get_mut(step.bot_id);

        if let Some(ref error) = result.response.error {
            step.status = StepStatus::Failed;
            step.summary = Some(error.clone());
            if let Some(bot) = bot {
                bot.stats.tasks_failed += 1;
                bot.stats.record_failure();
                bot.log(
                    BotWorkLogEntry::new(WorkLogAction::ChainStep, format!("Chain step {} failed", idx + 1))
                        .with_details(error.clone()),
                );
            }
            failure = Some(format!("step {} failed: {error}", idx + 1));
            continue;
        }

        let response = &result.response;
        let summary = response.summary_text();
        let issues = response.issues();
        let suggestions = response.suggestion_count();
        let written = response.written_files();
        step.status = StepStatus::Completed;
        step.summary = Some(summary.clone());
        step.files_fixed = written.clone();
        *completed_steps += 1;
        *total_files_fixed += written.len();

        if let Some(bot) = bot {
            bot.stats.tasks_completed += 1;
            bot.stats.record_success();
            bot.stats.issues_found += u64::from(issues);
            bot.stats.suggestions_given += u64::from(suggestions);
            bot.stats.files_fixed += written.len() as u64;
            bot.log(
                BotWorkLogEntry::new(WorkLogAction::ChainStep, summary)
                    .with_files(response.files_affected.clone())
                    .with_counts(issues, suggestions),
            );
        }
        if !written.is_empty() {
            events.push(TeamEvent::FilesFixed {
                bot_id: step.bot_id,
                task_id: chain_id,
                files: written,
            });
        }
    }
    failure
}
