//! Execution pipeline: admission, one remote skill call, bookkeeping.
//!
//! Every run goes through [`TeamOrchestrator::begin_run`] and
//! [`TeamOrchestrator::finish_run`]. The admission permit lives inside the
//! [`Run`]'s `WorkingGuard`: if the run is dropped before `finish_run`
//! (cancelled caller, panicking executor) the bot is restored out of
//! `working` and then its slot is released.

use bt_bridge::protocol::{TaskOutcome, TeamEvent};
use bt_core::state_machine::{BotEvent, BotStatus};
use bt_core::types::{
    BotTask, BotWorkLogEntry, Specialization, TaskStatus, TeamBot, WorkLogAction,
    UNHEALTHY_AFTER_FAILURES,
};
use bt_harness::skill::{
    ExecutionMode, SkillContext, SkillError, SkillRequest, SkillResponse, SkillStreamEvent,
};
use bt_telemetry::metrics::names;
use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::governor::AdmissionRejected;
use crate::orchestrator::{restore_status, TeamOrchestrator};
use crate::profiles::profile;
use crate::working::WorkingGuard;

/// Build the Skill Executor request for `bot`.
pub(crate) fn skill_request(bot: &TeamBot, project_path: Option<String>) -> SkillRequest {
    let template = profile(bot.specialization);
    SkillRequest {
        specialization: bot.specialization,
        model: bot.model.clone(),
        skill: template.skill.to_string(),
        preferences: bot.preferences.clone(),
        role: template.role.to_string(),
        context: SkillContext {
            target_paths: bot.preferences.target_paths.clone(),
            exclude_paths: bot.preferences.exclude_paths.clone(),
            custom_instructions: bot.preferences.custom_instructions.clone(),
            project_path,
        },
        mode: if bot.preferences.auto_approve {
            ExecutionMode::Fix
        } else {
            ExecutionMode::Analyze
        },
    }
}

/// An admitted execution between its start and its bookkeeping.
pub(crate) struct Run {
    guard: WorkingGuard,
    bot_id: Uuid,
    specialization: Specialization,
    task: BotTask,
    request: SkillRequest,
    previous_status: BotStatus,
    started: Instant,
}

impl TeamOrchestrator {
    /// Run `bot_id` once. Returns `None` when admission was rejected; a
    /// failed remote call still yields the failed task.
    pub async fn execute(&self, bot_id: Uuid) -> Result<Option<BotTask>> {
        match self.run_pipeline(bot_id).await {
            Ok(task) => Ok(Some(task)),
            Err(OrchestratorError::AdmissionRejected(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Manual trigger, outside the schedule. Same admission rules as a tick.
    pub async fn run_now(&self, bot_id: Uuid) -> Result<Option<BotTask>> {
        info!(bot_id = %bot_id, "manual run requested");
        self.execute(bot_id).await
    }

    /// Like [`execute`](Self::execute) but reports rejection and remote
    /// failure as errors.
    pub async fn execute_checked(&self, bot_id: Uuid) -> Result<BotTask> {
        let task = self.run_pipeline(bot_id).await?;
        match task.error {
            Some(ref message) if task.status == TaskStatus::Failed => {
                Err(OrchestratorError::RemoteExecutionFailed {
                    bot_id,
                    message: message.clone(),
                })
            }
            _ => Ok(task),
        }
    }

    /// Run `bot_id` against the streaming executor variant. `progress`
    /// events are re-published as `task-progress`.
    pub async fn execute_streaming(&self, bot_id: Uuid) -> Result<Option<BotTask>> {
        let run = match self.begin_run(bot_id).await {
            Ok(run) => run,
            Err(OrchestratorError::AdmissionRejected(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let outcome = self.consume_stream(&run).await;
        Ok(Some(self.finish_run(run, outcome).await))
    }

    async fn run_pipeline(&self, bot_id: Uuid) -> Result<BotTask> {
        let run = self.begin_run(bot_id).await?;
        let outcome = self
            .executor
            .execute(&run.request)
            .await
            .map_err(|e| e.to_string());
        Ok(self.finish_run(run, outcome).await)
    }

    async fn consume_stream(&self, run: &Run) -> std::result::Result<SkillResponse, String> {
        let mut stream = self
            .executor
            .stream(&run.request)
            .await
            .map_err(|e| e.to_string())?;
        let mut content = String::new();

        while let Some(item) = stream.next().await {
            match item.map_err(|e| e.to_string())? {
                SkillStreamEvent::Progress { message, percent } => {
                    self.bus.publish(TeamEvent::TaskProgress {
                        bot_id: run.bot_id,
                        task_id: run.task.id,
                        message,
                        percent,
                    });
                }
                SkillStreamEvent::Status { message } => {
                    debug!(bot_id = %run.bot_id, %message, "stream status");
                }
                SkillStreamEvent::Content { text } => content.push_str(&text),
                SkillStreamEvent::Meta { .. } | SkillStreamEvent::Memory { .. } => {
                    trace!(bot_id = %run.bot_id, "stream metadata");
                }
                SkillStreamEvent::Done { mut response } => {
                    if response.response.is_none() && !content.is_empty() {
                        response.response = Some(content);
                    }
                    return Ok(response);
                }
                SkillStreamEvent::Error { message } => return Err(message),
            }
        }
        Err(SkillError::StreamIncomplete.to_string())
    }

    /// Admit `bot_id`, create its running task and mark it `working`.
    ///
    /// A rejection for lack of a free slot leaves a `waiting` note in the
    /// work log; the bot is not queued and retries on its next tick.
    pub(crate) async fn begin_run(&self, bot_id: Uuid) -> Result<Run> {
        let (max, project_path) = {
            let config = self.config.read().await;
            (config.max_concurrent_bots, config.project_path.clone())
        };
        let mut reg = self.registry.write().await;
        let bot = reg
            .get_mut(bot_id)
            .ok_or(OrchestratorError::BotNotFound(bot_id))?;

        let permit = match self.governor.try_admit(bot_id, max) {
            Ok(permit) => permit,
            Err(rejected) => {
                self.metrics.increment_counter(
                    names::ADMISSION_REJECTED_TOTAL,
                    &[("reason", rejected.reason())],
                );
                if let AdmissionRejected::AtCapacity { running, max } = rejected {
                    bot.log(
                        BotWorkLogEntry::new(WorkLogAction::Waiting, "Waiting for a free execution slot")
                            .with_details(format!("{running}/{max} slots in use")),
                    );
                    self.persist_roster_logged(&reg);
                }
                info!(bot_id = %bot_id, reason = rejected.reason(), "execution deferred");
                return Err(rejected.into());
            }
        };

        let previous_status = bot.status;
        bot.status = bot.status.apply(BotEvent::BeginWork)?;
        let template = profile(bot.specialization);
        let mut task = BotTask::new(bot_id, format!("{} scan", template.display_name));
        task.start();
        bot.upsert_task(task.clone());
        let guard = WorkingGuard::new(self, permit, vec![(bot_id, previous_status)], Some(task.id));
        let request = skill_request(bot, project_path);
        let specialization = bot.specialization;
        self.persist_roster_logged(&reg);
        drop(reg);

        self.metrics.add_gauge(names::BOTS_WORKING, 1);
        info!(bot_id = %bot_id, task_id = %task.id, specialization = %specialization, mode = ?request.mode, "execution started");
        self.bus.publish(TeamEvent::TaskStarted {
            bot_id,
            task: task.clone(),
        });
        self.bus.publish(TeamEvent::BotStatusChanged {
            bot_id,
            status: BotStatus::Working,
        });

        Ok(Run {
            guard,
            bot_id,
            specialization,
            task,
            request,
            previous_status,
            started: Instant::now(),
        })
    }

    /// Record the outcome of `run`, restore the bot's status and release
    /// its slot.
    pub(crate) async fn finish_run(
        &self,
        run: Run,
        outcome: std::result::Result<SkillResponse, String>,
    ) -> BotTask {
        let Run {
            guard,
            bot_id,
            specialization,
            mut task,
            previous_status,
            started,
            ..
        } = run;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        let outcome = match outcome {
            Ok(response) => match response.error.clone() {
                Some(error) => Err(error),
                None => Ok(response),
            },
            Err(error) => Err(error),
        };

        let mut events = Vec::new();
        {
            let mut reg = self.registry.write().await;
            match reg.get_mut(bot_id) {
                Some(bot) => {
                    match &outcome {
                        Ok(response) => {
                            let summary = response.summary_text();
                            let issues = response.issues();
                            let suggestions = response.suggestion_count();
                            task.files_affected = response.files_affected.clone();
                            task.suggestions = response.suggestions.clone();
                            task.complete(response.output_text());

                            bot.stats.tasks_completed += 1;
                            bot.stats.record_success();
                            bot.stats.issues_found += u64::from(issues);
                            bot.stats.suggestions_given += u64::from(suggestions);
                            bot.log(
                                BotWorkLogEntry::new(WorkLogAction::TaskCompleted, summary.clone())
                                    .with_files(response.files_affected.clone())
                                    .with_counts(issues, suggestions),
                            );
                            events.push(TeamEvent::TaskCompleted(TaskOutcome {
                                bot_id,
                                task: task.clone(),
                                summary,
                                issues_found: issues,
                                suggestions_given: suggestions,
                            }));

                            let written = response.written_files();
                            if !written.is_empty() {
                                bot.stats.files_fixed += written.len() as u64;
                                bot.log(
                                    BotWorkLogEntry::new(
                                        WorkLogAction::FilesFixed,
                                        format!("Fixed {} file(s)", written.len()),
                                    )
                                    .with_files(written.clone()),
                                );
                                events.push(TeamEvent::FilesFixed {
                                    bot_id,
                                    task_id: task.id,
                                    files: written,
                                });
                            }
                        }
                        Err(error) => {
                            task.fail(error.clone());
                            bot.stats.tasks_failed += 1;
                            bot.stats.record_failure();
                            if bot.stats.consecutive_failures == UNHEALTHY_AFTER_FAILURES {
                                warn!(
                                    bot_id = %bot_id,
                                    failures = bot.stats.consecutive_failures,
                                    "bot marked unhealthy"
                                );
                            }
                            bot.log(
                                BotWorkLogEntry::new(WorkLogAction::TaskFailed, "Task failed")
                                    .with_details(error.clone()),
                            );
                            events.push(TeamEvent::TaskFailed {
                                bot_id,
                                task: task.clone(),
                                error: error.clone(),
                            });
                        }
                    }

                    bot.stats.record_runtime(elapsed_ms);
                    bot.stats.cycles_completed += 1;
                    restore_status(bot, previous_status);
                    bot.upsert_task(task.clone());
                    events.push(TeamEvent::BotStatusChanged {
                        bot_id,
                        status: bot.status,
                    });
                    self.persist_roster_logged(&reg);
                }
                None => {
                    // Deleted mid-flight; the result has nowhere to go.
                    match &outcome {
                        Ok(response) => task.complete(response.output_text()),
                        Err(error) => task.fail(error.clone()),
                    };
                    debug!(bot_id = %bot_id, "bot gone, execution result dropped");
                }
            }
        }
        guard.release();

        let outcome_label = if outcome.is_ok() { "completed" } else { "failed" };
        self.metrics.add_gauge(names::BOTS_WORKING, -1);
        self.metrics
            .record_histogram(names::BOT_EXECUTION_DURATION_SECONDS, elapsed.as_secs_f64());
        self.metrics.increment_counter(
            names::BOT_EXECUTIONS_TOTAL,
            &[
                ("specialization", specialization.as_str()),
                ("outcome", outcome_label),
            ],
        );
        match &outcome {
            Ok(_) => info!(bot_id = %bot_id, task_id = %task.id, duration_ms = elapsed_ms, "execution completed"),
            Err(error) => warn!(bot_id = %bot_id, task_id = %task.id, duration_ms = elapsed_ms, %error, "execution failed"),
        }

        for event in events {
            self.bus.publish(event);
        }
        task
    }
}
