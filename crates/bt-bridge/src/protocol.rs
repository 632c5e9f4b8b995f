use bt_core::state_machine::BotStatus;
use bt_core::types::{BotTask, TeamBot, TeamConfig, TeamMessage, TeamStats, TeamThread};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every notification the orchestrator and the discussion engine emit.
///
/// On the wire: `{"type": "task-completed", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "kebab-case")]
pub enum TeamEvent {
    // Registry
    BotCreated(TeamBot),
    BotUpdated(TeamBot),
    BotDeleted {
        bot_id: Uuid,
    },
    BotStatusChanged {
        bot_id: Uuid,
        status: BotStatus,
    },

    // Execution pipeline
    TaskStarted {
        bot_id: Uuid,
        task: BotTask,
    },
    TaskCompleted(TaskOutcome),
    TaskFailed {
        bot_id: Uuid,
        task: BotTask,
        error: String,
    },
    TaskProgress {
        bot_id: Uuid,
        task_id: Uuid,
        message: String,
        #[serde(default)]
        percent: Option<f32>,
    },
    FilesFixed {
        bot_id: Uuid,
        task_id: Uuid,
        files: Vec<String>,
    },

    // Chain executor
    ChainStarted {
        chain_id: Uuid,
        bot_ids: Vec<Uuid>,
    },
    ChainCompleted {
        chain_id: Uuid,
        bot_ids: Vec<Uuid>,
        completed_steps: usize,
        total_files_fixed: usize,
    },
    ChainFailed {
        chain_id: Uuid,
        bot_ids: Vec<Uuid>,
        error: String,
    },

    // Delegation
    DelegationStarted {
        delegation_id: Uuid,
        lead_id: Uuid,
        bot_ids: Vec<Uuid>,
        task: String,
    },
    DelegationCompleted {
        delegation_id: Uuid,
        lead_id: Uuid,
        synthesis: String,
    },
    DelegationFailed {
        delegation_id: Uuid,
        lead_id: Uuid,
        error: String,
    },

    ConfigUpdated(TeamConfig),
    TeamStats(TeamStats),

    // Discussion engine
    Message(TeamMessage),
    Thread(TeamThread),
    Thinking {
        bot_id: Uuid,
        thinking: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub bot_id: Uuid,
    pub task: BotTask,
    pub summary: String,
    pub issues_found: u32,
    pub suggestions_given: u32,
}

impl TeamEvent {
    /// The wire name of this event (`"bot-created"`, `"thinking"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            TeamEvent::BotCreated(_) => "bot-created",
            TeamEvent::BotUpdated(_) => "bot-updated",
            TeamEvent::BotDeleted { .. } => "bot-deleted",
            TeamEvent::BotStatusChanged { .. } => "bot-status-changed",
            TeamEvent::TaskStarted { .. } => "task-started",
            TeamEvent::TaskCompleted(_) => "task-completed",
            TeamEvent::TaskFailed { .. } => "task-failed",
            TeamEvent::TaskProgress { .. } => "task-progress",
            TeamEvent::FilesFixed { .. } => "files-fixed",
            TeamEvent::ChainStarted { .. } => "chain-started",
            TeamEvent::ChainCompleted { .. } => "chain-completed",
            TeamEvent::ChainFailed { .. } => "chain-failed",
            TeamEvent::DelegationStarted { .. } => "delegation-started",
            TeamEvent::DelegationCompleted { .. } => "delegation-completed",
            TeamEvent::DelegationFailed { .. } => "delegation-failed",
            TeamEvent::ConfigUpdated(_) => "config-updated",
            TeamEvent::TeamStats(_) => "team-stats",
            TeamEvent::Message(_) => "message",
            TeamEvent::Thread(_) => "thread",
            TeamEvent::Thinking { .. } => "thinking",
        }
    }

    /// The bot this event is about, if it concerns a single bot.
    pub fn bot_id(&self) -> Option<Uuid> {
        match self {
            TeamEvent::BotCreated(bot) | TeamEvent::BotUpdated(bot) => Some(bot.id),
            TeamEvent::BotDeleted { bot_id }
            | TeamEvent::BotStatusChanged { bot_id, .. }
            | TeamEvent::TaskStarted { bot_id, .. }
            | TeamEvent::TaskFailed { bot_id, .. }
            | TeamEvent::TaskProgress { bot_id, .. }
            | TeamEvent::FilesFixed { bot_id, .. }
            | TeamEvent::Thinking { bot_id, .. } => Some(*bot_id),
            TeamEvent::TaskCompleted(outcome) => Some(outcome.bot_id),
            _ => None,
        }
    }
}
