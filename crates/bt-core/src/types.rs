use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use crate::state_machine::BotStatus;

/// Most recent tasks kept on a bot.
pub const MAX_TASK_QUEUE: usize = 50;
/// Most recent work-log entries kept on a bot.
pub const MAX_WORK_LOG: usize = 100;
/// Discussion messages kept in memory.
pub const MAX_MESSAGES_IN_MEMORY: usize = 500;
/// Discussion messages written to the State Store.
pub const MAX_MESSAGES_PERSISTED: usize = 200;
/// Discussion threads written to the State Store.
pub const MAX_THREADS_PERSISTED: usize = 50;
/// Discussion threads kept in memory.
pub const MAX_THREADS_IN_MEMORY: usize = 100;
/// Messages kept on a single thread.
pub const MAX_THREAD_MESSAGES: usize = 100;
/// Consecutive failed runs after which a bot is reported unhealthy.
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Drop the oldest elements so that at most `cap` remain.
pub fn trim_front<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

// ---------------------------------------------------------------------------
// Specialization
// ---------------------------------------------------------------------------

/// Fixed role tag that decides a bot's default behaviour and remote skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Specialization {
    CodeReviewer,
    Debugger,
    Architect,
    SecurityAuditor,
    TestWriter,
    Documenter,
    PerformanceOptimizer,
    Refactorer,
    /// Planner that leads delegation.
    Ceo,
}

impl Specialization {
    pub const ALL: [Specialization; 9] = [
        Specialization::CodeReviewer,
        Specialization::Debugger,
        Specialization::Architect,
        Specialization::SecurityAuditor,
        Specialization::TestWriter,
        Specialization::Documenter,
        Specialization::PerformanceOptimizer,
        Specialization::Refactorer,
        Specialization::Ceo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::CodeReviewer => "code-reviewer",
            Specialization::Debugger => "debugger",
            Specialization::Architect => "architect",
            Specialization::SecurityAuditor => "security-auditor",
            Specialization::TestWriter => "test-writer",
            Specialization::Documenter => "documenter",
            Specialization::PerformanceOptimizer => "performance-optimizer",
            Specialization::Refactorer => "refactorer",
            Specialization::Ceo => "ceo",
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specialization::ALL
            .iter()
            .copied()
            .find(|spec| spec.as_str() == s)
            .ok_or_else(|| format!("unknown specialization: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Per-bot scheduling and scoping preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotPreferences {
    #[serde(default)]
    pub target_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    pub schedule_minutes: u32,
    #[serde(default)]
    pub auto_approve: bool,
    pub max_tasks_per_cycle: u32,
    #[serde(default)]
    pub priority: BotPriority,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

impl BotPreferences {
    /// Merge caller overrides on top of these preferences; explicit overrides win.
    pub fn merged(mut self, overrides: &BotOverrides) -> Self {
        if let Some(ref paths) = overrides.target_paths {
            self.target_paths = paths.clone();
        }
        if let Some(ref paths) = overrides.exclude_paths {
            self.exclude_paths = paths.clone();
        }
        if let Some(minutes) = overrides.schedule_minutes {
            self.schedule_minutes = minutes.max(1);
        }
        if let Some(auto) = overrides.auto_approve {
            self.auto_approve = auto;
        }
        if let Some(max) = overrides.max_tasks_per_cycle {
            self.max_tasks_per_cycle = max;
        }
        if let Some(priority) = overrides.priority {
            self.priority = priority;
        }
        if let Some(ref instructions) = overrides.custom_instructions {
            self.custom_instructions = Some(instructions.clone());
        }
        self
    }
}

/// Caller-supplied overrides applied at creation or update time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotOverrides {
    pub name: Option<String>,
    pub model: Option<String>,
    pub target_paths: Option<Vec<String>>,
    pub exclude_paths: Option<Vec<String>>,
    pub schedule_minutes: Option<u32>,
    pub auto_approve: Option<bool>,
    pub max_tasks_per_cycle: Option<u32>,
    pub priority: Option<BotPriority>,
    pub custom_instructions: Option<String>,
}

/// Partial update for an existing bot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotUpdate {
    #[serde(flatten)]
    pub overrides: BotOverrides,
    /// Operator override of the lifecycle status (e.g. flagging a bot as `error`).
    pub status: Option<BotStatus>,
}

// ---------------------------------------------------------------------------
// BotTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One execution attempt of a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotTask {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub description: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub files_affected: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl BotTask {
    pub fn new(bot_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_id,
            description: description.into(),
            status: TaskStatus::Queued,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            files_affected: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Move a queued task to `running`.
    pub fn start(&mut self) {
        if self.status == TaskStatus::Queued {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark the task completed. Returns `false` if it was already terminal.
    pub fn complete(&mut self, result: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result.into());
        self.finish_clock();
        true
    }

    /// Mark the task failed. Returns `false` if it was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.finish_clock();
        true
    }

    fn finish_clock(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|start| now.signed_duration_since(start).num_milliseconds().max(0) as u64);
    }
}

// ---------------------------------------------------------------------------
// Work log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkLogAction {
    Created,
    Started,
    Stopped,
    Resumed,
    TaskCompleted,
    TaskFailed,
    /// Admission was rejected; the bot waits for its next tick.
    Waiting,
    FilesFixed,
    ChainStep,
    Delegation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotWorkLogEntry {
    pub id: Uuid,
    pub action: WorkLogAction,
    pub summary: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub issues_found: Option<u32>,
    #[serde(default)]
    pub suggestions_given: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl BotWorkLogEntry {
    pub fn new(action: WorkLogAction, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            summary: summary.into(),
            details: None,
            files: Vec::new(),
            issues_found: None,
            suggestions_given: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_counts(mut self, issues: u32, suggestions: u32) -> Self {
        self.issues_found = Some(issues);
        self.suggestions_given = Some(suggestions);
        self
    }
}

// ---------------------------------------------------------------------------
// BotStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotStats {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub issues_found: u64,
    pub suggestions_given: u64,
    #[serde(default)]
    pub files_fixed: u64,
    pub total_runtime_ms: u64,
    pub average_response_ms: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
    /// Failed runs since the last successful one.
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl BotStats {
    /// Fold one execution's duration into the runtime totals.
    pub fn record_runtime(&mut self, duration_ms: u64) {
        self.total_runtime_ms += duration_ms;
        self.average_response_ms = if self.average_response_ms == 0 {
            duration_ms
        } else {
            (self.average_response_ms + duration_ms) / 2
        };
        self.last_run_at = Some(Utc::now());
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(Utc::now());
    }

    /// Healthy until [`UNHEALTHY_AFTER_FAILURES`] runs in a row have failed.
    /// Health is reported only; the bot keeps its schedule either way.
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures < UNHEALTHY_AFTER_FAILURES
    }
}

// ---------------------------------------------------------------------------
// TeamBot
// ---------------------------------------------------------------------------

/// One autonomous agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamBot {
    pub id: Uuid,
    pub name: String,
    pub specialization: Specialization,
    pub model: String,
    pub status: BotStatus,
    pub preferences: BotPreferences,
    #[serde(default)]
    pub task_queue: Vec<BotTask>,
    #[serde(default)]
    pub work_log: Vec<BotWorkLogEntry>,
    #[serde(default)]
    pub stats: BotStats,
    /// Set when disabling the team paused this bot; cleared on resume.
    #[serde(default)]
    pub resume_on_enable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamBot {
    pub fn new(
        name: impl Into<String>,
        specialization: Specialization,
        model: impl Into<String>,
        preferences: BotPreferences,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            specialization,
            model: model.into(),
            status: BotStatus::Idle,
            preferences,
            task_queue: Vec::new(),
            work_log: Vec::new(),
            stats: BotStats::default(),
            resume_on_enable: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a work-log entry, dropping the oldest beyond [`MAX_WORK_LOG`].
    pub fn log(&mut self, entry: BotWorkLogEntry) {
        self.work_log.push(entry);
        trim_front(&mut self.work_log, MAX_WORK_LOG);
        self.updated_at = Utc::now();
    }

    /// Insert or replace a task by id, keeping the last [`MAX_TASK_QUEUE`].
    pub fn upsert_task(&mut self, task: BotTask) {
        match self.task_queue.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.task_queue.push(task),
        }
        trim_front(&mut self.task_queue, MAX_TASK_QUEUE);
        self.updated_at = Utc::now();
    }

    /// Apply the non-status parts of an update.
    pub fn apply_overrides(&mut self, overrides: &BotOverrides) {
        if let Some(ref name) = overrides.name {
            self.name = name.clone();
        }
        if let Some(ref model) = overrides.model {
            self.model = model.clone();
        }
        self.preferences = self.preferences.clone().merged(overrides);
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// TeamConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub on_complete: bool,
    pub on_error: bool,
    #[serde(default = "default_true")]
    pub on_discussion: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            on_complete: true,
            on_error: true,
            on_discussion: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Process-wide orchestration policy (persisted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub enabled: bool,
    pub max_concurrent_bots: usize,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub project_path: Option<String>,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_bots: 3,
            notifications: NotificationSettings::default(),
            project_path: None,
        }
    }
}

/// Partial update for [`TeamConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamConfigPatch {
    pub enabled: Option<bool>,
    pub max_concurrent_bots: Option<usize>,
    pub notifications: Option<NotificationSettings>,
    pub project_path: Option<String>,
}

impl TeamConfigPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// TeamStats
// ---------------------------------------------------------------------------

/// Roster-wide aggregate derived from every bot's stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub total_bots: usize,
    pub active_bots: usize,
    pub working_bots: usize,
    pub paused_bots: usize,
    pub error_bots: usize,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub success_rate: f64,
    pub issues_found: u64,
    pub suggestions_given: u64,
    pub files_fixed: u64,
    pub average_response_ms: u64,
    /// Bots whose recent runs keep failing.
    #[serde(default)]
    pub unhealthy_bots: Vec<Uuid>,
}

impl TeamStats {
    pub fn from_bots<'a>(bots: impl IntoIterator<Item = &'a TeamBot>) -> Self {
        let mut stats = TeamStats::default();
        let mut response_sum = 0u64;
        let mut response_samples = 0u64;
        for bot in bots {
            stats.total_bots += 1;
            match bot.status {
                BotStatus::Active => stats.active_bots += 1,
                BotStatus::Working => stats.working_bots += 1,
                BotStatus::Paused => stats.paused_bots += 1,
                BotStatus::Error => stats.error_bots += 1,
                BotStatus::Idle => {}
            }
            stats.tasks_completed += bot.stats.tasks_completed;
            stats.tasks_failed += bot.stats.tasks_failed;
            stats.issues_found += bot.stats.issues_found;
            stats.suggestions_given += bot.stats.suggestions_given;
            stats.files_fixed += bot.stats.files_fixed;
            if !bot.stats.is_healthy() {
                stats.unhealthy_bots.push(bot.id);
            }
            if bot.stats.average_response_ms > 0 {
                response_sum += bot.stats.average_response_ms;
                response_samples += 1;
            }
        }
        let attempts = stats.tasks_completed + stats.tasks_failed;
        if attempts > 0 {
            stats.success_rate = stats.tasks_completed as f64 / attempts as f64;
        }
        if response_samples > 0 {
            stats.average_response_ms = response_sum / response_samples;
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Discussion: messages and threads
// ---------------------------------------------------------------------------

/// Who wrote a discussion message. Serialized as `"user"`, `"system"`, or the bot id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MessageAuthor {
    Bot(Uuid),
    User,
    System,
}

impl MessageAuthor {
    pub fn bot_id(&self) -> Option<Uuid> {
        match self {
            MessageAuthor::Bot(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<MessageAuthor> for String {
    fn from(author: MessageAuthor) -> Self {
        match author {
            MessageAuthor::Bot(id) => id.to_string(),
            MessageAuthor::User => "user".to_string(),
            MessageAuthor::System => "system".to_string(),
        }
    }
}

impl TryFrom<String> for MessageAuthor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(MessageAuthor::User),
            "system" => Ok(MessageAuthor::System),
            other => Uuid::parse_str(other)
                .map(MessageAuthor::Bot)
                .map_err(|e| format!("invalid message author `{other}`: {e}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Discussion,
    Analysis,
    Suggestion,
    Decision,
    Question,
    System,
    Preference,
    Report,
    Alert,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Discussion => "discussion",
            MessageType::Analysis => "analysis",
            MessageType::Suggestion => "suggestion",
            MessageType::Decision => "decision",
            MessageType::Question => "question",
            MessageType::System => "system",
            MessageType::Preference => "preference",
            MessageType::Report => "report",
            MessageType::Alert => "alert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMessage {
    pub id: Uuid,
    #[serde(default)]
    pub thread_id: Option<Uuid>,
    pub author: MessageAuthor,
    pub author_name: String,
    pub message_type: MessageType,
    pub content: String,
    #[serde(default)]
    pub code_snippets: Vec<CodeSnippet>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl TeamMessage {
    pub fn new(
        author: MessageAuthor,
        author_name: impl Into<String>,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: None,
            author,
            author_name: author_name.into(),
            message_type,
            content: content.into(),
            code_snippets: Vec::new(),
            reply_to: None,
            timestamp: Utc::now(),
        }
    }

    pub fn in_thread(mut self, thread_id: Uuid) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn replying_to(mut self, message_id: Uuid) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Resolved,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamThread {
    pub id: Uuid,
    pub topic: String,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    #[serde(default)]
    pub messages: Vec<TeamMessage>,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamThread {
    pub fn new(topic: impl Into<String>, participants: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            participants,
            messages: Vec::new(),
            status: ThreadStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, keeping the newest [`MAX_THREAD_MESSAGES`].
    pub fn push(&mut self, message: TeamMessage) {
        self.messages.push(message);
        trim_front(&mut self.messages, MAX_THREAD_MESSAGES);
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> BotPreferences {
        BotPreferences {
            target_paths: vec!["src/**".into()],
            exclude_paths: vec![],
            schedule_minutes: 30,
            auto_approve: false,
            max_tasks_per_cycle: 5,
            priority: BotPriority::Medium,
            custom_instructions: None,
        }
    }

    #[test]
    fn specialization_round_trips_through_str() {
        for spec in Specialization::ALL {
            assert_eq!(spec.as_str().parse::<Specialization>().unwrap(), spec);
        }
        assert!("janitor".parse::<Specialization>().is_err());
    }

    #[test]
    fn specialization_serializes_kebab_case() {
        let json = serde_json::to_string(&Specialization::SecurityAuditor).unwrap();
        assert_eq!(json, "\"security-auditor\"");
    }

    #[test]
    fn overrides_win_over_template() {
        let merged = prefs().merged(&BotOverrides {
            schedule_minutes: Some(10),
            exclude_paths: Some(vec!["target/**".into()]),
            ..BotOverrides::default()
        });
        assert_eq!(merged.schedule_minutes, 10);
        assert_eq!(merged.exclude_paths, vec!["target/**".to_string()]);
        assert_eq!(merged.target_paths, vec!["src/**".to_string()]);
    }

    #[test]
    fn zero_schedule_is_clamped() {
        let merged = prefs().merged(&BotOverrides {
            schedule_minutes: Some(0),
            ..BotOverrides::default()
        });
        assert_eq!(merged.schedule_minutes, 1);
    }

    #[test]
    fn work_log_keeps_most_recent_hundred() {
        let mut bot = TeamBot::new("r", Specialization::CodeReviewer, "m", prefs());
        for i in 0..150 {
            bot.log(BotWorkLogEntry::new(WorkLogAction::TaskCompleted, format!("entry {i}")));
        }
        assert_eq!(bot.work_log.len(), MAX_WORK_LOG);
        assert_eq!(bot.work_log[0].summary, "entry 50");
        assert_eq!(bot.work_log[99].summary, "entry 149");
    }

    #[test]
    fn task_queue_keeps_most_recent_fifty() {
        let mut bot = TeamBot::new("r", Specialization::Debugger, "m", prefs());
        let mut last = None;
        for _ in 0..60 {
            let task = BotTask::new(bot.id, "scan");
            last = Some(task.id);
            bot.upsert_task(task);
        }
        assert_eq!(bot.task_queue.len(), MAX_TASK_QUEUE);
        assert_eq!(bot.task_queue.last().map(|t| t.id), last);
    }

    #[test]
    fn upsert_replaces_existing_task() {
        let mut bot = TeamBot::new("r", Specialization::Debugger, "m", prefs());
        let mut task = BotTask::new(bot.id, "scan");
        bot.upsert_task(task.clone());
        task.start();
        bot.upsert_task(task);
        assert_eq!(bot.task_queue.len(), 1);
        assert_eq!(bot.task_queue[0].status, TaskStatus::Running);
    }

    #[test]
    fn task_terminal_state_is_set_once() {
        let mut task = BotTask::new(Uuid::new_v4(), "scan");
        task.start();
        assert!(task.complete("ok"));
        assert!(!task.fail("late failure"));
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error.is_none());
        assert!(task.duration_ms.is_some());
    }

    #[test]
    fn runtime_blend() {
        let mut stats = BotStats::default();
        stats.record_runtime(1000);
        assert_eq!(stats.average_response_ms, 1000);
        stats.record_runtime(3000);
        assert_eq!(stats.average_response_ms, 2000);
        assert_eq!(stats.total_runtime_ms, 4000);
        assert!(stats.last_run_at.is_some());
    }

    #[test]
    fn consecutive_failures_mark_unhealthy_until_a_success() {
        let mut bot = TeamBot::new("d", Specialization::Debugger, "m", prefs());
        for _ in 0..UNHEALTHY_AFTER_FAILURES - 1 {
            bot.stats.record_failure();
        }
        assert!(bot.stats.is_healthy());
        bot.stats.record_failure();
        assert!(!bot.stats.is_healthy());
        assert!(bot.stats.last_failure_at.is_some());
        assert_eq!(TeamStats::from_bots([&bot]).unhealthy_bots, vec![bot.id]);

        bot.stats.record_success();
        assert!(bot.stats.is_healthy());
        assert!(TeamStats::from_bots([&bot]).unhealthy_bots.is_empty());
    }

    #[test]
    fn team_stats_aggregate() {
        let mut a = TeamBot::new("a", Specialization::CodeReviewer, "m", prefs());
        a.status = BotStatus::Active;
        a.stats.tasks_completed = 3;
        a.stats.tasks_failed = 1;
        a.stats.issues_found = 4;
        let mut b = TeamBot::new("b", Specialization::Debugger, "m", prefs());
        b.status = BotStatus::Paused;
        b.stats.tasks_completed = 0;
        let stats = TeamStats::from_bots([&a, &b]);
        assert_eq!(stats.total_bots, 2);
        assert_eq!(stats.active_bots, 1);
        assert_eq!(stats.paused_bots, 1);
        assert_eq!(stats.issues_found, 4);
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn message_author_wire_format() {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(&MessageAuthor::Bot(id)).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let user: MessageAuthor = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(user, MessageAuthor::User);
        assert!(serde_json::from_str::<MessageAuthor>("\"nobody\"").is_err());
    }

    #[test]
    fn thread_keeps_newest_messages() {
        let mut thread = TeamThread::new("Caching", vec![]);
        for i in 0..MAX_THREAD_MESSAGES + 5 {
            thread.push(TeamMessage::new(
                MessageAuthor::User,
                "user",
                MessageType::Discussion,
                format!("m{i}"),
            ));
        }
        assert_eq!(thread.messages.len(), MAX_THREAD_MESSAGES);
        assert_eq!(thread.messages[0].content, "m5");
    }

    #[test]
    fn timestamps_serialize_as_iso8601() {
        let msg = TeamMessage::new(MessageAuthor::System, "system", MessageType::System, "hi");
        let value = serde_json::to_value(&msg).unwrap();
        let ts = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
