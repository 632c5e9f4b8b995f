//! Skill Executor contract.
//!
//! The orchestrator treats skill execution as an opaque asynchronous RPC: it
//! sends a [`SkillRequest`] describing the bot and its scope, and receives a
//! [`SkillResponse`] (or a stream of [`SkillStreamEvent`]s). Batched
//! protocols use [`ChainRequest`] and [`DelegationRequest`]. The discussion
//! engine talks to a separate [`ConversationalExecutor`].

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bt_core::types::{BotPreferences, Specialization};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// Connection failure, DNS, TLS, etc.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("request timed out")]
    Timeout,

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The remote side reported a failure of its own.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("stream ended without a done event")]
    StreamIncomplete,
}

impl From<reqwest::Error> for SkillError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SkillError::Timeout
        } else {
            SkillError::Http(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;

// ---------------------------------------------------------------------------
// Single execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Report findings only.
    #[default]
    Analyze,
    /// Findings may come back with file edits.
    Fix,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillContext {
    pub target_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub custom_instructions: Option<String>,
    pub project_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRequest {
    pub specialization: Specialization,
    pub model: String,
    pub skill: String,
    pub preferences: BotPreferences,
    pub role: String,
    pub context: SkillContext,
    #[serde(default)]
    pub mode: ExecutionMode,
}

/// One file change authored by a bot in fix mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEdit {
    pub path: String,
    pub content: String,
    /// `false` when the edit was proposed but not applied.
    #[serde(default)]
    pub written: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillResponse {
    pub summary: Option<String>,
    pub response: Option<String>,
    pub files_affected: Vec<String>,
    pub suggestions: Vec<String>,
    pub issues_found: Option<u32>,
    pub suggestions_given: Option<u32>,
    pub files_fixed: Vec<FileEdit>,
    pub error: Option<String>,
}

impl SkillResponse {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Human-readable one-liner: the summary, else the first line of the
    /// response, else a fixed fallback.
    pub fn summary_text(&self) -> String {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            return summary.to_string();
        }
        self.response
            .as_deref()
            .and_then(|r| r.lines().find(|l| !l.trim().is_empty()))
            .map(|line| truncate(line.trim(), 200))
            .unwrap_or_else(|| "Task completed".to_string())
    }

    pub fn issues(&self) -> u32 {
        self.issues_found.unwrap_or(0)
    }

    /// Explicit count if present, else the number of listed suggestions.
    pub fn suggestion_count(&self) -> u32 {
        self.suggestions_given
            .unwrap_or(self.suggestions.len() as u32)
    }

    /// Paths of edits that were actually applied.
    pub fn written_files(&self) -> Vec<String> {
        self.files_fixed
            .iter()
            .filter(|edit| edit.written)
            .map(|edit| edit.path.clone())
            .collect()
    }

    /// Text handed to the next step of a chain.
    pub fn output_text(&self) -> String {
        self.response.clone().unwrap_or_else(|| self.summary_text())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillStreamEvent {
    Status {
        message: String,
    },
    Meta {
        #[serde(default)]
        data: serde_json::Value,
    },
    Content {
        text: String,
    },
    Progress {
        message: String,
        #[serde(default)]
        percent: Option<f32>,
    },
    Memory {
        #[serde(default)]
        data: serde_json::Value,
    },
    Done {
        #[serde(default)]
        response: SkillResponse,
    },
    Error {
        message: String,
    },
}

pub type SkillStream = Pin<Box<dyn Stream<Item = Result<SkillStreamEvent>> + Send>>;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStepRequest {
    pub bot_id: Uuid,
    pub request: SkillRequest,
}

/// Ordered, dependent steps; step N consumes step N-1's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRequest {
    pub chain_id: Uuid,
    pub steps: Vec<ChainStepRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStepResult {
    pub bot_id: Uuid,
    pub response: SkillResponse,
}

/// Per-step results in step order. Steps that never ran are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainResponse {
    pub steps: Vec<ChainStepResult>,
}

// ---------------------------------------------------------------------------
// Delegation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateMember {
    pub id: Uuid,
    pub name: String,
    pub specialization: Specialization,
    pub skill: String,
    pub role: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    pub delegation_id: Uuid,
    pub task: String,
    pub model: String,
    pub lead: DelegateMember,
    pub team: Vec<DelegateMember>,
    pub project_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Assignment {
    pub bot_id: Uuid,
    pub subtask: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegationPlan {
    pub summary: String,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegateStatus {
    Completed,
    Failed,
    #[default]
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegateResult {
    pub bot_id: Uuid,
    pub status: DelegateStatus,
    pub summary: String,
    pub files_affected: Vec<String>,
    pub issues_found: u32,
    pub suggestions_given: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegationStats {
    pub total_issues: u32,
    pub total_suggestions: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegationResponse {
    pub plan: DelegationPlan,
    pub full_results: Vec<DelegateResult>,
    pub synthesis: String,
    pub stats: DelegationStats,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// SkillExecutor trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SkillExecutor: Send + Sync {
    /// Run one skill and return its full response.
    async fn execute(&self, request: &SkillRequest) -> Result<SkillResponse>;

    /// Run one skill, streaming incremental events terminated by `done` or
    /// `error`.
    async fn stream(&self, _request: &SkillRequest) -> Result<SkillStream> {
        Err(SkillError::Unsupported(
            "streaming not implemented by this executor".into(),
        ))
    }

    /// Run a chain. The default issues one `execute` per step in order,
    /// feeding each step's output into the next step's instructions, and
    /// stops after the first step that reports an error.
    async fn execute_chain(&self, request: &ChainRequest) -> Result<ChainResponse> {
        let mut steps = Vec::with_capacity(request.steps.len());
        let mut previous: Option<String> = None;

        for step in &request.steps {
            let mut skill_request = step.request.clone();
            if let Some(ref output) = previous {
                skill_request.context.custom_instructions =
                    Some(chain_instructions(
                        skill_request.context.custom_instructions.as_deref(),
                        output,
                    ));
            }
            let response = self.execute(&skill_request).await?;
            let failed = response.error.is_some();
            previous = Some(response.output_text());
            steps.push(ChainStepResult {
                bot_id: step.bot_id,
                response,
            });
            if failed {
                break;
            }
        }
        Ok(ChainResponse { steps })
    }

    /// Plan, dispatch and synthesize a delegated task in one call.
    async fn execute_delegation(&self, _request: &DelegationRequest) -> Result<DelegationResponse> {
        Err(SkillError::Unsupported(
            "delegation not implemented by this executor".into(),
        ))
    }
}

fn chain_instructions(own: Option<&str>, previous_output: &str) -> String {
    match own {
        Some(own) if !own.trim().is_empty() => {
            format!("{own}\n\nOutput of the previous step:\n{previous_output}")
        }
        _ => format!("Output of the previous step:\n{previous_output}"),
    }
}

// ---------------------------------------------------------------------------
// Conversational variant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Persona of the speaking bot.
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub content: String,
}

#[async_trait]
pub trait ConversationalExecutor: Send + Sync {
    async fn converse(&self, request: &ConversationRequest) -> Result<ConversationResponse>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
