//! Default behavior of the `SkillExecutor` trait for executors that only
//! implement `execute`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bt_core::types::{BotPreferences, BotPriority, Specialization};
use bt_harness::skill::{
    ChainRequest, ChainStepRequest, DelegateMember, DelegationRequest, ExecutionMode,
    SkillContext, SkillError, SkillExecutor, SkillRequest, SkillResponse,
};
use uuid::Uuid;

// ===========================================================================
// Helpers
// ===========================================================================

struct RecordingExecutor {
    responses: Mutex<VecDeque<SkillResponse>>,
    seen: Mutex<Vec<SkillRequest>>,
}

impl RecordingExecutor {
    fn new(responses: Vec<SkillResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SkillExecutor for RecordingExecutor {
    async fn execute(&self, request: &SkillRequest) -> bt_harness::skill::Result<SkillResponse> {
        self.seen.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        next.ok_or_else(|| SkillError::Http("no scripted response".into()))
    }
}

fn request(spec: Specialization, instructions: Option<&str>) -> SkillRequest {
    SkillRequest {
        specialization: spec,
        model: "claude-sonnet".into(),
        skill: spec.as_str().into(),
        preferences: BotPreferences {
            target_paths: vec!["src/**".into()],
            exclude_paths: Vec::new(),
            schedule_minutes: 30,
            auto_approve: false,
            max_tasks_per_cycle: 5,
            priority: BotPriority::Medium,
            custom_instructions: instructions.map(str::to_string),
        },
        role: "tester".into(),
        context: SkillContext {
            custom_instructions: instructions.map(str::to_string),
            ..SkillContext::default()
        },
        mode: ExecutionMode::Analyze,
    }
}

fn chain(specs: &[(Specialization, Option<&str>)]) -> ChainRequest {
    ChainRequest {
        chain_id: Uuid::new_v4(),
        steps: specs
            .iter()
            .map(|(spec, instructions)| ChainStepRequest {
                bot_id: Uuid::new_v4(),
                request: request(*spec, *instructions),
            })
            .collect(),
    }
}

// ===========================================================================
// Chain
// ===========================================================================

#[tokio::test]
async fn test_default_chain_feeds_previous_output_forward() {
    let exec = RecordingExecutor::new(vec![
        SkillResponse {
            response: Some("three unchecked unwraps in parser.rs".into()),
            ..SkillResponse::default()
        },
        SkillResponse::success("fixed"),
    ]);
    let req = chain(&[
        (Specialization::CodeReviewer, None),
        (Specialization::Debugger, Some("Focus on panics.")),
    ]);

    let resp = exec.execute_chain(&req).await.unwrap();
    assert_eq!(resp.steps.len(), 2);
    assert_eq!(resp.steps[0].bot_id, req.steps[0].bot_id);
    assert_eq!(resp.steps[1].bot_id, req.steps[1].bot_id);

    let seen = exec.seen.lock().unwrap();
    assert_eq!(seen[0].context.custom_instructions, None);
    let second = seen[1].context.custom_instructions.as_deref().unwrap();
    assert!(second.starts_with("Focus on panics."));
    assert!(second.ends_with("three unchecked unwraps in parser.rs"));
}

#[tokio::test]
async fn test_default_chain_stops_after_failed_step() {
    let exec = RecordingExecutor::new(vec![
        SkillResponse::failure("repository not found"),
        SkillResponse::success("never used"),
    ]);
    let req = chain(&[
        (Specialization::Architect, None),
        (Specialization::Documenter, None),
    ]);

    let resp = exec.execute_chain(&req).await.unwrap();
    assert_eq!(resp.steps.len(), 1);
    assert_eq!(resp.steps[0].response.error.as_deref(), Some("repository not found"));
    assert_eq!(exec.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_default_chain_propagates_transport_error() {
    let exec = RecordingExecutor::new(Vec::new());
    let req = chain(&[(Specialization::TestWriter, None)]);
    assert!(matches!(
        exec.execute_chain(&req).await,
        Err(SkillError::Http(_))
    ));
}

// ===========================================================================
// Unsupported variants
// ===========================================================================

#[tokio::test]
async fn test_stream_and_delegation_default_to_unsupported() {
    let exec = RecordingExecutor::new(Vec::new());
    let req = request(Specialization::Refactorer, None);
    assert!(matches!(exec.stream(&req).await, Err(SkillError::Unsupported(_))));

    let member = DelegateMember {
        id: Uuid::new_v4(),
        name: "CEO".into(),
        specialization: Specialization::Ceo,
        skill: "delegate".into(),
        role: "lead".into(),
        capabilities: Vec::new(),
    };
    let delegation = DelegationRequest {
        delegation_id: Uuid::new_v4(),
        task: "harden auth".into(),
        model: "claude-sonnet".into(),
        lead: member,
        team: Vec::new(),
        project_path: None,
    };
    assert!(matches!(
        exec.execute_delegation(&delegation).await,
        Err(SkillError::Unsupported(_))
    ));
}
