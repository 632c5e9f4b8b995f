//! Discussion engine tests: event-driven reports, the FIFO generation
//! queue, user-started discussions and the persisted feed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bt_agents::discussion::{DiscussionEngine, DiscussionError};
use bt_agents::profiles::profile;
use bt_agents::{OrchestratorOptions, TeamOrchestrator};
use bt_bridge::event_bus::EventBus;
use bt_bridge::protocol::TeamEvent;
use bt_core::config::DiscussionConfig;
use bt_core::store::{self, MemoryStore, StateStore, KEY_MESSAGES, KEY_THREADS};
use bt_core::types::{
    BotOverrides, MessageAuthor, MessageType, Specialization, TeamBot, TeamMessage, TeamThread,
    ThreadStatus, MAX_THREADS_IN_MEMORY, MAX_THREADS_PERSISTED,
};
use bt_harness::shutdown::ShutdownSignal;
use bt_harness::skill::{
    ConversationRequest, ConversationResponse, ConversationalExecutor, SkillError, SkillExecutor,
    SkillRequest, SkillResponse,
};
use bt_telemetry::metrics::{names, MetricsCollector};
use uuid::Uuid;

// ===========================================================================
// Test doubles
// ===========================================================================

struct ReviewExecutor;

#[async_trait]
impl SkillExecutor for ReviewExecutor {
    async fn execute(&self, _request: &SkillRequest) -> bt_harness::skill::Result<SkillResponse> {
        Ok(SkillResponse {
            summary: Some("found 2 issues".into()),
            issues_found: Some(2),
            ..SkillResponse::default()
        })
    }
}

/// Replies with a line naming the persona. Latency and failures are keyed
/// on the persona string of the request.
#[derive(Default)]
struct ScriptedConverser {
    latency: HashMap<String, Duration>,
    failing: Vec<String>,
    calls: Mutex<Vec<ConversationRequest>>,
}

impl ScriptedConverser {
    fn slow(mut self, spec: Specialization, latency: Duration) -> Self {
        self.latency.insert(role(spec), latency);
        self
    }

    fn failing_for(mut self, spec: Specialization) -> Self {
        self.failing.push(role(spec));
        self
    }
}

#[async_trait]
impl ConversationalExecutor for ScriptedConverser {
    async fn converse(
        &self,
        request: &ConversationRequest,
    ) -> bt_harness::skill::Result<ConversationResponse> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(latency) = self.latency.get(&request.role) {
            tokio::time::sleep(*latency).await;
        }
        if self.failing.contains(&request.role) {
            return Err(SkillError::Remote("model overloaded".into()));
        }
        Ok(ConversationResponse {
            content: format!("take from {}", request.role),
        })
    }
}

fn role(spec: Specialization) -> String {
    profile(spec).role.to_string()
}

// ===========================================================================
// Helpers
// ===========================================================================

struct Harness {
    orch: Arc<TeamOrchestrator>,
    engine: Arc<DiscussionEngine>,
    converser: Arc<ScriptedConverser>,
    events: flume::Receiver<TeamEvent>,
    store: Arc<dyn StateStore>,
    shutdown: ShutdownSignal,
}

fn quick_config() -> DiscussionConfig {
    DiscussionConfig {
        typing_delay_min_ms: 0,
        typing_delay_max_ms: 0,
        max_responders: 2,
        ..DiscussionConfig::default()
    }
}

fn harness(converser: ScriptedConverser, config: DiscussionConfig) -> Harness {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let bus = EventBus::new();
    let events = bus.subscribe();
    let orch = TeamOrchestrator::new(
        Arc::new(ReviewExecutor),
        store.clone(),
        bus,
        Arc::new(MetricsCollector::new()),
        OrchestratorOptions::default(),
    )
    .unwrap();
    let converser = Arc::new(converser);
    let engine = Arc::new(DiscussionEngine::new(orch.clone(), converser.clone(), config).unwrap());
    let shutdown = ShutdownSignal::new();
    engine.spawn(&shutdown);
    Harness {
        orch,
        engine,
        converser,
        events,
        store,
        shutdown,
    }
}

async fn add(orch: &TeamOrchestrator, spec: Specialization) -> TeamBot {
    orch.create_bot(spec, BotOverrides::default()).await.unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition never became true");
}

fn replies_to(engine: &DiscussionEngine, message: &TeamMessage) -> Vec<TeamMessage> {
    engine
        .messages(usize::MAX)
        .into_iter()
        .filter(|m| m.reply_to == Some(message.id))
        .collect()
}

fn authors(messages: &[TeamMessage]) -> Vec<Option<Uuid>> {
    messages.iter().map(|m| m.author.bot_id()).collect()
}

// ===========================================================================
// Event-driven reports
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_completed_run_posts_report_and_affinity_replies() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let reviewer = add(&h.orch, Specialization::CodeReviewer).await;
    let debugger = add(&h.orch, Specialization::Debugger).await;
    let architect = add(&h.orch, Specialization::Architect).await;
    add(&h.orch, Specialization::Documenter).await;

    h.orch.run_now(reviewer.id).await.unwrap().unwrap();
    wait_until(|| h.engine.messages(usize::MAX).len() >= 3).await;

    let feed = h.engine.messages(usize::MAX);
    let report = &feed[0];
    assert_eq!(report.author, MessageAuthor::Bot(reviewer.id));
    assert_eq!(report.message_type, MessageType::Report);
    assert_eq!(report.content, "found 2 issues (2 issue(s), 0 suggestion(s))");

    let replies = replies_to(&h.engine, report);
    assert_eq!(authors(&replies), vec![Some(debugger.id), Some(architect.id)]);
    assert!(replies.iter().all(|m| m.message_type == MessageType::Discussion));
    assert_eq!(replies[0].content, format!("take from {}", role(Specialization::Debugger)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.engine.messages(usize::MAX).len(), 3);
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_reply_prompt_carries_persona_and_context() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let reviewer = add(&h.orch, Specialization::CodeReviewer).await;
    add(&h.orch, Specialization::Debugger).await;

    h.orch.run_now(reviewer.id).await.unwrap();
    wait_until(|| h.engine.messages(usize::MAX).len() >= 2).await;

    let calls = h.converser.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let request = &calls[0];
    assert_eq!(request.role, role(Specialization::Debugger));
    assert!(request.messages[0].content.contains("the team's Debugger"));
    assert!(request.messages.last().unwrap().content.contains("found 2 issues"));
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_disabled_discussion_stays_silent() {
    let config = DiscussionConfig {
        enabled: false,
        ..quick_config()
    };
    let h = harness(ScriptedConverser::default(), config);
    let reviewer = add(&h.orch, Specialization::CodeReviewer).await;
    add(&h.orch, Specialization::Debugger).await;

    h.orch.run_now(reviewer.id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.engine.messages(usize::MAX).is_empty());
    assert!(h.engine.spawn(&h.shutdown).is_empty());
}

// ===========================================================================
// Generation queue
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_replies_land_in_enqueue_order() {
    let converser = ScriptedConverser::default()
        .slow(Specialization::CodeReviewer, Duration::from_secs(3))
        .slow(Specialization::Debugger, Duration::from_millis(10))
        .slow(Specialization::Architect, Duration::from_secs(1));
    let h = harness(converser, quick_config());
    let reviewer = add(&h.orch, Specialization::CodeReviewer).await;
    let debugger = add(&h.orch, Specialization::Debugger).await;
    let architect = add(&h.orch, Specialization::Architect).await;

    let prompt = h.engine.share_preference("Prefer small pull requests").unwrap();
    for id in [reviewer.id, debugger.id, architect.id] {
        h.engine.enqueue_reply(id, &prompt);
    }
    wait_until(|| replies_to(&h.engine, &prompt).len() == 3).await;

    let replies = replies_to(&h.engine, &prompt);
    assert_eq!(
        authors(&replies),
        vec![Some(reviewer.id), Some(debugger.id), Some(architect.id)]
    );
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_failed_generation_is_dropped_quietly() {
    let converser = ScriptedConverser::default().failing_for(Specialization::Debugger);
    let h = harness(converser, quick_config());
    let debugger = add(&h.orch, Specialization::Debugger).await;
    let architect = add(&h.orch, Specialization::Architect).await;
    let prompt = h.engine.share_preference("Keep functions short").unwrap();
    h.events.try_iter().count();

    h.engine.enqueue_reply(debugger.id, &prompt);
    h.engine.enqueue_reply(architect.id, &prompt);
    wait_until(|| !replies_to(&h.engine, &prompt).is_empty()).await;

    let replies = replies_to(&h.engine, &prompt);
    assert_eq!(authors(&replies), vec![Some(architect.id)]);
    assert_eq!(
        h.orch
            .metrics()
            .get_counter(names::GENERATION_JOBS_DROPPED_TOTAL, &[]),
        1
    );

    let thinking: Vec<(Uuid, bool)> = h
        .events
        .try_iter()
        .filter_map(|e| match e {
            TeamEvent::Thinking { bot_id, thinking } => Some((bot_id, thinking)),
            _ => None,
        })
        .collect();
    assert!(thinking.contains(&(debugger.id, true)));
    assert!(thinking.contains(&(debugger.id, false)));
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_reply_for_deleted_bot_is_dropped() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let debugger = add(&h.orch, Specialization::Debugger).await;
    let prompt = h.engine.share_preference("Tabs over spaces").unwrap();
    h.orch.delete_bot(debugger.id).await.unwrap();

    h.engine.enqueue_reply(debugger.id, &prompt);
    wait_until(|| {
        h.orch
            .metrics()
            .get_counter(names::GENERATION_JOBS_DROPPED_TOTAL, &[])
            == 1
    })
    .await;
    assert!(replies_to(&h.engine, &prompt).is_empty());
    h.shutdown.trigger();
}

// ===========================================================================
// User-started discussions
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_discussion_runs_turns_in_order() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let a = add(&h.orch, Specialization::Architect).await;
    let b = add(&h.orch, Specialization::SecurityAuditor).await;
    let c = add(&h.orch, Specialization::PerformanceOptimizer).await;

    let thread = h
        .engine
        .start_discussion("Should we split the monolith?", &[a.id, b.id, c.id])
        .await
        .unwrap();

    assert_eq!(thread.topic, "Should we split the monolith?");
    assert_eq!(thread.status, ThreadStatus::Active);
    assert_eq!(
        authors(&thread.messages),
        vec![None, Some(a.id), Some(b.id), Some(c.id), Some(a.id), Some(b.id)]
    );
    assert_eq!(thread.messages[0].author, MessageAuthor::System);
    assert!(thread.messages.iter().all(|m| m.thread_id == Some(thread.id)));
    assert_eq!(thread.participants, vec![a.id, b.id, c.id]);
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_single_bot_discussion_has_no_follow_up() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let a = add(&h.orch, Specialization::Architect).await;
    let thread = h.engine.start_discussion("Naming", &[a.id]).await.unwrap();
    assert_eq!(thread.messages.len(), 2);
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_failed_turn_becomes_apology() {
    let converser = ScriptedConverser::default().failing_for(Specialization::Documenter);
    let config = DiscussionConfig {
        follow_up_round: false,
        ..quick_config()
    };
    let h = harness(converser, config);
    let a = add(&h.orch, Specialization::Documenter).await;
    let b = add(&h.orch, Specialization::Refactorer).await;

    let thread = h
        .engine
        .start_discussion("Docs debt", &[a.id, b.id])
        .await
        .unwrap();
    assert_eq!(thread.messages.len(), 3);
    assert!(thread.messages[1].content.starts_with("Sorry"));
    assert!(thread.messages[1].content.contains("Docs debt"));
    assert!(thread.messages[2].content.starts_with("take from"));
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_start_discussion_validates_input() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let a = add(&h.orch, Specialization::Architect).await;
    assert!(matches!(
        h.engine.start_discussion("  ", &[a.id]).await,
        Err(DiscussionError::InvalidRequest(_))
    ));
    assert!(matches!(
        h.engine.start_discussion("topic", &[]).await,
        Err(DiscussionError::InvalidRequest(_))
    ));
    let ghost = Uuid::new_v4();
    assert!(matches!(
        h.engine.start_discussion("topic", &[ghost]).await,
        Err(DiscussionError::BotNotFound(id)) if id == ghost
    ));
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_user_message_in_thread_gets_participant_replies() {
    let config = DiscussionConfig {
        follow_up_round: false,
        ..quick_config()
    };
    let h = harness(ScriptedConverser::default(), config);
    let a = add(&h.orch, Specialization::Architect).await;
    let b = add(&h.orch, Specialization::Debugger).await;
    let outsider = add(&h.orch, Specialization::TestWriter).await;
    let thread = h.engine.start_discussion("Retry policy", &[a.id, b.id]).await.unwrap();

    let question = h
        .engine
        .post_user_message(Some(thread.id), "What about idempotency?")
        .await
        .unwrap();
    assert_eq!(question.message_type, MessageType::Question);
    assert_eq!(question.author, MessageAuthor::User);
    wait_until(|| replies_to(&h.engine, &question).len() == 2).await;

    let replies = replies_to(&h.engine, &question);
    assert!(replies.iter().all(|m| m.thread_id == Some(thread.id)));
    assert!(replies.iter().all(|m| m.author.bot_id() != Some(outsider.id)));
    assert_eq!(h.engine.thread(thread.id).unwrap().messages.len(), 6);
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_global_user_message_capped_by_max_responders() {
    let h = harness(ScriptedConverser::default(), quick_config());
    for spec in [
        Specialization::Architect,
        Specialization::Debugger,
        Specialization::TestWriter,
    ] {
        add(&h.orch, spec).await;
    }
    let question = h.engine.post_user_message(None, "Anyone free?").await.unwrap();
    wait_until(|| replies_to(&h.engine, &question).len() == 2).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(replies_to(&h.engine, &question).len(), 2);
    assert!(matches!(
        h.engine.post_user_message(Some(Uuid::new_v4()), "hello").await,
        Err(DiscussionError::ThreadNotFound(_))
    ));
    h.shutdown.trigger();
}

// ===========================================================================
// Threads and persistence
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_thread_status_changes() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let a = add(&h.orch, Specialization::Architect).await;
    let thread = h.engine.start_discussion("Caching", &[a.id]).await.unwrap();

    assert_eq!(h.engine.resolve_thread(thread.id).unwrap().status, ThreadStatus::Resolved);
    assert_eq!(h.engine.archive_thread(thread.id).unwrap().status, ThreadStatus::Archived);
    assert_eq!(h.engine.threads().len(), 1);
    assert!(matches!(
        h.engine.resolve_thread(Uuid::new_v4()),
        Err(DiscussionError::ThreadNotFound(_))
    ));
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_feed_persists_bounded_tail_and_reloads() {
    let h = harness(ScriptedConverser::default(), quick_config());
    for i in 0..210 {
        h.engine.share_preference(&format!("preference {i}")).unwrap();
    }
    assert_eq!(h.engine.messages(usize::MAX).len(), 210);
    assert_eq!(h.engine.messages(5).len(), 5);

    h.engine.flush().unwrap();
    let persisted: Vec<TeamMessage> = store::load_json(h.store.as_ref(), KEY_MESSAGES)
        .unwrap()
        .unwrap();
    assert_eq!(persisted.len(), 200);
    assert_eq!(persisted.last().unwrap().content, "preference 209");

    let reloaded = DiscussionEngine::new(
        h.orch.clone(),
        Arc::new(ScriptedConverser::default()),
        quick_config(),
    )
    .unwrap();
    let feed = reloaded.messages(usize::MAX);
    assert_eq!(feed.len(), 200);
    assert_eq!(feed[0].content, "preference 10");

    reloaded.clear().unwrap();
    assert!(reloaded.messages(usize::MAX).is_empty());
    let persisted: Vec<TeamMessage> = store::load_json(h.store.as_ref(), KEY_MESSAGES)
        .unwrap()
        .unwrap();
    assert!(persisted.is_empty());
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_in_memory_feed_is_capped() {
    let h = harness(ScriptedConverser::default(), quick_config());
    for i in 0..520 {
        h.engine.share_preference(&format!("p{i}")).unwrap();
    }
    let feed = h.engine.messages(usize::MAX);
    assert_eq!(feed.len(), 500);
    assert_eq!(feed[0].content, "p20");
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_appends_reach_the_store_in_the_background() {
    let h = harness(ScriptedConverser::default(), quick_config());
    for i in 0..20 {
        h.engine.share_preference(&format!("p{i}")).unwrap();
    }
    let store = h.store.clone();
    wait_until(move || {
        store::load_json::<Vec<TeamMessage>>(store.as_ref(), KEY_MESSAGES)
            .unwrap()
            .is_some_and(|m| m.len() == 20 && m[19].content == "p19")
    })
    .await;
    h.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_in_memory_threads_are_capped() {
    let h = harness(ScriptedConverser::default(), quick_config());
    let a = add(&h.orch, Specialization::Architect).await;
    let mut first = None;
    for i in 0..MAX_THREADS_IN_MEMORY + 3 {
        let thread = h.engine.start_discussion(&format!("topic {i}"), &[a.id]).await.unwrap();
        first.get_or_insert(thread.id);
    }

    let threads = h.engine.threads();
    assert_eq!(threads.len(), MAX_THREADS_IN_MEMORY);
    assert_eq!(threads[0].topic, "topic 3");
    assert!(matches!(
        h.engine.thread(first.unwrap()),
        Err(DiscussionError::ThreadNotFound(_))
    ));

    h.engine.flush().unwrap();
    let persisted: Vec<TeamThread> = store::load_json(h.store.as_ref(), KEY_THREADS)
        .unwrap()
        .unwrap();
    assert_eq!(persisted.len(), MAX_THREADS_PERSISTED);
    assert_eq!(persisted.last().unwrap().topic, format!("topic {}", MAX_THREADS_IN_MEMORY + 2));
    h.shutdown.trigger();
}
