//! Bot-to-bot discussion feed.
//!
//! The engine listens to orchestrator events. Each completed, failed or
//! file-fixing run turns into a report message from the bot, and one or two
//! teammates picked from the affinity table are queued to reply. Replies go
//! through a single FIFO generation queue drained by one worker, so the feed
//! stays in enqueue order no matter how long each remote call takes.
//!
//! A generation job that fails is dropped and the bot simply does not speak
//! that turn. User-started discussions run inline and fall back to an
//! apology message instead.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bt_bridge::event_bus::EventBus;
use bt_bridge::protocol::TeamEvent;
use bt_core::config::DiscussionConfig;
use bt_core::store::{self, StateStore, StoreError, KEY_MESSAGES, KEY_THREADS};
use bt_core::types::{
    trim_front, MessageAuthor, MessageType, Specialization, TeamBot, TeamMessage, TeamThread,
    ThreadStatus, MAX_MESSAGES_IN_MEMORY, MAX_MESSAGES_PERSISTED, MAX_THREADS_IN_MEMORY,
    MAX_THREADS_PERSISTED,
};
use bt_harness::shutdown::{ShutdownListener, ShutdownSignal};
use bt_harness::skill::{ChatMessage, ConversationRequest, ConversationalExecutor};
use bt_telemetry::metrics::{names, MetricsCollector};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::orchestrator::TeamOrchestrator;
use crate::profiles::{affinity, profile};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DiscussionError {
    #[error("thread not found: {0}")]
    ThreadNotFound(Uuid),

    #[error("bot not found: {0}")]
    BotNotFound(Uuid),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DiscussionError>;

// ---------------------------------------------------------------------------
// Responder selection
// ---------------------------------------------------------------------------

/// Pick up to `max` responders for a message from a `speaker` bot.
///
/// Candidates are taken in affinity order. If none of the preferred
/// specializations is available, one random candidate answers instead.
pub fn select_responders<R: Rng + ?Sized>(
    speaker: Specialization,
    candidates: &[&TeamBot],
    max: usize,
    rng: &mut R,
) -> Vec<Uuid> {
    let mut picked: Vec<Uuid> = Vec::new();
    for preferred in affinity(speaker) {
        if picked.len() >= max {
            break;
        }
        if let Some(bot) = candidates
            .iter()
            .find(|b| b.specialization == *preferred && !picked.contains(&b.id))
        {
            picked.push(bot.id);
        }
    }
    if picked.is_empty() && max > 0 {
        if let Some(bot) = candidates.choose(rng) {
            picked.push(bot.id);
        }
    }
    picked
}

fn report_text(summary: &str, issues: u32, suggestions: u32) -> String {
    if issues == 0 && suggestions == 0 {
        return summary.to_string();
    }
    format!("{summary} ({issues} issue(s), {suggestions} suggestion(s))")
}

// ---------------------------------------------------------------------------
// DiscussionEngine
// ---------------------------------------------------------------------------

struct GenerationJob {
    bot_id: Uuid,
    reply_to: TeamMessage,
}

#[derive(Default)]
struct DiscussionLog {
    messages: Vec<TeamMessage>,
    threads: Vec<TeamThread>,
    /// Bumped on every snapshot so older writes never overwrite newer ones.
    seq: u64,
}

impl DiscussionLog {
    fn snapshot(&mut self) -> LogSnapshot {
        self.seq += 1;
        LogSnapshot {
            seq: self.seq,
            messages: tail(&self.messages, MAX_MESSAGES_PERSISTED).to_vec(),
            threads: tail(&self.threads, MAX_THREADS_PERSISTED).to_vec(),
        }
    }
}

struct LogSnapshot {
    seq: u64,
    messages: Vec<TeamMessage>,
    threads: Vec<TeamThread>,
}

/// Writes log snapshots to the store outside the log lock.
struct LogWriter {
    store: Arc<dyn StateStore>,
    written: Mutex<u64>,
}

impl LogWriter {
    fn write(&self, snapshot: LogSnapshot) -> std::result::Result<(), StoreError> {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.seq <= *written {
            return Ok(());
        }
        store::save_json(self.store.as_ref(), KEY_MESSAGES, &snapshot.messages)?;
        store::save_json(self.store.as_ref(), KEY_THREADS, &snapshot.threads)?;
        *written = snapshot.seq;
        Ok(())
    }
}

pub struct DiscussionEngine {
    orchestrator: Arc<TeamOrchestrator>,
    converser: Arc<dyn ConversationalExecutor>,
    writer: Arc<LogWriter>,
    bus: EventBus,
    metrics: Arc<MetricsCollector>,
    config: DiscussionConfig,
    log: Mutex<DiscussionLog>,
    events: Mutex<Option<flume::Receiver<TeamEvent>>>,
    jobs_tx: flume::Sender<GenerationJob>,
    jobs_rx: flume::Receiver<GenerationJob>,
}

impl DiscussionEngine {
    /// Build the engine and reload the persisted feed. Subscribes to the
    /// orchestrator's bus right away when discussion is enabled, so events
    /// published before [`spawn`](Self::spawn) are not lost.
    pub fn new(
        orchestrator: Arc<TeamOrchestrator>,
        converser: Arc<dyn ConversationalExecutor>,
        config: DiscussionConfig,
    ) -> Result<Self> {
        let store = Arc::clone(orchestrator.store());
        let messages: Vec<TeamMessage> =
            store::load_json(store.as_ref(), KEY_MESSAGES)?.unwrap_or_default();
        let mut threads: Vec<TeamThread> =
            store::load_json(store.as_ref(), KEY_THREADS)?.unwrap_or_default();
        trim_front(&mut threads, MAX_THREADS_IN_MEMORY);
        info!(messages = messages.len(), threads = threads.len(), "discussion log loaded");

        let bus = orchestrator.bus().clone();
        let events = config.enabled.then(|| bus.subscribe());
        let (jobs_tx, jobs_rx) = flume::unbounded();
        Ok(Self {
            metrics: Arc::clone(orchestrator.metrics()),
            orchestrator,
            converser,
            writer: Arc::new(LogWriter {
                store,
                written: Mutex::new(0),
            }),
            bus,
            config,
            log: Mutex::new(DiscussionLog {
                messages,
                threads,
                seq: 0,
            }),
            events: Mutex::new(events),
            jobs_tx,
            jobs_rx,
        })
    }

    /// Start the event listener and the single generation worker. Returns
    /// no handles when discussion is disabled or the loops already run.
    pub fn spawn(self: &Arc<Self>, shutdown: &ShutdownSignal) -> Vec<JoinHandle<()>> {
        let Some(events) = self.events.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return Vec::new();
        };

        let listener = {
            let engine = Arc::clone(self);
            let listener = shutdown.listener();
            let guard = shutdown.guard();
            tokio::spawn(async move {
                engine.listen(events, listener).await;
                drop(guard);
            })
        };
        let worker = {
            let engine = Arc::clone(self);
            let listener = shutdown.listener();
            let guard = shutdown.guard();
            tokio::spawn(async move {
                engine.work(listener).await;
                drop(guard);
            })
        };
        vec![listener, worker]
    }

    async fn listen(&self, events: flume::Receiver<TeamEvent>, mut shutdown: ShutdownListener) {
        debug!("discussion listener started");
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                event = events.recv_async() => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(_) => break,
                },
            }
        }
        debug!("discussion listener stopped");
    }

    async fn work(&self, mut shutdown: ShutdownListener) {
        debug!("generation worker started");
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                job = self.jobs_rx.recv_async() => match job {
                    Ok(job) => self.generate(job).await,
                    Err(_) => break,
                },
            }
        }
        debug!("generation worker stopped");
    }

    async fn on_event(&self, event: TeamEvent) {
        let (bot_id, kind, content) = match event {
            TeamEvent::TaskCompleted(outcome) => (
                outcome.bot_id,
                MessageType::Report,
                report_text(&outcome.summary, outcome.issues_found, outcome.suggestions_given),
            ),
            TeamEvent::FilesFixed { bot_id, files, .. } => (
                bot_id,
                MessageType::Report,
                format!("I fixed {} file(s): {}", files.len(), files.join(", ")),
            ),
            TeamEvent::TaskFailed { bot_id, error, .. } => (
                bot_id,
                MessageType::Alert,
                format!("My last run failed: {error}"),
            ),
            TeamEvent::ChainCompleted {
                bot_ids,
                completed_steps,
                total_files_fixed,
                ..
            } => {
                let Some(last) = bot_ids.last().copied() else {
                    return;
                };
                (
                    last,
                    MessageType::Report,
                    format!(
                        "Our chain finished: {completed_steps} step(s) completed, {total_files_fixed} file(s) fixed."
                    ),
                )
            }
            _ => return,
        };

        let Ok(speaker) = self.orchestrator.get_bot(bot_id).await else {
            debug!(bot_id = %bot_id, "trigger from unknown bot ignored");
            return;
        };
        let report = TeamMessage::new(MessageAuthor::Bot(bot_id), speaker.name.clone(), kind, content);
        self.append(report.clone());

        let roster = self.orchestrator.list_bots().await;
        let candidates: Vec<&TeamBot> = roster
            .iter()
            .filter(|b| b.id != bot_id && b.status.is_available())
            .collect();
        let responders = select_responders(
            speaker.specialization,
            &candidates,
            self.config.max_responders,
            &mut rand::thread_rng(),
        );
        for responder in responders {
            self.enqueue_reply(responder, &report);
        }
    }

    /// Queue `bot_id` to reply to `message`. Jobs run one at a time, in the
    /// order they were queued.
    pub fn enqueue_reply(&self, bot_id: Uuid, message: &TeamMessage) {
        let job = GenerationJob {
            bot_id,
            reply_to: message.clone(),
        };
        if self.jobs_tx.send(job).is_err() {
            self.metrics
                .increment_counter(names::GENERATION_JOBS_DROPPED_TOTAL, &[]);
        }
    }

    async fn generate(&self, job: GenerationJob) {
        let Ok(bot) = self.orchestrator.get_bot(job.bot_id).await else {
            self.metrics
                .increment_counter(names::GENERATION_JOBS_DROPPED_TOTAL, &[]);
            return;
        };
        let template = profile(bot.specialization);
        let prompt = format!(
            "{} just said: \"{}\". Respond briefly from your perspective as the team's {}.",
            job.reply_to.author_name, job.reply_to.content, template.display_name
        );

        self.set_thinking(bot.id, true);
        self.typing_delay().await;
        let request = self.conversation_request(&bot, job.reply_to.thread_id, prompt);
        match self.converser.converse(&request).await {
            Ok(reply) if !reply.content.trim().is_empty() => {
                let mut message = TeamMessage::new(
                    MessageAuthor::Bot(bot.id),
                    bot.name.clone(),
                    MessageType::Discussion,
                    reply.content.trim(),
                )
                .replying_to(job.reply_to.id);
                if let Some(thread_id) = job.reply_to.thread_id {
                    message = message.in_thread(thread_id);
                }
                self.append(message);
            }
            Ok(_) => {
                debug!(bot_id = %bot.id, "empty reply, bot stays quiet");
                self.metrics
                    .increment_counter(names::GENERATION_JOBS_DROPPED_TOTAL, &[]);
            }
            Err(e) => {
                debug!(bot_id = %bot.id, error = %e, "generation failed, bot stays quiet");
                self.metrics
                    .increment_counter(names::GENERATION_JOBS_DROPPED_TOTAL, &[]);
            }
        }
        self.set_thinking(bot.id, false);
    }

    fn set_thinking(&self, bot_id: Uuid, thinking: bool) {
        self.bus.publish(TeamEvent::Thinking { bot_id, thinking });
    }

    async fn typing_delay(&self) {
        let (min, max) = (self.config.typing_delay_min_ms, self.config.typing_delay_max_ms);
        let ms = if max <= min {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Persona prompt, the last `context_window` messages of the thread (or
    /// the global feed), then `prompt`.
    fn conversation_request(
        &self,
        bot: &TeamBot,
        thread_id: Option<Uuid>,
        prompt: String,
    ) -> ConversationRequest {
        let template = profile(bot.specialization);
        let mut messages = vec![ChatMessage::system(format!(
            "You are {}, the team's {}. {} Keep replies to two or three sentences and talk to your teammates directly.",
            bot.name, template.display_name, template.role
        ))];
        for past in self.recent_context(thread_id) {
            if past.author == MessageAuthor::Bot(bot.id) {
                messages.push(ChatMessage::assistant(past.content));
            } else {
                messages.push(ChatMessage::user(format!("{}: {}", past.author_name, past.content)));
            }
        }
        messages.push(ChatMessage::user(prompt));

        ConversationRequest {
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            role: template.role.to_string(),
        }
    }

    fn recent_context(&self, thread_id: Option<Uuid>) -> Vec<TeamMessage> {
        let log = self.lock_log();
        let window = self.config.context_window;
        let pool: Vec<&TeamMessage> = match thread_id {
            Some(id) => log
                .messages
                .iter()
                .filter(|m| m.thread_id == Some(id))
                .collect(),
            None => log.messages.iter().collect(),
        };
        let start = pool.len().saturating_sub(window);
        pool[start..].iter().map(|m| (*m).clone()).collect()
    }

    // -----------------------------------------------------------------------
    // User-facing operations
    // -----------------------------------------------------------------------

    /// Open a thread on `topic` and let each bot give its initial take in
    /// order, followed by a short follow-up round from up to two of them.
    /// Runs inline, not through the generation queue.
    pub async fn start_discussion(&self, topic: &str, bot_ids: &[Uuid]) -> Result<TeamThread> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(DiscussionError::InvalidRequest("topic is empty".into()));
        }
        if bot_ids.is_empty() {
            return Err(DiscussionError::InvalidRequest(
                "a discussion needs at least one bot".into(),
            ));
        }
        let mut bots = Vec::with_capacity(bot_ids.len());
        for id in bot_ids {
            let bot = self
                .orchestrator
                .get_bot(*id)
                .await
                .map_err(|_| DiscussionError::BotNotFound(*id))?;
            bots.push(bot);
        }

        let thread = TeamThread::new(topic, bot_ids.to_vec());
        let thread_id = thread.id;
        let snapshot = {
            let mut log = self.lock_log();
            log.threads.push(thread.clone());
            trim_front(&mut log.threads, MAX_THREADS_IN_MEMORY);
            log.snapshot()
        };
        self.persist(snapshot);
        info!(%thread_id, topic, participants = bots.len(), "discussion started");
        self.bus.publish(TeamEvent::Thread(thread));

        self.append(
            TeamMessage::new(
                MessageAuthor::System,
                "system",
                MessageType::System,
                format!("Discussion started: {topic}"),
            )
            .in_thread(thread_id),
        );

        for bot in &bots {
            let template = profile(bot.specialization);
            let prompt = format!(
                "The team is discussing: \"{topic}\". Share your initial take as the {}.",
                template.display_name
            );
            self.speak(bot, thread_id, topic, prompt).await;
        }

        if self.config.follow_up_round && bots.len() > 1 {
            for bot in bots.iter().take(2) {
                let prompt = "Respond briefly to your teammates' points above: agree, push back, or add what is missing.".to_string();
                self.speak(bot, thread_id, topic, prompt).await;
            }
        }

        self.thread(thread_id)
    }

    async fn speak(&self, bot: &TeamBot, thread_id: Uuid, topic: &str, prompt: String) {
        self.set_thinking(bot.id, true);
        self.typing_delay().await;
        let request = self.conversation_request(bot, Some(thread_id), prompt);
        let content = match self.converser.converse(&request).await {
            Ok(reply) if !reply.content.trim().is_empty() => reply.content.trim().to_string(),
            Ok(_) => apology(topic),
            Err(e) => {
                warn!(bot_id = %bot.id, error = %e, "discussion turn failed");
                apology(topic)
            }
        };
        self.append(
            TeamMessage::new(
                MessageAuthor::Bot(bot.id),
                bot.name.clone(),
                MessageType::Discussion,
                content,
            )
            .in_thread(thread_id),
        );
        self.set_thinking(bot.id, false);
    }

    /// Post a message from the user and queue replies: thread participants
    /// inside a thread, random available bots in the global feed.
    pub async fn post_user_message(
        &self,
        thread_id: Option<Uuid>,
        content: &str,
    ) -> Result<TeamMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DiscussionError::InvalidRequest("message is empty".into()));
        }
        let participants = match thread_id {
            Some(id) => Some(self.thread(id)?.participants),
            None => None,
        };

        let mut message = TeamMessage::new(MessageAuthor::User, "You", MessageType::Question, content);
        if let Some(id) = thread_id {
            message = message.in_thread(id);
        }
        self.append(message.clone());

        let roster = self.orchestrator.list_bots().await;
        let mut available: Vec<&TeamBot> = roster
            .iter()
            .filter(|b| b.status.is_available())
            .filter(|b| participants.as_ref().is_none_or(|p| p.contains(&b.id)))
            .collect();
        let responders: Vec<Uuid> = {
            let mut rng = rand::thread_rng();
            if participants.is_none() {
                available.shuffle(&mut rng);
            }
            available
                .iter()
                .take(self.config.max_responders)
                .map(|b| b.id)
                .collect()
        };
        for responder in responders {
            self.enqueue_reply(responder, &message);
        }
        Ok(message)
    }

    /// Record a user preference in the feed. Nobody replies to it.
    pub fn share_preference(&self, content: &str) -> Result<TeamMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DiscussionError::InvalidRequest("preference is empty".into()));
        }
        let message = TeamMessage::new(MessageAuthor::User, "You", MessageType::Preference, content);
        self.append(message.clone());
        Ok(message)
    }

    pub fn resolve_thread(&self, thread_id: Uuid) -> Result<TeamThread> {
        self.set_thread_status(thread_id, ThreadStatus::Resolved)
    }

    pub fn archive_thread(&self, thread_id: Uuid) -> Result<TeamThread> {
        self.set_thread_status(thread_id, ThreadStatus::Archived)
    }

    fn set_thread_status(&self, thread_id: Uuid, status: ThreadStatus) -> Result<TeamThread> {
        let (updated, snapshot) = {
            let mut log = self.lock_log();
            let thread = log
                .threads
                .iter_mut()
                .find(|t| t.id == thread_id)
                .ok_or(DiscussionError::ThreadNotFound(thread_id))?;
            thread.status = status;
            thread.updated_at = chrono::Utc::now();
            let updated = thread.clone();
            (updated, log.snapshot())
        };
        self.persist(snapshot);
        self.bus.publish(TeamEvent::Thread(updated.clone()));
        Ok(updated)
    }

    pub fn threads(&self) -> Vec<TeamThread> {
        self.lock_log().threads.clone()
    }

    pub fn thread(&self, thread_id: Uuid) -> Result<TeamThread> {
        self.lock_log()
            .threads
            .iter()
            .find(|t| t.id == thread_id)
            .cloned()
            .ok_or(DiscussionError::ThreadNotFound(thread_id))
    }

    /// The most recent `limit` messages, oldest first.
    pub fn messages(&self, limit: usize) -> Vec<TeamMessage> {
        let log = self.lock_log();
        let start = log.messages.len().saturating_sub(limit);
        log.messages[start..].to_vec()
    }

    pub fn clear(&self) -> Result<()> {
        let snapshot = {
            let mut log = self.lock_log();
            log.messages.clear();
            log.threads.clear();
            log.snapshot()
        };
        self.writer.write(snapshot)?;
        info!("discussion log cleared");
        Ok(())
    }

    /// Write the current log to the store and wait for it. Background
    /// writes still in flight are superseded.
    pub fn flush(&self) -> Result<()> {
        let snapshot = self.lock_log().snapshot();
        self.writer.write(snapshot)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Log
    // -----------------------------------------------------------------------

    fn lock_log(&self) -> MutexGuard<'_, DiscussionLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn append(&self, message: TeamMessage) {
        let snapshot = {
            let mut log = self.lock_log();
            if let Some(thread_id) = message.thread_id {
                if let Some(thread) = log.threads.iter_mut().find(|t| t.id == thread_id) {
                    if let MessageAuthor::Bot(id) = message.author {
                        if !thread.participants.contains(&id) {
                            thread.participants.push(id);
                        }
                    }
                    thread.push(message.clone());
                }
            }
            log.messages.push(message.clone());
            trim_front(&mut log.messages, MAX_MESSAGES_IN_MEMORY);
            log.snapshot()
        };
        self.persist(snapshot);
        self.metrics.increment_counter(
            names::DISCUSSION_MESSAGES_TOTAL,
            &[("kind", message.message_type.as_str())],
        );
        self.bus.publish(TeamEvent::Message(message));
    }

    /// Write a snapshot on the blocking pool when a runtime is around,
    /// inline otherwise.
    fn persist(&self, snapshot: LogSnapshot) {
        let writer = Arc::clone(&self.writer);
        let write = move || {
            if let Err(e) = writer.write(snapshot) {
                warn!(error = %e, "failed to persist discussion log");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

fn apology(topic: &str) -> String {
    format!("Sorry, I couldn't put my thoughts on \"{topic}\" together just now. I'll chime in later.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_core::types::BotStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bot(spec: Specialization) -> TeamBot {
        let p = profile(spec);
        let mut b = TeamBot::new(p.display_name, spec, "m", p.default_preferences());
        b.status = BotStatus::Active;
        b
    }

    #[test]
    fn affinity_order_wins() {
        let debugger = bot(Specialization::Debugger);
        let architect = bot(Specialization::Architect);
        let documenter = bot(Specialization::Documenter);
        let candidates = vec![&documenter, &architect, &debugger];
        let mut rng = StdRng::seed_from_u64(7);
        let picked = select_responders(Specialization::CodeReviewer, &candidates, 2, &mut rng);
        assert_eq!(picked, vec![debugger.id, architect.id]);
    }

    #[test]
    fn falls_back_to_one_random_candidate() {
        let documenter = bot(Specialization::Documenter);
        let refactorer = bot(Specialization::Refactorer);
        let candidates = vec![&documenter, &refactorer];
        let mut rng = StdRng::seed_from_u64(1);
        let picked = select_responders(Specialization::SecurityAuditor, &candidates, 2, &mut rng);
        assert_eq!(picked.len(), 1);
        assert!(picked[0] == documenter.id || picked[0] == refactorer.id);
    }

    #[test]
    fn no_candidates_no_responders() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_responders(Specialization::Debugger, &[], 2, &mut rng).is_empty());
    }

    #[test]
    fn report_text_mentions_counts() {
        assert_eq!(report_text("all clear", 0, 0), "all clear");
        assert_eq!(
            report_text("found 2 issues", 2, 1),
            "found 2 issues (2 issue(s), 1 suggestion(s))"
        );
    }

    #[test]
    fn tail_keeps_last_n() {
        assert_eq!(tail(&[1, 2, 3, 4], 2), &[3, 4]);
        assert_eq!(tail(&[1], 5), &[1]);
    }
}
