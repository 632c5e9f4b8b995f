use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use bt_harness::shutdown::ShutdownListener;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ScheduleQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: Instant,
    generation: u64,
    bot_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    period: Duration,
    generation: u64,
}

/// Min-heap of next fire times, one recurring timer per armed bot.
///
/// Disarming does not touch the heap: an entry whose generation no longer
/// matches the bot's armed generation is discarded when it reaches the top.
/// Once stale entries outnumber armed bots the heap is rebuilt.
#[derive(Debug, Default)]
pub struct ScheduleQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    armed: HashMap<Uuid, Armed>,
    next_generation: u64,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) `bot_id` to fire every `period`, first at `now + period`.
    pub fn arm(&mut self, bot_id: Uuid, period: Duration, now: Instant) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert(bot_id, Armed { period, generation });
        self.heap.push(Reverse(Entry {
            deadline: now + period,
            generation,
            bot_id,
        }));
        self.compact();
    }

    pub fn disarm(&mut self, bot_id: Uuid) -> bool {
        let removed = self.armed.remove(&bot_id).is_some();
        self.compact();
        removed
    }

    pub fn disarm_all(&mut self) {
        self.armed.clear();
        self.heap.clear();
    }

    pub fn is_armed(&self, bot_id: Uuid) -> bool {
        self.armed.contains_key(&bot_id)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    fn compact(&mut self) {
        let stale = self.heap.len().saturating_sub(self.armed.len());
        if stale <= self.armed.len() {
            return;
        }
        let armed = &self.armed;
        self.heap
            .retain(|Reverse(e)| armed.get(&e.bot_id).is_some_and(|a| a.generation == e.generation));
        debug!(stale, kept = self.heap.len(), "schedule heap compacted");
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.armed
            .get(&entry.bot_id)
            .is_some_and(|a| a.generation == entry.generation)
    }

    /// Earliest live deadline, discarding stale entries on the way.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if self.is_live(&top) {
                return Some(top.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pop every live entry due at or before `now`, re-arming each for its
    /// next period. Returns the bot ids in deadline order.
    pub fn pop_due(&mut self, now: Instant) -> Vec<Uuid> {
        let mut due = Vec::new();
        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if top.deadline > now {
                break;
            }
            self.heap.pop();
            let Some(armed) = self.armed.get(&top.bot_id).copied() else {
                continue;
            };
            if armed.generation != top.generation {
                continue;
            }
            due.push(top.bot_id);
            let mut next = top.deadline + armed.period;
            if next <= now {
                next = now + armed.period;
            }
            self.heap.push(Reverse(Entry {
                deadline: next,
                ..top
            }));
        }
        due
    }
}

// ---------------------------------------------------------------------------
// Scheduler loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    Arm { bot_id: Uuid, period: Duration },
    Disarm { bot_id: Uuid },
    DisarmAll,
}

/// Cheap, cloneable sender side of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: flume::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn arm(&self, bot_id: Uuid, schedule_minutes: u32) {
        let period = Duration::from_secs(u64::from(schedule_minutes.max(1)) * 60);
        self.send(SchedulerCommand::Arm { bot_id, period });
    }

    pub fn disarm(&self, bot_id: Uuid) {
        self.send(SchedulerCommand::Disarm { bot_id });
    }

    pub fn disarm_all(&self) {
        self.send(SchedulerCommand::DisarmAll);
    }

    fn send(&self, cmd: SchedulerCommand) {
        // Once the loop has exited there is nothing left to schedule.
        if self.tx.send(cmd).is_err() {
            debug!("scheduler loop gone, command dropped");
        }
    }
}

/// Single loop driving every bot's recurring timer.
pub struct Scheduler {
    queue: ScheduleQueue,
    rx: flume::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new() -> (Self, SchedulerHandle) {
        let (tx, rx) = flume::unbounded();
        (
            Self {
                queue: ScheduleQueue::new(),
                rx,
            },
            SchedulerHandle { tx },
        )
    }

    fn apply(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::Arm { bot_id, period } => {
                debug!(bot_id = %bot_id, period_secs = period.as_secs(), "timer armed");
                self.queue.arm(bot_id, period, Instant::now());
            }
            SchedulerCommand::Disarm { bot_id } => {
                if self.queue.disarm(bot_id) {
                    debug!(bot_id = %bot_id, "timer cleared");
                }
            }
            SchedulerCommand::DisarmAll => {
                debug!(count = self.queue.armed_count(), "all timers cleared");
                self.queue.disarm_all();
            }
        }
    }

    /// Run until shutdown or until every [`SchedulerHandle`] is dropped,
    /// calling `on_tick` for each due bot.
    pub async fn run<F>(mut self, on_tick: F, mut shutdown: ShutdownListener)
    where
        F: Fn(Uuid),
    {
        info!("scheduler started");
        loop {
            let next = self.queue.next_deadline();
            let sleep = async move {
                match next {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown.wait() => break,
                cmd = self.rx.recv_async() => match cmd {
                    Ok(cmd) => self.apply(cmd),
                    Err(_) => break,
                },
                _ = sleep => {
                    for bot_id in self.queue.pop_due(Instant::now()) {
                        on_tick(bot_id);
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[test]
    fn pops_in_deadline_order_and_rearms() {
        let now = Instant::now();
        let mut q = ScheduleQueue::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        q.arm(a, 30 * MIN, now);
        q.arm(b, 10 * MIN, now);

        assert_eq!(q.next_deadline(), Some(now + 10 * MIN));
        assert_eq!(q.pop_due(now + 10 * MIN), vec![b]);
        assert_eq!(q.pop_due(now + 30 * MIN), vec![b, a]);
        assert_eq!(q.next_deadline(), Some(now + 40 * MIN));
    }

    #[test]
    fn disarmed_entries_never_fire() {
        let now = Instant::now();
        let mut q = ScheduleQueue::new();
        let a = Uuid::new_v4();
        q.arm(a, MIN, now);
        assert!(q.disarm(a));
        assert!(q.pop_due(now + 5 * MIN).is_empty());
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn rearm_replaces_the_old_period() {
        let now = Instant::now();
        let mut q = ScheduleQueue::new();
        let a = Uuid::new_v4();
        q.arm(a, MIN, now);
        q.arm(a, 10 * MIN, now);
        assert!(q.pop_due(now + 5 * MIN).is_empty());
        assert_eq!(q.pop_due(now + 10 * MIN), vec![a]);
    }

    #[test]
    fn stale_entries_are_compacted() {
        let now = Instant::now();
        let mut q = ScheduleQueue::new();
        let keep = Uuid::new_v4();
        q.arm(keep, MIN, now);
        for _ in 0..50 {
            let id = Uuid::new_v4();
            q.arm(id, MIN, now);
            q.disarm(id);
        }
        for _ in 0..50 {
            q.arm(keep, 2 * MIN, now);
        }
        assert_eq!(q.armed_count(), 1);
        assert!(q.heap.len() <= 2 * q.armed_count());
        assert_eq!(q.pop_due(now + 2 * MIN), vec![keep]);
    }

    #[test]
    fn late_pop_does_not_burst() {
        let now = Instant::now();
        let mut q = ScheduleQueue::new();
        let a = Uuid::new_v4();
        q.arm(a, MIN, now);
        assert_eq!(q.pop_due(now + 10 * MIN), vec![a]);
        assert_eq!(q.next_deadline(), Some(now + 11 * MIN));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_fires_ticks_until_shutdown() {
        let signal = bt_harness::shutdown::ShutdownSignal::new();
        let (scheduler, handle) = Scheduler::new();
        let (tick_tx, tick_rx) = flume::unbounded();
        let task = tokio::spawn(scheduler.run(
            move |id| {
                let _ = tick_tx.send(id);
            },
            signal.listener(),
        ));

        let bot = Uuid::new_v4();
        handle.arm(bot, 30);
        tokio::time::sleep(Duration::from_secs(30 * 60 + 1)).await;
        assert_eq!(tick_rx.try_recv().unwrap(), bot);

        handle.disarm(bot);
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert!(tick_rx.try_recv().is_err());

        signal.trigger();
        task.await.unwrap();
    }
}
