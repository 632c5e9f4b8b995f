use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

// ---------------------------------------------------------------------------
// AdmissionRejected
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionRejected {
    #[error("bot {0} is already executing")]
    AlreadyRunning(Uuid),
    #[error("concurrency limit reached ({running}/{max})")]
    AtCapacity { running: usize, max: usize },
}

impl AdmissionRejected {
    /// Label used for the `admission_rejected_total` metric.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionRejected::AlreadyRunning(_) => "already_running",
            AdmissionRejected::AtCapacity { .. } => "at_capacity",
        }
    }
}

// ---------------------------------------------------------------------------
// ConcurrencyGovernor
// ---------------------------------------------------------------------------

/// The set of bot ids currently executing, used as a global admission
/// counter.
///
/// Admission hands out an [`AdmissionPermit`]; the ids it covers leave the set
/// when the permit is dropped, however the holder exits.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGovernor {
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl ConcurrencyGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        // The set stays consistent even if a holder panicked.
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit a single execution if the bot is not already running and fewer
    /// than `max` executions are in flight.
    pub fn try_admit(&self, bot_id: Uuid, max: usize) -> Result<AdmissionPermit, AdmissionRejected> {
        let mut running = self.lock();
        if running.contains(&bot_id) {
            return Err(AdmissionRejected::AlreadyRunning(bot_id));
        }
        if running.len() >= max {
            return Err(AdmissionRejected::AtCapacity {
                running: running.len(),
                max,
            });
        }
        running.insert(bot_id);
        Ok(AdmissionPermit {
            running: Arc::clone(&self.running),
            ids: vec![bot_id],
        })
    }

    /// Claim every id in `bot_ids` at once, or none of them.
    ///
    /// Only re-entrancy is checked; a batched protocol is one remote call and
    /// is not bounded by the slot limit.
    pub fn try_claim_group(&self, bot_ids: &[Uuid]) -> Result<AdmissionPermit, AdmissionRejected> {
        let mut running = self.lock();
        if let Some(busy) = bot_ids.iter().find(|id| running.contains(id)) {
            return Err(AdmissionRejected::AlreadyRunning(*busy));
        }
        let mut ids: Vec<Uuid> = Vec::with_capacity(bot_ids.len());
        for id in bot_ids {
            if running.insert(*id) {
                ids.push(*id);
            }
        }
        Ok(AdmissionPermit {
            running: Arc::clone(&self.running),
            ids,
        })
    }

    pub fn running_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_running(&self, bot_id: Uuid) -> bool {
        self.lock().contains(&bot_id)
    }
}

// ---------------------------------------------------------------------------
// AdmissionPermit
// ---------------------------------------------------------------------------

/// Held for the lifetime of an admitted execution.
#[derive(Debug)]
pub struct AdmissionPermit {
    running: Arc<Mutex<HashSet<Uuid>>>,
    ids: Vec<Uuid>,
}

impl AdmissionPermit {
    pub fn bot_ids(&self) -> &[Uuid] {
        &self.ids
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        for id in &self.ids {
            running.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reentry() {
        let gov = ConcurrencyGovernor::new();
        let id = Uuid::new_v4();
        let _permit = gov.try_admit(id, 3).unwrap();
        assert_eq!(gov.try_admit(id, 3).unwrap_err(), AdmissionRejected::AlreadyRunning(id));
    }

    #[test]
    fn rejects_at_capacity() {
        let gov = ConcurrencyGovernor::new();
        let _a = gov.try_admit(Uuid::new_v4(), 1).unwrap();
        let err = gov.try_admit(Uuid::new_v4(), 1).unwrap_err();
        assert_eq!(err, AdmissionRejected::AtCapacity { running: 1, max: 1 });
        assert_eq!(err.reason(), "at_capacity");
    }

    #[test]
    fn drop_releases_slot() {
        let gov = ConcurrencyGovernor::new();
        let id = Uuid::new_v4();
        let permit = gov.try_admit(id, 1).unwrap();
        assert!(gov.is_running(id));
        drop(permit);
        assert_eq!(gov.running_count(), 0);
        assert!(gov.try_admit(Uuid::new_v4(), 1).is_ok());
    }

    #[test]
    fn release_survives_panic_in_holder() {
        let gov = ConcurrencyGovernor::new();
        let id = Uuid::new_v4();
        let cloned = gov.clone();
        let result = std::thread::spawn(move || {
            let _permit = cloned.try_admit(id, 1).unwrap();
            panic!("holder blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(gov.running_count(), 0);
    }

    #[test]
    fn group_claim_is_all_or_nothing() {
        let gov = ConcurrencyGovernor::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let _single = gov.try_admit(b, 5).unwrap();
        assert_eq!(
            gov.try_claim_group(&[a, b, c]).unwrap_err(),
            AdmissionRejected::AlreadyRunning(b)
        );
        assert!(!gov.is_running(a));
        assert!(!gov.is_running(c));
    }

    #[test]
    fn group_claim_ignores_slot_limit_and_dedups() {
        let gov = ConcurrencyGovernor::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _other = gov.try_admit(Uuid::new_v4(), 1).unwrap();
        let group = gov.try_claim_group(&[a, b, a]).unwrap();
        assert_eq!(group.bot_ids(), &[a, b]);
        assert_eq!(gov.running_count(), 3);
        drop(group);
        assert_eq!(gov.running_count(), 1);
    }
}
