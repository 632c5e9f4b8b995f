use std::collections::HashMap;

use bt_core::state_machine::BotStatus;
use bt_core::store::{self, StateStore, KEY_BOTS};
use bt_core::types::{Specialization, TeamBot};
use tracing::{info, warn};
use uuid::Uuid;

/// In-memory roster of bots, keyed by id.
#[derive(Debug, Default)]
pub struct BotRegistry {
    bots: HashMap<Uuid, TeamBot>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted roster. Bots saved while `working` come back as
    /// `active`; the execution they were in did not survive the restart.
    pub fn load(store: &dyn StateStore) -> store::Result<Self> {
        let saved: Vec<TeamBot> = store::load_json(store, KEY_BOTS)?.unwrap_or_default();
        let mut bots = HashMap::with_capacity(saved.len());
        for mut bot in saved {
            if bot.status == BotStatus::Working {
                warn!(bot_id = %bot.id, name = %bot.name, "bot was working at shutdown, resetting to active");
                bot.status = BotStatus::Active;
            }
            bots.insert(bot.id, bot);
        }
        info!(count = bots.len(), "roster loaded");
        Ok(Self { bots })
    }

    /// Write the whole roster, oldest bot first.
    pub fn persist(&self, store: &dyn StateStore) -> store::Result<()> {
        store::save_json(store, KEY_BOTS, &self.list())
    }

    pub fn insert(&mut self, bot: TeamBot) {
        self.bots.insert(bot.id, bot);
    }

    pub fn get(&self, id: Uuid) -> Option<&TeamBot> {
        self.bots.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut TeamBot> {
        self.bots.get_mut(&id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<TeamBot> {
        self.bots.remove(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.bots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Snapshot of every bot, ordered by creation time.
    pub fn list(&self) -> Vec<TeamBot> {
        let mut bots: Vec<TeamBot> = self.bots.values().cloned().collect();
        bots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        bots
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamBot> {
        self.bots.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TeamBot> {
        self.bots.values_mut()
    }

    pub fn has_specialization(&self, spec: Specialization) -> bool {
        self.bots.values().any(|b| b.specialization == spec)
    }

    pub fn bots_with(&self, spec: Specialization) -> Vec<&TeamBot> {
        self.bots
            .values()
            .filter(|b| b.specialization == spec)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::profile;
    use bt_core::store::MemoryStore;

    fn bot(spec: Specialization) -> TeamBot {
        let p = profile(spec);
        TeamBot::new(p.display_name, spec, "m", p.default_preferences())
    }

    #[test]
    fn load_resets_working_bots() {
        let store = MemoryStore::new();
        let mut reg = BotRegistry::new();
        let mut b = bot(Specialization::Debugger);
        b.status = BotStatus::Working;
        let id = b.id;
        reg.insert(b);
        reg.persist(&store).unwrap();

        let loaded = BotRegistry::load(&store).unwrap();
        assert_eq!(loaded.get(id).unwrap().status, BotStatus::Active);
    }

    #[test]
    fn empty_store_gives_empty_roster() {
        let reg = BotRegistry::load(&MemoryStore::new()).unwrap();
        assert!(reg.is_empty());
    }

    #[test]
    fn specialization_lookup() {
        let mut reg = BotRegistry::new();
        reg.insert(bot(Specialization::Architect));
        reg.insert(bot(Specialization::Architect));
        assert!(reg.has_specialization(Specialization::Architect));
        assert!(!reg.has_specialization(Specialization::Ceo));
        assert_eq!(reg.bots_with(Specialization::Architect).len(), 2);
    }
}
