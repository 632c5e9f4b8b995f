//! Core data model for the bot team runtime.
//!
//! - **types**: `TeamBot`, `BotTask`, work-log entries, team config, discussion messages
//! - **state_machine**: the bot lifecycle (`idle → active → working → ...`)
//! - **store**: the key→JSON State Store contract plus file and memory backends
//! - **config**: TOML configuration loaded from `~/.botteam/config.toml`

pub mod config;
pub mod state_machine;
pub mod store;
pub mod types;
