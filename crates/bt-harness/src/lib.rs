//! Remote execution harness for the bot team.
//!
//! - [`skill`]: the Skill Executor and Conversational Executor contracts
//! - [`http`]: reqwest-backed JSON implementation of both
//! - [`shutdown`]: cooperative shutdown for long-running loops

pub mod http;
pub mod shutdown;
pub mod skill;
