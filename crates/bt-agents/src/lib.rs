//! Bot orchestration and discussion engine.
//!
//! [`orchestrator::TeamOrchestrator`] owns the roster, the schedule and the
//! admission set; the execution pipeline, chain executor and delegation
//! protocol are implemented on it in [`pipeline`], [`chain`] and
//! [`delegation`]. [`discussion::DiscussionEngine`] reacts to its events and
//! serializes bot-to-bot conversation.

pub mod chain;
pub mod delegation;
pub mod discussion;
pub mod error;
pub mod governor;
pub mod orchestrator;
pub mod pipeline;
pub mod profiles;
pub mod registry;
pub mod scheduler;
mod working;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{OrchestratorOptions, TeamOrchestrator};
