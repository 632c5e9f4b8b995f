//! Process host for the bot team.
//!
//! Wires the state store, the Skill Executor, the orchestrator and the
//! discussion engine together, then keeps the scheduler, discussion and
//! stats loops running until shutdown.

pub mod daemon;
