use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// BotStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a `TeamBot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    #[default]
    Idle,
    Active,
    Working,
    Paused,
    Error,
}

impl BotStatus {
    /// Bots in these states may be picked as discussion responders.
    pub fn is_available(&self) -> bool {
        matches!(self, BotStatus::Idle | BotStatus::Active)
    }

    /// Attempt a transition driven by `event`, returning the next status.
    ///
    /// Valid transitions:
    /// - Idle | Paused | Error            + Start     -> Active
    /// - Idle | Active | Paused | Error   + BeginWork -> Working
    /// - Working                          + Finish    -> Active
    /// - any                              + Stop      -> Paused
    ///
    /// `error` is only ever set directly (by an operator update or a stored
    /// roster); `Start` is the way out of it.
    pub fn apply(self, event: BotEvent) -> Result<BotStatus, TransitionError> {
        use BotEvent as E;
        use BotStatus as S;

        let next = match (self, event) {
            (S::Idle | S::Paused | S::Error, E::Start) => S::Active,
            (S::Idle | S::Active | S::Paused | S::Error, E::BeginWork) => S::Working,
            (S::Working, E::Finish) => S::Active,
            (_, E::Stop) => S::Paused,
            _ => {
                return Err(TransitionError::InvalidTransition {
                    status: self,
                    event,
                })
            }
        };
        tracing::trace!(from = %self, event = %event, to = %next, "bot status transition");
        Ok(next)
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BotStatus::Idle => "idle",
            BotStatus::Active => "active",
            BotStatus::Working => "working",
            BotStatus::Paused => "paused",
            BotStatus::Error => "error",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// BotEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotEvent {
    Start,
    BeginWork,
    Finish,
    Stop,
}

impl fmt::Display for BotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BotEvent::Start => "Start",
            BotEvent::BeginWork => "BeginWork",
            BotEvent::Finish => "Finish",
            BotEvent::Stop => "Stop",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// An event was applied to a status that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition: cannot apply {event} in status {status}")]
    InvalidTransition { status: BotStatus, event: BotEvent },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_work_cycle() {
        let s = BotStatus::Idle;
        let s = s.apply(BotEvent::Start).unwrap();
        assert_eq!(s, BotStatus::Active);
        let s = s.apply(BotEvent::BeginWork).unwrap();
        assert_eq!(s, BotStatus::Working);
        let s = s.apply(BotEvent::Finish).unwrap();
        assert_eq!(s, BotStatus::Active);
    }

    #[test]
    fn start_while_working_is_rejected() {
        let err = BotStatus::Working.apply(BotEvent::Start).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                status: BotStatus::Working,
                event: BotEvent::Start
            }
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let s = BotStatus::Active.apply(BotEvent::Stop).unwrap();
        assert_eq!(s.apply(BotEvent::Stop).unwrap(), BotStatus::Paused);
    }

    #[test]
    fn stop_mid_flight_pauses() {
        assert_eq!(
            BotStatus::Working.apply(BotEvent::Stop).unwrap(),
            BotStatus::Paused
        );
    }

    #[test]
    fn stop_from_error_pauses() {
        assert_eq!(
            BotStatus::Error.apply(BotEvent::Stop).unwrap(),
            BotStatus::Paused
        );
    }

    #[test]
    fn start_leaves_error() {
        assert_eq!(
            BotStatus::Error.apply(BotEvent::Start).unwrap(),
            BotStatus::Active
        );
    }

    #[test]
    fn finish_requires_working() {
        assert!(BotStatus::Active.apply(BotEvent::Finish).is_err());
        assert!(BotStatus::Paused.apply(BotEvent::Finish).is_err());
    }

    #[test]
    fn availability() {
        assert!(BotStatus::Idle.is_available());
        assert!(BotStatus::Active.is_available());
        assert!(!BotStatus::Working.is_available());
        assert!(!BotStatus::Paused.is_available());
        assert!(!BotStatus::Error.is_available());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&BotStatus::Working).unwrap();
        assert_eq!(json, "\"working\"");
    }
}
