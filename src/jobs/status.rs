//! Lifecycle status values and the transition rules that gate every mutation.
//!
//! The [`rules`] functions are the single source of truth for transition
//! legality: no component changes a [`Status`] without consulting them first.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::command::Action;

/// Lifecycle state owned per [`Identity`](super::identity::Identity).
///
/// Exactly one `Status` value exists per identity at any time. `Completed`,
/// `Failed`, and `Killed` are terminal; only `Kill` is reachable from a
/// non-Killed terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Initial state before any command has been processed
    InActive,
    /// Start accepted, worker init in progress
    Starting,
    /// Init complete, ready to process work
    Started,
    /// Actively processing work
    Running,
    /// Suspended; resumable
    Paused,
    /// Stopped by request
    Stopped,
    /// Work finished successfully
    Completed,
    /// Work ended with an error
    Failed,
    /// Forcibly terminated
    Killed,
}

impl Status {
    /// Check if this is a terminal state (no further transitions except Kill)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Killed)
    }

    /// Check if this is an active state (identity is live in the engine)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Started | Self::Running)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::InActive
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InActive => write!(f, "inactive"),
            Self::Starting => write!(f, "starting"),
            Self::Started => write!(f, "started"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Killed => write!(f, "killed"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::InActive),
            "starting" => Ok(Self::Starting),
            "started" => Ok(Self::Started),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "killed" => Ok(Self::Killed),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// A transition rejected by [`rules`]; the state is left unchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot {action} while status is {current}")]
pub struct TransitionError {
    pub action: Action,
    pub current: Status,
}

/// Pure transition-legality predicates.
///
/// Each predicate is side-effect free; [`check`] is the typed gate used by
/// the runner before any status mutation.
pub mod rules {
    use super::{Action, Status, TransitionError};

    /// A start is legal unless the identity is already running or killed
    pub fn can_start(current: Status) -> bool {
        !matches!(current, Status::Running | Status::Killed)
    }

    /// A pause is legal for anything live enough to suspend
    pub fn can_pause(current: Status) -> bool {
        !matches!(
            current,
            Status::InActive | Status::Completed | Status::Failed | Status::Killed
        )
    }

    /// A resume is legal only from a suspended, non-terminal state
    pub fn can_resume(current: Status) -> bool {
        !matches!(
            current,
            Status::InActive
                | Status::Running
                | Status::Completed
                | Status::Failed
                | Status::Killed
        )
    }

    /// A stop is legal for anything started and not already stopped or
    /// terminal; a repeated stop is rejected so no duplicate `Stopped`
    /// events are emitted
    pub fn can_stop(current: Status) -> bool {
        !matches!(
            current,
            Status::InActive
                | Status::Stopped
                | Status::Completed
                | Status::Failed
                | Status::Killed
        )
    }

    /// A kill is always legal except on an already-killed identity
    pub fn can_kill(current: Status) -> bool {
        !matches!(current, Status::Killed)
    }

    /// Work processing is legal once init has finished
    pub fn can_process(current: Status) -> bool {
        matches!(current, Status::Started | Status::Running)
    }

    /// Validate an action against the current status, producing the typed
    /// rejection surfaced to callers. `Check` is always legal.
    pub fn check(action: Action, current: Status) -> Result<(), TransitionError> {
        let allowed = match action {
            Action::Start => can_start(current),
            Action::Pause => can_pause(current),
            Action::Resume => can_resume(current),
            Action::Stop => can_stop(current),
            Action::Kill => can_kill(current),
            Action::Process => can_process(current),
            Action::Check => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(TransitionError { action, current })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 9] = [
        Status::InActive,
        Status::Starting,
        Status::Started,
        Status::Running,
        Status::Paused,
        Status::Stopped,
        Status::Completed,
        Status::Failed,
        Status::Killed,
    ];

    #[test]
    fn test_can_start_truth_table() {
        for status in ALL {
            let expected = !matches!(status, Status::Running | Status::Killed);
            assert_eq!(rules::can_start(status), expected, "can_start({status})");
        }
    }

    #[test]
    fn test_can_pause_truth_table() {
        for status in ALL {
            let expected = !matches!(
                status,
                Status::InActive | Status::Completed | Status::Failed | Status::Killed
            );
            assert_eq!(rules::can_pause(status), expected, "can_pause({status})");
        }
    }

    #[test]
    fn test_can_resume_truth_table() {
        for status in ALL {
            let expected = !matches!(
                status,
                Status::InActive
                    | Status::Running
                    | Status::Completed
                    | Status::Failed
                    | Status::Killed
            );
            assert_eq!(rules::can_resume(status), expected, "can_resume({status})");
        }
    }

    #[test]
    fn test_can_stop_truth_table() {
        for status in ALL {
            let expected = !matches!(
                status,
                Status::InActive
                    | Status::Stopped
                    | Status::Completed
                    | Status::Failed
                    | Status::Killed
            );
            assert_eq!(rules::can_stop(status), expected, "can_stop({status})");
        }
    }

    #[test]
    fn test_repeated_stop_is_rejected() {
        assert!(rules::can_stop(Status::Running));
        assert!(!rules::can_stop(Status::Stopped));
    }

    #[test]
    fn test_can_kill_truth_table() {
        for status in ALL {
            assert_eq!(
                rules::can_kill(status),
                status != Status::Killed,
                "can_kill({status})"
            );
        }
    }

    #[test]
    fn test_check_surfaces_typed_rejection() {
        let err = rules::check(Action::Resume, Status::Running).unwrap_err();
        assert_eq!(err.to_string(), "cannot resume while status is running");

        assert!(rules::check(Action::Start, Status::Stopped).is_ok());
        assert!(rules::check(Action::Check, Status::Killed).is_ok());
    }

    #[test]
    fn test_terminal_states() {
        assert!(Status::Completed.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::Killed.is_terminal());
        assert!(!Status::Paused.is_terminal());
        assert!(!Status::Stopped.is_terminal());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in ALL {
            let parsed: Status = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&Status::InActive).unwrap();
        assert_eq!(json, "\"in_active\"");
        let parsed: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Status::InActive);
    }
}
