//! Lifecycle state of a tool connection handle.

use super::{ParseConnectionStateError, ToolConnectionDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a tool connection handle.
///
/// A handle moves `connecting -> ready -> closed`, or straight from
/// `connecting` to `closed` when launch or handshake fails. Nothing leaves
/// `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// The subprocess is starting or the handshake is in flight.
    Connecting,
    /// The handshake completed and tools may be listed and called.
    Ready,
    /// The subprocess has been released.
    Closed,
}

impl ConnectionState {
    /// Returns the canonical text representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }

    /// Returns whether this state allows listing or calling tools.
    #[must_use]
    pub const fn can_use_tools(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Connecting, Self::Ready | Self::Closed) | (Self::Ready, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConnectionState {
    type Error = ParseConnectionStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "connecting" => Ok(Self::Connecting),
            "ready" => Ok(Self::Ready),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseConnectionStateError(value.to_owned())),
        }
    }
}

/// State holder enforcing the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
}

impl ConnectionLifecycle {
    /// Creates a lifecycle in the `connecting` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(self) -> ConnectionState {
        self.state
    }

    /// Marks the handshake as complete.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionDomainError::InvalidLifecycleTransition`] unless
    /// the lifecycle is `connecting`.
    pub fn mark_ready(&mut self) -> Result<(), ToolConnectionDomainError> {
        self.transition_to(ConnectionState::Ready)
    }

    /// Marks the connection as closed.
    ///
    /// Returns `false` when the lifecycle was already closed, so callers can
    /// skip releasing resources a second time.
    pub const fn mark_closed(&mut self) -> bool {
        if matches!(self.state, ConnectionState::Closed) {
            return false;
        }
        self.state = ConnectionState::Closed;
        true
    }

    fn transition_to(&mut self, target: ConnectionState) -> Result<(), ToolConnectionDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(ToolConnectionDomainError::InvalidLifecycleTransition {
                from: self.state.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }

        self.state = target;
        Ok(())
    }
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConnectionState::Connecting, ConnectionState::Ready, true)]
    #[case(ConnectionState::Connecting, ConnectionState::Closed, true)]
    #[case(ConnectionState::Ready, ConnectionState::Closed, true)]
    #[case(ConnectionState::Ready, ConnectionState::Connecting, false)]
    #[case(ConnectionState::Closed, ConnectionState::Ready, false)]
    #[case(ConnectionState::Closed, ConnectionState::Connecting, false)]
    #[case(ConnectionState::Ready, ConnectionState::Ready, false)]
    fn lifecycle_transition_matrix(
        #[case] current: ConnectionState,
        #[case] target: ConnectionState,
        #[case] expected: bool,
    ) {
        assert_eq!(current.can_transition_to(target), expected);
    }

    #[test]
    fn mark_closed_reports_first_close_only() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.mark_ready().expect("connecting -> ready is valid");

        assert!(lifecycle.mark_closed());
        assert!(!lifecycle.mark_closed());
        assert_eq!(lifecycle.state(), ConnectionState::Closed);
    }

    #[test]
    fn closed_lifecycle_cannot_become_ready() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.mark_closed();

        let result = lifecycle.mark_ready();
        assert!(matches!(
            result,
            Err(ToolConnectionDomainError::InvalidLifecycleTransition { .. })
        ));
    }

    #[rstest]
    #[case("ready", ConnectionState::Ready)]
    #[case(" Closed ", ConnectionState::Closed)]
    fn state_parses_from_text(#[case] input: &str, #[case] expected: ConnectionState) {
        assert_eq!(ConnectionState::try_from(input), Ok(expected));
    }

    #[test]
    fn state_rejects_unknown_text() {
        assert!(ConnectionState::try_from("running").is_err());
    }
}
