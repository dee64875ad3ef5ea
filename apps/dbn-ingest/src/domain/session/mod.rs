//! Session Lifecycle
//!
//! State machine for one ingestion session and the summary it reports when
//! the stream is over.
//!
//! ```text
//! Created -> Authenticating -> Subscribing -> Started -> Streaming -> Stopping -> Stopped
//!    |             |               |            |           |
//!    +-------------+---------------+------------+-----------+------> Stopped
//! ```
//!
//! Every state may fall straight to `Stopped` on failure. A session never
//! leaves `Stopped`.

use std::fmt;

use serde::Serialize;

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, archive opened, not yet connected.
    #[default]
    Created,
    /// Connecting and authenticating with the feed gateway.
    Authenticating,
    /// Issuing subscription requests.
    Subscribing,
    /// Setup complete; the stream has not been followed yet.
    Started,
    /// Inside the ingestion loop.
    Streaming,
    /// Stop requested; the loop exits at the next record boundary.
    Stopping,
    /// Terminal.
    Stopped,
}

impl SessionState {
    /// Whether moving to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Authenticating)
                | (Self::Authenticating, Self::Subscribing)
                | (Self::Subscribing, Self::Started)
                | (Self::Started, Self::Streaming)
                | (Self::Streaming, Self::Stopping)
                | (
                    Self::Created
                        | Self::Authenticating
                        | Self::Subscribing
                        | Self::Started
                        | Self::Streaming
                        | Self::Stopping,
                    Self::Stopped
                )
        )
    }

    /// Whether the session has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Numeric code for the state gauge.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Authenticating => 1,
            Self::Subscribing => 2,
            Self::Started => 3,
            Self::Streaming => 4,
            Self::Stopping => 5,
            Self::Stopped => 6,
        }
    }

    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Started => "started",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Lifecycle Errors
// =============================================================================

/// Misuse of the session lifecycle. Reported to the caller, never fatal to
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The stream has already been followed once.
    #[error("session already started")]
    AlreadyStarted,

    /// Stop was requested before the stream was followed.
    #[error("session not started")]
    NotStarted,

    /// An internal transition was attempted out of order.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// State that was requested.
        to: SessionState,
    },
}

// =============================================================================
// Summary
// =============================================================================

/// How the ingestion loop ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// The feed closed the stream.
    #[default]
    EndOfStream,
    /// A cooperative stop was observed.
    Stopped,
}

/// Counters reported by a completed session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Records pulled from the feed and archived.
    pub records: u64,
    /// Trades written.
    pub trades_inserted: u64,
    /// Trades collapsed onto an existing natural key.
    pub trades_duplicate: u64,
    /// Bars written.
    pub candles_inserted: u64,
    /// Bars collapsed onto an existing natural key.
    pub candles_duplicate: u64,
    /// Symbol mapping updates applied.
    pub mapping_updates: u64,
    /// Trades and bars skipped for lack of a ticker.
    pub unresolved: u64,
    /// Records with nothing to persist.
    pub ignored: u64,
    /// Bytes written to the archive, header included.
    pub archived_bytes: u64,
    /// How the loop ended.
    pub end: StreamEnd,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(SessionState::Created, SessionState::Authenticating ; "connect")]
    #[test_case(SessionState::Authenticating, SessionState::Subscribing ; "authenticated")]
    #[test_case(SessionState::Subscribing, SessionState::Started ; "subscribed")]
    #[test_case(SessionState::Started, SessionState::Streaming ; "follow")]
    #[test_case(SessionState::Streaming, SessionState::Stopping ; "stop requested")]
    #[test_case(SessionState::Stopping, SessionState::Stopped ; "stop observed")]
    #[test_case(SessionState::Subscribing, SessionState::Stopped ; "setup failure")]
    fn legal_transitions(from: SessionState, to: SessionState) {
        assert!(from.can_transition_to(to));
    }

    #[test_case(SessionState::Stopped, SessionState::Streaming ; "restart")]
    #[test_case(SessionState::Stopped, SessionState::Stopped ; "stop twice")]
    #[test_case(SessionState::Created, SessionState::Streaming ; "skip setup")]
    #[test_case(SessionState::Streaming, SessionState::Started ; "backwards")]
    fn illegal_transitions(from: SessionState, to: SessionState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn only_stopped_is_terminal() {
        assert!(SessionState::Stopped.is_terminal());
        assert!(!SessionState::Stopping.is_terminal());
    }

    #[test]
    fn summary_serializes_end_reason() {
        let summary = StreamSummary {
            records: 3,
            end: StreamEnd::Stopped,
            ..StreamSummary::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["records"], 3);
        assert_eq!(json["end"], "stopped");
    }
}
