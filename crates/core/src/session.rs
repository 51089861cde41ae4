//! Assignment sessions: one pipeline execution per session.
//!
//! ```text
//! pending ──► scoring ──► assigning ──► justifying ──► complete
//!    ▲           │            │
//!    └───────────┴────────────┘   (rollback on scoring/matching failure)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assignment::{AssignmentResult, CompatibilityMatrix};
use crate::roster::{Role, RosterId};

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which role list a session assigns against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The canonical role list
    Primary,
    /// Caller-supplied role names
    Secondary,
}

/// Pipeline stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Scoring,
    Assigning,
    Justifying,
    Complete,
}

impl SessionStatus {
    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Scoring)
                | (Scoring, Assigning)
                | (Assigning, Justifying)
                | (Justifying, Complete)
                | (Scoring, Pending)
                | (Assigning, Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Complete
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Scoring => "scoring",
            SessionStatus::Assigning => "assigning",
            SessionStatus::Justifying => "justifying",
            SessionStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of the scoring → matching → justification pipeline for a roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub roster_id: RosterId,
    pub phase: Phase,
    pub roles: Vec<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<CompatibilityMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AssignmentResult>,
    pub status: SessionStatus,
    /// Message of the last failure that rolled the session back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(roster_id: RosterId, phase: Phase, roles: Vec<Role>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            roster_id,
            phase,
            roles,
            matrix: None,
            result: None,
            status: SessionStatus::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_legal() {
        use SessionStatus::*;
        let path = [Pending, Scoring, Assigning, Justifying, Complete];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn rollback_only_from_synchronous_stages() {
        use SessionStatus::*;
        assert!(Scoring.can_transition_to(Pending));
        assert!(Assigning.can_transition_to(Pending));
        assert!(!Justifying.can_transition_to(Pending));
        assert!(!Complete.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Complete));
    }

    #[test]
    fn new_session_starts_pending() {
        let session = Session::new(RosterId::from("r1"), Phase::Primary, Role::canonical());
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.result.is_none());
        assert_eq!(
            serde_json::to_string(&session.status).unwrap(),
            "\"pending\""
        );
    }
}
