//! Error types for the RoleMatch domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all RoleMatch operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Oracle transport errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Pipeline validation errors ---
    #[error("Assignment error: {0}")]
    Assignment(#[from] AssignmentError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("An assignment is already in flight for roster {roster_id}")]
    AlreadyRunning { roster_id: String },

    #[error("Session {session_id} is {status}, expected complete")]
    SessionNotReady { session_id: String, status: String },

    #[error("Batch too large: {actual} items submitted, at most {max} allowed")]
    BatchTooLarge { max: usize, actual: usize },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a failure as transient (worth retrying) or terminal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::Network(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::AuthenticationFailed(_) | ProviderError::NotConfigured(_) => false,
        }
    }
}

/// Validation failures raised by the scoring, matching and explanation stages.
#[derive(Debug, Clone, Error)]
pub enum AssignmentError {
    #[error("Roster must have exactly {expected} members (has {actual})")]
    RosterIncomplete { expected: usize, actual: usize },

    #[error("Must supply exactly {expected} roles (got {actual})")]
    RoleCountMismatch { expected: usize, actual: usize },

    #[error("Invalid roles: {0}")]
    InvalidRoles(String),

    #[error("Malformed oracle reply: {0}")]
    MalformedReply(String),

    #[error("Score matrix shape mismatch: expected {expected}x{expected}, {detail}")]
    ShapeMismatch { expected: usize, detail: String },

    #[error("Score at row {row}, column {col} is out of range [0, 100]: {value}")]
    ScoreOutOfRange { row: usize, col: usize, value: f64 },

    #[error("Solver produced a degenerate matching: {0}")]
    DegenerateMatching(String),

    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),

    #[error("Invalid explanations: {0}")]
    InvalidExplanations(String),

    #[error("Oracle call failed: {0}")]
    Provider(#[from] ProviderError),
}

impl Retryable for AssignmentError {
    fn is_retryable(&self) -> bool {
        match self {
            AssignmentError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Roster not found: {0}")]
    RosterNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Member {member_id} not found in roster {roster_id}")]
    MemberNotFound { roster_id: String, member_id: String },

    #[error("Group {0} is not active")]
    GroupInactive(String),

    #[error("Roster {roster_id} already holds {capacity} members")]
    RosterFull { roster_id: String, capacity: usize },

    #[error("Invalid member: {0}")]
    InvalidMember(String),

    #[error("Invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("Bulk submission too large: {actual} members, at most {max} allowed")]
    BulkTooLarge { max: usize, actual: usize },
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Provider(e) => e.is_retryable(),
            Error::Assignment(e) => e.is_retryable(),
            _ => false,
        }
    }
}
