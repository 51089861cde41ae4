//! # RoleMatch Core
//!
//! Domain types, traits, and error definitions for the RoleMatch assignment
//! pipeline. This crate has **no framework dependencies**: it defines the
//! model that the store, provider and engine crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (the oracle, the roster/group/session stores)
//! is a trait here. Implementations live in their respective crates, so the
//! pipeline can be tested against scripted oracles and in-memory stores.

pub mod error;
pub mod message;
pub mod provider;
pub mod roster;
pub mod assignment;
pub mod session;
pub mod store;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{AssignmentError, Error, ProviderError, Result, Retryable, StoreError};
pub use message::{Message, MessageRole};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use roster::{Group, GroupId, GroupStatus, Member, NewMember, Role, Roster, RosterId, MAX_TAGS, ROSTER_SIZE};
pub use assignment::{AssignmentResult, CompatibilityMatrix, Pairing, MAX_EXPLANATION_CHARS};
pub use session::{Phase, Session, SessionId, SessionStatus};
pub use store::{GroupStore, RosterStore, SessionStore};
pub use event::{DomainEvent, EventBus};
