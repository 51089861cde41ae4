//! Store traits: the persistence seams the pipeline depends on.
//!
//! Rosters, groups and sessions are reached only through these traits, so
//! the orchestrators can be wired against any backend at construction time.

use async_trait::async_trait;

use crate::assignment::{AssignmentResult, CompatibilityMatrix};
use crate::error::StoreError;
use crate::roster::{Group, GroupId, NewMember, Role, Roster, RosterId};
use crate::session::{Phase, Session, SessionId, SessionStatus};

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create_group(&self, name: &str) -> Result<Group, StoreError>;

    async fn get_group(&self, id: &GroupId) -> Result<Group, StoreError>;

    async fn is_active(&self, id: &GroupId) -> Result<bool, StoreError> {
        Ok(self.get_group(id).await?.is_active())
    }

    /// active → ended. Rosters of an ended group become immutable.
    async fn end_group(&self, id: &GroupId) -> Result<Group, StoreError>;

    /// ended → archived.
    async fn archive_group(&self, id: &GroupId) -> Result<Group, StoreError>;
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn create_roster(&self, group_id: &GroupId, name: &str) -> Result<Roster, StoreError>;

    async fn get_roster(&self, id: &RosterId) -> Result<Roster, StoreError>;

    /// List rosters, optionally restricted to one group.
    async fn list_rosters(&self, group_id: Option<&GroupId>) -> Result<Vec<Roster>, StoreError>;

    async fn add_member(&self, roster_id: &RosterId, member: NewMember) -> Result<Roster, StoreError>;

    /// Add several members atomically: either all are added or none.
    async fn add_members(
        &self,
        roster_id: &RosterId,
        members: Vec<NewMember>,
    ) -> Result<Roster, StoreError>;

    async fn remove_member(&self, roster_id: &RosterId, member_id: &str) -> Result<Roster, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        roster_id: &RosterId,
        phase: Phase,
        roles: Vec<Role>,
    ) -> Result<Session, StoreError>;

    async fn get_session(&self, id: &SessionId) -> Result<Session, StoreError>;

    /// The most recently created session for a roster, if any.
    async fn latest_for_roster(&self, roster_id: &RosterId) -> Result<Option<Session>, StoreError>;

    /// All sessions for a roster, oldest first.
    async fn list_for_roster(&self, roster_id: &RosterId) -> Result<Vec<Session>, StoreError>;

    /// Move a session to `status`, rejecting illegal transitions.
    async fn update_status(&self, id: &SessionId, status: SessionStatus) -> Result<Session, StoreError>;

    /// Roll a session back to `pending`, recording why.
    async fn revert_to_pending(&self, id: &SessionId, reason: &str) -> Result<Session, StoreError>;

    async fn attach_matrix(
        &self,
        id: &SessionId,
        matrix: CompatibilityMatrix,
    ) -> Result<Session, StoreError>;

    async fn attach_result(&self, id: &SessionId, result: AssignmentResult) -> Result<Session, StoreError>;

    /// Patch one member's explanation in the stored result, atomically.
    async fn set_explanation(
        &self,
        id: &SessionId,
        member_id: &str,
        text: &str,
    ) -> Result<Session, StoreError>;
}
