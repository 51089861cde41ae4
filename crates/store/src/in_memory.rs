//! In-memory store: one component owning groups, rosters and sessions.
//!
//! All three entity kinds live behind a single lock so membership changes
//! can check their group's status atomically. State lives as long as the
//! store value; nothing is global.

use async_trait::async_trait;
use chrono::Utc;
use rolematch_core::assignment::{AssignmentResult, CompatibilityMatrix};
use rolematch_core::error::StoreError;
use rolematch_core::roster::{Group, GroupId, GroupStatus, Member, NewMember, Role, Roster, RosterId, ROSTER_SIZE};
use rolematch_core::session::{Phase, Session, SessionId, SessionStatus};
use rolematch_core::store::{GroupStore, RosterStore, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Default ceiling for `add_members`.
pub const DEFAULT_BULK_LIMIT: usize = 500;

#[derive(Default)]
struct State {
    groups: HashMap<GroupId, Group>,
    rosters: HashMap<RosterId, Roster>,
    /// Creation order, for stable listing
    roster_order: Vec<RosterId>,
    sessions: HashMap<SessionId, Session>,
    /// Session history per roster, oldest first
    sessions_by_roster: HashMap<RosterId, Vec<SessionId>>,
}

impl State {
    fn group(&self, id: &GroupId) -> Result<&Group, StoreError> {
        self.groups
            .get(id)
            .ok_or_else(|| StoreError::GroupNotFound(id.to_string()))
    }

    /// Fetch a roster for mutation, enforcing that its group is active.
    fn mutable_roster(&mut self, id: &RosterId) -> Result<&mut Roster, StoreError> {
        let group_id = self
            .rosters
            .get(id)
            .map(|r| r.group_id.clone())
            .ok_or_else(|| StoreError::RosterNotFound(id.to_string()))?;
        if !self.group(&group_id)?.is_active() {
            return Err(StoreError::GroupInactive(group_id.to_string()));
        }
        self.rosters
            .get_mut(id)
            .ok_or_else(|| StoreError::RosterNotFound(id.to_string()))
    }

    fn session_mut(&mut self, id: &SessionId) -> Result<&mut Session, StoreError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }
}

/// An in-memory store implementing every store trait.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    bulk_limit: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            bulk_limit: DEFAULT_BULK_LIMIT,
        }
    }

    /// Override the `add_members` submission ceiling.
    pub fn with_bulk_limit(mut self, limit: usize) -> Self {
        self.bulk_limit = limit;
        self
    }

    async fn transition_group(&self, id: &GroupId, next: GroupStatus) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(id)
            .ok_or_else(|| StoreError::GroupNotFound(id.to_string()))?;
        group.transition(next)?;
        debug!(group_id = %id, status = %next, "Group status changed");
        Ok(group.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupStore for InMemoryStore {
    async fn create_group(&self, name: &str) -> Result<Group, StoreError> {
        let group = Group::new(name);
        self.state
            .write()
            .await
            .groups
            .insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn get_group(&self, id: &GroupId) -> Result<Group, StoreError> {
        self.state.read().await.group(id).cloned()
    }

    async fn end_group(&self, id: &GroupId) -> Result<Group, StoreError> {
        self.transition_group(id, GroupStatus::Ended).await
    }

    async fn archive_group(&self, id: &GroupId) -> Result<Group, StoreError> {
        self.transition_group(id, GroupStatus::Archived).await
    }
}

#[async_trait]
impl RosterStore for InMemoryStore {
    async fn create_roster(&self, group_id: &GroupId, name: &str) -> Result<Roster, StoreError> {
        let mut state = self.state.write().await;
        if !state.group(group_id)?.is_active() {
            return Err(StoreError::GroupInactive(group_id.to_string()));
        }
        let roster = Roster::new(group_id.clone(), name);
        state.roster_order.push(roster.id.clone());
        state.rosters.insert(roster.id.clone(), roster.clone());
        Ok(roster)
    }

    async fn get_roster(&self, id: &RosterId) -> Result<Roster, StoreError> {
        self.state
            .read()
            .await
            .rosters
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RosterNotFound(id.to_string()))
    }

    async fn list_rosters(&self, group_id: Option<&GroupId>) -> Result<Vec<Roster>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .roster_order
            .iter()
            .filter_map(|id| state.rosters.get(id))
            .filter(|r| group_id.is_none_or(|g| &r.group_id == g))
            .cloned()
            .collect())
    }

    async fn add_member(&self, roster_id: &RosterId, member: NewMember) -> Result<Roster, StoreError> {
        let member = Member::from_submission(member)?;
        let mut state = self.state.write().await;
        let roster = state.mutable_roster(roster_id)?;
        roster.push_member(member)?;
        debug!(roster_id = %roster_id, members = roster.len(), complete = roster.complete, "Member added");
        Ok(roster.clone())
    }

    async fn add_members(
        &self,
        roster_id: &RosterId,
        members: Vec<NewMember>,
    ) -> Result<Roster, StoreError> {
        if members.len() > self.bulk_limit {
            return Err(StoreError::BulkTooLarge {
                max: self.bulk_limit,
                actual: members.len(),
            });
        }
        let members = members
            .into_iter()
            .map(Member::from_submission)
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.write().await;
        let roster = state.mutable_roster(roster_id)?;
        if roster.len() + members.len() > ROSTER_SIZE {
            return Err(StoreError::RosterFull {
                roster_id: roster_id.to_string(),
                capacity: ROSTER_SIZE,
            });
        }
        for member in members {
            roster.push_member(member)?;
        }
        debug!(roster_id = %roster_id, members = roster.len(), complete = roster.complete, "Members added");
        Ok(roster.clone())
    }

    async fn remove_member(&self, roster_id: &RosterId, member_id: &str) -> Result<Roster, StoreError> {
        let mut state = self.state.write().await;
        let roster = state.mutable_roster(roster_id)?;
        roster.remove_member(member_id)?;
        debug!(roster_id = %roster_id, member_id, members = roster.len(), "Member removed");
        Ok(roster.clone())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(
        &self,
        roster_id: &RosterId,
        phase: Phase,
        roles: Vec<Role>,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        if !state.rosters.contains_key(roster_id) {
            return Err(StoreError::RosterNotFound(roster_id.to_string()));
        }
        let session = Session::new(roster_id.clone(), phase, roles);
        state
            .sessions_by_roster
            .entry(roster_id.clone())
            .or_default()
            .push(session.id.clone());
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.state
            .read()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    async fn latest_for_roster(&self, roster_id: &RosterId) -> Result<Option<Session>, StoreError> {
        let state = self.state.read().await;
        if !state.rosters.contains_key(roster_id) {
            return Err(StoreError::RosterNotFound(roster_id.to_string()));
        }
        Ok(state
            .sessions_by_roster
            .get(roster_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.sessions.get(id))
            .cloned())
    }

    async fn list_for_roster(&self, roster_id: &RosterId) -> Result<Vec<Session>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .sessions_by_roster
            .get(roster_id)
            .map(|ids| ids.iter().filter_map(|id| state.sessions.get(id)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_status(&self, id: &SessionId, status: SessionStatus) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        let session = state.session_mut(id)?;
        if !session.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                entity: format!("session {id}"),
                from: session.status.to_string(),
                to: status.to_string(),
            });
        }
        session.status = status;
        session.updated_at = Utc::now();
        if status != SessionStatus::Pending {
            session.last_error = None;
        }
        Ok(session.clone())
    }

    async fn revert_to_pending(&self, id: &SessionId, reason: &str) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        let session = state.session_mut(id)?;
        if session.status != SessionStatus::Pending
            && !session.status.can_transition_to(SessionStatus::Pending)
        {
            return Err(StoreError::InvalidTransition {
                entity: format!("session {id}"),
                from: session.status.to_string(),
                to: SessionStatus::Pending.to_string(),
            });
        }
        session.status = SessionStatus::Pending;
        session.last_error = Some(reason.to_string());
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn attach_matrix(
        &self,
        id: &SessionId,
        matrix: CompatibilityMatrix,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        let session = state.session_mut(id)?;
        session.matrix = Some(matrix);
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn attach_result(&self, id: &SessionId, result: AssignmentResult) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        let session = state.session_mut(id)?;
        session.result = Some(result);
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn set_explanation(
        &self,
        id: &SessionId,
        member_id: &str,
        text: &str,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        let session = state.session_mut(id)?;
        let patched = session
            .result
            .as_mut()
            .is_some_and(|result| result.set_explanation(member_id, text));
        if !patched {
            return Err(StoreError::MemberNotFound {
                roster_id: session.roster_id.to_string(),
                member_id: member_id.to_string(),
            });
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }
}
