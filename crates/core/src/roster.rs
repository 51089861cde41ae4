//! Roster domain types: members, roles, rosters and their owning groups.
//!
//! A roster holds exactly [`ROSTER_SIZE`] members once complete. The
//! completeness flag is recomputed on every membership change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AssignmentError, StoreError};

/// Number of members in a complete roster, and number of roles per session.
pub const ROSTER_SIZE: usize = 10;

/// Maximum number of skill or trait tags per member.
pub const MAX_TAGS: usize = 5;

/// Unique identifier for a roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RosterId(pub String);

impl RosterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RosterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RosterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A member submission, before the store has assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub occupation: String,
    pub skills: Vec<String>,
    pub traits: Vec<String>,
}

impl NewMember {
    /// Check name, occupation and tag counts.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidMember("name must not be empty".into()));
        }
        if self.occupation.trim().is_empty() {
            return Err(StoreError::InvalidMember(format!(
                "occupation must not be empty for '{}'",
                self.name
            )));
        }
        validate_tags("skills", &self.name, &self.skills)?;
        validate_tags("traits", &self.name, &self.traits)?;
        Ok(())
    }
}

fn validate_tags(kind: &str, name: &str, tags: &[String]) -> Result<(), StoreError> {
    if tags.is_empty() || tags.len() > MAX_TAGS {
        return Err(StoreError::InvalidMember(format!(
            "'{name}' must have between 1 and {MAX_TAGS} {kind} (has {})",
            tags.len()
        )));
    }
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(StoreError::InvalidMember(format!(
            "'{name}' has a blank entry in {kind}"
        )));
    }
    Ok(())
}

/// A profiled person on a roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub occupation: String,
    pub skills: Vec<String>,
    pub traits: Vec<String>,
}

impl Member {
    /// Accept a validated submission, trimming tags and assigning a fresh id.
    pub fn from_submission(submission: NewMember) -> Result<Self, StoreError> {
        submission.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: submission.name.trim().to_string(),
            occupation: submission.occupation.trim().to_string(),
            skills: submission.skills.iter().map(|s| s.trim().to_string()).collect(),
            traits: submission.traits.iter().map(|t| t.trim().to_string()).collect(),
        })
    }
}

/// A role a member can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

const CANONICAL_ROLES: [(&str, &str); ROSTER_SIZE] = [
    ("coordinator", "Coordinator"),
    ("strategist", "Strategist"),
    ("researcher", "Researcher"),
    ("builder", "Builder"),
    ("designer", "Designer"),
    ("analyst", "Analyst"),
    ("communicator", "Communicator"),
    ("mentor", "Mentor"),
    ("negotiator", "Negotiator"),
    ("innovator", "Innovator"),
];

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The fixed role list used by the primary phase.
    pub fn canonical() -> Vec<Role> {
        CANONICAL_ROLES
            .iter()
            .map(|(id, name)| Role::new(*id, *name))
            .collect()
    }

    /// Build caller-named roles for the secondary phase.
    ///
    /// Names must be exactly [`ROSTER_SIZE`], non-blank and distinct
    /// (case-insensitive). Ids are `custom-1` .. `custom-N`.
    pub fn custom(names: &[String]) -> Result<Vec<Role>, AssignmentError> {
        if names.len() != ROSTER_SIZE {
            return Err(AssignmentError::RoleCountMismatch {
                expected: ROSTER_SIZE,
                actual: names.len(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        let mut roles = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                return Err(AssignmentError::InvalidRoles(format!(
                    "role #{} has an empty name",
                    i + 1
                )));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(AssignmentError::InvalidRoles(format!(
                    "duplicate role name '{name}'"
                )));
            }
            roles.push(Role::new(format!("custom-{}", i + 1), name));
        }
        Ok(roles)
    }
}

/// An ordered collection of members owned by a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pub id: RosterId,
    pub group_id: GroupId,
    pub name: String,
    pub members: Vec<Member>,
    /// `true` iff `members.len() == ROSTER_SIZE`
    pub complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Roster {
    pub fn new(group_id: GroupId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RosterId::new(),
            group_id,
            name: name.into(),
            members: Vec::new(),
            complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a member. Fails once the roster already holds [`ROSTER_SIZE`].
    pub fn push_member(&mut self, member: Member) -> Result<(), StoreError> {
        if self.members.len() >= ROSTER_SIZE {
            return Err(StoreError::RosterFull {
                roster_id: self.id.to_string(),
                capacity: ROSTER_SIZE,
            });
        }
        self.members.push(member);
        self.touch();
        Ok(())
    }

    /// Remove a member by id, returning it.
    pub fn remove_member(&mut self, member_id: &str) -> Result<Member, StoreError> {
        let pos = self
            .members
            .iter()
            .position(|m| m.id == member_id)
            .ok_or_else(|| StoreError::MemberNotFound {
                roster_id: self.id.to_string(),
                member_id: member_id.to_string(),
            })?;
        let removed = self.members.remove(pos);
        self.touch();
        Ok(removed)
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    fn touch(&mut self) {
        self.complete = self.members.len() == ROSTER_SIZE;
        self.updated_at = Utc::now();
    }
}

/// Lifecycle of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Active,
    Ended,
    Archived,
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupStatus::Active => "active",
            GroupStatus::Ended => "ended",
            GroupStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// Administrative container owning rosters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            status: GroupStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GroupStatus::Active
    }

    /// Move to a new status. Only active→ended and ended→archived are legal.
    pub fn transition(&mut self, next: GroupStatus) -> Result<(), StoreError> {
        let legal = matches!(
            (self.status, next),
            (GroupStatus::Active, GroupStatus::Ended) | (GroupStatus::Ended, GroupStatus::Archived)
        );
        if !legal {
            return Err(StoreError::InvalidTransition {
                entity: format!("group {}", self.id),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}
