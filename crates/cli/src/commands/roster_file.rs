//! Roster files: the JSON input format for `assign` and `batch`.
//!
//! ```json
//! {
//!   "name": "Expedition Alpha",
//!   "group": "Spring cohort",
//!   "roles": ["Navigator", "Medic", ...],
//!   "members": [
//!     {"name": "Ada", "occupation": "Engineer", "skills": ["welding"], "traits": ["calm"]}
//!   ]
//! }
//! ```

use std::path::Path;

use rolematch_core::{GroupStore, NewMember, Phase, Roster, RosterStore};
use rolematch_store::InMemoryStore;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RosterFile {
    pub name: String,
    /// Owning group name; defaults to the roster name
    #[serde(default)]
    pub group: Option<String>,
    /// Custom role names; present means the secondary phase
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    pub members: Vec<NewMember>,
}

impl RosterFile {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let file: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
        Ok(file)
    }

    /// Phase and custom roles, with `override_roles` taking priority.
    pub fn phase(&self, override_roles: Option<Vec<String>>) -> (Phase, Option<Vec<String>>) {
        match override_roles.or_else(|| self.roles.clone()) {
            Some(roles) => (Phase::Secondary, Some(roles)),
            None => (Phase::Primary, None),
        }
    }

    /// Create the group and roster in `store` and add every member.
    pub async fn seed(&self, store: &InMemoryStore) -> Result<Roster, Box<dyn std::error::Error>> {
        let group = store
            .create_group(self.group.as_deref().unwrap_or(&self.name))
            .await?;
        let roster = store.create_roster(&group.id, &self.name).await?;
        let roster = store.add_members(&roster.id, self.members.clone()).await?;
        tracing::debug!(roster = %roster.id, members = roster.len(), "Seeded roster");
        Ok(roster)
    }
}

/// Split a comma-separated role list.
pub fn parse_roles(list: &str) -> Vec<String> {
    list.split(',')
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}
