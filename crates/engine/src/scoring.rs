//! Compatibility scoring: one oracle call per roster yields an N×N matrix.

use std::sync::Arc;

use rolematch_config::OracleConfig;
use rolematch_core::assignment::{MAX_SCORE, MIN_SCORE};
use rolematch_core::{
    AssignmentError, CompatibilityMatrix, Member, Message, Provider, ProviderRequest, Role,
    Roster, ROSTER_SIZE,
};
use tracing::{debug, info};

use crate::extract::parse_first_array;

pub(crate) const SCORING_SYSTEM_PROMPT: &str = "You are an expert organizational psychologist. \
Rate how well each person fits each role on a scale from 0 (no fit) to 100 (ideal fit). \
Reply with only a JSON array of arrays of numbers: one inner array per person, in the order \
given, each holding one score per role, in the order given. Do not add commentary.";

/// Builds compatibility matrices by asking the oracle.
pub struct ScoreMatrixBuilder {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ScoreMatrixBuilder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, oracle: &OracleConfig) -> Self {
        Self::new(provider, oracle.model.clone())
            .with_temperature(oracle.scoring_temperature)
            .with_max_tokens(oracle.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Compose the scoring prompt for `roster` against `roles`.
    pub fn build_request(
        &self,
        roster: &Roster,
        roles: &[Role],
    ) -> Result<ProviderRequest, AssignmentError> {
        if roster.len() != ROSTER_SIZE {
            return Err(AssignmentError::RosterIncomplete {
                expected: ROSTER_SIZE,
                actual: roster.len(),
            });
        }
        if roles.len() != ROSTER_SIZE {
            return Err(AssignmentError::RoleCountMismatch {
                expected: ROSTER_SIZE,
                actual: roles.len(),
            });
        }

        let people = roster
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| describe_member(i + 1, m))
            .collect::<Vec<_>>()
            .join("\n");
        let role_list = roles
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r.name))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "People ({n}):\n{people}\n\nRoles ({n}):\n{role_list}\n\n\
             Return a {n}x{n} JSON array where row i is person i and column j is role j.",
            n = ROSTER_SIZE
        );

        Ok(ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(SCORING_SYSTEM_PROMPT), Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }

    /// Score every member against every role.
    pub async fn score(
        &self,
        roster: &Roster,
        roles: &[Role],
    ) -> Result<CompatibilityMatrix, AssignmentError> {
        let request = self.build_request(roster, roles)?;
        debug!(roster_id = %roster.id, provider = self.provider.name(), "Requesting score matrix");

        let response = self.provider.complete(request).await?;
        let scores = parse_matrix(&response.message.content, roles.len())?;

        info!(roster_id = %roster.id, "Score matrix received");
        Ok(CompatibilityMatrix::new(roster.id.clone(), scores))
    }
}

fn describe_member(position: usize, member: &Member) -> String {
    format!(
        "{position}. {} | occupation: {} | skills: {} | traits: {}",
        member.name,
        member.occupation,
        member.skills.join(", "),
        member.traits.join(", ")
    )
}

/// Parse an `n`×`n` score matrix out of oracle text.
pub fn parse_matrix(text: &str, n: usize) -> Result<Vec<Vec<f64>>, AssignmentError> {
    let rows = parse_first_array(text)?;
    if rows.len() != n {
        return Err(AssignmentError::ShapeMismatch {
            expected: n,
            detail: format!("got {} rows", rows.len()),
        });
    }

    rows.iter()
        .enumerate()
        .map(|(row, value)| {
            let cells = value.as_array().ok_or_else(|| {
                AssignmentError::MalformedReply(format!("row {row} is not an array"))
            })?;
            if cells.len() != n {
                return Err(AssignmentError::ShapeMismatch {
                    expected: n,
                    detail: format!("row {row} has {} columns", cells.len()),
                });
            }
            cells
                .iter()
                .enumerate()
                .map(|(col, cell)| {
                    let value = cell.as_f64().ok_or_else(|| {
                        AssignmentError::MalformedReply(format!(
                            "cell ({row}, {col}) is not a number"
                        ))
                    })?;
                    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                        return Err(AssignmentError::ScoreOutOfRange { row, col, value });
                    }
                    Ok(value)
                })
                .collect::<Result<Vec<f64>, AssignmentError>>()
        })
        .collect()
}
