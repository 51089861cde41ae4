//! Natural-language explanations for assigned pairings.
//!
//! One oracle call covers a whole assignment; a single pairing can also be
//! re-explained on demand.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rolematch_config::OracleConfig;
use rolematch_core::{
    AssignmentError, AssignmentResult, Member, Message, Pairing, Provider, ProviderRequest, Role,
    Roster, MAX_EXPLANATION_CHARS, ROSTER_SIZE,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::extract::parse_first_array;

pub(crate) const EXPLANATION_SYSTEM_PROMPT: &str = "You are an experienced team coach. \
For each person below, explain in at most 500 characters why their assigned role suits them, \
drawing on their occupation, skills and traits. Reply with only a JSON array of objects of the \
form {\"memberId\": \"<id>\", \"text\": \"<explanation>\"}, one object per person.";

pub(crate) const PAIR_SYSTEM_PROMPT: &str = "You are an experienced team coach. \
Explain in at most 500 characters why the role below suits this person, drawing on their \
occupation, skills and traits. Reply with only the explanation text.";

#[derive(Debug, Deserialize)]
struct ExplanationEntry {
    #[serde(rename = "memberId")]
    member_id: String,
    text: String,
}

/// Asks the oracle to justify assignments.
pub struct ExplanationGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ExplanationGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, oracle: &OracleConfig) -> Self {
        Self::new(provider, oracle.model.clone())
            .with_temperature(oracle.explanation_temperature)
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

    fn request(&self, system: &str, prompt: String) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Compose one prompt covering every pairing of `result`, best match first.
    pub fn build_request(
        &self,
        roster: &Roster,
        roles: &[Role],
        result: &AssignmentResult,
    ) -> Result<ProviderRequest, AssignmentError> {
        if roster.len() != ROSTER_SIZE {
            return Err(AssignmentError::RosterIncomplete {
                expected: ROSTER_SIZE,
                actual: roster.len(),
            });
        }
        if result.pairings.len() != ROSTER_SIZE {
            return Err(AssignmentError::InvalidAssignment(format!(
                "{} pairings, expected {ROSTER_SIZE}",
                result.pairings.len()
            )));
        }

        let mut ranked: Vec<&Pairing> = result.pairings.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let lines = ranked
            .into_iter()
            .map(|pairing| {
                let member = roster.member(&pairing.member_id).ok_or_else(|| {
                    AssignmentError::InvalidAssignment(format!(
                        "unknown member {}",
                        pairing.member_id
                    ))
                })?;
                let role = roles.iter().find(|r| r.id == pairing.role_id).ok_or_else(|| {
                    AssignmentError::InvalidAssignment(format!("unknown role {}", pairing.role_id))
                })?;
                Ok(format!(
                    "- memberId: {} | {} | role: {} | score: {:.0}",
                    member.id,
                    profile(member),
                    role.name,
                    pairing.score
                ))
            })
            .collect::<Result<Vec<_>, AssignmentError>>()?;

        Ok(self.request(
            EXPLANATION_SYSTEM_PROMPT,
            format!("Assignments:\n{}", lines.join("\n")),
        ))
    }

    /// Explain every pairing. Returns a copy of `result` with explanations filled in.
    pub async fn explain(
        &self,
        roster: &Roster,
        roles: &[Role],
        result: &AssignmentResult,
    ) -> Result<AssignmentResult, AssignmentError> {
        let request = self.build_request(roster, roles, result)?;
        debug!(roster_id = %roster.id, pairings = result.pairings.len(), "Requesting explanations");

        let response = self.provider.complete(request).await?;
        let mut texts = parse_explanations(&response.message.content, result)?;

        let mut explained = result.clone();
        for pairing in &mut explained.pairings {
            pairing.explanation = texts.remove(&pairing.member_id);
        }
        explained.justifications_generated = explained.all_explained();
        explained.justification_failed = false;

        info!(roster_id = %roster.id, "Explanations generated");
        Ok(explained)
    }

    /// Explain a single member/role pairing.
    pub async fn explain_pair(
        &self,
        member: &Member,
        role: &Role,
        score: f64,
    ) -> Result<String, AssignmentError> {
        let prompt = format!(
            "Person: {}\nAssigned role: {}\nCompatibility score: {score:.0}",
            profile(member),
            role.name
        );
        let response = self.provider.complete(self.request(PAIR_SYSTEM_PROMPT, prompt)).await?;
        clean_text(&member.id, &response.message.content)
    }
}

fn profile(member: &Member) -> String {
    format!(
        "{} | occupation: {} | skills: {} | traits: {}",
        member.name,
        member.occupation,
        member.skills.join(", "),
        member.traits.join(", ")
    )
}

fn clean_text(member_id: &str, raw: &str) -> Result<String, AssignmentError> {
    let trimmed = raw.trim();
    let text = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();

    if text.is_empty() {
        return Err(AssignmentError::InvalidExplanations(format!(
            "empty explanation for member {member_id}"
        )));
    }
    if text.chars().count() > MAX_EXPLANATION_CHARS {
        return Err(AssignmentError::InvalidExplanations(format!(
            "explanation for member {member_id} exceeds {MAX_EXPLANATION_CHARS} characters"
        )));
    }
    Ok(text.to_string())
}

/// Parse `[{memberId, text}, ...]` and check it covers exactly the pairings of `result`.
pub fn parse_explanations(
    text: &str,
    result: &AssignmentResult,
) -> Result<HashMap<String, String>, AssignmentError> {
    let expected: HashSet<&str> = result.pairings.iter().map(|p| p.member_id.as_str()).collect();
    let mut texts = HashMap::with_capacity(expected.len());

    for item in parse_first_array(text)? {
        let entry: ExplanationEntry = serde_json::from_value(item)
            .map_err(|e| AssignmentError::MalformedReply(format!("bad explanation entry: {e}")))?;

        if !expected.contains(entry.member_id.as_str()) {
            return Err(AssignmentError::InvalidExplanations(format!(
                "unknown member {}",
                entry.member_id
            )));
        }
        let cleaned = clean_text(&entry.member_id, &entry.text)?;
        if texts.insert(entry.member_id.clone(), cleaned).is_some() {
            return Err(AssignmentError::InvalidExplanations(format!(
                "member {} explained twice",
                entry.member_id
            )));
        }
    }

    if let Some(missing) = result
        .pairings
        .iter()
        .find(|p| !texts.contains_key(&p.member_id))
    {
        return Err(AssignmentError::InvalidExplanations(format!(
            "missing explanation for member {}",
            missing.member_id
        )));
    }
    Ok(texts)
}
