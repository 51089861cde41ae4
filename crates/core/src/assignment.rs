//! Score matrices and assignment results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::RosterId;

/// Maximum length (in characters) of a pairing explanation.
pub const MAX_EXPLANATION_CHARS: usize = 500;

/// Lowest and highest legal compatibility score.
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// N×N table of scores; row = member index, column = role index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityMatrix {
    pub roster_id: RosterId,
    pub scores: Vec<Vec<f64>>,
    pub generated_at: DateTime<Utc>,
}

impl CompatibilityMatrix {
    pub fn new(roster_id: RosterId, scores: Vec<Vec<f64>>) -> Self {
        Self {
            roster_id,
            scores,
            generated_at: Utc::now(),
        }
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.scores.len()
    }

    /// `true` when the matrix is `n`×`n` and every cell is finite and in range.
    pub fn is_well_formed(&self, n: usize) -> bool {
        self.scores.len() == n
            && self.scores.iter().all(|row| {
                row.len() == n
                    && row
                        .iter()
                        .all(|v| v.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(v))
            })
    }
}

/// One member matched to one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub member_id: String,
    pub role_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A bijection between a roster's members and a session's roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    /// Pairings in member order
    pub pairings: Vec<Pairing>,
    /// Sum of pairing scores
    pub total_score: f64,
    /// Every pairing carries an explanation
    #[serde(default)]
    pub justifications_generated: bool,
    /// The background explanation pass ran and could not produce explanations
    #[serde(default)]
    pub justification_failed: bool,
}

impl AssignmentResult {
    pub fn new(pairings: Vec<Pairing>) -> Self {
        let total_score = pairings.iter().map(|p| p.score).sum();
        Self {
            pairings,
            total_score,
            justifications_generated: false,
            justification_failed: false,
        }
    }

    pub fn pairing_for_member(&self, member_id: &str) -> Option<&Pairing> {
        self.pairings.iter().find(|p| p.member_id == member_id)
    }

    /// Set one member's explanation and recompute both explanation flags.
    ///
    /// Returns `false` when no pairing belongs to `member_id`.
    pub fn set_explanation(&mut self, member_id: &str, text: &str) -> bool {
        let mut found = false;
        for p in self.pairings.iter_mut().filter(|p| p.member_id == member_id) {
            p.explanation = Some(text.to_string());
            found = true;
        }
        self.justifications_generated = self.all_explained();
        if self.justifications_generated {
            self.justification_failed = false;
        }
        found
    }

    /// `true` when every pairing has a non-empty explanation.
    pub fn all_explained(&self) -> bool {
        !self.pairings.is_empty()
            && self
                .pairings
                .iter()
                .all(|p| p.explanation.as_deref().is_some_and(|e| !e.is_empty()))
    }
}
