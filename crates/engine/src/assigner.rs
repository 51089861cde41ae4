//! Optimal one-to-one matching of members to roles.
//!
//! Compatibility scores are turned into costs (`100 - score`) and solved
//! with the O(N³) Hungarian method using row/column potentials. The
//! resulting bijection maximizes the total score.

use std::collections::HashSet;

use rolematch_core::assignment::{MAX_SCORE, MIN_SCORE};
use rolematch_core::{
    AssignmentError, AssignmentResult, CompatibilityMatrix, Pairing, Role, Roster,
    MAX_EXPLANATION_CHARS, ROSTER_SIZE,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tolerance when comparing float totals.
const SCORE_EPSILON: f64 = 1e-6;

/// Solve the square min-cost assignment problem.
///
/// Returns `assignment[row] = column`. Costs must be finite.
pub fn solve_min_cost(cost: &[Vec<f64>]) -> Result<Vec<usize>, AssignmentError> {
    let n = cost.len();
    if cost.iter().any(|row| row.len() != n) {
        return Err(AssignmentError::ShapeMismatch {
            expected: n,
            detail: "cost matrix is not square".into(),
        });
    }
    if cost.iter().flatten().any(|c| !c.is_finite()) {
        return Err(AssignmentError::DegenerateMatching("non-finite cost".into()));
    }

    // 1-based indices; column 0 is the virtual start column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut col0 = 0usize;
        let mut min_slack = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[col0] = true;
            let row0 = owner[col0];
            let mut delta = f64::INFINITY;
            let mut col1 = 0usize;

            for col in 1..=n {
                if used[col] {
                    continue;
                }
                let reduced = cost[row0 - 1][col - 1] - u[row0] - v[col];
                if reduced < min_slack[col] {
                    min_slack[col] = reduced;
                    way[col] = col0;
                }
                if min_slack[col] < delta {
                    delta = min_slack[col];
                    col1 = col;
                }
            }

            if col1 == 0 {
                return Err(AssignmentError::DegenerateMatching(format!(
                    "no augmenting column for row {}",
                    row - 1
                )));
            }

            for col in 0..=n {
                if used[col] {
                    u[owner[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_slack[col] -= delta;
                }
            }

            col0 = col1;
            if owner[col0] == 0 {
                break;
            }
        }

        loop {
            let prev = way[col0];
            owner[col0] = owner[prev];
            col0 = prev;
            if col0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![usize::MAX; n];
    for col in 1..=n {
        if owner[col] != 0 {
            assignment[owner[col] - 1] = col - 1;
        }
    }
    Ok(assignment)
}

/// Maximize total score over a square score matrix.
pub fn optimal_matching(scores: &[Vec<f64>]) -> Result<Vec<usize>, AssignmentError> {
    let cost: Vec<Vec<f64>> = scores
        .iter()
        .map(|row| row.iter().map(|s| MAX_SCORE - s).collect())
        .collect();
    let assignment = solve_min_cost(&cost)?;
    check_permutation(&assignment, scores.len())?;
    Ok(assignment)
}

fn check_permutation(assignment: &[usize], n: usize) -> Result<(), AssignmentError> {
    if assignment.len() != n {
        return Err(AssignmentError::DegenerateMatching(format!(
            "{} rows matched, expected {n}",
            assignment.len()
        )));
    }
    let mut seen = HashSet::with_capacity(n);
    for (row, &col) in assignment.iter().enumerate() {
        if col >= n {
            return Err(AssignmentError::DegenerateMatching(format!(
                "row {row} left unmatched"
            )));
        }
        if !seen.insert(col) {
            return Err(AssignmentError::DegenerateMatching(format!(
                "column {col} matched twice"
            )));
        }
    }
    Ok(())
}

/// Check a score matrix against the roster and role list it claims to cover.
pub fn check_matrix(matrix: &CompatibilityMatrix, n: usize) -> Result<(), AssignmentError> {
    if matrix.size() != n {
        return Err(AssignmentError::ShapeMismatch {
            expected: n,
            detail: format!("got {} rows", matrix.size()),
        });
    }
    for (row, cells) in matrix.scores.iter().enumerate() {
        if cells.len() != n {
            return Err(AssignmentError::ShapeMismatch {
                expected: n,
                detail: format!("row {row} has {} columns", cells.len()),
            });
        }
        for (col, &value) in cells.iter().enumerate() {
            if !value.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                return Err(AssignmentError::ScoreOutOfRange { row, col, value });
            }
        }
    }
    Ok(())
}

/// Assign every member of `roster` to exactly one of `roles`.
///
/// Pairings come back in member order. Fails before touching the solver if
/// the roster, role list or matrix are the wrong size.
pub fn assign(
    roster: &Roster,
    roles: &[Role],
    matrix: &CompatibilityMatrix,
) -> Result<AssignmentResult, AssignmentError> {
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
    check_matrix(matrix, ROSTER_SIZE)?;

    let assignment = optimal_matching(&matrix.scores)?;

    let pairings = roster
        .members
        .iter()
        .zip(&assignment)
        .enumerate()
        .map(|(row, (member, &col))| Pairing {
            member_id: member.id.clone(),
            role_id: roles[col].id.clone(),
            score: matrix.scores[row][col],
            explanation: None,
        })
        .collect();

    let result = AssignmentResult::new(pairings);
    validate_assignment(roster, roles, &result)?;

    debug!(roster_id = %roster.id, total = result.total_score, "Matching solved");
    Ok(result)
}

/// Check that `result` is a well-formed bijection over `roster` and `roles`.
pub fn validate_assignment(
    roster: &Roster,
    roles: &[Role],
    result: &AssignmentResult,
) -> Result<(), AssignmentError> {
    let invalid = |msg: String| Err(AssignmentError::InvalidAssignment(msg));

    if result.pairings.len() != roster.len() || roster.len() != roles.len() {
        return invalid(format!(
            "{} pairings for {} members and {} roles",
            result.pairings.len(),
            roster.len(),
            roles.len()
        ));
    }

    let mut members = HashSet::new();
    let mut role_ids = HashSet::new();
    for pairing in &result.pairings {
        if roster.member(&pairing.member_id).is_none() {
            return invalid(format!("unknown member {}", pairing.member_id));
        }
        if !roles.iter().any(|r| r.id == pairing.role_id) {
            return invalid(format!("unknown role {}", pairing.role_id));
        }
        if !members.insert(pairing.member_id.as_str()) {
            return invalid(format!("member {} paired twice", pairing.member_id));
        }
        if !role_ids.insert(pairing.role_id.as_str()) {
            return invalid(format!("role {} paired twice", pairing.role_id));
        }
        if !pairing.score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&pairing.score) {
            return invalid(format!("score {} out of range", pairing.score));
        }
        if pairing
            .explanation
            .as_deref()
            .is_some_and(|text| text.chars().count() > MAX_EXPLANATION_CHARS)
        {
            return invalid(format!(
                "explanation for {} exceeds {MAX_EXPLANATION_CHARS} characters",
                pairing.member_id
            ));
        }
    }

    let sum: f64 = result.pairings.iter().map(|p| p.score).sum();
    if (sum - result.total_score).abs() > SCORE_EPSILON {
        return invalid(format!(
            "total {} does not match pairing sum {sum}",
            result.total_score
        ));
    }
    Ok(())
}

/// A pairing joined with the member and role it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingDetail {
    pub member_id: String,
    pub member_name: String,
    pub occupation: String,
    pub role_id: String,
    pub role_name: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Join pairings with member and role data, highest score first.
///
/// Ties keep member order.
pub fn join_details(
    roster: &Roster,
    roles: &[Role],
    result: &AssignmentResult,
) -> Result<Vec<PairingDetail>, AssignmentError> {
    let mut details = result
        .pairings
        .iter()
        .map(|pairing| {
            let member = roster.member(&pairing.member_id).ok_or_else(|| {
                AssignmentError::InvalidAssignment(format!("unknown member {}", pairing.member_id))
            })?;
            let role = roles.iter().find(|r| r.id == pairing.role_id).ok_or_else(|| {
                AssignmentError::InvalidAssignment(format!("unknown role {}", pairing.role_id))
            })?;
            Ok(PairingDetail {
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                occupation: member.occupation.clone(),
                role_id: role.id.clone(),
                role_name: role.name.clone(),
                score: pairing.score,
                explanation: pairing.explanation.clone(),
            })
        })
        .collect::<Result<Vec<_>, AssignmentError>>()?;

    details.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(details)
}

/// One histogram bucket, inclusive on both ends for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub label: String,
    pub count: usize,
}

/// Aggregate statistics over an assignment's pairing scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub histogram: Vec<ScoreBucket>,
}

const BUCKET_LABELS: [&str; 6] = ["0-49", "50-59", "60-69", "70-79", "80-89", "90-100"];

fn bucket_for(score: f64) -> usize {
    if score < 50.0 {
        0
    } else {
        (((score - 50.0) / 10.0) as usize + 1).min(BUCKET_LABELS.len() - 1)
    }
}

/// Summarize pairing scores: sum, mean, extremes and a histogram.
pub fn summarize(result: &AssignmentResult) -> AssignmentStats {
    let scores: Vec<f64> = result.pairings.iter().map(|p| p.score).collect();
    let mut counts = [0usize; BUCKET_LABELS.len()];
    for &score in &scores {
        counts[bucket_for(score)] += 1;
    }

    let count = scores.len();
    let total: f64 = scores.iter().sum();
    let (min, max) = if count == 0 {
        (0.0, 0.0)
    } else {
        scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)))
    };

    AssignmentStats {
        count,
        total,
        mean: if count == 0 { 0.0 } else { total / count as f64 },
        min,
        max,
        histogram: BUCKET_LABELS
            .iter()
            .zip(counts)
            .map(|(label, count)| ScoreBucket {
                label: (*label).to_string(),
                count,
            })
            .collect(),
    }
}
