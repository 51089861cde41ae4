//! Batch orchestrator: run many rosters through the pipeline together.
//!
//! Scoring for every admitted roster goes through one executor batch, then
//! each roster is matched. Explanations for all matched rosters run as one
//! tracked background batch. A failing roster never stops its siblings.

use std::sync::Arc;

use rolematch_core::{AssignmentResult, Error, Phase, Result, Role, Roster, RosterId, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assigner::{join_details, summarize, AssignmentStats, PairingDetail};
use crate::orchestrator::{Orchestrator, Pipeline, Prepared};

fn default_phase() -> Phase {
    Phase::Primary
}

/// One roster to run, with its phase and optional custom roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub roster_id: RosterId,
    #[serde(default = "default_phase")]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_roles: Option<Vec<String>>,
}

impl BatchRequest {
    pub fn primary(roster_id: RosterId) -> Self {
        Self {
            roster_id,
            phase: Phase::Primary,
            custom_roles: None,
        }
    }
}

/// Outcome for one roster of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub roster_id: RosterId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<PairingDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AssignmentStats>,
}

impl BatchEntry {
    fn new(roster_id: RosterId) -> Self {
        Self {
            roster_id,
            session_id: None,
            error: None,
            details: None,
            stats: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Attach joined rows and score statistics for a matched roster.
    ///
    /// A join failure is recorded as the entry's error.
    fn attach_details(&mut self, roster: &Roster, roles: &[Role], result: &AssignmentResult) {
        match join_details(roster, roles, result) {
            Ok(details) => {
                self.details = Some(details);
                self.stats = Some(summarize(result));
            }
            Err(e) => {
                warn!(roster_id = %self.roster_id, error = %e, "Could not join pairing details");
                self.error = Some(format!("details unavailable: {e}"));
            }
        }
    }
}

/// Aggregate batch outcome; entries follow request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub entries: Vec<BatchEntry>,
}

pub struct BatchOrchestrator {
    orchestrator: Arc<Orchestrator>,
}

impl BatchOrchestrator {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Score and match every requested roster, then explain them in the background.
    ///
    /// With `include_details`, successful entries carry joined pairing rows
    /// and score statistics.
    pub async fn start_batch(
        &self,
        requests: Vec<BatchRequest>,
        include_details: bool,
    ) -> Result<BatchSummary> {
        let max = self.orchestrator.limits().max_batch_rosters;
        if requests.len() > max {
            return Err(Error::BatchTooLarge {
                max,
                actual: requests.len(),
            });
        }

        let pipeline = self.orchestrator.pipeline();
        let mut entries: Vec<BatchEntry> = requests
            .iter()
            .map(|r| BatchEntry::new(r.roster_id.clone()))
            .collect();

        let mut admitted: Vec<(usize, Prepared)> = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            match pipeline
                .prepare(&request.roster_id, request.phase, request.custom_roles.as_deref())
                .await
            {
                Ok(prepared) => {
                    entries[index].session_id = Some(prepared.session_id.clone());
                    admitted.push((index, prepared));
                }
                Err(e) => entries[index].error = Some(e.to_string()),
            }
        }
        info!(requested = requests.len(), admitted = admitted.len(), "Batch admitted");

        let scored = pipeline
            .executor
            .run((0..admitted.len()).collect(), |k: usize| {
                let prepared = &admitted[k].1;
                pipeline.scorer.score(&prepared.roster, &prepared.roles)
            })
            .await;

        let mut matched: Vec<(Prepared, AssignmentResult)> = Vec::with_capacity(admitted.len());
        for ((index, prepared), outcome) in admitted.into_iter().zip(scored.into_outcomes()) {
            match pipeline.complete_matching(&prepared, outcome).await {
                Ok(result) => {
                    if include_details {
                        entries[index].attach_details(&prepared.roster, &prepared.roles, &result);
                    }
                    matched.push((prepared, result));
                }
                Err(e) => entries[index].error = Some(e.to_string()),
            }
        }

        if !matched.is_empty() {
            let background = Arc::clone(pipeline);
            self.orchestrator
                .spawn_background(async move { background.justify_batch(matched).await });
        }

        let total = entries.len();
        let successful = entries.iter().filter(|e| e.is_success()).count();
        info!(total, successful, "Batch matched");
        Ok(BatchSummary {
            total,
            successful,
            failed: total - successful,
            entries,
        })
    }

    pub async fn wait_for_background(&self) {
        self.orchestrator.wait_for_background().await;
    }
}

impl Pipeline {
    /// Explain every matched roster in one executor batch, then complete each session.
    pub(crate) async fn justify_batch(&self, matched: Vec<(Prepared, AssignmentResult)>) {
        let report = self
            .executor
            .run((0..matched.len()).collect(), |k: usize| {
                let (prepared, result) = &matched[k];
                self.explainer.explain(&prepared.roster, &prepared.roles, result)
            })
            .await;

        for ((prepared, result), outcome) in matched.into_iter().zip(report.into_outcomes()) {
            self.finish_justification(prepared, result, outcome).await;
        }
    }
}
