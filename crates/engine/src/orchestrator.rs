//! Assignment orchestrator: drives one roster through the session lifecycle.
//!
//! ```text
//! pending ──► scoring ──► assigning ──► justifying ──► complete
//!    ▲           │            │
//!    └───────────┴────────────┘  (stage failure)
//! ```
//!
//! Scoring and matching run inline; the caller gets the session id once a
//! result exists. Explanation runs in a background task tracked here, so
//! callers and tests can await it with [`Orchestrator::wait_for_background`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rolematch_config::{AppConfig, LimitsConfig};
use rolematch_core::{
    AssignmentError, AssignmentResult, CompatibilityMatrix, DomainEvent, Error, EventBus,
    GroupStore, NewMember, Phase, Provider, Result, Role, Roster, RosterId, RosterStore, Session,
    SessionId, SessionStatus, SessionStore, StoreError, ROSTER_SIZE,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::assigner::{assign, validate_assignment};
use crate::executor::BatchExecutor;
use crate::explain::ExplanationGenerator;
use crate::scoring::ScoreMatrixBuilder;

/// Store handles injected at construction.
#[derive(Clone)]
pub struct Stores {
    pub rosters: Arc<dyn RosterStore>,
    pub groups: Arc<dyn GroupStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Use one backend for all three stores.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: RosterStore + GroupStore + SessionStore + 'static,
    {
        Self {
            rosters: store.clone(),
            groups: store.clone(),
            sessions: store,
        }
    }
}

/// Request-size ceilings.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_batch_rosters: usize,
    pub max_bulk_members: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_batch_rosters: 100,
            max_bulk_members: 500,
        }
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_batch_rosters: config.max_batch_rosters,
            max_bulk_members: config.max_bulk_members,
        }
    }
}

/// Resolve the role list for a phase.
///
/// The primary phase always uses the canonical roles; the secondary phase
/// requires exactly [`ROSTER_SIZE`] caller-named roles.
pub fn resolve_roles(
    phase: Phase,
    custom: Option<&[String]>,
) -> std::result::Result<Vec<Role>, AssignmentError> {
    match (phase, custom) {
        (Phase::Primary, None) => Ok(Role::canonical()),
        (Phase::Primary, Some(_)) => Err(AssignmentError::InvalidRoles(
            "custom roles apply only to the secondary phase".into(),
        )),
        (Phase::Secondary, Some(names)) => Role::custom(names),
        (Phase::Secondary, None) => Err(AssignmentError::RoleCountMismatch {
            expected: ROSTER_SIZE,
            actual: 0,
        }),
    }
}

/// Rosters with a pipeline currently in flight.
#[derive(Default)]
struct InFlight {
    rosters: Mutex<HashSet<RosterId>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<RosterId>> {
        self.rosters.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn acquire(self: &Arc<Self>, roster_id: &RosterId) -> Option<InFlightGuard> {
        if !self.lock().insert(roster_id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            registry: Arc::clone(self),
            roster_id: roster_id.clone(),
        })
    }

    fn contains(&self, roster_id: &RosterId) -> bool {
        self.lock().contains(roster_id)
    }
}

/// Releases the roster when dropped.
pub(crate) struct InFlightGuard {
    registry: Arc<InFlight>,
    roster_id: RosterId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.roster_id);
    }
}

/// A roster admitted to the pipeline, with its session in `scoring`.
pub(crate) struct Prepared {
    pub(crate) roster: Roster,
    pub(crate) roles: Vec<Role>,
    pub(crate) session_id: SessionId,
    _guard: InFlightGuard,
}

/// Everything a pipeline stage needs; shared with background tasks.
pub(crate) struct Pipeline {
    pub(crate) stores: Stores,
    pub(crate) scorer: ScoreMatrixBuilder,
    pub(crate) explainer: ExplanationGenerator,
    pub(crate) executor: BatchExecutor,
    pub(crate) events: Arc<EventBus>,
    in_flight: Arc<InFlight>,
}

impl Pipeline {
    async fn advance(&self, session_id: &SessionId, from: SessionStatus, to: SessionStatus) -> Result<()> {
        self.stores.sessions.update_status(session_id, to).await?;
        info!(session_id = %session_id, from = %from, to = %to, "Session advanced");
        self.publish_status(session_id, from, to);
        Ok(())
    }

    fn publish_status(&self, session_id: &SessionId, from: SessionStatus, to: SessionStatus) {
        self.events.publish(DomainEvent::SessionStatusChanged {
            session_id: session_id.to_string(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    /// Check preconditions, create a session and move it to `scoring`.
    pub(crate) async fn prepare(
        &self,
        roster_id: &RosterId,
        phase: Phase,
        custom_roles: Option<&[String]>,
    ) -> Result<Prepared> {
        let roster = self.stores.rosters.get_roster(roster_id).await?;
        if !self.stores.groups.is_active(&roster.group_id).await? {
            return Err(StoreError::GroupInactive(roster.group_id.to_string()).into());
        }
        if roster.len() != ROSTER_SIZE {
            return Err(AssignmentError::RosterIncomplete {
                expected: ROSTER_SIZE,
                actual: roster.len(),
            }
            .into());
        }
        let roles = resolve_roles(phase, custom_roles)?;

        let guard = self.in_flight.acquire(&roster.id).ok_or_else(|| Error::AlreadyRunning {
            roster_id: roster.id.to_string(),
        })?;

        let session = self
            .stores
            .sessions
            .create_session(&roster.id, phase, roles.clone())
            .await?;
        info!(session_id = %session.id, roster_id = %roster.id, "Session created");
        self.events.publish(DomainEvent::SessionCreated {
            session_id: session.id.to_string(),
            roster_id: roster.id.to_string(),
            timestamp: Utc::now(),
        });

        self.advance(&session.id, SessionStatus::Pending, SessionStatus::Scoring)
            .await?;

        Ok(Prepared {
            roster,
            roles,
            session_id: session.id,
            _guard: guard,
        })
    }

    /// Roll the session back to `pending` and report the failure.
    async fn fail(&self, prepared: &Prepared, stage: SessionStatus, err: Error) -> Error {
        let reason = err.to_string();
        warn!(
            session_id = %prepared.session_id,
            roster_id = %prepared.roster.id,
            stage = stage.as_str(),
            error = %reason,
            "Stage failed, reverting session"
        );

        match self
            .stores
            .sessions
            .revert_to_pending(&prepared.session_id, &reason)
            .await
        {
            Ok(_) => self.publish_status(&prepared.session_id, stage, SessionStatus::Pending),
            Err(e) => error!(session_id = %prepared.session_id, error = %e, "Could not revert session"),
        }

        self.events.publish(DomainEvent::StageFailed {
            session_id: prepared.session_id.to_string(),
            stage: stage.as_str().to_string(),
            error_message: reason,
            timestamp: Utc::now(),
        });
        err
    }

    /// Take a scoring outcome through matching, leaving the session in `justifying`.
    pub(crate) async fn complete_matching(
        &self,
        prepared: &Prepared,
        scored: std::result::Result<CompatibilityMatrix, AssignmentError>,
    ) -> Result<AssignmentResult> {
        match self.try_matching(prepared, scored).await {
            Ok(result) => Ok(result),
            Err((stage, err)) => Err(self.fail(prepared, stage, err).await),
        }
    }

    async fn try_matching(
        &self,
        prepared: &Prepared,
        scored: std::result::Result<CompatibilityMatrix, AssignmentError>,
    ) -> std::result::Result<AssignmentResult, (SessionStatus, Error)> {
        let sessions = &self.stores.sessions;
        let id = &prepared.session_id;

        let matrix = scored.map_err(|e| (SessionStatus::Scoring, Error::from(e)))?;
        sessions
            .attach_matrix(id, matrix.clone())
            .await
            .map_err(|e| (SessionStatus::Scoring, Error::from(e)))?;
        self.advance(id, SessionStatus::Scoring, SessionStatus::Assigning)
            .await
            .map_err(|e| (SessionStatus::Scoring, e))?;

        let result = assign(&prepared.roster, &prepared.roles, &matrix)
            .map_err(|e| (SessionStatus::Assigning, Error::from(e)))?;
        sessions
            .attach_result(id, result.clone())
            .await
            .map_err(|e| (SessionStatus::Assigning, Error::from(e)))?;
        self.advance(id, SessionStatus::Assigning, SessionStatus::Justifying)
            .await
            .map_err(|e| (SessionStatus::Assigning, e))?;

        Ok(result)
    }

    /// Explain one matched roster and complete its session.
    pub(crate) async fn justify(&self, prepared: Prepared, result: AssignmentResult) {
        let unit = self
            .executor
            .run_one(|| self.explainer.explain(&prepared.roster, &prepared.roles, &result))
            .await;
        self.finish_justification(prepared, result, unit.outcome).await;
    }

    /// Record the explanation outcome and move the session to `complete`.
    ///
    /// Explanation failures are absorbed: the result is kept without
    /// explanations and flagged.
    pub(crate) async fn finish_justification(
        &self,
        prepared: Prepared,
        base: AssignmentResult,
        outcome: std::result::Result<AssignmentResult, AssignmentError>,
    ) {
        let outcome = outcome.and_then(|explained| {
            validate_assignment(&prepared.roster, &prepared.roles, &explained).map(|()| explained)
        });

        let (result, generated) = match outcome {
            Ok(explained) => (explained, true),
            Err(e) => {
                warn!(session_id = %prepared.session_id, error = %e, "Explanations unavailable");
                let mut fallback = base;
                fallback.justifications_generated = false;
                fallback.justification_failed = true;
                (fallback, false)
            }
        };

        let id = &prepared.session_id;
        if let Err(e) = self.stores.sessions.attach_result(id, result).await {
            error!(session_id = %id, error = %e, "Could not store explained result");
        }
        if let Err(e) = self
            .advance(id, SessionStatus::Justifying, SessionStatus::Complete)
            .await
        {
            error!(session_id = %id, error = %e, "Could not complete session");
        }
        self.events.publish(DomainEvent::JustificationFinished {
            session_id: id.to_string(),
            generated,
            timestamp: Utc::now(),
        });
    }
}

/// A member submission aimed at one roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSubmission {
    pub roster_id: RosterId,
    pub member: NewMember,
}

/// Per-item outcome of a bulk submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub roster_id: RosterId,
    pub member_name: String,
    pub result: std::result::Result<Roster, StoreError>,
}

/// Single-roster entry point to the pipeline.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    limits: Limits,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        scorer: ScoreMatrixBuilder,
        explainer: ExplanationGenerator,
        executor: BatchExecutor,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                stores,
                scorer,
                explainer,
                executor,
                events,
                in_flight: Arc::new(InFlight::default()),
            }),
            limits: Limits::default(),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Wire the pipeline from configuration.
    pub fn from_config(
        stores: Stores,
        provider: Arc<dyn Provider>,
        config: &AppConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self::new(
            stores,
            ScoreMatrixBuilder::from_config(provider.clone(), &config.oracle),
            ExplanationGenerator::from_config(provider, &config.oracle),
            BatchExecutor::from_config(&config.executor),
            events,
        )
        .with_limits(Limits::from(&config.limits))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.pipeline.events.clone()
    }

    pub fn stores(&self) -> &Stores {
        &self.pipeline.stores
    }

    pub(crate) fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// `true` while a pipeline, including its background stage, holds the roster.
    pub fn is_running(&self, roster_id: &RosterId) -> bool {
        self.pipeline.in_flight.contains(roster_id)
    }

    /// Score and match `roster_id`, then explain in the background.
    ///
    /// Returns once the session is `justifying` and its result is stored.
    pub async fn start_assignment(
        &self,
        roster_id: &RosterId,
        phase: Phase,
        custom_roles: Option<Vec<String>>,
    ) -> Result<SessionId> {
        let pipeline = &self.pipeline;
        let prepared = pipeline
            .prepare(roster_id, phase, custom_roles.as_deref())
            .await?;

        let scored = pipeline
            .executor
            .run_one(|| pipeline.scorer.score(&prepared.roster, &prepared.roles))
            .await
            .outcome;
        let result = pipeline.complete_matching(&prepared, scored).await?;

        let session_id = prepared.session_id.clone();
        let background = Arc::clone(pipeline);
        self.spawn_background(async move { background.justify(prepared, result).await });

        Ok(session_id)
    }

    pub(crate) fn spawn_background(&self, task: impl Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(task);
        let mut handles = self.background.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Await every background task spawned so far, including ones spawned meanwhile.
    pub async fn wait_for_background(&self) {
        loop {
            let handles = {
                let mut tracked = self.background.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *tracked)
            };
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Background task panicked");
                }
            }
        }
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session> {
        Ok(self.pipeline.stores.sessions.get_session(session_id).await?)
    }

    pub async fn latest_session_for_roster(&self, roster_id: &RosterId) -> Result<Option<Session>> {
        Ok(self.pipeline.stores.sessions.latest_for_roster(roster_id).await?)
    }

    /// Re-explain one pairing of a completed session and store it.
    ///
    /// The member is looked up in the roster as it is now, so a member
    /// removed after the session completed yields `MemberNotFound`. The
    /// patch is applied inside the session store, so concurrent calls for
    /// different members of one session all persist.
    pub async fn regenerate_explanation(&self, session_id: &SessionId, member_id: &str) -> Result<String> {
        let stores = &self.pipeline.stores;
        let session = stores.sessions.get_session(session_id).await?;
        let result = match (session.status, session.result) {
            (SessionStatus::Complete, Some(result)) => result,
            (status, _) => {
                return Err(Error::SessionNotReady {
                    session_id: session_id.to_string(),
                    status: status.to_string(),
                });
            }
        };

        let roster = stores.rosters.get_roster(&session.roster_id).await?;
        let not_found = || StoreError::MemberNotFound {
            roster_id: roster.id.to_string(),
            member_id: member_id.to_string(),
        };
        let member = roster.member(member_id).ok_or_else(not_found)?;
        let pairing = result.pairing_for_member(member_id).ok_or_else(not_found)?;
        let role = session
            .roles
            .iter()
            .find(|r| r.id == pairing.role_id)
            .ok_or_else(|| Error::Internal(format!("role {} missing from session", pairing.role_id)))?;
        let score = pairing.score;

        let text = self
            .pipeline
            .executor
            .run_one(|| self.pipeline.explainer.explain_pair(member, role, score))
            .await
            .outcome?;

        stores.sessions.set_explanation(session_id, member_id, &text).await?;

        info!(session_id = %session_id, member_id, "Explanation regenerated");
        Ok(text)
    }

    /// Add members to rosters in bulk. Each submission succeeds or fails on its own.
    pub async fn submit_members(&self, submissions: Vec<MemberSubmission>) -> Result<Vec<SubmissionOutcome>> {
        if submissions.len() > self.limits.max_bulk_members {
            return Err(Error::BatchTooLarge {
                max: self.limits.max_bulk_members,
                actual: submissions.len(),
            });
        }

        let mut outcomes = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let member_name = submission.member.name.clone();
            let result = self
                .pipeline
                .stores
                .rosters
                .add_member(&submission.roster_id, submission.member)
                .await;
            if let Err(e) = &result {
                warn!(roster_id = %submission.roster_id, member = %member_name, error = %e, "Member rejected");
            }
            outcomes.push(SubmissionOutcome {
                roster_id: submission.roster_id,
                member_name,
                result,
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RetryPolicy;
    use crate::test_support::{is_explaining, is_scoring, happy_reply, new_member, ScriptedProvider};
    use rolematch_core::ProviderError;
    use rolematch_store::InMemoryStore;
    use std::time::Duration;

    struct Harness {
        orchestrator: Orchestrator,
        store: Arc<InMemoryStore>,
        provider: Arc<ScriptedProvider>,
    }

    fn quick_executor() -> BatchExecutor {
        BatchExecutor::new(
            5,
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(10),
                group_pause: Duration::ZERO,
                second_pass: true,
                jitter_max: Duration::ZERO,
            },
        )
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let provider = provider.shared();
        let orchestrator = Orchestrator::new(
            Stores::from_shared(store.clone()),
            ScoreMatrixBuilder::new(provider.clone(), "m"),
            ExplanationGenerator::new(provider.clone(), "m"),
            quick_executor(),
            Arc::new(EventBus::default()),
        );
        Harness {
            orchestrator,
            store,
            provider,
        }
    }

    async fn seeded_roster(store: &InMemoryStore, members: usize) -> Roster {
        let group = store.create_group("Cohort").await.unwrap();
        let roster = store.create_roster(&group.id, "Team").await.unwrap();
        let submissions = (0..members).map(new_member).collect();
        store.add_members(&roster.id, submissions).await.unwrap()
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) -> Vec<(SessionStatus, SessionStatus)> {
        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::SessionStatusChanged { from, to, .. } = event.as_ref() {
                transitions.push((*from, *to));
            }
        }
        transitions
    }

    #[tokio::test(start_paused = true)]
    async fn full_pipeline_reaches_complete() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        let mut rx = h.orchestrator.events().subscribe();

        let session_id = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();

        let session = h.orchestrator.get_session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Justifying);
        assert!(session.result.is_some());

        h.orchestrator.wait_for_background().await;
        let session = h.orchestrator.get_session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        let result = session.result.unwrap();
        assert_eq!(result.pairings.len(), ROSTER_SIZE);
        assert!(result.justifications_generated);
        assert!(!result.justification_failed);
        assert!((result.total_score - 1000.0).abs() < 1e-9);

        use SessionStatus::*;
        assert_eq!(
            drain(&mut rx),
            vec![
                (Pending, Scoring),
                (Scoring, Assigning),
                (Assigning, Justifying),
                (Justifying, Complete)
            ]
        );
        assert!(!h.orchestrator.is_running(&roster.id));
        assert_eq!(h.provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shape_mismatch_reverts_to_pending() {
        let h = harness(ScriptedProvider::new(|req| {
            if is_scoring(req) {
                let rows: Vec<Vec<u32>> = vec![vec![50; ROSTER_SIZE]; ROSTER_SIZE - 1];
                Ok(serde_json::to_string(&rows).unwrap())
            } else {
                happy_reply(req)
            }
        }));
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;

        let err = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Assignment(AssignmentError::ShapeMismatch { expected: 10, .. })
        ));

        let session = h
            .orchestrator
            .latest_session_for_roster(&roster.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.result.is_none());
        assert!(session.last_error.unwrap().contains("shape mismatch"));
        // validation errors are not retried
        assert_eq!(h.provider.calls(), 1);
        assert!(!h.orchestrator.is_running(&roster.id));
    }

    #[tokio::test(start_paused = true)]
    async fn justification_failure_still_completes() {
        let h = harness(ScriptedProvider::new(|req| {
            if is_explaining(req) {
                Ok("I'd rather not.".into())
            } else {
                happy_reply(req)
            }
        }));
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;

        let session_id = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();
        h.orchestrator.wait_for_background().await;

        let session = h.orchestrator.get_session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        let result = session.result.unwrap();
        assert!(!result.justifications_generated);
        assert!(result.justification_failed);
        assert_eq!(result.pairings.len(), ROSTER_SIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_scoring_failures_are_retried() {
        let failures = Arc::new(Mutex::new(0u32));
        let seen = failures.clone();
        let h = harness(ScriptedProvider::new(move |req| {
            if is_scoring(req) {
                let mut n = seen.lock().unwrap();
                *n += 1;
                if *n <= 2 {
                    return Err(ProviderError::RateLimited { retry_after_secs: 1 });
                }
            }
            happy_reply(req)
        }));
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;

        h.orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();
        assert_eq!(*failures.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_is_rejected_while_in_flight() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;

        h.orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();
        // background explanation still holds the roster
        let err = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { .. }));

        h.orchestrator.wait_for_background().await;
        assert!(h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .is_ok());
        h.orchestrator.wait_for_background().await;
        let history = h.store.list_for_roster(&roster.id).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn preconditions_are_checked_before_any_session() {
        let h = harness(ScriptedProvider::happy());
        let short = seeded_roster(&h.store, ROSTER_SIZE - 1).await;

        let err = h
            .orchestrator
            .start_assignment(&short.id, Phase::Primary, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Assignment(AssignmentError::RosterIncomplete { expected: 10, actual: 9 })
        ));

        let missing = h
            .orchestrator
            .start_assignment(&RosterId::from("nope"), Phase::Primary, None)
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::Store(StoreError::RosterNotFound(_))));

        assert!(h.orchestrator.latest_session_for_roster(&short.id).await.unwrap().is_none());
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn ended_group_blocks_assignment() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        h.store.end_group(&roster.group_id).await.unwrap();

        let err = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::GroupInactive(_))));
    }

    #[test]
    fn role_resolution_per_phase() {
        assert_eq!(resolve_roles(Phase::Primary, None).unwrap().len(), ROSTER_SIZE);
        assert!(matches!(
            resolve_roles(Phase::Secondary, None),
            Err(AssignmentError::RoleCountMismatch { expected: 10, actual: 0 })
        ));
        let names: Vec<String> = (1..=3).map(|i| format!("Role {i}")).collect();
        assert!(matches!(
            resolve_roles(Phase::Secondary, Some(&names)),
            Err(AssignmentError::RoleCountMismatch { actual: 3, .. })
        ));
        assert!(resolve_roles(Phase::Primary, Some(&names)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_phase_uses_custom_roles() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        let names: Vec<String> = (1..=ROSTER_SIZE).map(|i| format!("Squad lead {i}")).collect();

        let session_id = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Secondary, Some(names))
            .await
            .unwrap();
        h.orchestrator.wait_for_background().await;

        let session = h.orchestrator.get_session(&session_id).await.unwrap();
        assert_eq!(session.phase, Phase::Secondary);
        assert_eq!(session.roles[0].name, "Squad lead 1");
        let result = session.result.unwrap();
        assert!(result.pairings.iter().all(|p| p.role_id.starts_with("custom-")));
    }

    #[tokio::test(start_paused = true)]
    async fn regenerate_patches_one_pairing() {
        let h = harness(ScriptedProvider::new(|req| {
            if is_explaining(req) {
                Err(ProviderError::ApiError {
                    status_code: 400,
                    message: "nope".into(),
                })
            } else {
                happy_reply(req)
            }
        }));
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        let session_id = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();
        h.orchestrator.wait_for_background().await;

        let member_id = roster.members[3].id.clone();
        let text = h
            .orchestrator
            .regenerate_explanation(&session_id, &member_id)
            .await
            .unwrap();
        assert!(!text.is_empty());

        let result = h.orchestrator.get_session(&session_id).await.unwrap().result.unwrap();
        assert_eq!(result.pairing_for_member(&member_id).unwrap().explanation.as_deref(), Some(text.as_str()));
        // other pairings still lack explanations
        assert!(!result.justifications_generated);
        assert!(result.justification_failed);
    }

    #[tokio::test(start_paused = true)]
    async fn regenerate_requires_completed_session() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        let session = h
            .store
            .create_session(&roster.id, Phase::Primary, Role::canonical())
            .await
            .unwrap();

        let err = h
            .orchestrator
            .regenerate_explanation(&session.id, &roster.members[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotReady { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_regenerations_both_persist() {
        let h = harness(
            ScriptedProvider::new(|req| {
                if is_explaining(req) {
                    Ok("not json".into())
                } else {
                    happy_reply(req)
                }
            })
            .with_pair_delay(Duration::from_millis(100)),
        );
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        let session_id = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();
        h.orchestrator.wait_for_background().await;

        let (a, b) = (roster.members[1].id.clone(), roster.members[2].id.clone());
        let (first, second) = tokio::join!(
            h.orchestrator.regenerate_explanation(&session_id, &a),
            h.orchestrator.regenerate_explanation(&session_id, &b),
        );
        first.unwrap();
        second.unwrap();

        let result = h.orchestrator.get_session(&session_id).await.unwrap().result.unwrap();
        assert!(result.pairing_for_member(&a).unwrap().explanation.is_some());
        assert!(result.pairing_for_member(&b).unwrap().explanation.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn regenerate_for_removed_member_is_not_found() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE).await;
        let session_id = h
            .orchestrator
            .start_assignment(&roster.id, Phase::Primary, None)
            .await
            .unwrap();
        h.orchestrator.wait_for_background().await;

        let member_id = roster.members[0].id.clone();
        h.store.remove_member(&roster.id, &member_id).await.unwrap();

        let err = h
            .orchestrator
            .regenerate_explanation(&session_id, &member_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::MemberNotFound { .. })));
        assert_eq!(h.provider.calls(), 2);
    }

    #[tokio::test]
    async fn bulk_submission_reports_each_item() {
        let h = harness(ScriptedProvider::happy());
        let roster = seeded_roster(&h.store, ROSTER_SIZE - 1).await;

        let mut blank = new_member(99);
        blank.name = "  ".into();
        let submissions = vec![
            MemberSubmission { roster_id: roster.id.clone(), member: new_member(10) },
            MemberSubmission { roster_id: roster.id.clone(), member: new_member(11) },
            MemberSubmission { roster_id: RosterId::from("ghost"), member: blank },
        ];

        let outcomes = h.orchestrator.submit_members(submissions).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.as_ref().unwrap().complete);
        assert!(matches!(outcomes[1].result, Err(StoreError::RosterFull { .. })));
        assert!(outcomes[2].result.is_err());
    }

    #[tokio::test]
    async fn bulk_submission_is_bounded() {
        let h = harness(ScriptedProvider::happy());
        let orchestrator = h.orchestrator.with_limits(Limits {
            max_batch_rosters: 100,
            max_bulk_members: 2,
        });
        let submissions = (0..3)
            .map(|i| MemberSubmission {
                roster_id: RosterId::from("r"),
                member: new_member(i),
            })
            .collect();
        assert!(matches!(
            orchestrator.submit_members(submissions).await,
            Err(Error::BatchTooLarge { max: 2, actual: 3 })
        ));
    }
}
