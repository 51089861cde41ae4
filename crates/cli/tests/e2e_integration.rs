//! End-to-end integration tests for the RoleMatch pipeline.
//!
//! These tests drive the real store, orchestrators, executor and solver
//! against a scripted oracle, from roster creation to a complete session.

use std::sync::Arc;

use rolematch_config::AppConfig;
use rolematch_core::error::ProviderError;
use rolematch_core::event::{DomainEvent, EventBus};
use rolematch_core::message::Message;
use rolematch_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use rolematch_core::{
    AssignmentError, Error, GroupStore, NewMember, Phase, RosterId, RosterStore, SessionStatus,
    ROSTER_SIZE,
};
use rolematch_engine::assigner::{join_details, summarize};
use rolematch_engine::{BatchOrchestrator, BatchRequest, Orchestrator, Stores};
use rolematch_store::InMemoryStore;
use tokio::sync::Notify;

// ── Scripted oracle ──────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Scoring,
    Explaining,
    Pair,
}

fn kind_of(request: &ProviderRequest) -> Kind {
    let system = &request.messages[0].content;
    if system.contains("JSON array of arrays") {
        Kind::Scoring
    } else if system.contains("memberId") {
        Kind::Explaining
    } else {
        Kind::Pair
    }
}

type Script = Box<dyn Fn(Kind, &ProviderRequest) -> Result<String, ProviderError> + Send + Sync>;

/// An oracle answering from a closure, optionally parking explanation
/// requests until released.
struct ScriptedProvider {
    script: Script,
    hold: Option<Arc<Notify>>,
    calls: std::sync::Mutex<Vec<Kind>>,
}

impl ScriptedProvider {
    fn new(
        script: impl Fn(Kind, &ProviderRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            hold: None,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn happy() -> Self {
        Self::new(happy_reply)
    }

    fn holding(mut self, gate: Arc<Notify>) -> Self {
        self.hold = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_of(&self, kind: Kind) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let kind = kind_of(&request);
        self.calls.lock().unwrap().push(kind);
        if kind == Kind::Explaining {
            if let Some(gate) = &self.hold {
                gate.notified().await;
            }
        }
        let text = (self.script)(kind, &request)?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }
}

fn graded_matrix(rows: usize, cols: usize) -> String {
    let scores: Vec<Vec<f64>> = (0..rows)
        .map(|i| {
            (0..cols)
                .map(|j| (100.0 - 5.0 * (i as f64 - j as f64).abs()).max(0.0))
                .collect()
        })
        .collect();
    serde_json::to_string(&scores).unwrap()
}

fn explanations(request: &ProviderRequest) -> String {
    let entries: Vec<serde_json::Value> = request.messages[1]
        .content
        .split("memberId: ")
        .skip(1)
        .filter_map(|rest| rest.split_whitespace().next())
        .map(|id| serde_json::json!({"memberId": id, "text": "Steady hands and a plan."}))
        .collect();
    serde_json::to_string(&entries).unwrap()
}

fn happy_reply(kind: Kind, request: &ProviderRequest) -> Result<String, ProviderError> {
    Ok(match kind {
        Kind::Scoring => format!("Here are the scores:\n{}", graded_matrix(ROSTER_SIZE, ROSTER_SIZE)),
        Kind::Explaining => explanations(request),
        Kind::Pair => "A natural fit for the role.".into(),
    })
}

// ── Harness ──────────────────────────────────────────────────────────────

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.executor.base_delay_ms = 1;
    config.executor.group_pause_ms = 0;
    config.executor.jitter_max_ms = 1;
    config
}

fn orchestrator(store: Arc<InMemoryStore>, provider: Arc<ScriptedProvider>) -> Orchestrator {
    Orchestrator::from_config(
        Stores::from_shared(store),
        provider,
        &fast_config(),
        Arc::new(EventBus::default()),
    )
}

async fn seeded_roster(store: &InMemoryStore, name: &str) -> RosterId {
    let group = store.create_group("Cohort").await.unwrap();
    let roster = store.create_roster(&group.id, name).await.unwrap();
    let members = (0..ROSTER_SIZE)
        .map(|i| NewMember {
            name: format!("{name} member {i}"),
            occupation: format!("Trade {i}"),
            skills: vec!["logistics".into(), format!("skill-{i}")],
            traits: vec!["patient".into()],
        })
        .collect();
    let roster = store.add_members(&roster.id, members).await.unwrap();
    assert!(roster.complete);
    roster.id
}

fn drain_statuses(rx: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) -> Vec<SessionStatus> {
    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::SessionStatusChanged { to, .. } = event.as_ref() {
            statuses.push(*to);
        }
    }
    statuses
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_full_pipeline_completes_with_explanations() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Alpha").await;
    let provider = Arc::new(ScriptedProvider::happy());
    let orch = orchestrator(store.clone(), provider.clone());
    let mut rx = orch.events().subscribe();

    let session_id = orch
        .start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap();
    orch.wait_for_background().await;

    let session = orch.get_session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    let result = session.result.as_ref().unwrap();
    assert_eq!(result.pairings.len(), ROSTER_SIZE);
    assert!(result.justifications_generated);
    assert!(!result.justification_failed);
    assert_eq!(result.total_score, 1000.0);

    assert_eq!(
        drain_statuses(&mut rx),
        vec![
            SessionStatus::Scoring,
            SessionStatus::Assigning,
            SessionStatus::Justifying,
            SessionStatus::Complete,
        ]
    );
    assert_eq!(provider.calls(), 2);

    let roster = store.get_roster(&roster_id).await.unwrap();
    let details = join_details(&roster, &session.roles, result).unwrap();
    assert_eq!(details.len(), ROSTER_SIZE);
    assert!(details.iter().all(|d| d.explanation.is_some()));
    let stats = summarize(result);
    assert_eq!(stats.mean, 100.0);
}

#[tokio::test]
async fn e2e_short_matrix_reverts_session_to_pending() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Bravo").await;
    let provider = Arc::new(ScriptedProvider::new(|kind, request| match kind {
        Kind::Scoring => Ok(graded_matrix(ROSTER_SIZE - 1, ROSTER_SIZE)),
        _ => happy_reply(kind, request),
    }));
    let orch = orchestrator(store.clone(), provider.clone());

    let err = orch
        .start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Assignment(AssignmentError::ShapeMismatch { .. })
    ));
    assert_eq!(provider.calls(), 1);

    let session = orch.latest_session_for_roster(&roster_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert!(session.result.is_none());
    assert!(!orch.is_running(&roster_id));
}

#[tokio::test]
async fn e2e_explanation_failure_still_completes() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Charlie").await;
    let provider = Arc::new(ScriptedProvider::new(|kind, request| match kind {
        Kind::Explaining => Ok("I would rather not say.".into()),
        _ => happy_reply(kind, request),
    }));
    let orch = orchestrator(store, provider);

    let session_id = orch
        .start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap();
    orch.wait_for_background().await;

    let session = orch.get_session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    let result = session.result.unwrap();
    assert_eq!(result.pairings.len(), ROSTER_SIZE);
    assert!(!result.justifications_generated);
    assert!(result.justification_failed);
}

#[tokio::test]
async fn e2e_second_start_while_explaining_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Delta").await;
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(ScriptedProvider::happy().holding(gate.clone()));
    let orch = orchestrator(store, provider);

    let session_id = orch
        .start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap();
    assert!(orch.is_running(&roster_id));

    let err = orch
        .start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning { .. }));

    gate.notify_one();
    orch.wait_for_background().await;
    assert!(!orch.is_running(&roster_id));
    let session = orch.get_session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
}

#[tokio::test]
async fn e2e_secondary_phase_uses_custom_roles() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Echo").await;
    let provider = Arc::new(ScriptedProvider::happy());
    let orch = orchestrator(store, provider);
    let names: Vec<String> = (1..=ROSTER_SIZE).map(|i| format!("Station {i}")).collect();

    let session_id = orch
        .start_assignment(&roster_id, Phase::Secondary, Some(names.clone()))
        .await
        .unwrap();
    orch.wait_for_background().await;

    let session = orch.get_session(&session_id).await.unwrap();
    assert_eq!(session.phase, Phase::Secondary);
    let role_names: Vec<String> = session.roles.iter().map(|r| r.name.clone()).collect();
    assert_eq!(role_names, names);
}

#[tokio::test]
async fn e2e_regenerate_single_explanation() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Foxtrot").await;
    let provider = Arc::new(ScriptedProvider::happy());
    let orch = orchestrator(store, provider.clone());

    let session_id = orch
        .start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap();
    orch.wait_for_background().await;

    let session = orch.get_session(&session_id).await.unwrap();
    let member_id = session.result.unwrap().pairings[3].member_id.clone();
    let text = orch
        .regenerate_explanation(&session_id, &member_id)
        .await
        .unwrap();
    assert_eq!(text, "A natural fit for the role.");
    assert_eq!(provider.calls_of(Kind::Pair), 1);

    let session = orch.get_session(&session_id).await.unwrap();
    let pairing = session.result.unwrap().pairings[3].clone();
    assert_eq!(pairing.explanation.as_deref(), Some("A natural fit for the role."));
}

#[tokio::test]
async fn e2e_batch_isolates_incomplete_roster() {
    let store = Arc::new(InMemoryStore::new());
    let first = seeded_roster(&store, "Golf").await;
    let second = seeded_roster(&store, "Hotel").await;
    let group = store.create_group("Stragglers").await.unwrap();
    let short = store.create_roster(&group.id, "India").await.unwrap();

    let provider = Arc::new(ScriptedProvider::happy());
    let batch = BatchOrchestrator::new(Arc::new(orchestrator(store, provider.clone())));

    let summary = batch
        .start_batch(
            vec![
                BatchRequest::primary(first.clone()),
                BatchRequest::primary(short.id.clone()),
                BatchRequest::primary(second.clone()),
            ],
            true,
        )
        .await
        .unwrap();
    batch.wait_for_background().await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.entries[0].roster_id, first);
    assert!(summary.entries[0].is_success());
    assert!(summary.entries[0].stats.is_some());
    assert!(summary.entries[1].error.is_some());
    assert_eq!(summary.entries[2].roster_id, second);
    assert_eq!(provider.calls_of(Kind::Scoring), 2);

    let orch = batch.orchestrator();
    for id in [&first, &second] {
        let session = orch.latest_session_for_roster(id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        assert!(session.result.unwrap().justifications_generated);
    }
}

#[tokio::test]
async fn e2e_transient_oracle_failure_is_retried() {
    let store = Arc::new(InMemoryStore::new());
    let roster_id = seeded_roster(&store, "Juliet").await;
    let failures = std::sync::Mutex::new(2);
    let provider = Arc::new(ScriptedProvider::new(move |kind, request| {
        let mut left = failures.lock().unwrap();
        if kind == Kind::Scoring && *left > 0 {
            *left -= 1;
            return Err(ProviderError::RateLimited { retry_after_secs: 0 });
        }
        happy_reply(kind, request)
    }));
    let orch = orchestrator(store, provider.clone());

    orch.start_assignment(&roster_id, Phase::Primary, None)
        .await
        .unwrap();
    orch.wait_for_background().await;

    assert_eq!(provider.calls_of(Kind::Scoring), 3);
}
