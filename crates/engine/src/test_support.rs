//! Shared fixtures for engine tests: a scripted oracle and roster builders.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rolematch_core::{
    AssignmentResult, GroupId, Member, Message, NewMember, Provider, ProviderError,
    ProviderRequest, ProviderResponse, Roster, ROSTER_SIZE,
};

use crate::explain::{EXPLANATION_SYSTEM_PROMPT, PAIR_SYSTEM_PROMPT};
use crate::scoring::SCORING_SYSTEM_PROMPT;

pub fn new_member(i: usize) -> NewMember {
    NewMember {
        name: format!("Member {i}"),
        occupation: "Engineer".into(),
        skills: vec!["rust".into(), "planning".into()],
        traits: vec!["calm".into()],
    }
}

pub fn complete_roster() -> Roster {
    let mut roster = Roster::new(GroupId::new(), "Test team");
    for i in 0..ROSTER_SIZE {
        roster
            .push_member(Member::from_submission(new_member(i)).unwrap())
            .unwrap();
    }
    roster
}

/// `100 - 5|i - j|`, so the identity matching is the unique optimum.
pub fn graded_scores(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| (100.0 - 5.0 * (i as f64 - j as f64).abs()).max(0.0))
                .collect()
        })
        .collect()
}

pub fn graded_matrix_json(n: usize) -> String {
    serde_json::to_string(&graded_scores(n)).unwrap()
}

fn explanations_json(ids: &[String]) -> String {
    let entries: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({"memberId": id, "text": format!("{id} suits this role.")}))
        .collect();
    serde_json::to_string(&entries).unwrap()
}

pub fn explanations_for(result: &AssignmentResult) -> String {
    let ids: Vec<String> = result.pairings.iter().map(|p| p.member_id.clone()).collect();
    explanations_json(&ids)
}

/// Read the member ids back out of an explanation prompt.
pub fn member_ids_in_prompt(prompt: &str) -> Vec<String> {
    prompt
        .split("memberId: ")
        .skip(1)
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub fn is_scoring(request: &ProviderRequest) -> bool {
    request.messages[0].content == SCORING_SYSTEM_PROMPT
}

pub fn is_explaining(request: &ProviderRequest) -> bool {
    request.messages[0].content == EXPLANATION_SYSTEM_PROMPT
}

pub fn is_pair(request: &ProviderRequest) -> bool {
    request.messages[0].content == PAIR_SYSTEM_PROMPT
}

/// Well-behaved oracle replies for every request kind.
pub fn happy_reply(request: &ProviderRequest) -> Result<String, ProviderError> {
    if is_scoring(request) {
        Ok(format!("Scores:\n{}", graded_matrix_json(ROSTER_SIZE)))
    } else if is_explaining(request) {
        Ok(explanations_json(&member_ids_in_prompt(
            &request.messages[1].content,
        )))
    } else {
        Ok("Their calm planning makes them a natural fit.".into())
    }
}

type Script = Box<dyn Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync>;

/// A provider that answers from a closure and counts calls.
pub struct ScriptedProvider {
    script: Script,
    pair_delay: Option<Duration>,
    calls: Mutex<u32>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            pair_delay: None,
            calls: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn happy() -> Self {
        Self::new(happy_reply)
    }

    /// Hold single-pair requests for `delay` before answering.
    pub fn with_pair_delay(mut self, delay: Duration) -> Self {
        self.pair_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.pair_delay.filter(|_| is_pair(&request)) {
            tokio::time::sleep(delay).await;
        }
        let text = (self.script)(&request)?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: request.model,
        })
    }
}
