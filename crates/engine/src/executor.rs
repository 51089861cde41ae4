//! Bounded-concurrency batch execution with retry and a second pass.
//!
//! Work units run in groups of at most `concurrency`. Within a group, units
//! run concurrently; groups run in sequence with a short pause between them.
//! A unit that fails with a retryable error backs off exponentially
//! (`base_delay * 2^attempt`) up to `max_retries` times. Units whose final
//! first-pass error was still retryable get one more attempt after a random
//! jitter. Terminal failures are never re-attempted.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use rolematch_config::ExecutorConfig;
use rolematch_core::Retryable;
use tracing::{debug, info, warn};

/// How a single unit is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub group_pause: Duration,
    pub second_pass: bool,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            group_pause: Duration::from_millis(250),
            second_pass: true,
            jitter_max: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.jitter_max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// Outcome of one work unit.
#[derive(Debug)]
pub struct UnitReport<T, E> {
    /// Position of the unit in the submitted batch
    pub index: usize,
    /// Calls made, including the second-pass attempt
    pub attempts: u32,
    /// First-pass retries; never exceeds `max_retries`
    pub retries: u32,
    /// The unit was re-attempted in the second pass
    pub second_pass: bool,
    pub outcome: Result<T, E>,
}

impl<T, E> UnitReport<T, E> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl<T, E: Retryable> UnitReport<T, E> {
    fn wants_second_pass(&self) -> bool {
        matches!(&self.outcome, Err(e) if e.is_retryable())
    }
}

/// Outcomes of a whole batch, in submission order.
#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub units: Vec<UnitReport<T, E>>,
}

impl<T, E> BatchReport<T, E> {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn total_retries(&self) -> u32 {
        self.units.iter().map(|u| u.retries).sum()
    }

    pub fn into_outcomes(self) -> Vec<Result<T, E>> {
        self.units.into_iter().map(|u| u.outcome).collect()
    }
}

/// Runs oracle calls in bounded groups with retry.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    concurrency: usize,
    policy: RetryPolicy,
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(5, RetryPolicy::default())
    }
}

impl BatchExecutor {
    pub fn new(concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            policy,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.concurrency,
            RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.base_delay_ms),
                group_pause: Duration::from_millis(config.group_pause_ms),
                second_pass: config.second_pass,
                jitter_max: Duration::from_millis(config.jitter_max_ms),
            },
        )
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `work` over every item, returning one report per item.
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, work: F) -> BatchReport<T, E>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let work = &work;
        let policy = &self.policy;
        let mut units: Vec<UnitReport<T, E>> = Vec::with_capacity(items.len());

        info!(units = items.len(), concurrency = self.concurrency, "Starting batch");

        for (group, chunk) in items.chunks(self.concurrency).enumerate() {
            if group > 0 {
                tokio::time::sleep(policy.group_pause).await;
            }
            let base = group * self.concurrency;
            debug!(group, size = chunk.len(), "Running group");

            let first_pass = chunk
                .iter()
                .cloned()
                .enumerate()
                .map(|(offset, item)| run_with_retries(policy, base + offset, item, work));
            units.extend(join_all(first_pass).await);
        }

        if policy.second_pass {
            let pending: Vec<usize> = units
                .iter()
                .filter(|u| u.wants_second_pass())
                .map(|u| u.index)
                .collect();

            if !pending.is_empty() {
                info!(units = pending.len(), "Second pass for transient failures");
            }

            for (group, chunk) in pending.chunks(self.concurrency).enumerate() {
                if group > 0 {
                    tokio::time::sleep(policy.group_pause).await;
                }
                let attempts = chunk.iter().map(|&index| {
                    let item = items[index].clone();
                    let jitter = policy.jitter();
                    async move {
                        tokio::time::sleep(jitter).await;
                        (index, work(item).await)
                    }
                });
                for (index, outcome) in join_all(attempts).await {
                    let unit = &mut units[index];
                    unit.attempts += 1;
                    unit.second_pass = true;
                    unit.outcome = outcome;
                }
            }
        }

        let report = BatchReport { units };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            retries = report.total_retries(),
            "Batch finished"
        );
        report
    }

    /// Run a single unit under the same retry policy.
    pub async fn run_one<T, E, F, Fut>(&self, work: F) -> UnitReport<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let unit_work = |(): ()| work();
        let mut unit = run_with_retries(&self.policy, 0, (), &unit_work).await;

        if self.policy.second_pass && unit.wants_second_pass() {
            tokio::time::sleep(self.policy.jitter()).await;
            unit.attempts += 1;
            unit.second_pass = true;
            unit.outcome = work().await;
        }
        unit
    }
}

async fn run_with_retries<I, T, E, F, Fut>(
    policy: &RetryPolicy,
    index: usize,
    item: I,
    work: &F,
) -> UnitReport<T, E>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0;
    let mut retries = 0;

    loop {
        attempts += 1;
        match work(item.clone()).await {
            Ok(value) => {
                return UnitReport {
                    index,
                    attempts,
                    retries,
                    second_pass: false,
                    outcome: Ok(value),
                };
            }
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                let delay = policy.backoff(retries);
                warn!(
                    unit = index,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => {
                return UnitReport {
                    index,
                    attempts,
                    retries,
                    second_pass: false,
                    outcome: Err(e),
                };
            }
        }
    }
}
