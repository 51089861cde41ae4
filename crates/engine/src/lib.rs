//! # RoleMatch Engine
//!
//! The assignment pipeline: oracle scoring, optimal matching, explanation,
//! and the orchestrators that drive sessions through those stages.
//!
//! ```text
//! Roster ─► ScoreMatrixBuilder ─► assigner::assign ─► ExplanationGenerator
//!                 │                                         │
//!                 └──────── BatchExecutor (retry) ──────────┘
//! ```

pub mod assigner;
pub mod batch;
pub mod executor;
pub mod explain;
pub mod extract;
pub mod orchestrator;
pub mod scoring;

#[cfg(test)]
mod test_support;

pub use assigner::{AssignmentStats, PairingDetail, ScoreBucket};
pub use batch::{BatchEntry, BatchOrchestrator, BatchRequest, BatchSummary};
pub use executor::{BatchExecutor, BatchReport, RetryPolicy, UnitReport};
pub use explain::ExplanationGenerator;
pub use orchestrator::{Limits, MemberSubmission, Orchestrator, Stores, SubmissionOutcome};
pub use scoring::ScoreMatrixBuilder;
