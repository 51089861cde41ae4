//! `rolematch assign`: Run the full pipeline for one roster file.

use std::path::PathBuf;
use std::sync::Arc;

use rolematch_engine::assigner::{join_details, summarize};

use super::roster_file::{parse_roles, RosterFile};
use super::{report, wiring};

pub async fn run(path: PathBuf, roles: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = wiring::load_config()?;
    let file = RosterFile::load(&path)?;
    let (phase, custom_roles) = file.phase(roles.as_deref().map(parse_roles));

    let store = wiring::build_store(&config);
    let roster = file.seed(&store).await?;
    let orchestrator = wiring::build_orchestrator(&config, store);

    println!("🧩 Assigning roles for '{}' ({phase:?} phase)", roster.name);
    println!("   Model: {}\n", config.oracle.model);

    let session_id = orchestrator
        .start_assignment(&roster.id, phase, custom_roles)
        .await?;
    println!("  ✅ Matched — generating explanations...");
    orchestrator.wait_for_background().await;

    let session = orchestrator.get_session(&session_id).await?;
    let result = session
        .result
        .as_ref()
        .ok_or_else(|| format!("Session {session_id} has no result"))?;

    if result.justification_failed {
        println!("  ⚠️  Explanations could not be generated; scores are still final.");
    }
    println!();

    let details = join_details(&roster, &session.roles, result)?;
    report::print_details(&details);
    report::print_stats(&summarize(result));
    println!("\n  Session: {session_id} ({})", session.status);

    Ok(())
}
