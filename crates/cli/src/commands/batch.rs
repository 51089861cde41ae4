//! `rolematch batch`: Run the pipeline for several roster files together.

use std::path::PathBuf;
use std::sync::Arc;

use rolematch_engine::{BatchOrchestrator, BatchRequest};

use super::roster_file::RosterFile;
use super::{report, wiring};

pub async fn run(files: Vec<PathBuf>, details: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = wiring::load_config()?;
    let store = wiring::build_store(&config);

    let mut requests = Vec::with_capacity(files.len());
    let mut names = Vec::with_capacity(files.len());
    for path in &files {
        let file = RosterFile::load(path)?;
        let roster = file.seed(&store).await?;
        let (phase, custom_roles) = file.phase(None);
        requests.push(BatchRequest {
            roster_id: roster.id,
            phase,
            custom_roles,
        });
        names.push(file.name);
    }

    let batch = BatchOrchestrator::new(Arc::new(wiring::build_orchestrator(&config, store)));
    println!("🧩 Running batch of {} rosters\n", requests.len());

    let summary = batch.start_batch(requests, details).await?;
    batch.wait_for_background().await;

    for (entry, name) in summary.entries.iter().zip(&names) {
        match &entry.error {
            None => println!("  ✅ {name}"),
            Some(error) => println!("  ❌ {name}: {error}"),
        }
        if let Some(rows) = &entry.details {
            report::print_details(rows);
        }
        if let Some(stats) = &entry.stats {
            report::print_stats(stats);
            println!();
        }
    }

    println!(
        "\n  {} total, {} succeeded, {} failed",
        summary.total, summary.successful, summary.failed
    );

    Ok(())
}
