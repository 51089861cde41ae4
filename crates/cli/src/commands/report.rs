//! Console rendering for assignment results.

use rolematch_engine::{AssignmentStats, PairingDetail};

pub fn print_details(details: &[PairingDetail]) {
    println!("  {:<24} {:<20} {:<20} {:>6}", "Member", "Occupation", "Role", "Score");
    println!("  {}", "-".repeat(73));
    for d in details {
        println!(
            "  {:<24} {:<20} {:<20} {:>6.1}",
            d.member_name, d.occupation, d.role_name, d.score
        );
        if let Some(explanation) = &d.explanation {
            println!("      ↳ {explanation}");
        }
    }
}

pub fn print_stats(stats: &AssignmentStats) {
    println!(
        "\n  Total {:.1} | mean {:.1} | min {:.1} | max {:.1}",
        stats.total, stats.mean, stats.min, stats.max
    );
    for bucket in &stats.histogram {
        println!("  {:>7} │ {}", bucket.label, "█".repeat(bucket.count));
    }
}
