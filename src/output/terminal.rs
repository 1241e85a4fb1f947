//! Terminal output: headroom overview and the end-of-run summary.

use crate::models::UtilizationRecord;
use crate::processing::{headroom_percent, Thresholds, Tier};
use crate::reconcile::RunSummary;
use colored::Colorize;

/// Format a value as a quoted, right-aligned field.
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let value_str = value.to_string();
    let quoted = format!("\"{value_str}\"");
    let quoted_len = quoted.len();

    if quoted_len >= width {
        quoted
    } else {
        format!("{quoted:>width$}")
    }
}

/// Number of records per headroom tier, in display order.
pub fn tier_counts(records: &[UtilizationRecord], thresholds: &Thresholds) -> [(Tier, usize); 4] {
    let mut counts = [
        (Tier::Ample, 0),
        (Tier::Watch, 0),
        (Tier::Critical, 0),
        (Tier::Unknown, 0),
    ];
    for record in records {
        let tier = thresholds.classify(headroom_percent(&record.address_space, record.available));
        if let Some(entry) = counts.iter_mut().find(|(t, _)| *t == tier) {
            entry.1 += 1;
        }
    }
    counts
}

/// Print the tier overview and list the critical address spaces.
pub fn print_overview(records: &[UtilizationRecord], thresholds: &Thresholds) {
    println!("#{}# headroom overview", "INFO".on_blue());
    for (tier, count) in tier_counts(records, thresholds) {
        println!("{} {},{}", tier.icon(), format_field(tier, 10), format_field(count, 6));
    }
    for record in records {
        let percent = headroom_percent(&record.address_space, record.available);
        if thresholds.classify(percent) == Tier::Critical {
            println!(
                "#{}# {} in {} / {} has {:.1}% left",
                "CRITICAL".red(),
                record.address_space,
                record.subscription_name,
                record.vnet_name,
                percent.unwrap_or_default()
            );
        }
    }
}

/// Print and log the end-of-run counters.
pub fn print_summary(summary: &RunSummary, elapsed: chrono::Duration, dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    log::info!("Reconciliation finished{mode}: {summary}");
    println!(
        "#{}# {summary} in {}.{:03}s{mode}",
        "DONE".on_blue(),
        elapsed.num_seconds(),
        elapsed.num_milliseconds() % 1000
    );
    if summary.failed > 0 {
        println!("#{}# {} record(s) failed, see log", "NOTE".on_red(), summary.failed);
    }
}
