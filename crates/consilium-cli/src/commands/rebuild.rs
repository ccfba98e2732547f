//! Rebuild command implementation.

use std::path::Path;

use consilium_reconcile::{RebuildMode, Reconciler};

use crate::commands::{github, open_ledger};
use crate::config::Config;

pub fn run(ledger_dir: &Path, config_path: &Path, repo: &str, full: bool) -> anyhow::Result<bool> {
    let config = Config::load(config_path)?;
    let host = github(repo)?;
    let mut ledger = open_ledger(ledger_dir)?;
    let mode = if full {
        RebuildMode::Full
    } else {
        RebuildMode::Incremental
    };

    let report = Reconciler::new(&mut ledger)
        .with_policy(config.credit.pr_merged)
        .rebuild(&host, mode)?;
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    println!(
        "Rebuilt from {}: {} comments fetched, {} entries added, {} skipped",
        host.repo(),
        report.records_fetched,
        report.entries_added,
        report.records_skipped
    );
    if report.publications_adopted > 0 {
        println!("Linked {} local entries to their comments", report.publications_adopted);
    }
    println!(
        "Ledger: {} entries, head {}",
        report.index.entry_count,
        report.index.head_hash.short()
    );
    Ok(true)
}
