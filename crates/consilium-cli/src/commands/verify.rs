//! Verify command implementation.

use std::path::Path;

use consilium_reconcile::Reconciler;

use crate::commands::{github, open_ledger};
use crate::config::Config;
use crate::output;

pub fn run(
    ledger_dir: &Path,
    config_path: &Path,
    repo: Option<&str>,
    json: bool,
) -> anyhow::Result<bool> {
    let mut ledger = open_ledger(ledger_dir)?;
    let local = Reconciler::new(&mut ledger).local_verify()?;
    let remote = match repo {
        Some(repo) => {
            let config = Config::load(config_path)?;
            let host = github(repo)?;
            let reconciler = Reconciler::new(&mut ledger).with_policy(config.credit.pr_merged);
            Some(reconciler.remote_verify(&host)?)
        }
        None => None,
    };
    let passed = local.is_valid() && remote.as_ref().map_or(true, |r| r.is_consistent());

    if json {
        println!("{}", output::format_json(&output::verify_json(&local, remote.as_ref())));
        return Ok(passed);
    }

    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    let line = output::describe_local(&local);
    if local.is_valid() {
        println!("{} {}", mark(true), line);
    } else {
        eprintln!("{} {}", mark(false), line);
    }
    if let Some(remote) = &remote {
        if remote.is_consistent() {
            println!(
                "{} Matches GitHub: {} comments, {} entries",
                mark(true),
                remote.records_checked,
                remote.entries_checked
            );
        } else {
            eprintln!(
                "{} {} divergences from GitHub:",
                mark(false),
                remote.divergences.len()
            );
            for divergence in &remote.divergences {
                eprintln!("  - {}", divergence);
            }
        }
    }
    Ok(passed)
}
