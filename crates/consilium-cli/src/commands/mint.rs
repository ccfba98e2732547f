//! Mint command implementation.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use consilium_canonical::Timestamp;
use consilium_github::parse_webhook;
use consilium_reconcile::{MintOutcome, Reconciler};
use tracing::info;

use crate::commands::{github, open_ledger};
use crate::config::Config;
use crate::output;

pub fn run(
    ledger_dir: &Path,
    config_path: &Path,
    repo: &str,
    pr: Option<u64>,
    event_file: Option<&Path>,
) -> anyhow::Result<bool> {
    let config = Config::load(config_path)?;
    let host = github(repo)?;

    let number = match (pr, event_file) {
        (Some(number), _) => number,
        (None, Some(path)) => {
            let payload = fs::read_to_string(path)
                .with_context(|| format!("failed to read event file {}", path.display()))?;
            let Some(merge) = parse_webhook(&payload)? else {
                println!("Not a merged pull request; nothing to record");
                return Ok(true);
            };
            if &merge.repo != host.repo() {
                bail!("event is for {} but --repo is {}", merge.repo, host.repo());
            }
            merge.number
        }
        (None, None) => bail!("either --pr or --event-file is required"),
    };

    let event = host.load_merge_event(number)?;
    info!(pr = number, author = %event.author, reviews = event.reviews.len(), "loaded merge");

    let mut ledger = open_ledger(ledger_dir)?;
    let outcome = Reconciler::new(&mut ledger).mint_and_append(
        &event,
        &config.credit.pr_merged,
        &host,
        &host,
        Timestamp::now(),
    )?;

    match outcome {
        MintOutcome::Minted { seq, entry } => {
            println!(
                "Recorded PR #{} as entry {} (comment {})",
                number,
                seq,
                entry
                    .external_record_id()
                    .map_or_else(|| "?".to_string(), |id| id.to_string())
            );
            println!("{}", output::format_entry(seq, &entry));
        }
        MintOutcome::AlreadyRecorded {
            seq,
            external_record_id,
        } => println!(
            "PR #{} already recorded as entry {} (comment {})",
            number, seq, external_record_id
        ),
    }
    Ok(true)
}
