//! Balance command implementation.

use std::path::Path;

use anyhow::Context;
use consilium_canonical::ActorId;
use consilium_store::{derive_index, LedgerStore};
use tracing::warn;

use crate::commands::open_ledger;
use crate::output;

/// Balances are replayed from the entries, so a drifted `index.json` is
/// reported but never shown.
pub fn run(ledger_dir: &Path, actor: Option<&str>, limit: Option<usize>) -> anyhow::Result<bool> {
    let ledger = open_ledger(ledger_dir)?;
    let index = derive_index(&ledger.load_all()?)
        .context("cannot compute balances; run `consilium verify`")?;
    if let Err(e) = ledger.verify_index() {
        warn!(error = %e, "index.json is stale; balances derived from entries");
    }

    match actor {
        Some(actor) => {
            let actor = ActorId::parse(actor.trim_start_matches('@'))?;
            println!("@{}: {}", actor, output::format_credit(index.balance(&actor)));
        }
        None => {
            let mut rows = index.leaderboard();
            if let Some(limit) = limit {
                rows.truncate(limit);
            }
            if rows.is_empty() {
                println!("Ledger is empty");
            } else {
                output::print_leaderboard(&rows);
            }
        }
    }
    Ok(true)
}
