//! Show command implementation.

use std::path::Path;

use anyhow::anyhow;
use consilium_store::LedgerStore;

use crate::commands::open_ledger;
use crate::output;

pub fn run(ledger_dir: &Path, seq: u64, json: bool) -> anyhow::Result<bool> {
    let ledger = open_ledger(ledger_dir)?;
    let entry = ledger
        .get(seq)?
        .ok_or_else(|| anyhow!("entry {} not found", seq))?;

    if json {
        println!("{}", output::format_json(&entry.to_json_value()));
    } else {
        println!("{}", output::format_entry(seq, &entry));
    }
    Ok(true)
}
