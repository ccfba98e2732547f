//! Output formatting utilities.

use consilium_canonical::{ActorId, Credit};
use consilium_core::Entry;
use consilium_reconcile::{RemoteReport, VerifyOutcome};
use serde_json::{json, Value};

/// Formats a value as pretty JSON.
pub fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Credit with two decimals.
pub fn format_credit(credit: Credit) -> String {
    format!("{:.2}", credit.to_f64())
}

/// Prints the leaderboard table.
#[allow(clippy::print_literal)]
pub fn print_leaderboard(rows: &[(&ActorId, Credit)]) {
    println!("{:<6} {:<39} {:>12}", "RANK", "ACTOR", "CREDIT");
    println!("{}", "-".repeat(59));
    for (rank, (actor, credit)) in rows.iter().enumerate() {
        println!(
            "{:<6} {:<39} {:>12}",
            rank + 1,
            truncate(&format!("@{}", actor), 39),
            format_credit(*credit)
        );
    }
}

/// Multi-line summary of one entry.
pub fn format_entry(seq: u64, entry: &Entry) -> String {
    let mut lines = vec![
        format!("Entry #{}", seq),
        format!("  PR:        #{}", entry.event_id()),
        format!("  Source:    {}", entry.source_url()),
        format!("  Timestamp: {}", entry.timestamp()),
        format!("  Hash:      {}", entry.hash()),
        format!("  Prev:      {}", entry.prev_hash().as_str()),
        format!(
            "  Comment:   {}",
            entry
                .external_record_id()
                .map_or_else(|| "unpublished".to_string(), |id| id.to_string())
        ),
        "  Distribution:".to_string(),
    ];
    let mut rows: Vec<_> = entry.distribution().iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (actor, credit) in rows {
        lines.push(format!("    @{:<30} {:>10}", actor, format_credit(*credit)));
    }
    lines.join("\n")
}

/// One-line description of a local verification outcome.
pub fn describe_local(outcome: &VerifyOutcome) -> String {
    match outcome {
        VerifyOutcome::Valid {
            entry_count,
            head_hash,
        } => format!(
            "Local ledger valid: {} entries, head {}",
            entry_count,
            head_hash.short()
        ),
        VerifyOutcome::InvalidAt { index, reason } => {
            format!("Local ledger invalid at entry {}: {}", index, reason)
        }
        VerifyOutcome::IndexDrift(drift) => format!("Index drift: {}", drift),
    }
}

/// JSON report for `verify --json`.
pub fn verify_json(local: &VerifyOutcome, remote: Option<&RemoteReport>) -> Value {
    let local = match local {
        VerifyOutcome::Valid {
            entry_count,
            head_hash,
        } => json!({
            "status": "valid",
            "entry_count": entry_count,
            "head_hash": head_hash.as_str(),
        }),
        VerifyOutcome::InvalidAt { index, reason } => json!({
            "status": "invalid",
            "index": index,
            "reason": reason.to_string(),
        }),
        VerifyOutcome::IndexDrift(drift) => json!({
            "status": "index_drift",
            "reason": drift.to_string(),
        }),
    };
    let mut report = json!({ "local": local });
    if let Some(remote) = remote {
        report["remote"] = json!(remote);
    }
    report
}

/// Shortens `s` to at most `max_len` characters, marking the cut with `...`.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
