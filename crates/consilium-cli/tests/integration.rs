//! Integration tests for CLI commands.

use consilium_canonical::{ActorId, Credit, SourceUrl, Timestamp};
use consilium_core::{Distribution, Entry, EntryFields};
use consilium_store::{FileLedger, LedgerStore};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn mint(ledger: &mut FileLedger, event_id: u64, credits: &[(&str, u64)]) {
    let distribution: Distribution = credits
        .iter()
        .map(|(actor, whole)| (ActorId::parse(*actor).unwrap(), Credit::from_whole(*whole)))
        .collect();
    let entry = Entry::seal(EntryFields::credit_mint(
        event_id,
        SourceUrl::parse(format!("https://github.com/acme/widgets/pull/{}", event_id)).unwrap(),
        distribution,
        Timestamp::parse("2024-01-15T10:30:00Z").unwrap(),
        ledger.head_hash().unwrap(),
    ))
    .unwrap();
    let seq = ledger.append(entry).unwrap();
    ledger.record_publication(seq, 9000 + event_id).unwrap();
}

fn create_test_ledger() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ledger");
    let mut ledger = FileLedger::open(&path).unwrap();
    mint(&mut ledger, 42, &[("alice", 50), ("bob", 35), ("carol", 15)]);
    mint(&mut ledger, 43, &[("bob", 100)]);
    (temp_dir, path.to_string_lossy().into_owned())
}

fn run_cli(dir: &Path, args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_consilium"))
        .args(args)
        .current_dir(dir)
        .env_remove("GITHUB_TOKEN")
        .env_remove("CONSILIUM_CONFIG")
        .env_remove("CONSILIUM_LEDGER_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run consilium");
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

#[test]
fn test_verify_valid_ledger() {
    let (dir, ledger) = create_test_ledger();
    let (success, stdout, _) = run_cli(dir.path(), &["--ledger-dir", &ledger, "verify"]);
    assert!(success);
    assert!(stdout.contains("Local ledger valid: 2 entries"));
}

#[test]
fn test_verify_json_output() {
    let (dir, ledger) = create_test_ledger();
    let (success, stdout, _) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "verify", "--json"]);
    assert!(success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["local"]["status"], "valid");
    assert_eq!(report["local"]["entry_count"], 2);
    assert!(report.get("remote").is_none());
}

#[test]
fn test_verify_detects_tampering() {
    let (dir, ledger) = create_test_ledger();
    let entry_path = Path::new(&ledger).join("entries/0001.json");
    let mut entry: serde_json::Value =
        serde_json::from_slice(&fs::read(&entry_path).unwrap()).unwrap();
    entry["distribution"]["alice"] = json!(60.0);
    fs::write(&entry_path, serde_json::to_vec_pretty(&entry).unwrap()).unwrap();

    let (success, _, stderr) = run_cli(dir.path(), &["--ledger-dir", &ledger, "verify"]);
    assert!(!success);
    assert!(stderr.contains("invalid at entry 0"));
}

#[test]
fn test_verify_detects_index_drift() {
    let (dir, ledger) = create_test_ledger();
    let index_path = Path::new(&ledger).join("index.json");
    let mut index: serde_json::Value =
        serde_json::from_slice(&fs::read(&index_path).unwrap()).unwrap();
    index["balances"]["bob"] = json!(1.0);
    fs::write(&index_path, serde_json::to_vec_pretty(&index).unwrap()).unwrap();

    let (success, stdout, _) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "verify", "--json"]);
    assert!(!success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["local"]["status"], "index_drift");
}

#[test]
fn test_balance_leaderboard() {
    let (dir, ledger) = create_test_ledger();
    let (success, stdout, _) = run_cli(dir.path(), &["--ledger-dir", &ledger, "balance"]);
    assert!(success);
    let rows: Vec<&str> = stdout.lines().skip(2).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].contains("@bob") && rows[0].contains("135.00"));
    assert!(rows[1].contains("@alice") && rows[1].contains("50.00"));
    assert!(rows[2].contains("@carol") && rows[2].contains("15.00"));

    let (success, stdout, _) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "balance", "--limit", "1"]);
    assert!(success);
    assert_eq!(stdout.lines().skip(2).count(), 1);
}

#[test]
fn test_balance_for_one_actor() {
    let (dir, ledger) = create_test_ledger();
    let (success, stdout, _) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "balance", "@alice"]);
    assert!(success);
    assert_eq!(stdout.trim(), "@alice: 50.00");

    let (success, stdout, _) = run_cli(dir.path(), &["--ledger-dir", &ledger, "balance", "dave"]);
    assert!(success);
    assert_eq!(stdout.trim(), "@dave: 0.00");
}

#[test]
fn test_balance_ignores_drifted_index() {
    let (dir, ledger) = create_test_ledger();
    let index_path = Path::new(&ledger).join("index.json");
    let mut index: serde_json::Value =
        serde_json::from_slice(&fs::read(&index_path).unwrap()).unwrap();
    index["balances"]["bob"] = json!(1.0);
    fs::write(&index_path, serde_json::to_vec_pretty(&index).unwrap()).unwrap();

    let (success, stdout, _) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "balance", "bob"]);
    assert!(success);
    assert_eq!(stdout.trim(), "@bob: 135.00");
}

#[test]
fn test_show_command() {
    let (dir, ledger) = create_test_ledger();
    let (success, stdout, _) = run_cli(dir.path(), &["--ledger-dir", &ledger, "show", "1"]);
    assert!(success);
    assert!(stdout.contains("Entry #1"));
    assert!(stdout.contains("PR:        #42"));
    assert!(stdout.contains("Prev:      genesis"));
    assert!(stdout.contains("Comment:   9042"));

    let (success, stdout, _) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "show", "2", "--json"]);
    assert!(success);
    let entry: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entry["pr_number"], 43);
    assert_eq!(entry["distribution"]["bob"], 100.0);
    assert_eq!(entry["comment_id"], 9043);
}

#[test]
fn test_show_missing_entry() {
    let (dir, ledger) = create_test_ledger();
    let (success, _, stderr) = run_cli(dir.path(), &["--ledger-dir", &ledger, "show", "7"]);
    assert!(!success);
    assert!(stderr.contains("entry 7 not found"));
}

#[test]
fn test_mint_requires_token() {
    let (dir, ledger) = create_test_ledger();
    let (success, _, stderr) = run_cli(
        dir.path(),
        &["--ledger-dir", &ledger, "mint", "--repo", "acme/widgets", "--pr", "44"],
    );
    assert!(!success);
    assert!(stderr.contains("GITHUB_TOKEN is not set"));
}

#[test]
fn test_mint_rejects_invalid_policy() {
    let (dir, ledger) = create_test_ledger();
    fs::write(
        dir.path().join("consilium.yaml"),
        "credit:\n  pr_merged:\n    author: 0.7\n",
    )
    .unwrap();
    let (success, _, stderr) = run_cli(
        dir.path(),
        &["--ledger-dir", &ledger, "mint", "--repo", "acme/widgets", "--pr", "44"],
    );
    assert!(!success);
    assert!(stderr.contains("invalid credit.pr_merged"));
}

#[test]
fn test_rebuild_rejects_bad_repo() {
    let (dir, ledger) = create_test_ledger();
    let (success, _, stderr) =
        run_cli(dir.path(), &["--ledger-dir", &ledger, "rebuild", "--repo", "widgets"]);
    assert!(!success);
    assert!(stderr.contains("expected OWNER/REPO"));
}

#[test]
fn test_rebuild_help_explains_hashing_and_full() {
    let dir = TempDir::new().unwrap();
    let (success, stdout, _) = run_cli(dir.path(), &["rebuild", "--help"]);
    assert!(success);
    assert!(stdout.contains("minimal decimal strings"));
    assert!(stdout.contains("Use `--full` to discard local"));
}
