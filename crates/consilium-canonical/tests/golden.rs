use consilium_canonical::{
    compute_content_hash, ActorId, Canonicalizer, Credit, EntryHash, PrevHash,
};
use serde_json::json;
use std::collections::BTreeMap;

const GOLDEN_CANONICAL: &str = concat!(
    r#"{"distribution":{"alice":"50","bob":"35","carol":"15"},"#,
    r#""outcome":"pr_merged","pr_number":42,"prev_hash":"genesis","#,
    r#""source":"https://github.com/acme/widgets/pull/42","#,
    r#""timestamp":"2024-01-15T10:30:00Z","type":"credit_mint","version":"0.1"}"#
);

const GOLDEN_HASH: &str = "48d5aba29a1f8543e4821e3094ab4960d01c0f9de1b7b84ade7bdd2189be71e6";

fn golden_fields() -> serde_json::Value {
    json!({
        "version": "0.1",
        "type": "credit_mint",
        "pr_number": 42,
        "outcome": "pr_merged",
        "source": "https://github.com/acme/widgets/pull/42",
        "distribution": { "carol": "15", "alice": "50", "bob": "35" },
        "timestamp": "2024-01-15T10:30:00Z",
        "prev_hash": "genesis"
    })
}

#[test]
fn canonical_bytes_match_golden() {
    let out = Canonicalizer::new()
        .canonicalize_to_string(&golden_fields())
        .unwrap();
    assert_eq!(out, GOLDEN_CANONICAL);
}

#[test]
fn content_hash_matches_golden() {
    let hash = compute_content_hash(&golden_fields(), &Canonicalizer::new()).unwrap();
    assert_eq!(hash.as_str(), GOLDEN_HASH);
}

#[test]
fn hash_serializes_as_plain_hex_string() {
    let hash = EntryHash::parse(GOLDEN_HASH).unwrap();
    assert_eq!(
        serde_json::to_string(&hash).unwrap(),
        format!("\"{}\"", GOLDEN_HASH)
    );
    let prev: PrevHash = serde_json::from_str(&format!("\"{}\"", GOLDEN_HASH)).unwrap();
    assert_eq!(prev, PrevHash::Entry(hash));
}

#[test]
fn distribution_map_serializes_sorted() {
    let mut distribution = BTreeMap::new();
    distribution.insert(ActorId::parse("carol").unwrap(), Credit::from_whole(15));
    distribution.insert(ActorId::parse("alice").unwrap(), Credit::from_hundredths(5050));
    assert_eq!(
        serde_json::to_string(&distribution).unwrap(),
        r#"{"alice":50.5,"carol":15.0}"#
    );
}
