use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::entry::Entry;
use crate::errors::EntryError;

/// Opening marker of the machine-readable block.
pub const COMMENT_BEGIN: &str = "<!-- CONSILIUM:BEGIN -->";
/// Closing marker of the machine-readable block.
pub const COMMENT_END: &str = "<!-- CONSILIUM:END -->";

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<!-- CONSILIUM:BEGIN -->\s*```json\s*(\{.*?\})\s*```\s*<!-- CONSILIUM:END -->")
            .expect("static pattern")
    })
}

/// Why a marked comment could not be turned into an entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordParseError {
    /// Markers present but the fenced JSON block is missing or unterminated.
    #[error("malformed record block")]
    MalformedBlock,
    /// The block is not valid JSON.
    #[error("invalid record JSON: {0}")]
    InvalidJson(String),
    /// The JSON is not a valid entry.
    #[error("invalid entry: {0}")]
    InvalidEntry(#[from] EntryError),
}

/// Renders the comment body published for `entry`.
///
/// Only the marked JSON block is authoritative; the table below it is for
/// humans and is never parsed back.
pub fn render_comment(entry: &Entry) -> String {
    let mut payload = entry.to_json_value();
    if let Some(map) = payload.as_object_mut() {
        map.remove("comment_id");
    }
    let json = serde_json::to_string_pretty(&payload).unwrap_or_default();

    let fields = entry.fields();
    let mut rows: Vec<_> = entry.distribution().iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut lines = vec![
        COMMENT_BEGIN.to_string(),
        "```json".to_string(),
        json,
        "```".to_string(),
        COMMENT_END.to_string(),
        String::new(),
        "## 🏆 Consilium Credit Distribution".to_string(),
        String::new(),
        format!("**Outcome**: `{}`", fields.outcome.as_str()),
        format!("**PR**: #{}", entry.event_id()),
        format!("**Total Credit**: {}", fields.total()),
        String::new(),
        "| Contributor | Credit |".to_string(),
        "|-------------|--------|".to_string(),
    ];
    for (actor, credit) in rows {
        lines.push(format!("| @{} | {} |", actor, credit));
    }
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(format!(
        "*Hash: `{}...` | Prev: `{}...`*",
        entry.hash().short(),
        entry.prev_hash().short()
    ));
    lines.push("*Credit is earned, not given. Verified by outcomes, not votes.*".to_string());
    lines.join("\n")
}

/// Extracts the entry carried by a comment body.
///
/// Returns `None` when the body carries no record markers at all, so
/// ordinary discussion comments are skipped rather than reported.
pub fn parse_comment(body: &str) -> Option<Result<Entry, RecordParseError>> {
    if !body.contains(COMMENT_BEGIN) {
        return None;
    }
    let Some(captures) = block_pattern().captures(body) else {
        return Some(Err(RecordParseError::MalformedBlock));
    };
    let json = &captures[1];
    Some(
        serde_json::from_str::<crate::entry::EntryRecord>(json)
            .map_err(|e| RecordParseError::InvalidJson(e.to_string()))
            .and_then(|record| Entry::try_from(record).map_err(RecordParseError::from)),
    )
}
