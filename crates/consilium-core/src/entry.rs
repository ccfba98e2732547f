//! Ledger entry types and hashing.

use std::collections::BTreeMap;

use consilium_canonical::{
    compute_content_hash, ActorId, Canonicalizer, Credit, EntryHash, PrevHash, SourceUrl,
    Timestamp, ValidationError,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::EntryError;

/// Credit assigned to each actor, ordered by actor id.
pub type Distribution = BTreeMap<ActorId, Credit>;

/// Protocol version tag. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Version `"0.1"`.
    #[serde(rename = "0.1")]
    V0_1,
}

impl SchemaVersion {
    /// Version written by this implementation.
    pub const CURRENT: SchemaVersion = SchemaVersion::V0_1;

    /// Wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V0_1 => "0.1",
        }
    }

    /// Parses a wire tag, rejecting anything unknown.
    pub fn parse(value: &str) -> Result<Self, EntryError> {
        match value {
            "0.1" => Ok(SchemaVersion::V0_1),
            other => Err(EntryError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Entry kind. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// New credit minted for an outcome.
    #[serde(rename = "credit_mint")]
    CreditMint,
}

impl EntryKind {
    /// Wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::CreditMint => "credit_mint",
        }
    }

    /// Parses a wire tag, rejecting anything unknown.
    pub fn parse(value: &str) -> Result<Self, EntryError> {
        match value {
            "credit_mint" => Ok(EntryKind::CreditMint),
            other => Err(EntryError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Externally verifiable outcome that triggered the entry. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// A pull request was merged.
    #[serde(rename = "pr_merged")]
    PrMerged,
}

impl Outcome {
    /// Wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::PrMerged => "pr_merged",
        }
    }

    /// Parses a wire tag, rejecting anything unknown.
    pub fn parse(value: &str) -> Result<Self, EntryError> {
        match value {
            "pr_merged" => Ok(Outcome::PrMerged),
            other => Err(EntryError::UnsupportedOutcome(other.to_string())),
        }
    }
}

/// Every hashed field of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFields {
    /// Protocol version.
    pub version: SchemaVersion,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Numeric id of the external event (pull-request number).
    #[serde(rename = "pr_number")]
    pub event_id: u64,
    /// Outcome tag.
    pub outcome: Outcome,
    /// Link to the originating event.
    #[serde(rename = "source")]
    pub source_url: SourceUrl,
    /// Credit per actor.
    pub distribution: Distribution,
    /// When the entry was created.
    pub timestamp: Timestamp,
    /// Predecessor link.
    pub prev_hash: PrevHash,
}

/// Hash input: credits rendered as fixed decimal text, never floats.
#[derive(Serialize)]
struct HashView<'a> {
    version: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    pr_number: u64,
    outcome: &'static str,
    source: &'a str,
    distribution: BTreeMap<&'a str, String>,
    timestamp: &'a str,
    prev_hash: &'a str,
}

impl EntryFields {
    /// Fields of a `credit_mint`/`pr_merged` entry at the current version.
    pub fn credit_mint(
        event_id: u64,
        source_url: SourceUrl,
        distribution: Distribution,
        timestamp: Timestamp,
        prev_hash: PrevHash,
    ) -> Self {
        Self {
            version: SchemaVersion::CURRENT,
            kind: EntryKind::CreditMint,
            event_id,
            outcome: Outcome::PrMerged,
            source_url,
            distribution,
            timestamp,
            prev_hash,
        }
    }

    /// Sum of all distributed credit.
    pub fn total(&self) -> Credit {
        self.distribution.values().sum()
    }

    fn hash_view(&self) -> HashView<'_> {
        HashView {
            version: self.version.as_str(),
            kind: self.kind.as_str(),
            pr_number: self.event_id,
            outcome: self.outcome.as_str(),
            source: self.source_url.as_str(),
            distribution: self
                .distribution
                .iter()
                .map(|(actor, credit)| (actor.as_str(), credit.to_decimal_string()))
                .collect(),
            timestamp: self.timestamp.as_str(),
            prev_hash: self.prev_hash.as_str(),
        }
    }
}

/// Computes the hex SHA-256 of the canonical form of `fields`.
///
/// Pure and deterministic: equal fields always give equal hashes.
pub fn compute_hash(fields: &EntryFields) -> Result<EntryHash, EntryError> {
    compute_content_hash(&fields.hash_view(), &Canonicalizer::new())
        .map_err(|e| EntryError::Hashing(e.to_string()))
}

/// One immutable credit-distribution record.
///
/// Fields are private: once built, an entry can only be read. The one
/// exception is attaching the external record id, which consumes the entry
/// and does not affect its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    #[serde(flatten)]
    fields: EntryFields,
    hash: EntryHash,
    #[serde(rename = "comment_id", skip_serializing_if = "Option::is_none")]
    external_record_id: Option<u64>,
}

impl Entry {
    /// Hashes `fields` and wraps them into an entry.
    pub fn seal(fields: EntryFields) -> Result<Self, EntryError> {
        let hash = compute_hash(&fields)?;
        Ok(Self {
            fields,
            hash,
            external_record_id: None,
        })
    }

    /// Assembles an entry without checking the hash. Use [`validate_entry`] before trusting it.
    pub fn from_parts(fields: EntryFields, hash: EntryHash, external_record_id: Option<u64>) -> Self {
        Self {
            fields,
            hash,
            external_record_id,
        }
    }

    /// Returns the same entry carrying the given external record id.
    pub fn with_external_record_id(mut self, id: u64) -> Self {
        self.external_record_id = Some(id);
        self
    }

    /// Hashed fields.
    pub fn fields(&self) -> &EntryFields {
        &self.fields
    }

    /// External event id (pull-request number).
    pub fn event_id(&self) -> u64 {
        self.fields.event_id
    }

    /// Link to the originating event.
    pub fn source_url(&self) -> &SourceUrl {
        &self.fields.source_url
    }

    /// Credit per actor.
    pub fn distribution(&self) -> &Distribution {
        &self.fields.distribution
    }

    /// Creation time.
    pub fn timestamp(&self) -> &Timestamp {
        &self.fields.timestamp
    }

    /// Predecessor link.
    pub fn prev_hash(&self) -> &PrevHash {
        &self.fields.prev_hash
    }

    /// Stored hash.
    pub fn hash(&self) -> &EntryHash {
        &self.hash
    }

    /// Id of the external record carrying this entry, once published.
    pub fn external_record_id(&self) -> Option<u64> {
        self.external_record_id
    }

    /// JSON value with sorted keys, as published.
    pub fn to_json_value(&self) -> serde_json::Value {
        // Entry serialization cannot fail: all keys are strings and credits are finite.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = EntryRecord::deserialize(deserializer)?;
        Entry::try_from(record).map_err(serde::de::Error::custom)
    }
}

/// Loosely-typed entry as found on disk or in a comment.
///
/// Anything shaped like an entry deserializes into this; conversion into
/// [`Entry`] applies the closed-set and field checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// `version` tag.
    #[serde(default)]
    pub version: Option<String>,
    /// `type` tag.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Pull-request number.
    #[serde(default)]
    pub pr_number: Option<u64>,
    /// `outcome` tag.
    #[serde(default)]
    pub outcome: Option<String>,
    /// Source URL.
    #[serde(default)]
    pub source: Option<String>,
    /// Raw amounts.
    #[serde(default)]
    pub distribution: Option<BTreeMap<String, f64>>,
    /// Creation time.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Predecessor link.
    #[serde(default)]
    pub prev_hash: Option<String>,
    /// Stored hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// External record id.
    #[serde(default)]
    pub comment_id: Option<u64>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, EntryError> {
    value.ok_or(EntryError::MissingField(field))
}

fn required_str(value: Option<String>, field: &'static str) -> Result<String, EntryError> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(EntryError::MissingField(field)),
    }
}

fn invalid(field: &'static str) -> impl Fn(ValidationError) -> EntryError {
    move |e| EntryError::InvalidField {
        field,
        reason: e.to_string(),
    }
}

impl TryFrom<EntryRecord> for Entry {
    type Error = EntryError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let version = SchemaVersion::parse(&required_str(record.version, "version")?)?;
        let kind = EntryKind::parse(&required_str(record.kind, "type")?)?;
        let event_id = required(record.pr_number, "pr_number")?;
        let outcome = Outcome::parse(&required_str(record.outcome, "outcome")?)?;
        let source_url =
            SourceUrl::parse(required_str(record.source, "source")?).map_err(invalid("source"))?;
        let timestamp = Timestamp::parse(required_str(record.timestamp, "timestamp")?)
            .map_err(invalid("timestamp"))?;
        let prev_hash = PrevHash::parse(&required_str(record.prev_hash, "prev_hash")?)
            .map_err(invalid("prev_hash"))?;
        let hash =
            EntryHash::parse(required_str(record.hash, "hash")?).map_err(invalid("hash"))?;

        let raw = required(record.distribution, "distribution")?;
        if raw.is_empty() {
            return Err(EntryError::EmptyDistribution);
        }
        let mut distribution = Distribution::new();
        for (actor, amount) in raw {
            let credit = Credit::from_f64(amount).map_err(|e| match e {
                ValidationError::NegativeAmount(amount) => EntryError::NegativeAmount {
                    actor: actor.clone(),
                    amount,
                },
                other => invalid("distribution")(other),
            })?;
            let actor = ActorId::parse(actor).map_err(invalid("distribution"))?;
            distribution.insert(actor, credit);
        }

        Ok(Entry {
            fields: EntryFields {
                version,
                kind,
                event_id,
                outcome,
                source_url,
                distribution,
                timestamp,
                prev_hash,
            },
            hash,
            external_record_id: record.comment_id,
        })
    }
}

/// Structural check plus hash recomputation.
///
/// Closed-set tags and field formats are enforced when an [`Entry`] is
/// built; this re-checks what a typed entry can still get wrong and then
/// compares the stored hash with a fresh one.
pub fn validate_entry(entry: &Entry) -> Result<(), EntryError> {
    if entry.fields.distribution.is_empty() {
        return Err(EntryError::EmptyDistribution);
    }
    let computed = compute_hash(&entry.fields)?;
    if computed != entry.hash {
        return Err(EntryError::BadHash {
            stored: entry.hash.clone(),
            computed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(prev: PrevHash) -> EntryFields {
        let mut distribution = Distribution::new();
        distribution.insert(ActorId::parse("alice").unwrap(), Credit::from_whole(50));
        distribution.insert(ActorId::parse("bob").unwrap(), Credit::from_whole(35));
        distribution.insert(ActorId::parse("carol").unwrap(), Credit::from_whole(15));
        EntryFields::credit_mint(
            42,
            SourceUrl::parse("https://github.com/acme/widgets/pull/42").unwrap(),
            distribution,
            Timestamp::parse("2024-01-15T10:30:00Z").unwrap(),
            prev,
        )
    }

    #[test]
    fn seal_matches_golden_hash() {
        let entry = Entry::seal(fields(PrevHash::Genesis)).unwrap();
        assert_eq!(
            entry.hash().as_str(),
            "48d5aba29a1f8543e4821e3094ab4960d01c0f9de1b7b84ade7bdd2189be71e6"
        );
        assert!(validate_entry(&entry).is_ok());
    }

    #[test]
    fn hash_is_pure() {
        let a = compute_hash(&fields(PrevHash::Genesis)).unwrap();
        let b = compute_hash(&fields(PrevHash::Genesis)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn altering_one_amount_changes_hash() {
        let original = fields(PrevHash::Genesis);
        let mut altered = original.clone();
        altered
            .distribution
            .insert(ActorId::parse("carol").unwrap(), Credit::from_hundredths(1501));
        assert_ne!(compute_hash(&original).unwrap(), compute_hash(&altered).unwrap());
    }

    #[test]
    fn external_record_id_does_not_affect_hash() {
        let entry = Entry::seal(fields(PrevHash::Genesis)).unwrap();
        let published = entry.clone().with_external_record_id(9001);
        assert_eq!(entry.hash(), published.hash());
        assert!(validate_entry(&published).is_ok());
    }

    #[test]
    fn json_round_trip_preserves_hash() {
        let entry = Entry::seal(fields(PrevHash::Genesis))
            .unwrap()
            .with_external_record_id(7);
        let text = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, entry);
        assert!(validate_entry(&back).is_ok());
    }

    #[test]
    fn tampered_amount_is_bad_hash() {
        let entry = Entry::seal(fields(PrevHash::Genesis)).unwrap();
        let mut value = entry.to_json_value();
        value["distribution"]["bob"] = json!(36.0);
        let tampered: Entry = serde_json::from_value(value).unwrap();
        assert!(matches!(
            validate_entry(&tampered),
            Err(EntryError::BadHash { .. })
        ));
    }

    #[test]
    fn sub_hundredth_edit_is_rejected() {
        let entry = Entry::seal(fields(PrevHash::Genesis)).unwrap();
        let mut value = entry.to_json_value();
        value["distribution"]["alice"] = json!(50.000000004);
        assert!(serde_json::from_value::<Entry>(value).is_err());
    }

    fn valid_record() -> EntryRecord {
        let entry = Entry::seal(fields(PrevHash::Genesis)).unwrap();
        serde_json::from_value(entry.to_json_value()).unwrap()
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut record = valid_record();
        record.version = Some("0.2".into());
        assert_eq!(
            Entry::try_from(record),
            Err(EntryError::UnsupportedVersion("0.2".into()))
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut record = valid_record();
        record.kind = Some("credit_burn".into());
        assert_eq!(
            Entry::try_from(record),
            Err(EntryError::UnsupportedKind("credit_burn".into()))
        );
    }

    #[test]
    fn missing_and_empty_fields() {
        let mut record = valid_record();
        record.source = Some(String::new());
        assert_eq!(Entry::try_from(record), Err(EntryError::MissingField("source")));

        let mut record = valid_record();
        record.hash = None;
        assert_eq!(Entry::try_from(record), Err(EntryError::MissingField("hash")));
    }

    #[test]
    fn negative_and_empty_distributions() {
        let mut record = valid_record();
        record
            .distribution
            .as_mut()
            .unwrap()
            .insert("mallory".into(), -5.0);
        assert!(matches!(
            Entry::try_from(record),
            Err(EntryError::NegativeAmount { .. })
        ));

        let mut record = valid_record();
        record.distribution = Some(BTreeMap::new());
        assert_eq!(Entry::try_from(record), Err(EntryError::EmptyDistribution));
    }
}
