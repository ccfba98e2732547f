//! Reconciliation between the local store and published records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use consilium_canonical::{Credit, EntryHash, PrevHash, Timestamp};
use consilium_core::{
    check_policy_total, compute_distribution, validate_chain_link, validate_entry, verify_chain,
    ChainFault, Distribution, Entry, EntryFields, MergeEvent, RolePolicy,
};
use consilium_store::{IndexDrift, LedgerIndex, LedgerStore, MemoryLedger, StoreError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{IdempotencyConflict, PublishError, ReconcileError};
use crate::source::{Publisher, RecordSource};

/// Result of checking the local store on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Chain and index agree.
    Valid {
        /// Number of entries.
        entry_count: usize,
        /// Current head.
        head_hash: PrevHash,
    },
    /// Entry `index` (zero-based) failed.
    InvalidAt {
        /// Position of the first bad entry.
        index: usize,
        /// Why it failed.
        reason: ChainFault,
    },
    /// Chain is valid but the index disagrees with it.
    IndexDrift(IndexDrift),
}

impl VerifyOutcome {
    /// Whether the store passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid { .. })
    }
}

/// One disagreement found by [`Reconciler::remote_verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// Record carries markers but no readable entry.
    UnparseableRecord {
        /// External record id.
        record_id: u64,
        /// Parser message.
        reason: String,
    },
    /// Record's entry fails its own hash or structure check.
    InvalidRemoteEntry {
        /// External record id.
        record_id: u64,
        /// Validation message.
        reason: String,
    },
    /// Record mints a total other than the policy's.
    PolicyTotalMismatch {
        /// External record id.
        record_id: u64,
        /// Policy total.
        expected: Credit,
        /// Sum of the record's distribution.
        actual: Credit,
    },
    /// Record is posted on a different event than the one it carries.
    MisplacedRecord {
        /// External record id.
        record_id: u64,
        /// Event the record was posted on.
        posted_on: u64,
        /// Event inside the record.
        event_id: u64,
    },
    /// Published records do not form a chain in publication order.
    RemoteChainBreak {
        /// External record id of the record that does not link.
        record_id: u64,
        /// Link message.
        reason: String,
    },
    /// The same event is published more than once.
    DuplicateRemoteEvent {
        /// Event concerned.
        event_id: u64,
        /// First record.
        first: u64,
        /// Repeated record.
        second: u64,
    },
    /// Local entry has never been published.
    Unpublished {
        /// Local sequence number.
        seq: u64,
        /// Event concerned.
        event_id: u64,
    },
    /// Local entry points at a record the host does not have.
    MissingRemotely {
        /// Local sequence number.
        seq: u64,
        /// Record id stored locally.
        external_record_id: u64,
    },
    /// Local and published hashes differ.
    HashMismatch {
        /// Local sequence number.
        seq: u64,
        /// Record id.
        external_record_id: u64,
        /// Local hash.
        local: EntryHash,
        /// Published hash.
        remote: EntryHash,
    },
    /// Published record absent from the local store.
    MissingLocally {
        /// External record id.
        record_id: u64,
        /// Event carried by the record.
        event_id: u64,
    },
    /// Local order differs from publication order.
    OrderMismatch {
        /// Local sequence number.
        seq: u64,
        /// Record id.
        external_record_id: u64,
    },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::UnparseableRecord { record_id, reason } => {
                write!(f, "record {}: unparseable ({})", record_id, reason)
            }
            Divergence::InvalidRemoteEntry { record_id, reason } => {
                write!(f, "record {}: invalid entry ({})", record_id, reason)
            }
            Divergence::PolicyTotalMismatch {
                record_id,
                expected,
                actual,
            } => write!(
                f,
                "record {}: mints {}, policy total is {}",
                record_id, actual, expected
            ),
            Divergence::MisplacedRecord {
                record_id,
                posted_on,
                event_id,
            } => write!(
                f,
                "record {}: posted on #{} but carries event {}",
                record_id, posted_on, event_id
            ),
            Divergence::RemoteChainBreak { record_id, reason } => {
                write!(f, "record {}: published chain broken ({})", record_id, reason)
            }
            Divergence::DuplicateRemoteEvent {
                event_id,
                first,
                second,
            } => write!(
                f,
                "event {} published twice (records {} and {})",
                event_id, first, second
            ),
            Divergence::Unpublished { seq, event_id } => {
                write!(f, "entry {} (event {}): missing comment_id", seq, event_id)
            }
            Divergence::MissingRemotely {
                seq,
                external_record_id,
            } => write!(
                f,
                "entry {}: comment_id {} not found on host",
                seq, external_record_id
            ),
            Divergence::HashMismatch {
                seq,
                external_record_id,
                local,
                remote,
            } => write!(
                f,
                "entry {}: hash mismatch with record {} (local={}, remote={})",
                seq,
                external_record_id,
                local.short(),
                remote.short()
            ),
            Divergence::MissingLocally {
                record_id,
                event_id,
            } => write!(
                f,
                "record {} (event {}) not in local ledger",
                record_id, event_id
            ),
            Divergence::OrderMismatch {
                seq,
                external_record_id,
            } => write!(
                f,
                "entry {}: record {} is out of publication order",
                seq, external_record_id
            ),
        }
    }
}

/// Outcome of [`Reconciler::remote_verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteReport {
    /// Records fetched from the host.
    pub records_checked: usize,
    /// Local entries compared.
    pub entries_checked: usize,
    /// Every disagreement found.
    pub divergences: Vec<Divergence>,
}

impl RemoteReport {
    /// Whether local and remote agree completely.
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Where a rebuild starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Keep local entries and add what is missing.
    Incremental,
    /// Start from nothing and replay every record.
    Full,
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    /// Records fetched.
    pub records_fetched: usize,
    /// Entries appended.
    pub entries_added: usize,
    /// Records skipped because their event was already present.
    pub records_skipped: usize,
    /// Local entries whose record id was learned during the rebuild.
    pub publications_adopted: usize,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
    /// Index of the rebuilt store.
    pub index: LedgerIndex,
}

/// Outcome of [`Reconciler::mint_and_append`].
#[derive(Debug, Clone, PartialEq)]
pub enum MintOutcome {
    /// A new entry was appended and published.
    Minted {
        /// Sequence number.
        seq: u64,
        /// The entry, with its record id.
        entry: Entry,
    },
    /// The event was already recorded and published; nothing was minted.
    AlreadyRecorded {
        /// Sequence number.
        seq: u64,
        /// Record id.
        external_record_id: u64,
    },
}

/// Reconciles a store with the record host.
///
/// Holds the store handle explicitly; there is no global ledger state.
/// Published records are checked against `policy`, the default role policy
/// unless replaced with [`Reconciler::with_policy`].
pub struct Reconciler<'a, S: LedgerStore> {
    store: &'a mut S,
    policy: RolePolicy,
}

impl<'a, S: LedgerStore> Reconciler<'a, S> {
    /// Reconciler over `store`.
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            policy: RolePolicy::default(),
        }
    }

    /// Checks published records against `policy` instead of the default.
    pub fn with_policy(mut self, policy: RolePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The store being reconciled.
    pub fn store(&self) -> &S {
        &*self.store
    }

    /// Verifies every entry, every link and the index. No network access.
    pub fn local_verify(&self) -> Result<VerifyOutcome, ReconcileError> {
        let entries = self.store.load_all()?;
        let report = verify_chain(&entries);
        if let Some(broken) = report.broken_at {
            return Ok(VerifyOutcome::InvalidAt {
                index: broken.index,
                reason: broken.fault,
            });
        }
        match self.store.verify_index() {
            Ok(()) => {}
            Err(StoreError::IndexDrift(drift)) => return Ok(VerifyOutcome::IndexDrift(drift)),
            Err(e) => return Err(e.into()),
        }
        Ok(VerifyOutcome::Valid {
            entry_count: report.entry_count,
            head_hash: PrevHash::from(report.head_hash.as_ref()),
        })
    }

    /// Compares the store with every published record. Never writes.
    pub fn remote_verify(
        &self,
        source: &impl RecordSource,
    ) -> Result<RemoteReport, ReconcileError> {
        let records = source.fetch_all_records(None)?;
        let local = self.store.load_all()?;
        let mut divergences = Vec::new();

        // Published side on its own: parse, hash, chain, duplicates.
        let mut remote: Vec<(u64, &Entry)> = Vec::new();
        for record in &records {
            match &record.parsed {
                Err(e) => divergences.push(Divergence::UnparseableRecord {
                    record_id: record.record_id,
                    reason: e.to_string(),
                }),
                Ok(entry) => match validate_entry(entry) {
                    Err(e) => divergences.push(Divergence::InvalidRemoteEntry {
                        record_id: record.record_id,
                        reason: e.to_string(),
                    }),
                    Ok(()) => {
                        if entry.fields().total() != self.policy.total {
                            divergences.push(Divergence::PolicyTotalMismatch {
                                record_id: record.record_id,
                                expected: self.policy.total,
                                actual: entry.fields().total(),
                            });
                        }
                        if let Some(posted_on) = record.event_id_hint {
                            if posted_on != entry.event_id() {
                                divergences.push(Divergence::MisplacedRecord {
                                    record_id: record.record_id,
                                    posted_on,
                                    event_id: entry.event_id(),
                                });
                            }
                        }
                        remote.push((record.record_id, entry));
                    }
                },
            }
        }

        let mut first_record_for_event: BTreeMap<u64, u64> = BTreeMap::new();
        for (position, (record_id, entry)) in remote.iter().enumerate() {
            let prev = position.checked_sub(1).map(|p| remote[p].1);
            if let Err(e) = validate_chain_link(entry, prev) {
                divergences.push(Divergence::RemoteChainBreak {
                    record_id: *record_id,
                    reason: e.to_string(),
                });
            }
            if let Some(first) = first_record_for_event.get(&entry.event_id()) {
                divergences.push(Divergence::DuplicateRemoteEvent {
                    event_id: entry.event_id(),
                    first: *first,
                    second: *record_id,
                });
            } else {
                first_record_for_event.insert(entry.event_id(), *record_id);
            }
        }

        // Local against published.
        let position_of: BTreeMap<u64, (usize, &Entry)> = remote
            .iter()
            .enumerate()
            .map(|(position, (id, entry))| (*id, (position, *entry)))
            .collect();
        let mut local_ids = BTreeSet::new();
        let mut last_position = None;
        for (i, entry) in local.iter().enumerate() {
            let seq = i as u64 + 1;
            let Some(external_record_id) = entry.external_record_id() else {
                divergences.push(Divergence::Unpublished {
                    seq,
                    event_id: entry.event_id(),
                });
                continue;
            };
            local_ids.insert(external_record_id);
            let Some((position, published)) = position_of.get(&external_record_id) else {
                divergences.push(Divergence::MissingRemotely {
                    seq,
                    external_record_id,
                });
                continue;
            };
            if published.hash() != entry.hash() {
                divergences.push(Divergence::HashMismatch {
                    seq,
                    external_record_id,
                    local: entry.hash().clone(),
                    remote: published.hash().clone(),
                });
            }
            if last_position.is_some_and(|last| *position < last) {
                divergences.push(Divergence::OrderMismatch {
                    seq,
                    external_record_id,
                });
            }
            last_position = Some(*position);
        }

        for (record_id, entry) in &remote {
            if !local_ids.contains(record_id) {
                divergences.push(Divergence::MissingLocally {
                    record_id: *record_id,
                    event_id: entry.event_id(),
                });
            }
        }

        info!(
            records = records.len(),
            entries = local.len(),
            divergences = divergences.len(),
            "remote verification finished"
        );
        Ok(RemoteReport {
            records_checked: records.len(),
            entries_checked: local.len(),
            divergences,
        })
    }

    /// Replays published records into a staging ledger and swaps it in.
    ///
    /// The store is only touched once every record has validated. Incremental
    /// and full rebuilds of the same records produce the same store: an
    /// incremental rebuild that meets a local entry differing from its
    /// published record fails with [`IdempotencyConflict::PublishedDiffers`],
    /// and a full rebuild replaces it, reporting each replaced or dropped
    /// local entry in [`RebuildReport::warnings`].
    pub fn rebuild(
        &mut self,
        source: &impl RecordSource,
        mode: RebuildMode,
    ) -> Result<RebuildReport, ReconcileError> {
        let local = self.store.load_all()?;
        let (mut staging, after) = match mode {
            RebuildMode::Full => (MemoryLedger::new(), None),
            RebuildMode::Incremental => {
                let cursor = local.last().and_then(Entry::external_record_id);
                (MemoryLedger::from_entries(local.clone())?, cursor)
            }
        };
        let records = source.fetch_all_records(after)?;
        info!(records = records.len(), ?mode, after, "rebuilding from published records");

        let mut report = RebuildReport {
            records_fetched: records.len(),
            entries_added: 0,
            records_skipped: 0,
            publications_adopted: 0,
            warnings: Vec::new(),
            index: LedgerIndex::default(),
        };
        let mut head = staging.load_all()?.pop();
        // First record seen per event in this fetch, with its hash.
        let mut seen: BTreeMap<u64, (u64, EntryHash)> = BTreeMap::new();

        for record in records {
            let record_id = record.record_id;
            let entry = record
                .parsed
                .map_err(|e| ReconcileError::InvalidRecord {
                    record_id,
                    reason: e.to_string(),
                })?
                .with_external_record_id(record_id);
            let event_id = entry.event_id();

            if let Some((first, hash)) = seen.get(&event_id) {
                if hash != entry.hash() {
                    return Err(IdempotencyConflict::ConflictingRemoteRecords {
                        event_id,
                        first: *first,
                        second: record_id,
                    }
                    .into());
                }
                warn!(record_id, event_id, "duplicate record skipped");
                report.warnings.push(format!(
                    "record {} repeats event {} (first published as {})",
                    record_id, event_id, first
                ));
                report.records_skipped += 1;
                continue;
            }
            seen.insert(event_id, (record_id, entry.hash().clone()));

            if let Some((seq, existing)) = staging.find_by_event_id(event_id)? {
                if existing.hash() != entry.hash() {
                    return Err(IdempotencyConflict::PublishedDiffers {
                        event_id,
                        seq,
                        external_record_id: record_id,
                    }
                    .into());
                }
                if existing.external_record_id().is_none() {
                    staging.record_publication(seq, record_id)?;
                    report.publications_adopted += 1;
                }
                debug!(record_id, event_id, "already present");
                report.records_skipped += 1;
                continue;
            }

            let invalid = |reason: String| ReconcileError::InvalidRecord { record_id, reason };
            validate_entry(&entry).map_err(|e| invalid(e.to_string()))?;
            check_policy_total(&entry, &self.policy).map_err(|e| invalid(e.to_string()))?;
            validate_chain_link(&entry, head.as_ref()).map_err(|e| invalid(e.to_string()))?;
            staging
                .append(entry.clone())
                .map_err(|e| invalid(e.to_string()))?;
            head = Some(entry);
            report.entries_added += 1;
        }

        if mode == RebuildMode::Full {
            for (i, previous) in local.iter().enumerate() {
                let seq = i as u64 + 1;
                let note = match staging.find_by_event_id(previous.event_id())? {
                    None => format!(
                        "local entry {} for event {} is not published; dropped",
                        seq,
                        previous.event_id()
                    ),
                    Some((_, rebuilt)) if rebuilt.hash() != previous.hash() => format!(
                        "local entry {} for event {} replaced by its published record",
                        seq,
                        previous.event_id()
                    ),
                    Some(_) => continue,
                };
                warn!(seq, event_id = previous.event_id(), "{}", note);
                report.warnings.push(note);
            }
        }

        report.index = self.store.replace_all(staging.into_entries())?;
        info!(
            added = report.entries_added,
            skipped = report.records_skipped,
            entries = report.index.entry_count,
            "rebuild complete"
        );
        Ok(report)
    }

    /// Records a merge: computes the distribution, appends it, then publishes it.
    ///
    /// Safe to re-run for the same event. An event already recorded and
    /// published is reported as such; one recorded but unpublished is only
    /// published; one published but missing locally is refused with a
    /// rebuild hint. A publish failure after the append leaves the entry
    /// committed and is reported as [`ReconcileError::PublishPending`].
    pub fn mint_and_append(
        &mut self,
        event: &MergeEvent,
        policy: &RolePolicy,
        source: &impl RecordSource,
        publisher: &impl Publisher,
        now: Timestamp,
    ) -> Result<MintOutcome, ReconcileError> {
        if let Some((seq, entry)) = self.store.find_by_event_id(event.event_id)? {
            if let Some(external_record_id) = entry.external_record_id() {
                return Ok(MintOutcome::AlreadyRecorded {
                    seq,
                    external_record_id,
                });
            }
            if let Some(record) = source.existing_record(event.event_id)? {
                let external_record_id = record.record_id;
                match &record.parsed {
                    Ok(published) if published.hash() == entry.hash() => {}
                    _ => {
                        return Err(IdempotencyConflict::PublishedDiffers {
                            event_id: event.event_id,
                            seq,
                            external_record_id,
                        }
                        .into())
                    }
                }
                info!(seq, external_record_id, "adopting existing publication");
                self.store.record_publication(seq, external_record_id)?;
                return Ok(MintOutcome::AlreadyRecorded {
                    seq,
                    external_record_id,
                });
            }
            info!(seq, event_id = event.event_id, "retrying publish of committed entry");
            return self.publish(seq, entry, publisher);
        }

        if let Some(external_record_id) = source.find_existing_record(event.event_id)? {
            return Err(IdempotencyConflict::RemoteExistsLocalMissing {
                event_id: event.event_id,
                external_record_id,
            }
            .into());
        }

        let distribution: Distribution = compute_distribution(event, policy)?;
        let entry = Entry::seal(EntryFields::credit_mint(
            event.event_id,
            event.source_url.clone(),
            distribution,
            now,
            self.store.head_hash()?,
        ))?;
        let seq = match self.store.append(entry.clone()) {
            Ok(seq) => seq,
            Err(StoreError::DuplicateEventId(event_id)) => {
                return Err(IdempotencyConflict::ConcurrentMint { event_id }.into())
            }
            Err(e) => return Err(e.into()),
        };
        self.publish(seq, entry, publisher)
    }

    fn publish(
        &mut self,
        seq: u64,
        entry: Entry,
        publisher: &impl Publisher,
    ) -> Result<MintOutcome, ReconcileError> {
        let external_record_id = match publisher.publish(&entry) {
            Ok(id) => id,
            Err(PublishError::ConflictingRecord { external_record_id }) => {
                return Err(IdempotencyConflict::PublishedDiffers {
                    event_id: entry.event_id(),
                    seq,
                    external_record_id,
                }
                .into())
            }
            Err(source) => return Err(ReconcileError::PublishPending { seq, source }),
        };
        self.store.record_publication(seq, external_record_id)?;
        info!(
            seq,
            external_record_id,
            hash = entry.hash().short(),
            "entry published"
        );
        Ok(MintOutcome::Minted {
            seq,
            entry: entry.with_external_record_id(external_record_id),
        })
    }
}
