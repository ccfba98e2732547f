use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use consilium_canonical::{ActorId, Credit, SourceUrl, Timestamp};
use serde::{Deserialize, Serialize};

use crate::entry::{Distribution, Entry};
use crate::errors::RuleError;

/// Allowed deviation of the share sum from 1.0.
pub const SHARE_TOLERANCE: f64 = 1e-9;

/// State of one review as reported by the code host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewVerdict {
    /// Approved the change.
    Approved,
    /// Asked for changes.
    ChangesRequested,
    /// Review was dismissed after submission.
    Dismissed,
    /// Left comments only.
    Commented,
    /// Started but never submitted.
    Pending,
}

impl ReviewVerdict {
    /// Whether the latest state makes the actor a reviewer.
    pub fn is_review(self) -> bool {
        matches!(
            self,
            ReviewVerdict::Approved | ReviewVerdict::ChangesRequested | ReviewVerdict::Dismissed
        )
    }

    /// Whether the latest state makes the actor an approver.
    pub fn is_approval(self) -> bool {
        self == ReviewVerdict::Approved
    }
}

/// One review record on a merged change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    /// Reviewer.
    pub actor: ActorId,
    /// What the review said.
    pub state: ReviewVerdict,
    /// Submission time.
    pub submitted_at: Timestamp,
}

/// A merged pull request with its review history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeEvent {
    /// Pull-request number.
    pub event_id: u64,
    /// Link to the pull request.
    pub source_url: SourceUrl,
    /// Pull-request author.
    pub author: ActorId,
    /// Every review record, in the order the host returned them.
    pub reviews: Vec<ReviewState>,
    /// Merge time.
    pub timestamp: Timestamp,
}

/// Credit minted per merge and how it is split across roles.
///
/// Deserializes from the `credit.pr_merged` block of `consilium.yaml`;
/// missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePolicy {
    /// Credit minted per event.
    pub total: Credit,
    /// Fraction for the author.
    #[serde(rename = "author")]
    pub author_share: f64,
    /// Fraction split equally across reviewers.
    #[serde(rename = "reviewers")]
    pub reviewer_share: f64,
    /// Fraction split equally across approvers.
    #[serde(rename = "approvers")]
    pub approver_share: f64,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            total: Credit::from_whole(100),
            author_share: 0.5,
            reviewer_share: 0.3,
            approver_share: 0.2,
        }
    }
}

impl RolePolicy {
    /// Rejects a zero total, out-of-range shares and shares not summing to one.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.total == Credit::ZERO {
            return Err(RuleError::InvalidTotal);
        }
        for (role, value) in [
            ("author", self.author_share),
            ("reviewer", self.reviewer_share),
            ("approver", self.approver_share),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(RuleError::InvalidShare { role, value });
            }
        }
        let sum = self.author_share + self.reviewer_share + self.approver_share;
        if (sum - 1.0).abs() > SHARE_TOLERANCE {
            return Err(RuleError::SharesDoNotSumToOne { sum });
        }
        Ok(())
    }
}

// Latest verdict per actor; on equal times the later record wins.
fn latest_verdicts(
    reviews: &[ReviewState],
) -> Result<BTreeMap<&ActorId, (DateTime<Utc>, ReviewVerdict)>, RuleError> {
    let mut latest: BTreeMap<&ActorId, (DateTime<Utc>, ReviewVerdict)> = BTreeMap::new();
    for review in reviews {
        let at = review
            .submitted_at
            .to_datetime()
            .map_err(|_| RuleError::InvalidTimestamp {
                actor: review.actor.to_string(),
                value: review.submitted_at.to_string(),
            })?;
        match latest.get(&review.actor) {
            Some((seen, _)) if *seen > at => {}
            _ => {
                latest.insert(&review.actor, (at, review.state));
            }
        }
    }
    Ok(latest)
}

fn pool(total: u64, share: f64) -> u64 {
    (total as f64 * share).round() as u64
}

/// Splits `policy.total` across the author, reviewers and approvers of `event`.
///
/// Amounts are fixed-point hundredths: each role pool is split by integer
/// division and the author takes whatever is left, so the result always sums
/// exactly to the total. Empty reviewer or approver sets fold their pool into
/// the author. Same inputs give the same map.
pub fn compute_distribution(
    event: &MergeEvent,
    policy: &RolePolicy,
) -> Result<Distribution, RuleError> {
    policy.validate()?;

    let mut reviewers = Vec::new();
    let mut approvers = Vec::new();
    for (actor, (_, verdict)) in latest_verdicts(&event.reviews)? {
        if *actor == event.author {
            continue;
        }
        if verdict.is_review() {
            reviewers.push(actor);
        }
        if verdict.is_approval() {
            approvers.push(actor);
        }
    }

    let total = policy.total.hundredths();
    let reviewer_pool = if reviewers.is_empty() {
        0
    } else {
        pool(total, policy.reviewer_share).min(total)
    };
    let approver_pool = if approvers.is_empty() {
        0
    } else {
        pool(total, policy.approver_share).min(total - reviewer_pool)
    };

    let mut others: BTreeMap<ActorId, Credit> = BTreeMap::new();
    for (members, amount) in [(&reviewers, reviewer_pool), (&approvers, approver_pool)] {
        if members.is_empty() {
            continue;
        }
        let (each, _) = Credit::from_hundredths(amount).split(members.len() as u64);
        for actor in members.iter() {
            *others.entry((*actor).clone()).or_default() += each;
        }
    }

    let paid: Credit = others.values().sum();
    let mut distribution: Distribution = others
        .into_iter()
        .filter(|(_, credit)| *credit > Credit::ZERO)
        .collect();
    distribution.insert(event.author.clone(), policy.total - paid);
    Ok(distribution)
}

/// Checks that `entry` mints exactly `policy.total`.
///
/// Published records carry no reviews, so this is the part of the rule a
/// reader can re-check without the merge event.
pub fn check_policy_total(entry: &Entry, policy: &RolePolicy) -> Result<(), RuleError> {
    let actual = entry.fields().total();
    if actual != policy.total {
        return Err(RuleError::TotalMismatch {
            event_id: entry.event_id(),
            expected: policy.total,
            actual,
        });
    }
    Ok(())
}
