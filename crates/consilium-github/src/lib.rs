//! GitHub as the record host for the Consilium ledger.
//!
//! Ledger entries are published as pull-request comments carrying a marked
//! JSON block. This crate provides:
//! - [`GitHubClient`]: authenticated REST calls with pagination, timeouts
//!   and rate-limit aware retry
//! - [`GitHubRecords`]: a repository's comments as a
//!   [`RecordSource`](consilium_reconcile::RecordSource) and
//!   [`Publisher`](consilium_reconcile::Publisher)
//! - Merge-event loading and webhook parsing for live minting
//!
#![deny(missing_docs)]

/// HTTP client and status classification.
pub mod client;
/// Comment records.
pub mod comments;
/// Error types.
pub mod errors;
/// Pull requests, reviews and webhooks.
pub mod pulls;
/// Repository coordinates.
pub mod repo;

pub use client::{classify_status, GitHubClient, RateLimit, DEFAULT_API_BASE_URL};
pub use comments::{pr_number_from_issue_url, records_from_comments, GitHubRecords, IssueComment};
pub use errors::GitHubError;
pub use pulls::{merge_event_from, parse_webhook, PullRequest, Review, WebhookMerge};
pub use repo::RepoSlug;
