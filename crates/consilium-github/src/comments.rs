//! Ledger records carried in pull-request comments.

use std::cell::Cell;

use consilium_core::{parse_comment, render_comment, Entry, COMMENT_BEGIN};
use consilium_reconcile::{ExternalRecord, PublishError, Publisher, RecordSource, TransientApiError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::GitHubClient;
use crate::repo::RepoSlug;

/// Issue comment as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    /// Comment id.
    pub id: u64,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// API link to the issue the comment belongs to.
    #[serde(default)]
    pub issue_url: String,
}

#[derive(Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct CreatedComment {
    id: Option<u64>,
}

enum PublishAttempt {
    Created(CreatedComment),
    Found(ExternalRecord),
}

// A record found after a failed POST counts only if it carries `entry`.
fn adopt_landed(entry: &Entry, record: ExternalRecord) -> Result<u64, PublishError> {
    match &record.parsed {
        Ok(published) if published.hash() == entry.hash() => {
            info!(comment_id = record.record_id, "earlier publish attempt landed");
            Ok(record.record_id)
        }
        _ => {
            warn!(
                comment_id = record.record_id,
                pr = entry.event_id(),
                "pull request already carries a different ledger record"
            );
            Err(PublishError::ConflictingRecord {
                external_record_id: record.record_id,
            })
        }
    }
}

/// Pull-request number at the end of an `issue_url`.
pub fn pr_number_from_issue_url(issue_url: &str) -> Option<u64> {
    issue_url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Turns marked comments into records, oldest id first.
///
/// Comments without the record marker are dropped; marked comments that do
/// not parse are kept with their error.
pub fn records_from_comments(
    comments: impl IntoIterator<Item = IssueComment>,
    after: Option<u64>,
) -> Vec<ExternalRecord> {
    let mut records: Vec<ExternalRecord> = comments
        .into_iter()
        .filter(|comment| after.map_or(true, |after| comment.id > after))
        .filter_map(|comment| {
            let body = comment.body.as_deref()?;
            if !body.contains(COMMENT_BEGIN) {
                return None;
            }
            let parsed = parse_comment(body)?;
            if let Err(error) = &parsed {
                warn!(comment_id = comment.id, %error, "unreadable ledger comment");
            }
            Some(ExternalRecord {
                record_id: comment.id,
                event_id_hint: pr_number_from_issue_url(&comment.issue_url),
                parsed,
            })
        })
        .collect();
    records.sort_by_key(|record| record.record_id);
    records
}

/// One repository's comments as a ledger record host.
pub struct GitHubRecords {
    client: GitHubClient,
    repo: RepoSlug,
}

impl GitHubRecords {
    /// Record host for `repo`.
    pub fn new(client: GitHubClient, repo: RepoSlug) -> Self {
        Self { client, repo }
    }

    /// Repository served.
    pub fn repo(&self) -> &RepoSlug {
        &self.repo
    }

    /// Underlying client.
    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    fn issue_comments_path(&self, number: u64) -> String {
        format!(
            "/repos/{}/{}/issues/{}/comments",
            self.repo.owner(),
            self.repo.name(),
            number
        )
    }
}

impl RecordSource for GitHubRecords {
    fn fetch_all_records(
        &self,
        after: Option<u64>,
    ) -> Result<Vec<ExternalRecord>, TransientApiError> {
        let path = format!(
            "/repos/{}/{}/issues/comments",
            self.repo.owner(),
            self.repo.name()
        );
        let query = [
            ("sort", "created".to_string()),
            ("direction", "asc".to_string()),
        ];
        let comments: Vec<IssueComment> = self.client.get_paginated(&path, &query)?;
        let fetched = comments.len();
        let records = records_from_comments(comments, after);
        info!(repo = %self.repo, fetched, records = records.len(), after, "fetched ledger comments");
        Ok(records)
    }

    fn existing_record(&self, event_id: u64) -> Result<Option<ExternalRecord>, TransientApiError> {
        let comments: Vec<IssueComment> = self
            .client
            .get_paginated(&self.issue_comments_path(event_id), &[])?;
        let found = records_from_comments(comments, None)
            .into_iter()
            .find(|record| {
                matches!(&record.parsed, Ok(entry) if entry.event_id() == event_id)
            });
        debug!(
            event_id,
            found = ?found.as_ref().map(|record| record.record_id),
            "looked up existing ledger comment"
        );
        Ok(found)
    }
}

impl Publisher for GitHubRecords {
    /// Posts the entry as a comment on its pull request.
    ///
    /// Before each retry the pull request is searched again, so a POST that
    /// landed despite a failed response is adopted rather than duplicated.
    /// A record found there with a different hash is a conflict, not a
    /// publication of `entry`.
    fn publish(&self, entry: &Entry) -> Result<u64, PublishError> {
        let path = self.issue_comments_path(entry.event_id());
        let body = render_comment(entry);
        let attempt = Cell::new(0u32);
        let outcome = self.client.retry().run("publish", || {
            attempt.set(attempt.get() + 1);
            if attempt.get() > 1 {
                if let Some(record) = self.existing_record(entry.event_id())? {
                    return Ok(PublishAttempt::Found(record));
                }
            }
            self.client
                .post_json(&path, &NewComment { body: &body })
                .map(PublishAttempt::Created)
        })?;
        let id = match outcome {
            PublishAttempt::Created(created) => created.id.ok_or(PublishError::MissingRecordId)?,
            PublishAttempt::Found(record) => adopt_landed(entry, record)?,
        };
        info!(repo = %self.repo, pr = entry.event_id(), comment_id = id, "published ledger comment");
        Ok(id)
    }
}
