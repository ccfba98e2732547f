//! Merged pull requests and their reviews.

use consilium_canonical::{ActorId, SourceUrl, Timestamp};
use consilium_core::{MergeEvent, ReviewState, ReviewVerdict};
use serde::Deserialize;
use tracing::debug;

use crate::comments::GitHubRecords;
use crate::errors::GitHubError;
use crate::repo::RepoSlug;

/// Account reference.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Login name.
    pub login: String,
}

/// Pull request as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// Pull-request number.
    pub number: u64,
    /// Author; absent for deleted accounts.
    #[serde(default)]
    pub user: Option<User>,
    /// Browser link.
    #[serde(default)]
    pub html_url: Option<String>,
    /// Whether it was merged.
    #[serde(default)]
    pub merged: bool,
    /// Merge time.
    #[serde(default)]
    pub merged_at: Option<String>,
}

/// Review as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    /// Reviewer; absent for deleted accounts.
    #[serde(default)]
    pub user: Option<User>,
    /// `APPROVED`, `CHANGES_REQUESTED`, `COMMENTED`, `DISMISSED` or `PENDING`.
    pub state: String,
    /// Submission time; absent while pending.
    #[serde(default)]
    pub submitted_at: Option<String>,
}

fn verdict(state: &str) -> Option<ReviewVerdict> {
    match state {
        "APPROVED" => Some(ReviewVerdict::Approved),
        "CHANGES_REQUESTED" => Some(ReviewVerdict::ChangesRequested),
        "DISMISSED" => Some(ReviewVerdict::Dismissed),
        "COMMENTED" => Some(ReviewVerdict::Commented),
        "PENDING" => Some(ReviewVerdict::Pending),
        _ => None,
    }
}

fn invalid(number: u64, field: &str, reason: impl std::fmt::Display) -> GitHubError {
    GitHubError::NotCreditable {
        number,
        reason: format!("has invalid {}: {}", field, reason),
    }
}

/// Builds the merge event the credit rule consumes.
///
/// Reviews without a user, a known state or a submission time are skipped.
pub fn merge_event_from(
    repo: &RepoSlug,
    pull: &PullRequest,
    reviews: &[Review],
) -> Result<MergeEvent, GitHubError> {
    let number = pull.number;
    if !pull.merged {
        return Err(GitHubError::NotCreditable {
            number,
            reason: "is not merged".to_string(),
        });
    }
    let author = pull.user.as_ref().ok_or_else(|| GitHubError::NotCreditable {
        number,
        reason: "has no author".to_string(),
    })?;
    let author = ActorId::parse(author.login.as_str()).map_err(|e| invalid(number, "author", e))?;
    let merged_at = pull.merged_at.as_deref().ok_or_else(|| GitHubError::NotCreditable {
        number,
        reason: "has no merge time".to_string(),
    })?;
    let timestamp = Timestamp::parse(merged_at).map_err(|e| invalid(number, "merged_at", e))?;
    let source_url = pull
        .html_url
        .clone()
        .unwrap_or_else(|| repo.pull_url(number));
    let source_url = SourceUrl::parse(source_url).map_err(|e| invalid(number, "html_url", e))?;

    let mut states = Vec::new();
    for review in reviews {
        let (Some(user), Some(state), Some(submitted_at)) = (
            review.user.as_ref(),
            verdict(&review.state),
            review.submitted_at.as_deref(),
        ) else {
            debug!(pr = number, state = %review.state, "skipping incomplete review");
            continue;
        };
        states.push(ReviewState {
            actor: ActorId::parse(user.login.as_str()).map_err(|e| invalid(number, "reviewer", e))?,
            state,
            submitted_at: Timestamp::parse(submitted_at)
                .map_err(|e| invalid(number, "submitted_at", e))?,
        });
    }

    Ok(MergeEvent {
        event_id: number,
        source_url,
        author,
        reviews: states,
        timestamp,
    })
}

impl GitHubRecords {
    /// Fetches pull request `number` and its reviews.
    pub fn load_merge_event(&self, number: u64) -> Result<MergeEvent, GitHubError> {
        let repo = self.repo();
        let path = format!("/repos/{}/{}/pulls/{}", repo.owner(), repo.name(), number);
        let pull: PullRequest = self.client().get_json(&path, &[])?;
        let reviews: Vec<Review> = self
            .client()
            .get_paginated(&format!("{}/reviews", path), &[])?;
        merge_event_from(repo, &pull, &reviews)
    }
}

#[derive(Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    pull_request: Option<PullRequest>,
    #[serde(default)]
    repository: Option<Repository>,
}

#[derive(Deserialize)]
struct Repository {
    full_name: String,
}

/// A merge announced by a `pull_request` webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookMerge {
    /// Repository the pull request belongs to.
    pub repo: RepoSlug,
    /// Pull-request number.
    pub number: u64,
}

/// Reads a `pull_request` webhook payload.
///
/// Returns `None` for anything other than a closed-and-merged pull request.
/// Payloads carry no reviews; fetch them with
/// [`GitHubRecords::load_merge_event`].
pub fn parse_webhook(payload: &str) -> Result<Option<WebhookMerge>, GitHubError> {
    let payload: WebhookPayload = serde_json::from_str(payload)
        .map_err(|e| GitHubError::InvalidPayload(e.to_string()))?;
    let Some(pull) = payload.pull_request else {
        return Ok(None);
    };
    if payload.action.as_deref() != Some("closed") || !pull.merged {
        return Ok(None);
    }
    let repository = payload
        .repository
        .ok_or_else(|| GitHubError::InvalidPayload("missing repository".to_string()))?;
    Ok(Some(WebhookMerge {
        repo: RepoSlug::parse(&repository.full_name)?,
        number: pull.number,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use consilium_core::{compute_distribution, RolePolicy};
    use serde_json::json;

    fn repo() -> RepoSlug {
        RepoSlug::parse("acme/widgets").unwrap()
    }

    fn pull() -> PullRequest {
        serde_json::from_value(json!({
            "number": 42,
            "user": {"login": "alice"},
            "html_url": "https://github.com/acme/widgets/pull/42",
            "merged": true,
            "merged_at": "2024-01-15T10:30:00Z",
            "title": "Add widgets"
        }))
        .unwrap()
    }

    fn reviews() -> Vec<Review> {
        serde_json::from_value(json!([
            {"user": {"login": "bob"}, "state": "APPROVED", "submitted_at": "2024-01-15T09:00:00Z"},
            {"user": {"login": "carol"}, "state": "CHANGES_REQUESTED", "submitted_at": "2024-01-15T09:10:00Z"},
            {"user": {"login": "dave"}, "state": "PENDING"},
            {"user": null, "state": "APPROVED", "submitted_at": "2024-01-15T09:20:00Z"}
        ]))
        .unwrap()
    }

    #[test]
    fn merged_pull_becomes_merge_event() {
        let event = merge_event_from(&repo(), &pull(), &reviews()).unwrap();
        assert_eq!(event.event_id, 42);
        assert_eq!(event.author.as_str(), "alice");
        assert_eq!(event.reviews.len(), 2);

        let distribution = compute_distribution(&event, &RolePolicy::default()).unwrap();
        let whole: Vec<(&str, f64)> = distribution
            .iter()
            .map(|(actor, credit)| (actor.as_str(), credit.to_f64()))
            .collect();
        assert_eq!(whole, vec![("alice", 50.0), ("bob", 35.0), ("carol", 15.0)]);
    }

    #[test]
    fn unmerged_pull_is_not_creditable() {
        let mut pull = pull();
        pull.merged = false;
        assert!(matches!(
            merge_event_from(&repo(), &pull, &[]),
            Err(GitHubError::NotCreditable { number: 42, .. })
        ));
    }

    #[test]
    fn missing_html_url_falls_back_to_repo_link() {
        let mut pull = pull();
        pull.html_url = None;
        let event = merge_event_from(&repo(), &pull, &[]).unwrap();
        assert_eq!(
            event.source_url.as_str(),
            "https://github.com/acme/widgets/pull/42"
        );
    }

    #[test]
    fn webhook_reports_only_merges() {
        let merged = json!({
            "action": "closed",
            "pull_request": {"number": 7, "merged": true, "user": {"login": "alice"}},
            "repository": {"full_name": "acme/widgets"}
        });
        assert_eq!(
            parse_webhook(&merged.to_string()).unwrap(),
            Some(WebhookMerge {
                repo: repo(),
                number: 7
            })
        );

        let closed = json!({
            "action": "closed",
            "pull_request": {"number": 7, "merged": false},
            "repository": {"full_name": "acme/widgets"}
        });
        assert_eq!(parse_webhook(&closed.to_string()).unwrap(), None);

        let opened = json!({"action": "opened", "pull_request": {"number": 7}});
        assert_eq!(parse_webhook(&opened.to_string()).unwrap(), None);

        let push = json!({"ref": "refs/heads/main"});
        assert_eq!(parse_webhook(&push.to_string()).unwrap(), None);

        assert!(matches!(
            parse_webhook("not json"),
            Err(GitHubError::InvalidPayload(_))
        ));
    }
}
