use consilium_reconcile::TransientApiError;
use thiserror::Error;

/// Errors raised while talking to GitHub.
#[derive(Error, Debug)]
pub enum GitHubError {
    /// A required input is missing or malformed.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Repository not given as `owner/repo`.
    #[error("invalid repository '{0}': expected OWNER/REPO")]
    InvalidRepo(String),
    /// API call failed.
    #[error(transparent)]
    Api(#[from] TransientApiError),
    /// Pull request is not in a state that can be credited.
    #[error("pull request #{number} {reason}")]
    NotCreditable {
        /// Pull-request number.
        number: u64,
        /// Why it cannot be credited.
        reason: String,
    },
    /// Webhook payload could not be read.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}
