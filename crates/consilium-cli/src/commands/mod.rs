//! Subcommand implementations.
//!
//! Each `run` returns `Ok(false)` when the command completed but found a
//! problem, so the binary can exit non-zero without an error message.

pub mod balance;
pub mod mint;
pub mod rebuild;
pub mod show;
pub mod verify;

use std::env;
use std::path::Path;

use anyhow::Context;
use consilium_github::{GitHubClient, GitHubRecords, RepoSlug, DEFAULT_API_BASE_URL};
use consilium_store::FileLedger;

pub fn open_ledger(dir: &Path) -> anyhow::Result<FileLedger> {
    FileLedger::open(dir).with_context(|| format!("failed to open ledger {}", dir.display()))
}

/// GitHub host for `repo`, authenticated with `GITHUB_TOKEN`.
///
/// `GITHUB_API_URL` overrides the endpoint, as set by GitHub Actions on
/// Enterprise Server.
pub fn github(repo: &str) -> anyhow::Result<GitHubRecords> {
    let repo = RepoSlug::parse(repo)?;
    let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set")?;
    let api_base_url =
        env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
    let client = GitHubClient::with_api_base_url(token, api_base_url)?;
    Ok(GitHubRecords::new(client, repo))
}
