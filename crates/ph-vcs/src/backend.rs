use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub summary: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Remote metadata captured from a working directory after clone or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDetails {
    pub url: String,
    pub branch: String,
    pub branches: Vec<String>,
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("repo not found")]
    RepoNotFound,
    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },
    #[error("branch not found: {name}")]
    BranchNotFound { name: String },
    #[error("nothing to commit")]
    NothingToCommit,
    #[error("clone failed: {reason}")]
    CloneFailed { reason: String },
    #[error("push failed: {reason}")]
    PushFailed { reason: String },
    #[error("backend error: {reason}")]
    BackendError { reason: String },
}

/// Source-control operations against one working directory per repository.
///
/// `update` returns a human readable status line. Callers inspect it with
/// [`update_changed`] rather than parsing it.
pub trait SourceControl {
    fn clone_repo(&self, url: &str, dest: &Path, branch: Option<&str>) -> Result<(), VcsError>;
    fn update(&self, dest: &Path, branch: Option<&str>) -> Result<String, VcsError>;
    fn branches(&self, dest: &Path) -> Result<Vec<String>, VcsError>;
    fn status(&self, dest: &Path) -> Result<String, VcsError>;
    fn details(&self, dest: &Path) -> Result<RepoDetails, VcsError>;
    fn commit(&self, dest: &Path, message: &str, path: &Path) -> Result<String, VcsError>;
    fn push(&self, dest: &Path, credential: Option<&Path>) -> Result<String, VcsError>;
    /// Creates an SSH key pair at `key_path` unless one is already there and
    /// returns the public key line.
    fn generate_key(&self, key_path: &Path, comment: &str) -> Result<String, VcsError>;
}

pub const UPDATED_MESSAGE: &str = "Updated to latest commit";
pub const CHECKED_OUT_MESSAGE: &str = "Checked out new branch";
pub const UP_TO_DATE_MESSAGE: &str = "Already up to date";

/// True when an update message reports new commits or a branch switch.
pub fn update_changed(message: &str) -> bool {
    let lowered = message.to_lowercase();
    (lowered.contains("updated") && !lowered.contains("up to date"))
        || message.contains(CHECKED_OUT_MESSAGE)
}

/// True when a status line reports local commits not yet pushed.
pub fn status_is_ahead(status: &str) -> bool {
    status.contains("ahead")
}

/// Push needs key based auth, which only works for SSH remotes.
pub fn is_ssh_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("git@") || url.starts_with("ssh://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_messages_are_classified() {
        assert!(update_changed("Updated to latest commit abc123"));
        assert!(update_changed("Checked out new branch: develop"));
        assert!(!update_changed("Already up to date"));
        assert!(!update_changed(""));
    }

    #[test]
    fn ahead_status_detected() {
        assert!(status_is_ahead("## main...origin/main [ahead 2]"));
        assert!(!status_is_ahead("## main...origin/main"));
    }

    #[test]
    fn ssh_urls_detected() {
        assert!(is_ssh_url("git@github.com:org/repo.git"));
        assert!(is_ssh_url("ssh://git@example.com/repo.git"));
        assert!(!is_ssh_url("https://github.com/org/repo.git"));
    }
}
