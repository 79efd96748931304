use chrono::{DateTime, Utc};
use ph_vcs::{CommitInfo, RepoDetails};
use serde::{Deserialize, Serialize};

/// Metadata about the remote and the current checkout of an imported
/// repository, refreshed on every import, update and push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDetails {
    pub url: String,
    pub branch: String,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub commit: Option<CommitInfo>,
    #[serde(default)]
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryDetails {
    pub fn from_remote(remote: RepoDetails, fallback_url: &str, status: impl Into<String>) -> Self {
        let url = if remote.url.is_empty() {
            fallback_url.to_string()
        } else {
            remote.url
        };
        Self {
            url,
            branch: remote.branch,
            branches: remote.branches,
            commit: remote.commit,
            status: status.into(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub remote_url: String,
    pub deploy_key_reference: Option<String>,
    pub details: RepositoryDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    /// Branches present in `details` that this record did not know about.
    pub fn new_branches(&self, details: &RepositoryDetails) -> Vec<String> {
        details
            .branches
            .iter()
            .filter(|branch| !self.details.branches.contains(branch))
            .cloned()
            .collect()
    }
}
