pub mod backend;
pub mod git;

pub use backend::{
    CommitInfo, RepoDetails, SourceControl, VcsError, is_ssh_url, status_is_ahead,
    update_changed,
};
pub use git::GitClient;
