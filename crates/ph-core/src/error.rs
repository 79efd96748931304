use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository not found: {name}")]
    NotFound { name: String },
    #[error("repository already exists: {name}")]
    AlreadyExists { name: String },
    #[error("invalid repository name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("working directory missing for repository {name}")]
    WorkingDirectoryMissing { name: String },
    #[error("push requires an ssh remote url, got {url}")]
    PushRequiresSsh { url: String },
    #[error("io error at {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum SkilletError {
    #[error("skillet not found: {name}")]
    NotFound { name: String },
    #[error("skillet {name} already belongs to repository {existing_repository}")]
    DuplicateName {
        name: String,
        existing_repository: String,
    },
    #[error("stored skillet {name} is unreadable: {message}")]
    CorruptRecord { name: String, message: String },
    #[error("invalid skillet name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("skillet {name} is not part of repository {repository}")]
    NotInRepository { name: String, repository: String },
    #[error("io error at {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collection not found: {name}")]
    NotFound { name: String },
    #[error("collection already exists: {name}")]
    AlreadyExists { name: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {message}")]
    Unavailable { message: String },
    #[error("cache value could not be encoded: {message}")]
    Encode { message: String },
}

#[derive(Debug, Error)]
pub enum SourceControlError {
    #[error("not a git repository")]
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
    #[error("source control error: {reason}")]
    Failed { reason: String },
}

impl From<ph_vcs::VcsError> for SourceControlError {
    fn from(value: ph_vcs::VcsError) -> Self {
        match value {
            ph_vcs::VcsError::RepoNotFound => Self::RepoNotFound,
            ph_vcs::VcsError::PermissionDenied { reason } => Self::PermissionDenied { reason },
            ph_vcs::VcsError::BranchNotFound { name } => Self::BranchNotFound { name },
            ph_vcs::VcsError::NothingToCommit => Self::NothingToCommit,
            ph_vcs::VcsError::CloneFailed { reason } => Self::CloneFailed { reason },
            ph_vcs::VcsError::PushFailed { reason } => Self::PushFailed { reason },
            ph_vcs::VcsError::BackendError { reason } => Self::Failed { reason },
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
    #[error("malformed definition at {path}: {message}")]
    Malformed { path: PathBuf, message: String },
    #[error("render failed for snippet {snippet}: {message}")]
    Render { snippet: String, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("home directory could not be determined")]
    HomeUnavailable,
}

#[derive(Debug, Error)]
pub enum PanhandlerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Skillet(#[from] SkilletError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    SourceControl(#[from] SourceControlError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<ph_vcs::VcsError> for PanhandlerError {
    fn from(value: ph_vcs::VcsError) -> Self {
        PanhandlerError::SourceControl(SourceControlError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vcs_errors_keep_their_reason() {
        let err = PanhandlerError::from(ph_vcs::VcsError::CloneFailed {
            reason: "repository not found".to_string(),
        });
        assert!(matches!(
            err,
            PanhandlerError::SourceControl(SourceControlError::CloneFailed { .. })
        ));
        assert_eq!(err.to_string(), "clone failed: repository not found");
    }
}
