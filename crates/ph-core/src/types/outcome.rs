use crate::error::PanhandlerError;
use crate::types::repository::Repository;
use crate::types::skillet::{Skillet, SkilletMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A non-fatal problem found while synchronizing a repository. Warnings never
/// abort the operation that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    DuplicateSkilletName {
        name: String,
        repository: String,
        existing_repository: String,
        source_path: PathBuf,
    },
    StructuralValidation {
        name: String,
        source_path: PathBuf,
        errors: Vec<String>,
    },
    Indeterminate {
        path: PathBuf,
        reason: String,
    },
    UnmetDependency {
        skillet: String,
        url: String,
        branch: String,
    },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::DuplicateSkilletName {
                name,
                repository,
                existing_repository,
                source_path,
            } => {
                if repository == existing_repository {
                    write!(
                        f,
                        "skillet {name} at {} duplicates another skillet in {repository} and was skipped",
                        source_path.display()
                    )
                } else {
                    write!(
                        f,
                        "skillet {name} from {repository} was not indexed: the name is already owned by {existing_repository}"
                    )
                }
            }
            SyncWarning::StructuralValidation {
                name,
                source_path,
                errors,
            } => write!(
                f,
                "skillet {name} at {} has problems: {}",
                source_path.display(),
                errors.join("; ")
            ),
            SyncWarning::Indeterminate { path, reason } => write!(
                f,
                "could not read skillet definition at {}: {reason}",
                path.display()
            ),
            SyncWarning::UnmetDependency {
                skillet,
                url,
                branch,
            } => write!(
                f,
                "skillet {skillet} depends on {url} ({branch}), which is not imported"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    SucceededWithWarnings,
}

impl OutcomeStatus {
    fn from_warnings(warnings: &[SyncWarning]) -> Self {
        if warnings.is_empty() {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::SucceededWithWarnings
        }
    }
}

/// What one reconciliation pass changed in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub repository: String,
    pub skillets: Vec<Skillet>,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub warnings: Vec<SyncWarning>,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }

    pub fn status(&self) -> OutcomeStatus {
        OutcomeStatus::from_warnings(&self.warnings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub repository: Repository,
    pub skillets: Vec<SkilletMetadata>,
    pub warnings: Vec<SyncWarning>,
}

impl ImportOutcome {
    pub fn status(&self) -> OutcomeStatus {
        OutcomeStatus::from_warnings(&self.warnings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub status: String,
    pub changed: bool,
    pub new_branches: Vec<String>,
    pub skillets: Vec<SkilletMetadata>,
    pub warnings: Vec<SyncWarning>,
}

impl UpdateOutcome {
    pub fn outcome_status(&self) -> OutcomeStatus {
        OutcomeStatus::from_warnings(&self.warnings)
    }
}

/// A definition written into a repository by `SkilletsApi::save`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedSkillet {
    pub name: String,
    pub path: PathBuf,
    pub created: bool,
    /// Short id of the local commit, when one was made.
    pub commit: Option<String>,
    pub reconciliation: Reconciliation,
}

/// A deploy key pair on disk and the repository record that now points at
/// it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployKey {
    pub repository: Repository,
    pub public_key: String,
}

/// Per-repository result of a bulk update. One failing repository does not
/// stop the others.
#[derive(Debug)]
pub struct RepositoryUpdate {
    pub name: String,
    pub result: Result<UpdateOutcome, PanhandlerError>,
}
