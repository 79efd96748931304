pub mod collection;
pub mod event;
pub mod outcome;
pub mod repository;
pub mod skillet;

pub use collection::{Collection, CollectionSummary, CreateCollectionInput};
pub use event::{Event, EventBody};
pub use outcome::{
    DeployKey, ImportOutcome, OutcomeStatus, Reconciliation, RepositoryUpdate, SavedSkillet,
    SyncWarning, UpdateOutcome,
};
pub use repository::{Repository, RepositoryDetails};
pub use skillet::{
    Dependency, Labels, Skillet, SkilletMetadata, SkilletType, Snippet, UpsertOutcome, Variable,
};
