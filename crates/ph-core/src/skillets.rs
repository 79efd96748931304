use crate::error::SkilletError;
use crate::types::{Skillet, SkilletMetadata, UpsertOutcome};

pub trait SkilletIndex {
    /// Inserts or refreshes the record for `name`. A record owned by another
    /// repository is never touched; that case is `DuplicateName`.
    fn upsert(
        &self,
        name: &str,
        metadata: &SkilletMetadata,
        repository: &str,
    ) -> Result<(Skillet, UpsertOutcome), SkilletError>;
    fn delete(&self, name: &str) -> Result<(), SkilletError>;
    fn get_by_name(&self, name: &str) -> Result<Option<Skillet>, SkilletError>;
    fn list_all(&self) -> Result<Vec<Skillet>, SkilletError>;
    fn list_for_repository(&self, repository: &str) -> Result<Vec<Skillet>, SkilletError>;
    fn delete_for_repository(&self, repository: &str) -> Result<Vec<String>, SkilletError>;
}
