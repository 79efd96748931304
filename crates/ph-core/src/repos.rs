use crate::error::RepositoryError;
use crate::types::{Repository, RepositoryDetails};

pub trait RepositoryIndex {
    /// Returns the record and whether this call created it. An existing
    /// record is returned untouched.
    fn get_or_create(
        &self,
        name: &str,
        url: &str,
        details: &RepositoryDetails,
    ) -> Result<(Repository, bool), RepositoryError>;
    fn get(&self, name: &str) -> Result<Option<Repository>, RepositoryError>;
    fn list(&self) -> Result<Vec<Repository>, RepositoryError>;
    fn update_details(
        &self,
        name: &str,
        details: &RepositoryDetails,
    ) -> Result<Repository, RepositoryError>;
    fn set_deploy_key(
        &self,
        name: &str,
        reference: Option<&str>,
    ) -> Result<Repository, RepositoryError>;
    fn delete(&self, name: &str) -> Result<(), RepositoryError>;
}
