use crate::error::CollectionError;
use crate::types::{Collection, CreateCollectionInput};

pub trait CollectionIndex {
    fn create(&self, input: CreateCollectionInput) -> Result<Collection, CollectionError>;
    fn get(&self, name: &str) -> Result<Option<Collection>, CollectionError>;
    fn list(&self) -> Result<Vec<Collection>, CollectionError>;
    fn delete(&self, name: &str) -> Result<(), CollectionError>;
    fn collections_for_skillet(&self, skillet: &str) -> Result<Vec<String>, CollectionError>;
    /// Replaces the skillet's memberships with exactly `collections`.
    fn set_skillet_collections(
        &self,
        skillet: &str,
        collections: &[String],
    ) -> Result<(), CollectionError>;
}
