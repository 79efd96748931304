use ph_core::error::PanhandlerError;
use ph_core::store::Store;
use rusqlite::Connection;

use crate::collection_repo::CollectionRepo;
use crate::event_repo::EventRepo;
use crate::repository_repo::RepositoryRepo;
use crate::skillet_repo::SkilletRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn transaction_error(err: rusqlite::Error) -> PanhandlerError {
    PanhandlerError::Internal {
        message: format!("transaction failed: {err}"),
    }
}

impl Store for DbStore {
    type Repositories<'a>
        = RepositoryRepo<'a>
    where
        Self: 'a;
    type Skillets<'a>
        = SkilletRepo<'a>
    where
        Self: 'a;
    type Collections<'a>
        = CollectionRepo<'a>
    where
        Self: 'a;
    type Events<'a>
        = EventRepo<'a>
    where
        Self: 'a;

    fn repositories(&self) -> Self::Repositories<'_> {
        RepositoryRepo::new(&self.conn)
    }

    fn skillets(&self) -> Self::Skillets<'_> {
        SkilletRepo::new(&self.conn)
    }

    fn collections(&self) -> Self::Collections<'_> {
        CollectionRepo::new(&self.conn)
    }

    fn events(&self) -> Self::Events<'_> {
        EventRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, PanhandlerError>
    where
        F: FnOnce(&Self) -> Result<T, PanhandlerError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(transaction_error)?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(transaction_error)?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(transaction_error)?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use ph_core::error::SkilletError;
    use ph_core::repos::RepositoryIndex;
    use ph_core::types::RepositoryDetails;

    fn details() -> RepositoryDetails {
        RepositoryDetails {
            url: "u".to_string(),
            branch: "main".to_string(),
            branches: Vec::new(),
            commit: None,
            status: String::new(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = DbStore::new(with_test_db().unwrap());
        let result: Result<(), PanhandlerError> = store.with_tx(|store| {
            store.repositories().get_or_create("r", "u", &details())?;
            Err(SkilletError::NotFound {
                name: "x".to_string(),
            }
            .into())
        });
        assert!(result.is_err());
        assert!(store.repositories().get("r").unwrap().is_none());
    }

    #[test]
    fn committed_transaction_persists() {
        let store = DbStore::new(with_test_db().unwrap());
        store
            .with_tx(|store| {
                store.repositories().get_or_create("r", "u", &details())?;
                Ok(())
            })
            .unwrap();
        assert!(store.repositories().get("r").unwrap().is_some());
    }
}
