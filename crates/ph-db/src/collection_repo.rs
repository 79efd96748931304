use ph_core::collections::CollectionIndex;
use ph_core::error::CollectionError;
use ph_core::types::{Collection, CreateCollectionInput};
use rusqlite::Connection;

use crate::util::{decode_json, encode_json, from_rfc3339, to_rfc3339};

pub struct CollectionRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> CollectionRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn exists(&self, name: &str) -> Result<bool, CollectionError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM collections WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .map_err(storage)?;
        Ok(count > 0)
    }

    fn members(&self, name: &str) -> Result<Vec<String>, CollectionError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT skillet FROM collection_skillets WHERE collection = ?1 ORDER BY position ASC",
            )
            .map_err(storage)?;
        let mut rows = stmt.query([name]).map_err(storage)?;
        let mut skillets = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            skillets.push(row.get(0).map_err(storage)?);
        }
        Ok(skillets)
    }
}

fn storage(err: impl std::fmt::Display) -> CollectionError {
    CollectionError::Storage {
        message: err.to_string(),
    }
}

impl<'a> CollectionIndex for CollectionRepo<'a> {
    fn create(&self, input: CreateCollectionInput) -> Result<Collection, CollectionError> {
        if self.exists(&input.name)? {
            return Err(CollectionError::AlreadyExists { name: input.name });
        }
        let collection = Collection {
            name: input.name,
            description: input.description,
            categories: input.categories,
            skillets: Vec::new(),
            created_at: chrono::Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO collections (name, description, categories_json, created_at) VALUES (?1, ?2, ?3, ?4)",
                (
                    &collection.name,
                    &collection.description,
                    encode_json(&collection.categories).map_err(storage)?,
                    to_rfc3339(&collection.created_at),
                ),
            )
            .map_err(storage)?;
        Ok(collection)
    }

    fn get(&self, name: &str) -> Result<Option<Collection>, CollectionError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, description, categories_json, created_at FROM collections WHERE name = ?1",
            )
            .map_err(storage)?;
        let mut rows = stmt.query([name]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        let mut collection = map_collection_row(row)?;
        collection.skillets = self.members(name)?;
        Ok(Some(collection))
    }

    fn list(&self) -> Result<Vec<Collection>, CollectionError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, description, categories_json, created_at FROM collections ORDER BY name ASC",
            )
            .map_err(storage)?;
        let mut rows = stmt.query([]).map_err(storage)?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            collections.push(map_collection_row(row)?);
        }
        for collection in &mut collections {
            collection.skillets = self.members(&collection.name)?;
        }
        Ok(collections)
    }

    fn delete(&self, name: &str) -> Result<(), CollectionError> {
        let affected = self
            .conn
            .execute("DELETE FROM collections WHERE name = ?1", [name])
            .map_err(storage)?;
        if affected == 0 {
            return Err(CollectionError::NotFound {
                name: name.to_string(),
            });
        }
        self.conn
            .execute(
                "DELETE FROM collection_skillets WHERE collection = ?1",
                [name],
            )
            .map_err(storage)?;
        Ok(())
    }

    fn collections_for_skillet(&self, skillet: &str) -> Result<Vec<String>, CollectionError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT collection FROM collection_skillets WHERE skillet = ?1 ORDER BY collection ASC",
            )
            .map_err(storage)?;
        let mut rows = stmt.query([skillet]).map_err(storage)?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            collections.push(row.get(0).map_err(storage)?);
        }
        Ok(collections)
    }

    fn set_skillet_collections(
        &self,
        skillet: &str,
        collections: &[String],
    ) -> Result<(), CollectionError> {
        for name in collections {
            if !self.exists(name)? {
                return Err(CollectionError::NotFound { name: name.clone() });
            }
        }
        self.conn
            .execute(
                "DELETE FROM collection_skillets WHERE skillet = ?1",
                [skillet],
            )
            .map_err(storage)?;
        for name in collections {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO collection_skillets (collection, skillet, position) VALUES (?1, ?2, (SELECT COALESCE(MAX(position), 0) + 1 FROM collection_skillets WHERE collection = ?1))",
                    (name, skillet),
                )
                .map_err(storage)?;
        }
        Ok(())
    }
}

fn map_collection_row(row: &rusqlite::Row<'_>) -> Result<Collection, CollectionError> {
    let name: String = row.get(0).map_err(storage)?;
    let description: String = row.get(1).map_err(storage)?;
    let categories_json: String = row.get(2).map_err(storage)?;
    let created_at: String = row.get(3).map_err(storage)?;
    Ok(Collection {
        name,
        description,
        categories: decode_json(&categories_json).map_err(storage)?,
        skillets: Vec::new(),
        created_at: from_rfc3339(&created_at).map_err(storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;

    fn input(name: &str) -> CreateCollectionInput {
        CreateCollectionInput {
            name: name.to_string(),
            description: format!("{name} favorites"),
            categories: vec!["panos".to_string()],
        }
    }

    #[test]
    fn create_rejects_duplicates() {
        let conn = with_test_db().unwrap();
        let repo = CollectionRepo::new(&conn);
        let created = repo.create(input("mine")).unwrap();
        assert_eq!(created.categories, ["panos"]);
        assert!(matches!(
            repo.create(input("mine")),
            Err(CollectionError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn memberships_are_replaced_wholesale() {
        let conn = with_test_db().unwrap();
        let repo = CollectionRepo::new(&conn);
        repo.create(input("a")).unwrap();
        repo.create(input("b")).unwrap();

        repo.set_skillet_collections("sk1", &["a".to_string(), "b".to_string()])
            .unwrap();
        repo.set_skillet_collections("sk2", &["a".to_string()])
            .unwrap();
        assert_eq!(repo.collections_for_skillet("sk1").unwrap(), ["a", "b"]);
        assert_eq!(repo.get("a").unwrap().unwrap().skillets, ["sk1", "sk2"]);

        repo.set_skillet_collections("sk1", &["b".to_string()])
            .unwrap();
        assert_eq!(repo.get("a").unwrap().unwrap().skillets, ["sk2"]);
        assert_eq!(repo.collections_for_skillet("sk1").unwrap(), ["b"]);
    }

    #[test]
    fn unknown_collection_is_rejected_before_changes() {
        let conn = with_test_db().unwrap();
        let repo = CollectionRepo::new(&conn);
        repo.create(input("a")).unwrap();
        repo.set_skillet_collections("sk1", &["a".to_string()])
            .unwrap();

        let err = repo
            .set_skillet_collections("sk1", &["missing".to_string()])
            .unwrap_err();
        assert!(matches!(err, CollectionError::NotFound { .. }));
        assert_eq!(repo.collections_for_skillet("sk1").unwrap(), ["a"]);
    }

    #[test]
    fn delete_drops_memberships() {
        let conn = with_test_db().unwrap();
        let repo = CollectionRepo::new(&conn);
        repo.create(input("a")).unwrap();
        repo.set_skillet_collections("sk1", &["a".to_string()])
            .unwrap();
        repo.delete("a").unwrap();
        assert!(repo.collections_for_skillet("sk1").unwrap().is_empty());
        assert!(repo.list().unwrap().is_empty());
    }
}
