use ph_core::error::SkilletError;
use ph_core::skillets::SkilletIndex;
use ph_core::types::{Skillet, SkilletMetadata, UpsertOutcome};
use rusqlite::Connection;

use crate::util::{content_hash, encode_json, from_rfc3339, to_rfc3339};

const COLUMNS: &str = "name, repository, metadata_json, content_hash, created_at, updated_at";

pub struct SkilletRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> SkilletRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_many(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Skillet>, SkilletError> {
        let mut stmt = self.conn.prepare(sql).map_err(storage)?;
        let mut rows = stmt.query(params).map_err(storage)?;
        let mut skillets = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            skillets.push(map_skillet_row(row)?);
        }
        Ok(skillets)
    }
}

fn storage(err: impl std::fmt::Display) -> SkilletError {
    SkilletError::Storage {
        message: err.to_string(),
    }
}

impl<'a> SkilletIndex for SkilletRepo<'a> {
    fn upsert(
        &self,
        name: &str,
        metadata: &SkilletMetadata,
        repository: &str,
    ) -> Result<(Skillet, UpsertOutcome), SkilletError> {
        let metadata_json = encode_json(metadata).map_err(storage)?;
        let hash = content_hash(&metadata_json);
        let now = to_rfc3339(&chrono::Utc::now());

        let inserted = self
            .conn
            .execute(
                "INSERT INTO skillets (name, repository, metadata_json, content_hash, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5) ON CONFLICT(name) DO NOTHING",
                (name, repository, &metadata_json, &hash, &now),
            )
            .map_err(storage)?;

        let existing = self.get_by_name(name)?.ok_or_else(|| SkilletError::Storage {
            message: format!("skillet {name} vanished during upsert"),
        })?;
        if inserted == 1 {
            return Ok((existing, UpsertOutcome::Created));
        }
        if existing.repository != repository {
            return Err(SkilletError::DuplicateName {
                name: name.to_string(),
                existing_repository: existing.repository,
            });
        }
        if existing.metadata_json == metadata_json {
            return Ok((existing, UpsertOutcome::Unchanged));
        }

        self.conn
            .execute(
                "UPDATE skillets SET metadata_json = ?1, content_hash = ?2, updated_at = ?3 WHERE name = ?4",
                (&metadata_json, &hash, &now, name),
            )
            .map_err(storage)?;
        let updated = Skillet {
            metadata_json,
            content_hash: hash,
            updated_at: from_rfc3339(&now).map_err(storage)?,
            ..existing
        };
        Ok((updated, UpsertOutcome::Updated))
    }

    fn delete(&self, name: &str) -> Result<(), SkilletError> {
        let affected = self
            .conn
            .execute("DELETE FROM skillets WHERE name = ?1", [name])
            .map_err(storage)?;
        if affected == 0 {
            return Err(SkilletError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn get_by_name(&self, name: &str) -> Result<Option<Skillet>, SkilletError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM skillets WHERE name = ?1"))
            .map_err(storage)?;
        let mut rows = stmt.query([name]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        map_skillet_row(row).map(Some)
    }

    fn list_all(&self) -> Result<Vec<Skillet>, SkilletError> {
        self.query_many(
            &format!("SELECT {COLUMNS} FROM skillets ORDER BY name ASC"),
            [],
        )
    }

    fn list_for_repository(&self, repository: &str) -> Result<Vec<Skillet>, SkilletError> {
        self.query_many(
            &format!("SELECT {COLUMNS} FROM skillets WHERE repository = ?1 ORDER BY name ASC"),
            [repository],
        )
    }

    fn delete_for_repository(&self, repository: &str) -> Result<Vec<String>, SkilletError> {
        let names: Vec<String> = self
            .list_for_repository(repository)?
            .into_iter()
            .map(|skillet| skillet.name)
            .collect();
        self.conn
            .execute("DELETE FROM skillets WHERE repository = ?1", [repository])
            .map_err(storage)?;
        Ok(names)
    }
}

fn map_skillet_row(row: &rusqlite::Row<'_>) -> Result<Skillet, SkilletError> {
    let name: String = row.get(0).map_err(storage)?;
    let repository: String = row.get(1).map_err(storage)?;
    let metadata_json: String = row.get(2).map_err(storage)?;
    let content_hash: String = row.get(3).map_err(storage)?;
    let created_at: String = row.get(4).map_err(storage)?;
    let updated_at: String = row.get(5).map_err(storage)?;

    Ok(Skillet {
        name,
        repository,
        metadata_json,
        content_hash,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
        updated_at: from_rfc3339(&updated_at).map_err(storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use ph_core::types::{Labels, SkilletType};
    use std::path::PathBuf;

    fn metadata(name: &str, description: &str) -> SkilletMetadata {
        SkilletMetadata {
            name: name.to_string(),
            label: name.to_uppercase(),
            description: description.to_string(),
            kind: SkilletType::Panos,
            variables: Vec::new(),
            snippets: Vec::new(),
            labels: Labels::new(),
            depends: Vec::new(),
            source_path: PathBuf::from(format!("/repos/a/{name}")),
            metadata_file: ".meta-cnc.yaml".to_string(),
        }
    }

    #[test]
    fn upsert_classifies_changes() {
        let conn = with_test_db().unwrap();
        let repo = SkilletRepo::new(&conn);

        let (created, outcome) = repo.upsert("sk1", &metadata("sk1", "v1"), "a").unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(created.repository, "a");
        assert_eq!(created.content_hash.len(), 64);

        let (_, outcome) = repo.upsert("sk1", &metadata("sk1", "v1"), "a").unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);

        let (updated, outcome) = repo.upsert("sk1", &metadata("sk1", "v2"), "a").unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(updated.metadata().unwrap().description, "v2");
        assert_ne!(updated.content_hash, created.content_hash);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn names_are_owned_by_the_first_repository() {
        let conn = with_test_db().unwrap();
        let repo = SkilletRepo::new(&conn);
        repo.upsert("shared", &metadata("shared", "from a"), "a")
            .unwrap();

        let err = repo
            .upsert("shared", &metadata("shared", "from b"), "b")
            .unwrap_err();
        assert!(matches!(
            err,
            SkilletError::DuplicateName { ref existing_repository, .. } if existing_repository == "a"
        ));
        let stored = repo.get_by_name("shared").unwrap().unwrap();
        assert_eq!(stored.metadata().unwrap().description, "from a");
    }

    #[test]
    fn repository_scoped_listing_and_deletion() {
        let conn = with_test_db().unwrap();
        let repo = SkilletRepo::new(&conn);
        repo.upsert("b1", &metadata("b1", ""), "b").unwrap();
        repo.upsert("a2", &metadata("a2", ""), "a").unwrap();
        repo.upsert("a1", &metadata("a1", ""), "a").unwrap();

        let names: Vec<String> = repo
            .list_for_repository("a")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["a1", "a2"]);

        assert_eq!(repo.delete_for_repository("a").unwrap(), ["a1", "a2"]);
        assert_eq!(repo.list_all().unwrap().len(), 1);
        assert!(matches!(
            repo.delete("a1"),
            Err(SkilletError::NotFound { .. })
        ));
    }
}
