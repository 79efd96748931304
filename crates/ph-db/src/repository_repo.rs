use ph_core::error::RepositoryError;
use ph_core::repos::RepositoryIndex;
use ph_core::types::{Repository, RepositoryDetails};
use rusqlite::Connection;

use crate::util::{decode_json, encode_json, from_rfc3339, to_rfc3339};

const COLUMNS: &str = "name, remote_url, deploy_key_reference, details_json, created_at, updated_at";

pub struct RepositoryRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> RepositoryRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn require(&self, name: &str) -> Result<Repository, RepositoryError> {
        self.get(name)?.ok_or_else(|| RepositoryError::NotFound {
            name: name.to_string(),
        })
    }
}

fn storage(err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage {
        message: err.to_string(),
    }
}

impl<'a> RepositoryIndex for RepositoryRepo<'a> {
    fn get_or_create(
        &self,
        name: &str,
        url: &str,
        details: &RepositoryDetails,
    ) -> Result<(Repository, bool), RepositoryError> {
        let now = to_rfc3339(&chrono::Utc::now());
        let sql = "INSERT INTO repositories (name, remote_url, deploy_key_reference, details_json, created_at, updated_at) VALUES (?1, ?2, NULL, ?3, ?4, ?4) ON CONFLICT(name) DO NOTHING";
        let affected = self
            .conn
            .execute(sql, (name, url, encode_json(details).map_err(storage)?, now))
            .map_err(storage)?;
        Ok((self.require(name)?, affected == 1))
    }

    fn get(&self, name: &str) -> Result<Option<Repository>, RepositoryError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM repositories WHERE name = ?1"))
            .map_err(storage)?;
        let mut rows = stmt.query([name]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        map_repository_row(row).map(Some)
    }

    fn list(&self) -> Result<Vec<Repository>, RepositoryError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM repositories ORDER BY name ASC"))
            .map_err(storage)?;
        let mut rows = stmt.query([]).map_err(storage)?;
        let mut repositories = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            repositories.push(map_repository_row(row)?);
        }
        Ok(repositories)
    }

    fn update_details(
        &self,
        name: &str,
        details: &RepositoryDetails,
    ) -> Result<Repository, RepositoryError> {
        let affected = self
            .conn
            .execute(
                "UPDATE repositories SET details_json = ?1, updated_at = ?2 WHERE name = ?3",
                (
                    encode_json(details).map_err(storage)?,
                    to_rfc3339(&chrono::Utc::now()),
                    name,
                ),
            )
            .map_err(storage)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                name: name.to_string(),
            });
        }
        self.require(name)
    }

    fn set_deploy_key(
        &self,
        name: &str,
        reference: Option<&str>,
    ) -> Result<Repository, RepositoryError> {
        let affected = self
            .conn
            .execute(
                "UPDATE repositories SET deploy_key_reference = ?1, updated_at = ?2 WHERE name = ?3",
                (reference, to_rfc3339(&chrono::Utc::now()), name),
            )
            .map_err(storage)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                name: name.to_string(),
            });
        }
        self.require(name)
    }

    fn delete(&self, name: &str) -> Result<(), RepositoryError> {
        let affected = self
            .conn
            .execute("DELETE FROM repositories WHERE name = ?1", [name])
            .map_err(storage)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn map_repository_row(row: &rusqlite::Row<'_>) -> Result<Repository, RepositoryError> {
    let name: String = row.get(0).map_err(storage)?;
    let remote_url: String = row.get(1).map_err(storage)?;
    let deploy_key_reference: Option<String> = row.get(2).map_err(storage)?;
    let details_json: String = row.get(3).map_err(storage)?;
    let created_at: String = row.get(4).map_err(storage)?;
    let updated_at: String = row.get(5).map_err(storage)?;

    Ok(Repository {
        name,
        remote_url,
        deploy_key_reference,
        details: decode_json(&details_json).map_err(storage)?,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
        updated_at: from_rfc3339(&updated_at).map_err(storage)?,
    })
}
