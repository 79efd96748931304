use crate::error::CliError;
use ph_core::{Panhandler, Settings};
use ph_db::{DbStore, SqliteCache, schema};
use ph_engine::MetaFileEngine;
use ph_events::EventBus;
use ph_vcs::GitClient;
use std::fs;
use std::path::Path;

pub type App = Panhandler<DbStore, SqliteCache, GitClient, MetaFileEngine>;

fn database_error(path: &Path, err: impl std::fmt::Display) -> CliError {
    CliError::Database {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Opens the index database (creating it on first use), sweeps expired cache
/// entries and wires the facade.
pub fn open(settings: Settings) -> Result<App, CliError> {
    let db_path = settings.database_path.clone();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|err| database_error(parent, err))?;
    }
    let conn = schema::open_and_migrate(&db_path).map_err(|err| database_error(&db_path, err))?;
    let cache = SqliteCache::open(&db_path)?;
    match cache.cleanup(chrono::Utc::now()) {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "dropped expired cache entries"),
        Err(err) => tracing::warn!(error = %err, "cache cleanup failed"),
    }

    Ok(Panhandler::new(
        DbStore::new(conn),
        cache,
        GitClient::new(),
        MetaFileEngine::new(),
        settings,
        EventBus::default(),
    ))
}
