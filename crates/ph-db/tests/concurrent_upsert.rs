use ph_core::PanhandlerError;
use ph_core::error::SkilletError;
use ph_core::repos::RepositoryIndex;
use ph_core::skillets::SkilletIndex;
use ph_core::store::Store;
use ph_core::types::{
    Labels, RepositoryDetails, SkilletMetadata, SkilletType, UpsertOutcome,
};
use ph_db::{DbStore, schema};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

fn details(url: &str) -> RepositoryDetails {
    RepositoryDetails {
        url: url.to_string(),
        branch: "master".to_string(),
        branches: vec!["master".to_string()],
        commit: None,
        status: "Imported".to_string(),
        updated_at: chrono::Utc::now(),
    }
}

fn metadata(repository: &str) -> SkilletMetadata {
    SkilletMetadata {
        name: "shared".to_string(),
        label: "Shared".to_string(),
        description: format!("from {repository}"),
        kind: SkilletType::Python3,
        variables: Vec::new(),
        snippets: Vec::new(),
        labels: Labels::new(),
        depends: Vec::new(),
        source_path: PathBuf::from(format!("/repos/{repository}/shared")),
        metadata_file: ".meta-cnc.yaml".to_string(),
    }
}

fn claim(db: &Path, repository: &str) -> Result<UpsertOutcome, PanhandlerError> {
    let store = DbStore::new(schema::open_and_migrate(db).unwrap());
    store.with_tx(|store| {
        let (_, outcome) = store
            .skillets()
            .upsert("shared", &metadata(repository), repository)?;
        Ok(outcome)
    })
}

#[test]
fn racing_imports_leave_one_owner() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("index.db");
    let setup = DbStore::new(schema::open_and_migrate(&db).unwrap());
    for name in ["r1", "r2"] {
        setup
            .repositories()
            .get_or_create(name, &format!("https://example.com/{name}.git"), &details(name))
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["r1", "r2"]
        .into_iter()
        .map(|repository| {
            let barrier = Arc::clone(&barrier);
            let db = db.clone();
            thread::spawn(move || {
                barrier.wait();
                claim(&db, repository)
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let created = results
        .iter()
        .filter(|result| matches!(result, Ok(UpsertOutcome::Created)))
        .count();
    let rejected = results
        .iter()
        .filter(|result| {
            matches!(
                result,
                Err(PanhandlerError::Skillet(SkilletError::DuplicateName { .. }))
            )
        })
        .count();
    assert_eq!((created, rejected), (1, 1));

    let owner = setup.skillets().get_by_name("shared").unwrap().unwrap();
    let winner = if results[0].is_ok() { "r1" } else { "r2" };
    assert_eq!(owner.repository, winner);
    assert_eq!(owner.metadata().unwrap().description, format!("from {winner}"));
}
