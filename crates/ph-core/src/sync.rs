use crate::cache::CacheStore;
use crate::engine::TemplateEngine;
use crate::error::{PanhandlerError, RepositoryError, SkilletError};
use crate::query::SkilletQuery;
use crate::repos::RepositoryIndex;
use crate::skillets::SkilletIndex;
use crate::store::Store;
use crate::types::{Reconciliation, SkilletMetadata, SyncWarning, UpsertOutcome};
use crate::validation::unmet_dependencies;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Default)]
struct IndexChanges {
    added: Vec<String>,
    updated: Vec<String>,
    removed: Vec<String>,
    warnings: Vec<SyncWarning>,
}

/// Brings the skillet index for one repository in line with what is on disk
/// in its working directory.
pub struct Synchronizer<'a, S: Store, C: CacheStore, E: TemplateEngine> {
    store: &'a S,
    engine: &'a E,
    query: SkilletQuery<'a, S, C>,
}

impl<'a, S: Store, C: CacheStore, E: TemplateEngine> Synchronizer<'a, S, C, E> {
    pub fn new(store: &'a S, engine: &'a E, query: SkilletQuery<'a, S, C>) -> Self {
        Self {
            store,
            engine,
            query,
        }
    }

    /// One reconciliation pass. Running it twice against an unchanged
    /// directory changes nothing the second time.
    ///
    /// Definitions that fail to parse are reported and leave any record
    /// previously indexed from the same directory in place. Names owned by
    /// another repository are skipped with a warning. The cache is rebuilt
    /// only when the index actually changed.
    pub fn reconcile(
        &self,
        repository: &str,
        working_directory: &Path,
    ) -> Result<Reconciliation, PanhandlerError> {
        if self.store.repositories().get(repository)?.is_none() {
            return Err(RepositoryError::NotFound {
                name: repository.to_string(),
            }
            .into());
        }

        let discovery = self.engine.discover(working_directory)?;
        let mut warnings = Vec::new();

        let mut indeterminate: Vec<PathBuf> = Vec::new();
        for failure in discovery.failures {
            tracing::warn!(
                repository,
                path = %failure.directory.display(),
                reason = %failure.reason,
                "skillet definition could not be read"
            );
            warnings.push(SyncWarning::Indeterminate {
                path: failure.directory.clone(),
                reason: failure.reason,
            });
            indeterminate.push(failure.directory);
        }

        let mut found: Vec<SkilletMetadata> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for definition in discovery.definitions {
            let errors = self.engine.validate_structure(&definition);
            if !errors.is_empty() {
                tracing::warn!(repository, skillet = %definition.name, ?errors, "skillet has structural problems");
                warnings.push(SyncWarning::StructuralValidation {
                    name: definition.name.clone(),
                    source_path: definition.source_path.clone(),
                    errors,
                });
            }
            if seen.contains(&definition.name) {
                tracing::warn!(repository, skillet = %definition.name, "duplicate skillet name within repository");
                warnings.push(SyncWarning::DuplicateSkilletName {
                    name: definition.name.clone(),
                    repository: repository.to_string(),
                    existing_repository: repository.to_string(),
                    source_path: definition.source_path.clone(),
                });
                continue;
            }
            seen.insert(definition.name.clone());
            found.push(definition);
        }

        let changes = self.store.with_tx(|store| {
            let mut changes = IndexChanges::default();
            let existing = store.skillets().list_for_repository(repository)?;

            for definition in &found {
                match store.skillets().upsert(&definition.name, definition, repository) {
                    Ok((_, UpsertOutcome::Created)) => changes.added.push(definition.name.clone()),
                    Ok((_, UpsertOutcome::Updated)) => {
                        changes.updated.push(definition.name.clone());
                    }
                    Ok((_, UpsertOutcome::Unchanged)) => {}
                    Err(SkilletError::DuplicateName {
                        name,
                        existing_repository,
                    }) => {
                        tracing::warn!(
                            repository,
                            skillet = %name,
                            owner = %existing_repository,
                            "skillet name already indexed from another repository"
                        );
                        changes.warnings.push(SyncWarning::DuplicateSkilletName {
                            name,
                            repository: repository.to_string(),
                            existing_repository,
                            source_path: definition.source_path.clone(),
                        });
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            for record in existing {
                if seen.contains(&record.name) {
                    continue;
                }
                let retained = record.metadata().is_ok_and(|metadata| {
                    indeterminate
                        .iter()
                        .any(|dir| metadata.source_path.starts_with(dir))
                });
                if retained {
                    tracing::debug!(repository, skillet = %record.name, "keeping skillet with unreadable definition");
                    continue;
                }
                store.skillets().delete(&record.name)?;
                changes.removed.push(record.name);
            }
            Ok(changes)
        })?;
        warnings.extend(changes.warnings);

        let changed = !(changes.added.is_empty()
            && changes.updated.is_empty()
            && changes.removed.is_empty());
        if changed {
            self.query.invalidate()?;
        }

        let skillets = self.store.skillets().list_for_repository(repository)?;
        let indexed: Vec<SkilletMetadata> = skillets
            .iter()
            .filter_map(|record| record.metadata().ok())
            .collect();
        let repositories = self.store.repositories().list()?;
        warnings.extend(unmet_dependencies(&indexed, &repositories));

        tracing::info!(
            repository,
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            warnings = warnings.len(),
            "reconciled repository"
        );

        Ok(Reconciliation {
            repository: repository.to_string(),
            skillets,
            added: changes.added,
            updated: changes.updated,
            removed: changes.removed,
            warnings,
        })
    }
}
