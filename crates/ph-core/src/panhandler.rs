use crate::cache::{CacheStore, REPOSITORIES_CATEGORY, REPOSITORIES_KEY};
use crate::collections::CollectionIndex;
use crate::config::Settings;
use crate::engine::{DEFAULT_METADATA_FILE, TemplateEngine};
use crate::error::{
    CacheError, CollectionError, PanhandlerError, RepositoryError, SkilletError,
    SourceControlError,
};
use crate::events::EventRepository;
use crate::query::SkilletQuery;
use crate::repos::RepositoryIndex;
use crate::skillets::SkilletIndex;
use crate::store::Store;
use crate::sync::Synchronizer;
use crate::types::{
    Collection, CollectionSummary, CreateCollectionInput, DeployKey, Event, EventBody,
    ImportOutcome, Reconciliation, Repository, RepositoryDetails, RepositoryUpdate, SavedSkillet,
    SkilletMetadata, UpdateOutcome,
};
use crate::validation::{validate_repository_name, validate_skillet_name};
use chrono::Utc;
use ph_events::{EventBus, EventRecord, EventSource};
use ph_vcs::{SourceControl, is_ssh_url, status_is_ahead, update_changed};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new(source: EventSource, correlation_id: Option<String>) -> Self {
        Self {
            source,
            correlation_id,
        }
    }
}

pub struct Panhandler<S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine> {
    store: S,
    cache: C,
    scm: V,
    engine: E,
    settings: Settings,
    event_bus: EventBus,
}

impl<S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine> Panhandler<S, C, V, E> {
    pub fn new(
        store: S,
        cache: C,
        scm: V,
        engine: E,
        settings: Settings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            cache,
            scm,
            engine,
            settings,
            event_bus,
        }
    }

    pub fn repositories(&self) -> RepositoriesApi<'_, S, C, V, E> {
        RepositoriesApi { core: self }
    }

    pub fn skillets(&self) -> SkilletsApi<'_, S, C, V, E> {
        SkilletsApi { core: self }
    }

    pub fn favorites(&self) -> FavoritesApi<'_, S, C, V, E> {
        FavoritesApi { core: self }
    }

    pub fn events(&self) -> EventsApi<'_, S, C, V, E> {
        EventsApi { core: self }
    }

    pub fn query(&self) -> SkilletQuery<'_, S, C> {
        SkilletQuery::new(
            &self.store,
            &self.cache,
            &self.settings.app_id,
            self.settings.collection_cache_expiry(),
        )
    }

    pub fn synchronizer(&self) -> Synchronizer<'_, S, C, E> {
        Synchronizer::new(&self.store, &self.engine, self.query())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn with_events<T, F>(&self, ctx: &RequestContext, f: F) -> Result<T, PanhandlerError>
    where
        F: FnOnce(&S) -> Result<(T, Vec<EventBody>), PanhandlerError>,
    {
        let (value, records) = self.store.with_tx(|store| {
            let (value, bodies) = f(store)?;
            let mut records = Vec::new();
            for body in bodies {
                let record = build_event_record(ctx, body)?;
                let record = store.events().append(record)?;
                records.push(record);
            }
            Ok((value, records))
        })?;
        let delivered = self.event_bus.publish_all(records);
        tracing::trace!(delivered, "published committed events");
        Ok(value)
    }

    fn record_events(
        &self,
        ctx: &RequestContext,
        bodies: Vec<EventBody>,
    ) -> Result<(), PanhandlerError> {
        if bodies.is_empty() {
            return Ok(());
        }
        self.with_events(ctx, |_| Ok(((), bodies)))
    }

    fn evict_repositories(&self) -> Result<(), CacheError> {
        self.cache
            .evict_category(&self.settings.app_id, REPOSITORIES_CATEGORY)
            .map(|_| ())
    }

    fn require_repository(&self, name: &str) -> Result<Repository, PanhandlerError> {
        self.store
            .repositories()
            .get(name)?
            .ok_or_else(|| {
                RepositoryError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    fn existing_working_directory(&self, name: &str) -> Result<PathBuf, RepositoryError> {
        let dir = self.settings.repository_dir(name);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(RepositoryError::WorkingDirectoryMissing {
                name: name.to_string(),
            })
        }
    }

    /// Creates the working directory for a new repository. Creation of the
    /// leaf directory is the claim on the name: a second importer loses here.
    fn claim_working_directory(&self, name: &str) -> Result<PathBuf, RepositoryError> {
        let root = &self.settings.repositories_root;
        fs::create_dir_all(root).map_err(|err| RepositoryError::Io {
            path: root.clone(),
            message: err.to_string(),
        })?;

        let dir = self.settings.repository_dir(name);
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        match builder.create(&dir) {
            Ok(()) => Ok(dir),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RepositoryError::AlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(err) => Err(RepositoryError::Io {
                path: dir,
                message: err.to_string(),
            }),
        }
    }
}

pub struct RepositoriesApi<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine> {
    core: &'a Panhandler<S, C, V, E>,
}

impl<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine>
    RepositoriesApi<'a, S, C, V, E>
{
    /// Clones `url` into a fresh working directory named `name`, records the
    /// repository and indexes its skillets.
    ///
    /// Import never overwrites: an existing record or directory with this
    /// name fails with `AlreadyExists`. A failed clone removes the directory
    /// it created so the import can be retried.
    pub fn import(
        &self,
        ctx: &RequestContext,
        name: &str,
        url: &str,
        branch: Option<&str>,
    ) -> Result<ImportOutcome, PanhandlerError> {
        validate_repository_name(name)?;
        let url = url.trim();
        if self.core.store.repositories().get(name)?.is_some() {
            return Err(RepositoryError::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }

        let dir = self.core.claim_working_directory(name)?;
        let details = match self.clone_and_describe(url, &dir, branch) {
            Ok(details) => details,
            Err(err) => {
                discard_directory(&dir);
                return Err(err);
            }
        };

        let (repository, created) =
            self.core
                .store
                .repositories()
                .get_or_create(name, url, &details)?;
        if !created {
            return Err(RepositoryError::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }
        tracing::info!(repository = name, url, branch = %repository.details.branch, "imported repository");

        let reconciliation = self.core.synchronizer().reconcile(name, &dir)?;
        self.core.evict_repositories()?;

        let mut bodies = vec![EventBody::RepositoryImported {
            repository: repository.clone(),
        }];
        bodies.extend(reconciliation_events(&reconciliation));
        self.core.record_events(ctx, bodies)?;

        Ok(ImportOutcome {
            repository,
            skillets: decode_records(&reconciliation),
            warnings: reconciliation.warnings,
        })
    }

    fn clone_and_describe(
        &self,
        url: &str,
        dir: &Path,
        branch: Option<&str>,
    ) -> Result<RepositoryDetails, PanhandlerError> {
        self.core.scm.clone_repo(url, dir, branch)?;
        let remote = self.core.scm.details(dir)?;
        Ok(RepositoryDetails::from_remote(remote, url, "Imported"))
    }

    /// Pulls the latest commits (switching to `branch` if given), refreshes
    /// the stored details and reconciles the index.
    pub fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        branch: Option<&str>,
    ) -> Result<UpdateOutcome, PanhandlerError> {
        let repository = self.core.require_repository(name)?;
        let dir = self.core.existing_working_directory(name)?;

        let status = self.core.scm.update(&dir, branch)?;
        let changed = update_changed(&status);
        let remote = self.core.scm.details(&dir)?;
        let details = RepositoryDetails::from_remote(remote, &repository.remote_url, status.clone());
        let new_branches = repository.new_branches(&details);
        self.core
            .store
            .repositories()
            .update_details(name, &details)?;
        tracing::info!(repository = name, %status, changed, "updated repository");

        let reconciliation = self.core.synchronizer().reconcile(name, &dir)?;
        self.core.evict_repositories()?;

        let mut bodies = vec![EventBody::RepositoryUpdated {
            name: name.to_string(),
            status: status.clone(),
        }];
        bodies.extend(reconciliation_events(&reconciliation));
        self.core.record_events(ctx, bodies)?;

        Ok(UpdateOutcome {
            status,
            changed,
            new_branches,
            skillets: decode_records(&reconciliation),
            warnings: reconciliation.warnings,
        })
    }

    /// Updates every imported repository in name order. Failures are
    /// collected per repository.
    pub fn update_all(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<RepositoryUpdate>, PanhandlerError> {
        let repositories = self.core.store.repositories().list()?;
        Ok(repositories
            .into_iter()
            .map(|repository| {
                let result = self.update(ctx, &repository.name, None);
                if let Err(err) = &result {
                    tracing::warn!(repository = %repository.name, error = %err, "update failed");
                }
                RepositoryUpdate {
                    name: repository.name,
                    result,
                }
            })
            .collect())
    }

    /// Reconciles the index against the working directory as it is, without
    /// touching the remote.
    pub fn reindex(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Reconciliation, PanhandlerError> {
        self.core.require_repository(name)?;
        let dir = self.core.existing_working_directory(name)?;
        let reconciliation = self.core.synchronizer().reconcile(name, &dir)?;
        self.core
            .record_events(ctx, reconciliation_events(&reconciliation))?;
        Ok(reconciliation)
    }

    /// Deletes the working directory, then the repository and skillet
    /// records. Each step tolerates the earlier ones having already happened,
    /// so a failed removal can be retried.
    pub fn remove(&self, ctx: &RequestContext, name: &str) -> Result<(), PanhandlerError> {
        self.core.require_repository(name)?;
        validate_repository_name(name)?;

        let dir = self.core.settings.repository_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(RepositoryError::Io {
                    path: dir,
                    message: err.to_string(),
                }
                .into());
            }
        }

        let removed = self.core.with_events(ctx, |store| {
            let removed = store.skillets().delete_for_repository(name)?;
            store.repositories().delete(name)?;
            let mut bodies: Vec<EventBody> = removed
                .iter()
                .map(|skillet| EventBody::SkilletRemoved {
                    name: skillet.clone(),
                    repository: name.to_string(),
                })
                .collect();
            bodies.push(EventBody::RepositoryRemoved {
                name: name.to_string(),
            });
            Ok((removed, bodies))
        })?;
        tracing::info!(repository = name, skillets = removed.len(), "removed repository");

        self.core.query().invalidate()?;
        self.core.evict_repositories()?;
        Ok(())
    }

    /// Pushes local commits to the remote using the repository's deploy key.
    pub fn push(&self, ctx: &RequestContext, name: &str) -> Result<String, PanhandlerError> {
        let repository = self.core.require_repository(name)?;
        if !is_ssh_url(&repository.remote_url) {
            return Err(RepositoryError::PushRequiresSsh {
                url: repository.remote_url,
            }
            .into());
        }
        let dir = self.core.existing_working_directory(name)?;

        let credential = repository.deploy_key_reference.as_deref().map(Path::new);
        let output = self.core.scm.push(&dir, credential)?;
        let status = self.core.scm.status(&dir)?;
        let remote = self.core.scm.details(&dir)?;
        let details = RepositoryDetails::from_remote(remote, &repository.remote_url, status.clone());
        self.core
            .store
            .repositories()
            .update_details(name, &details)?;
        self.core.evict_repositories()?;
        if status_is_ahead(&status) {
            tracing::warn!(repository = name, %status, "local commits remain after push");
        } else {
            tracing::info!(repository = name, %status, "pushed repository");
        }

        self.core.record_events(
            ctx,
            vec![EventBody::RepositoryPushed {
                name: name.to_string(),
                status,
            }],
        )?;
        Ok(output)
    }

    pub fn set_deploy_key(
        &self,
        ctx: &RequestContext,
        name: &str,
        reference: Option<&str>,
    ) -> Result<Repository, PanhandlerError> {
        let repository = self.core.with_events(ctx, |store| {
            let repository = store.repositories().set_deploy_key(name, reference)?;
            Ok((
                repository,
                vec![EventBody::DeployKeyChanged {
                    name: name.to_string(),
                }],
            ))
        })?;
        self.core.evict_repositories()?;
        Ok(repository)
    }

    /// Creates the SSH key pair for `name` under the keys directory, or
    /// reuses the one already there, and records it as the deploy key. The
    /// public key is returned for registration with the git host.
    pub fn generate_deploy_key(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<DeployKey, PanhandlerError> {
        self.core.require_repository(name)?;
        validate_repository_name(name)?;
        let key_path = self.core.settings.deploy_key_path(name);
        let public_key = self
            .core
            .scm
            .generate_key(&key_path, &format!("panhandler-{name}"))?;
        let reference = key_path.display().to_string();
        let repository = self.set_deploy_key(ctx, name, Some(&reference))?;
        tracing::info!(repository = name, key = %reference, "deploy key ready");
        Ok(DeployKey {
            repository,
            public_key,
        })
    }

    /// All imported repositories, served from the cache when fresh.
    pub fn list(&self) -> Result<Vec<Repository>, PanhandlerError> {
        let app_id = &self.core.settings.app_id;
        if let Some(value) = self.core.cache.get(app_id, REPOSITORIES_KEY)? {
            if let Ok(repositories) = serde_json::from_value(value) {
                return Ok(repositories);
            }
        }
        let repositories = self.core.store.repositories().list()?;
        let value = serde_json::to_value(&repositories).map_err(|err| CacheError::Encode {
            message: err.to_string(),
        })?;
        self.core.cache.set(
            app_id,
            REPOSITORIES_KEY,
            value,
            self.core.settings.repository_cache_expiry(),
            REPOSITORIES_CATEGORY,
        )?;
        Ok(repositories)
    }

    pub fn get(&self, name: &str) -> Result<Repository, PanhandlerError> {
        self.core.require_repository(name)
    }

    pub fn working_directory(&self, name: &str) -> PathBuf {
        self.core.settings.repository_dir(name)
    }
}

pub struct SkilletsApi<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine> {
    core: &'a Panhandler<S, C, V, E>,
}

impl<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine>
    SkilletsApi<'a, S, C, V, E>
{
    pub fn list(&self, refresh: bool) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        self.core.query().load_all(refresh)
    }

    pub fn list_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        self.core.query().load_by_label(label, value)
    }

    pub fn label_values(&self, label: &str) -> Result<Vec<String>, PanhandlerError> {
        self.core.query().load_label_values(label)
    }

    pub fn get(&self, name: &str) -> Result<SkilletMetadata, PanhandlerError> {
        self.core.query().load_by_name(name)
    }

    pub fn collection_summary(&self) -> Result<Vec<CollectionSummary>, PanhandlerError> {
        self.core.query().collection_summary()
    }

    pub fn collection(&self, name: &str) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        self.core.query().load_collection(name)
    }

    pub fn render(
        &self,
        name: &str,
        context: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, String>, PanhandlerError> {
        let metadata = self.get(name)?;
        Ok(self.core.engine.render(&metadata, context)?)
    }

    /// Writes definition `contents` into `repository`, re-indexes it and
    /// commits the file locally.
    ///
    /// A skillet already indexed under the same name from this repository is
    /// rewritten in place. Otherwise the file goes to
    /// `<working dir>/<name>/.meta-cnc.yaml`. Contents that do not parse are
    /// refused before anything is written, and a name owned by another
    /// repository is `DuplicateName`. Structural problems come back as
    /// reconciliation warnings. A failed commit is logged and keeps the file.
    pub fn save(
        &self,
        ctx: &RequestContext,
        repository: &str,
        contents: &str,
    ) -> Result<SavedSkillet, PanhandlerError> {
        self.core.require_repository(repository)?;
        let dir = self.core.existing_working_directory(repository)?;
        let engine = &self.core.engine;
        let name = engine.parse(contents, &dir, DEFAULT_METADATA_FILE)?.name;

        let (target, file_name, created) = match self.core.store.skillets().get_by_name(&name)? {
            Some(record) if record.repository != repository => {
                return Err(SkilletError::DuplicateName {
                    name,
                    existing_repository: record.repository,
                }
                .into());
            }
            Some(record) => {
                let existing = record.metadata()?;
                (existing.source_path, existing.metadata_file, false)
            }
            None => {
                validate_skillet_name(&name)?;
                (dir.join(&name), DEFAULT_METADATA_FILE.to_string(), true)
            }
        };
        if !target.starts_with(&dir) {
            return Err(SkilletError::NotInRepository {
                name,
                repository: repository.to_string(),
            }
            .into());
        }

        let definition = engine.parse(contents, &target, &file_name)?;
        let problems = engine.validate_structure(&definition);
        if !problems.is_empty() {
            tracing::warn!(repository, skillet = %name, ?problems, "saving skillet with structural problems");
        }
        let path = definition.metadata_path();
        let io = |path: &Path, err: std::io::Error| SkilletError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        fs::create_dir_all(&target).map_err(|err| io(&target, err))?;
        fs::write(&path, contents).map_err(|err| io(&path, err))?;

        let reconciliation = self.core.synchronizer().reconcile(repository, &dir)?;

        let verb = if created { "Created" } else { "Updated" };
        let commit = match self
            .core
            .scm
            .commit(&dir, &format!("{verb} skillet {name}"), &path)
        {
            Ok(rev) => {
                tracing::info!(repository, skillet = %name, %rev, "committed skillet");
                Some(rev)
            }
            Err(err) => {
                let err = SourceControlError::from(err);
                tracing::warn!(repository, skillet = %name, error = %err, "skillet not committed");
                None
            }
        };

        self.core
            .record_events(ctx, reconciliation_events(&reconciliation))?;
        Ok(SavedSkillet {
            name,
            path,
            created,
            commit,
            reconciliation,
        })
    }

    /// Deletes the definition file of `name` from `repository`'s working
    /// directory, reconciles, and commits the deletion locally. A failed
    /// commit is logged and does not undo the deletion.
    pub fn delete(
        &self,
        ctx: &RequestContext,
        repository: &str,
        name: &str,
    ) -> Result<Reconciliation, PanhandlerError> {
        self.core.require_repository(repository)?;
        let record = self
            .core
            .store
            .skillets()
            .get_by_name(name)?
            .ok_or_else(|| SkilletError::NotFound {
                name: name.to_string(),
            })?;
        if record.repository != repository {
            return Err(SkilletError::NotInRepository {
                name: name.to_string(),
                repository: repository.to_string(),
            }
            .into());
        }
        let metadata = record.metadata()?;
        let dir = self.core.existing_working_directory(repository)?;
        if !metadata.source_path.starts_with(&dir) {
            return Err(SkilletError::NotInRepository {
                name: name.to_string(),
                repository: repository.to_string(),
            }
            .into());
        }

        let file = metadata.metadata_path();
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(SkilletError::Io {
                    path: file,
                    message: err.to_string(),
                }
                .into());
            }
        }
        if let Err(err) = fs::remove_dir(&metadata.source_path) {
            if err.kind() != std::io::ErrorKind::DirectoryNotEmpty {
                tracing::debug!(path = %metadata.source_path.display(), error = %err, "skillet directory left in place");
            }
        }

        let reconciliation = self.core.synchronizer().reconcile(repository, &dir)?;

        match self.core.scm.commit(
            &dir,
            &format!("Removed skillet {name}"),
            &metadata.source_path,
        ) {
            Ok(rev) => tracing::info!(repository, skillet = name, %rev, "committed skillet removal"),
            Err(err) => {
                let err = SourceControlError::from(err);
                tracing::warn!(repository, skillet = name, error = %err, "skillet removal not committed");
            }
        }

        self.core
            .record_events(ctx, reconciliation_events(&reconciliation))?;
        Ok(reconciliation)
    }
}

pub struct FavoritesApi<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine> {
    core: &'a Panhandler<S, C, V, E>,
}

impl<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine>
    FavoritesApi<'a, S, C, V, E>
{
    pub fn create(
        &self,
        ctx: &RequestContext,
        input: CreateCollectionInput,
    ) -> Result<Collection, PanhandlerError> {
        if input.name.trim().is_empty() {
            return Err(CollectionError::InvalidInput {
                message: "collection name is required".to_string(),
            }
            .into());
        }
        self.core.with_events(ctx, |store| {
            let collection = store.collections().create(input)?;
            Ok((
                collection.clone(),
                vec![EventBody::FavoriteCreated { collection }],
            ))
        })
    }

    pub fn delete(&self, ctx: &RequestContext, name: &str) -> Result<(), PanhandlerError> {
        self.core.with_events(ctx, |store| {
            store.collections().delete(name)?;
            Ok((
                (),
                vec![EventBody::FavoriteDeleted {
                    name: name.to_string(),
                }],
            ))
        })
    }

    pub fn list(&self) -> Result<Vec<Collection>, PanhandlerError> {
        Ok(self.core.store.collections().list()?)
    }

    /// Skillets in the favorites collection `name`. Members whose skillet is
    /// no longer indexed are left out.
    pub fn skillets(&self, name: &str) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        let collection = self
            .core
            .store
            .collections()
            .get(name)?
            .ok_or_else(|| CollectionError::NotFound {
                name: name.to_string(),
            })?;
        let query = self.core.query();
        let mut skillets = Vec::new();
        for skillet in &collection.skillets {
            match query.load_by_name(skillet) {
                Ok(metadata) => skillets.push(metadata),
                Err(PanhandlerError::Skillet(SkilletError::NotFound { .. })) => {
                    tracing::debug!(collection = name, skillet = %skillet, "favorite no longer indexed");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(skillets)
    }

    pub fn collections_for_skillet(&self, skillet: &str) -> Result<Vec<String>, PanhandlerError> {
        Ok(self.core.store.collections().collections_for_skillet(skillet)?)
    }

    /// Makes `collections` the complete set of favorites holding `skillet`.
    pub fn set_for_skillet(
        &self,
        ctx: &RequestContext,
        skillet: &str,
        collections: &[String],
    ) -> Result<(), PanhandlerError> {
        self.core.with_events(ctx, |store| {
            if store.skillets().get_by_name(skillet)?.is_none() {
                return Err(SkilletError::NotFound {
                    name: skillet.to_string(),
                }
                .into());
            }
            store
                .collections()
                .set_skillet_collections(skillet, collections)?;
            Ok((
                (),
                vec![EventBody::FavoritesAssigned {
                    skillet: skillet.to_string(),
                    collections: collections.to_vec(),
                }],
            ))
        })
    }
}

pub struct EventsApi<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine> {
    core: &'a Panhandler<S, C, V, E>,
}

impl<'a, S: Store, C: CacheStore, V: SourceControl, E: TemplateEngine>
    EventsApi<'a, S, C, V, E>
{
    pub fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<Event>, PanhandlerError> {
        self.core
            .store
            .events()
            .list(after, limit)?
            .into_iter()
            .map(|record| {
                Event::try_from(record).map_err(|err| PanhandlerError::Internal {
                    message: err.to_string(),
                })
            })
            .collect()
    }
}

fn build_event_record(
    ctx: &RequestContext,
    body: EventBody,
) -> Result<EventRecord, PanhandlerError> {
    let value = serde_json::to_value(body).map_err(|err| PanhandlerError::Internal {
        message: err.to_string(),
    })?;
    Ok(EventRecord {
        id: String::new(),
        seq: 0,
        at: Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        body: value,
    })
}

fn reconciliation_events(reconciliation: &Reconciliation) -> Vec<EventBody> {
    let repository = &reconciliation.repository;
    let mut bodies = Vec::new();
    for name in &reconciliation.added {
        bodies.push(EventBody::SkilletAdded {
            name: name.clone(),
            repository: repository.clone(),
        });
    }
    for name in &reconciliation.updated {
        bodies.push(EventBody::SkilletUpdated {
            name: name.clone(),
            repository: repository.clone(),
        });
    }
    for name in &reconciliation.removed {
        bodies.push(EventBody::SkilletRemoved {
            name: name.clone(),
            repository: repository.clone(),
        });
    }
    for warning in &reconciliation.warnings {
        if let crate::types::SyncWarning::DuplicateSkilletName {
            name,
            existing_repository,
            ..
        } = warning
        {
            if existing_repository != repository {
                bodies.push(EventBody::DuplicateSkilletRejected {
                    name: name.clone(),
                    repository: repository.clone(),
                    existing_repository: existing_repository.clone(),
                });
            }
        }
    }
    bodies
}

fn decode_records(reconciliation: &Reconciliation) -> Vec<SkilletMetadata> {
    let mut skillets: Vec<SkilletMetadata> = reconciliation
        .skillets
        .iter()
        .filter_map(|record| record.metadata().ok())
        .collect();
    skillets.sort_by(|a, b| a.name.cmp(&b.name));
    skillets
}

fn discard_directory(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        tracing::warn!(path = %dir.display(), error = %err, "could not remove partial clone");
    }
}
