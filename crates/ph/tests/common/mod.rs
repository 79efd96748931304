#![allow(dead_code)]

use ph_core::cache::{CacheStore, Expiry, MemoryCache};
use ph_core::error::CacheError;
use ph_core::{Panhandler, RequestContext, Settings};
use ph_db::{DbStore, schema};
use ph_engine::MetaFileEngine;
use ph_events::{EventBus, EventSource};
use ph_vcs::backend::UPDATED_MESSAGE;
use ph_vcs::{RepoDetails, SourceControl, VcsError};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub type TestApp = Panhandler<DbStore, CountingCache, FakeScm, MetaFileEngine>;

/// Serves clones out of plain directories under `remotes`. A URL's last path
/// segment, minus `.git`, names the directory.
#[derive(Clone)]
pub struct FakeScm {
    remotes: PathBuf,
    origins: Arc<Mutex<HashMap<PathBuf, String>>>,
    pub branches: Arc<Mutex<Vec<String>>>,
    pub commits: Arc<Mutex<Vec<String>>>,
    pub pushes: Arc<Mutex<Vec<Option<PathBuf>>>>,
    pub keygens: Arc<AtomicUsize>,
}

impl FakeScm {
    fn new(remotes: &Path) -> Self {
        Self {
            remotes: remotes.to_path_buf(),
            origins: Arc::default(),
            branches: Arc::new(Mutex::new(vec!["master".to_string()])),
            commits: Arc::default(),
            pushes: Arc::default(),
            keygens: Arc::default(),
        }
    }

    fn remote_dir(&self, url: &str) -> Option<PathBuf> {
        let segment = url.trim_end_matches('/').rsplit('/').next()?;
        let dir = self.remotes.join(segment.trim_end_matches(".git"));
        dir.is_dir().then_some(dir)
    }

    fn origin(&self, dest: &Path) -> Result<String, VcsError> {
        self.origins
            .lock()
            .unwrap()
            .get(dest)
            .cloned()
            .ok_or(VcsError::RepoNotFound)
    }
}

impl SourceControl for FakeScm {
    fn clone_repo(&self, url: &str, dest: &Path, _branch: Option<&str>) -> Result<(), VcsError> {
        let source = self.remote_dir(url).ok_or_else(|| VcsError::CloneFailed {
            reason: format!("repository not found: {url}"),
        })?;
        copy_tree(&source, dest);
        self.origins
            .lock()
            .unwrap()
            .insert(dest.to_path_buf(), url.to_string());
        Ok(())
    }

    fn update(&self, dest: &Path, branch: Option<&str>) -> Result<String, VcsError> {
        if let Some(branch) = branch {
            if !self.branches.lock().unwrap().iter().any(|b| b == branch) {
                return Err(VcsError::BranchNotFound {
                    name: branch.to_string(),
                });
            }
        }
        let url = self.origin(dest)?;
        let source = self.remote_dir(&url).ok_or(VcsError::RepoNotFound)?;
        for entry in fs::read_dir(dest).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                fs::remove_dir_all(path).unwrap();
            } else {
                fs::remove_file(path).unwrap();
            }
        }
        copy_tree(&source, dest);
        Ok(UPDATED_MESSAGE.to_string())
    }

    fn branches(&self, _dest: &Path) -> Result<Vec<String>, VcsError> {
        Ok(self.branches.lock().unwrap().clone())
    }

    fn status(&self, _dest: &Path) -> Result<String, VcsError> {
        Ok("Your branch is up to date".to_string())
    }

    fn details(&self, dest: &Path) -> Result<RepoDetails, VcsError> {
        Ok(RepoDetails {
            url: self.origin(dest)?,
            branch: "master".to_string(),
            branches: self.branches.lock().unwrap().clone(),
            commit: None,
        })
    }

    fn commit(&self, _dest: &Path, message: &str, _path: &Path) -> Result<String, VcsError> {
        self.commits.lock().unwrap().push(message.to_string());
        Ok("0123456789abcdef".to_string())
    }

    fn push(&self, _dest: &Path, credential: Option<&Path>) -> Result<String, VcsError> {
        self.pushes
            .lock()
            .unwrap()
            .push(credential.map(Path::to_path_buf));
        Ok("pushed".to_string())
    }

    fn generate_key(&self, key_path: &Path, comment: &str) -> Result<String, VcsError> {
        let public_path = PathBuf::from(format!("{}.pub", key_path.display()));
        if !public_path.is_file() {
            let keys = self.keygens.fetch_add(1, Ordering::SeqCst);
            write_file(key_path, "private");
            write_file(&public_path, &format!("ssh-ed25519 AAAAkey{keys} {comment}\n"));
        }
        Ok(fs::read_to_string(public_path).unwrap().trim().to_string())
    }
}

/// In-memory cache that counts category evictions.
pub struct CountingCache {
    inner: MemoryCache,
    pub evictions: Arc<AtomicUsize>,
}

impl CacheStore for CountingCache {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<Value>, CacheError> {
        self.inner.get(app_id, key)
    }

    fn set(
        &self,
        app_id: &str,
        key: &str,
        value: Value,
        expiry: Expiry,
        category: &str,
    ) -> Result<(), CacheError> {
        self.inner.set(app_id, key, value, expiry, category)
    }

    fn evict(&self, app_id: &str, key: &str) -> Result<(), CacheError> {
        self.inner.evict(app_id, key)
    }

    fn evict_category(&self, app_id: &str, category: &str) -> Result<usize, CacheError> {
        if category == ph_core::cache::SKILLETS_CATEGORY {
            self.evictions.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.evict_category(app_id, category)
    }
}

pub struct Harness {
    pub home: TempDir,
    pub remotes: TempDir,
    pub app: TestApp,
    pub scm: FakeScm,
    pub skillet_evictions: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new() -> Self {
        let home = tempfile::tempdir().unwrap();
        let remotes = tempfile::tempdir().unwrap();
        let settings = Settings::with_home(home.path());
        let conn = schema::open_and_migrate(&settings.database_path).unwrap();
        let scm = FakeScm::new(remotes.path());
        let evictions = Arc::new(AtomicUsize::new(0));
        let cache = CountingCache {
            inner: MemoryCache::default(),
            evictions: Arc::clone(&evictions),
        };
        let app = Panhandler::new(
            DbStore::new(conn),
            cache,
            scm.clone(),
            MetaFileEngine::new(),
            settings,
            EventBus::default(),
        );
        Self {
            home,
            remotes,
            app,
            scm,
            skillet_evictions: evictions,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(EventSource::Cli, Some("test".to_string()))
    }

    pub fn url(remote: &str) -> String {
        format!("https://github.com/example/{remote}.git")
    }

    /// Writes `relative/.meta-cnc.yaml` in the named remote.
    pub fn remote_skillet(&self, remote: &str, relative: &str, yaml: &str) {
        write_file(&self.remotes.path().join(remote).join(relative).join(".meta-cnc.yaml"), yaml);
    }

    pub fn remote_file(&self, remote: &str, relative: &str, content: &str) {
        write_file(&self.remotes.path().join(remote).join(relative), content);
    }

    pub fn remove_remote_dir(&self, remote: &str, relative: &str) {
        fs::remove_dir_all(self.remotes.path().join(remote).join(relative)).unwrap();
    }

    pub fn import(&self, name: &str, remote: &str) -> ph_core::types::ImportOutcome {
        self.app
            .repositories()
            .import(&self.ctx(), name, &Self::url(remote), None)
            .unwrap()
    }

    /// Path of the working directory for repository `name`.
    pub fn working_dir(&self, name: &str) -> PathBuf {
        self.app.settings().repository_dir(name)
    }

    pub fn skillet_evictions(&self) -> usize {
        self.skillet_evictions.load(Ordering::SeqCst)
    }

    pub fn skillet_names(&self) -> Vec<String> {
        self.app
            .skillets()
            .list(false)
            .unwrap()
            .into_iter()
            .map(|skillet| skillet.name)
            .collect()
    }
}

pub fn skillet_yaml(name: &str, kind: &str, labels: &str) -> String {
    format!("name: {name}\nlabel: {name} label\ndescription: test skillet\ntype: {kind}\n{labels}")
}

pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn copy_tree(source: &Path, dest: &Path) {
    fs::create_dir_all(dest).unwrap();
    for entry in fs::read_dir(source).unwrap() {
        let entry = entry.unwrap();
        let target = dest.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}
