use crate::cache::Expiry;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "panhandler.toml";
pub const DEFAULT_APP_ID: &str = "panhandler";
pub const DEFAULT_REPOSITORY_CACHE_TTL_SECS: u64 = 604_800;
pub const DEFAULT_COLLECTION_CACHE_TTL_SECS: u64 = 86_400;

pub const HOME_ENV: &str = "PANHANDLER_HOME";
pub const DB_PATH_ENV: &str = "PANHANDLER_DB_PATH";
pub const REPOSITORIES_ROOT_ENV: &str = "PANHANDLER_REPOSITORIES_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub home: PathBuf,
    pub repositories_root: PathBuf,
    pub database_path: PathBuf,
    pub keys_dir: PathBuf,
    pub app_id: String,
    pub repository_cache_ttl_secs: u64,
    pub collection_cache_ttl_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    repositories_root: Option<PathBuf>,
    database_path: Option<PathBuf>,
    keys_dir: Option<PathBuf>,
    app_id: Option<String>,
    repository_cache_ttl_secs: Option<u64>,
    collection_cache_ttl_secs: Option<u64>,
}

impl Settings {
    /// Defaults rooted at `home`: repositories under `home/repositories`, the
    /// index at `home/panhandler.db`, generated deploy keys under `home/keys`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            repositories_root: home.join("repositories"),
            database_path: home.join("panhandler.db"),
            keys_dir: home.join("keys"),
            home,
            app_id: DEFAULT_APP_ID.to_string(),
            repository_cache_ttl_secs: DEFAULT_REPOSITORY_CACHE_TTL_SECS,
            collection_cache_ttl_secs: DEFAULT_COLLECTION_CACHE_TTL_SECS,
        }
    }

    /// Resolves settings from the process environment and, if present, the
    /// config file.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Precedence, lowest first: built-in defaults, the TOML file, then
    /// environment variables. `env` is the variable lookup.
    pub fn load_with<F>(config_path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = match env(HOME_ENV) {
            Some(home) if !home.trim().is_empty() => PathBuf::from(home),
            _ => default_home()?,
        };
        let mut settings = Self::with_home(&home);

        let config_path = config_path.map_or_else(|| home.join(CONFIG_FILE_NAME), Path::to_path_buf);
        if let Some(file) = read_settings_file(&config_path)? {
            settings.apply_file(file);
        }

        if let Some(path) = env(REPOSITORIES_ROOT_ENV).filter(|value| !value.trim().is_empty()) {
            settings.repositories_root = PathBuf::from(path);
        }
        if let Some(path) = env(DB_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            settings.database_path = PathBuf::from(path);
        }
        Ok(settings)
    }

    fn apply_file(&mut self, file: SettingsFile) {
        if let Some(root) = file.repositories_root {
            self.repositories_root = self.resolve(root);
        }
        if let Some(path) = file.database_path {
            self.database_path = self.resolve(path);
        }
        if let Some(dir) = file.keys_dir {
            self.keys_dir = self.resolve(dir);
        }
        if let Some(app_id) = file.app_id {
            self.app_id = app_id;
        }
        if let Some(ttl) = file.repository_cache_ttl_secs {
            self.repository_cache_ttl_secs = ttl;
        }
        if let Some(ttl) = file.collection_cache_ttl_secs {
            self.collection_cache_ttl_secs = ttl;
        }
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_relative() {
            self.home.join(path)
        } else {
            path
        }
    }

    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.repositories_root.join(name)
    }

    pub fn deploy_key_path(&self, repository: &str) -> PathBuf {
        self.keys_dir.join(repository)
    }

    pub fn repository_cache_expiry(&self) -> Expiry {
        Expiry::from_secs(self.repository_cache_ttl_secs)
    }

    pub fn collection_cache_expiry(&self) -> Expiry {
        Expiry::from_secs(self.collection_cache_ttl_secs)
    }
}

fn default_home() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeUnavailable)?;
    Ok(home.join(".pan_cnc").join("panhandler"))
}

fn read_settings_file(path: &Path) -> Result<Option<SettingsFile>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }
    };
    let parsed = toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(Some(parsed))
}
