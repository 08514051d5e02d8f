use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use fdsync_utils::{
    fs::ensure_parent_dir,
    path::{resolve_path, xdg_cache_home, xdg_config_home, xdg_data_home},
    time::parse_duration,
};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{info, warn};

use crate::{
    annotations::{annotate_toml_array_of_tables, annotate_toml_table},
    device::DeviceProfile,
    error::{ConfigError, Result},
    repository::RepositoryConfig,
};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

/// fdsync configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Path of the SQLite database holding repositories and their catalogs.
    /// Default: $XDG_DATA_HOME/fdsync/fdsync.db
    pub db_path: Option<String>,

    /// Directory for downloaded index archives and merge scratch files.
    /// Default: $XDG_CACHE_HOME/fdsync
    pub cache_path: Option<String>,

    /// Allow releases newer than the suggested version to be selected.
    /// Default: false
    pub allow_unstable: Option<bool>,

    /// Minimum time between syncs of a repository ("3h", "1d12h", "always",
    /// "never").
    /// Default: "3h"
    pub sync_interval: Option<String>,

    /// Device the catalog is evaluated against.
    #[serde(default)]
    pub device: DeviceProfile,

    /// Extra repositories, added on startup when their address is unknown.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("FDSYNC_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_config_home()
            .unwrap_or_default()
            .join("fdsync")
            .join("config.toml"),
    })
});

fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Loads the configuration file into [`CONFIG`].
pub fn init() -> Result<()> {
    let config = Config::new()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    Ok(())
}

/// Returns the loaded configuration, or the defaults when [`init`] was not
/// called.
pub fn get_config() -> Config {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    let mut guard = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    guard.get_or_insert_with(Config::default_config).clone()
}

fn default_db_path() -> Result<PathBuf> {
    Ok(xdg_data_home()?.join("fdsync").join("fdsync.db"))
}

fn default_cache_path() -> Result<PathBuf> {
    Ok(xdg_cache_home()?.join("fdsync"))
}

impl Config {
    pub fn default_config() -> Self {
        let display = |path: PathBuf| path.display().to_string();
        Self {
            db_path: default_db_path().ok().map(display),
            cache_path: default_cache_path().ok().map(display),
            allow_unstable: Some(false),
            sync_interval: Some("3h".to_string()),
            device: DeviceProfile::host(),
            repositories: Vec::new(),
        }
    }

    /// Reads the file at [`CONFIG_PATH`], using the defaults if it does not
    /// exist.
    pub fn new() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: Config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default_config());
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;
        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.allow_unstable.get_or_insert(false);

        if let Some(interval) = self.sync_interval.as_deref() {
            if !matches!(interval, "always" | "never") && parse_duration(interval).is_none() {
                warn!(
                    "Invalid sync_interval '{}', falling back to {}s",
                    interval,
                    DEFAULT_SYNC_INTERVAL.as_secs()
                );
            }
        }

        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if !seen.insert(repo.name.as_str()) {
                return Err(ConfigError::DuplicateRepositoryName(repo.name.clone()));
            }
            repo.validate()?;
        }

        Ok(())
    }

    pub fn get_db_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("FDSYNC_DB") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.db_path {
            Some(path) => Ok(resolve_path(path)?),
            None => default_db_path(),
        }
    }

    pub fn get_cache_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("FDSYNC_CACHE") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.cache_path {
            Some(path) => Ok(resolve_path(path)?),
            None => default_cache_path(),
        }
    }

    pub fn allow_unstable(&self) -> bool {
        self.allow_unstable.unwrap_or(false)
    }

    /// Minimum time between two syncs of the same repository. `never` maps to
    /// [`Duration::MAX`].
    pub fn sync_interval(&self) -> Duration {
        match self.sync_interval.as_deref().unwrap_or("3h") {
            "always" => Duration::ZERO,
            "never" => Duration::MAX,
            value => parse_duration(value).unwrap_or(DEFAULT_SYNC_INTERVAL),
        }
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(device) = doc.get_mut("device").and_then(|item| item.as_table_mut()) {
            annotate_toml_table::<DeviceProfile>(device, false)?;
        }

        if let Some(repositories) = doc
            .get_mut("repositories")
            .and_then(|item| item.as_array_of_tables_mut())
        {
            annotate_toml_array_of_tables::<RepositoryConfig>(repositories)?;
        }

        Ok(doc)
    }
}

/// Writes an annotated default configuration to [`CONFIG_PATH`].
pub fn generate_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let doc = Config::default_config().to_annotated_document()?;
    ensure_parent_dir(&path)?;
    fs::write(&path, doc.to_string())?;

    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(path)
}
