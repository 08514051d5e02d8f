use std::sync::Arc;

use fdsync_config::{
    config::{get_config, Config},
    repository::RepositoryConfig,
};
use fdsync_db::{DbConnection, DbError, RepositoryStore, SharedConnection, SqliteStorage};
use fdsync_dl::HttpDownloader;
use fdsync_index::{Repository, RepositoryUpdater};
use fdsync_utils::fs::{ensure_dir_exists, ensure_parent_dir};
use tracing::{debug, info, trace};

use crate::error::{CliError, CliResult};

/// Everything a command needs: the loaded config, the catalog database and
/// an updater wired to both.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SharedConnection,
    updater: Arc<RepositoryUpdater>,
}

impl AppState {
    pub fn new() -> CliResult<Self> {
        let config = get_config();

        let db_path = config.get_db_path()?;
        ensure_parent_dir(&db_path)?;
        trace!("opening database at {}", db_path.display());
        let db = DbConnection::open(&db_path).map_err(DbError::from)?.shared();

        let cache_path = config.get_cache_path()?;
        ensure_dir_exists(&cache_path)?;

        {
            let mut conn = db.lock();
            let seeded = RepositoryStore::seed_defaults(conn.conn())?;
            if seeded > 0 {
                debug!("seeded {seeded} default repositories");
            }
            seed_configured(&mut conn, &config.repositories)?;
        }

        let updater = RepositoryUpdater::new(
            Arc::new(HttpDownloader::new()),
            Arc::new(SqliteStorage::new(db.clone())),
            Arc::new(config.device.clone()),
            cache_path,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                updater: Arc::new(updater),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn db(&self) -> &SharedConnection {
        &self.inner.db
    }

    pub fn updater(&self) -> &Arc<RepositoryUpdater> {
        &self.inner.updater
    }

    /// Finds a repository by id, name or address.
    pub fn find_repository(&self, key: &str) -> CliResult<Repository> {
        let mut db = self.db().lock();
        let repositories = RepositoryStore::list(db.conn())?;
        let id = key.parse::<i64>().ok();
        repositories
            .into_iter()
            .find(|repo| {
                Some(repo.id) == id
                    || repo.name.eq_ignore_ascii_case(key)
                    || repo.address.trim_end_matches('/') == key.trim_end_matches('/')
            })
            .ok_or_else(|| CliError::RepositoryNotFound(key.to_string()))
    }
}

/// Adds the repositories from the config file whose address is not in the
/// database yet. Known addresses are left alone.
fn seed_configured(db: &mut DbConnection, configured: &[RepositoryConfig]) -> CliResult<()> {
    for entry in configured {
        if RepositoryStore::find_by_address(db.conn(), &entry.address)?.is_some() {
            continue;
        }
        let repository = Repository {
            name: entry.name.clone(),
            enabled: entry.is_enabled(),
            ..Repository::new(&entry.address, &entry.fingerprint(), &entry.authentication())
        };
        let stored = RepositoryStore::insert(db.conn(), &repository)?;
        info!("Added repository {} from config", stored.name);
    }
    Ok(())
}
