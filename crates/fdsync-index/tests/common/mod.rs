#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use fdsync_config::device::DeviceProfile;
use fdsync_dl::{DownloadError, Downloader, FetchOutcome, FetchRequest};
use fdsync_index::{CatalogStorage, Product, Repository, RepositoryUpdater, StorageError};

pub const LAST_MODIFIED: &str = "Tue, 14 Nov 2023 22:13:20 GMT";
pub const ENTITY_TAG: &str = "\"fixture\"";
pub const ADDRESS: &str = "https://example.org/repo";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn signer_fingerprint() -> String {
    let der = fs::read(fixture("signer.der")).unwrap();
    fdsync_utils::hash::calculate_fingerprint(&der)
}

pub fn repository(id: i64) -> Repository {
    Repository {
        id,
        ..Repository::new(ADDRESS, "", "")
    }
}

pub fn device() -> DeviceProfile {
    DeviceProfile {
        api_level: Some(30),
        features: None,
        platforms: Some(vec!["arm64-v8a".into(), "armeabi-v7a".into()]),
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    NotModified,
    Status(u16),
    Serve(PathBuf),
}

/// Answers by the requested file name; unknown names get a 404.
#[derive(Default)]
pub struct ScriptedDownloader {
    replies: HashMap<String, Reply>,
    pub requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedDownloader {
    pub fn new(replies: &[(&str, Reply)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(name, reply)| (name.to_string(), reply.clone()))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn serving(jar: &str, fixture_name: &str) -> Self {
        Self::new(&[(jar, Reply::Serve(fixture(fixture_name)))])
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

impl Downloader for ScriptedDownloader {
    fn fetch(
        &self,
        request: &FetchRequest,
        on_bytes: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<FetchOutcome, DownloadError> {
        self.requests.lock().unwrap().push(request.clone());
        let name = request.url.rsplit('/').next().unwrap_or_default();
        match self.replies.get(name) {
            None => Ok(FetchOutcome::Http(404)),
            Some(Reply::NotModified) => Ok(FetchOutcome::NotModified),
            Some(Reply::Status(code)) => Ok(FetchOutcome::Http(*code)),
            Some(Reply::Serve(path)) => {
                let len = fs::copy(path, &request.destination).map_err(|source| {
                    DownloadError::Io {
                        path: request.destination.display().to_string(),
                        source,
                    }
                })?;
                on_bytes(len, Some(len));
                Ok(FetchOutcome::Success {
                    last_modified: LAST_MODIFIED.into(),
                    entity_tag: ENTITY_TAG.into(),
                })
            }
        }
    }
}

/// Keeps staged rows, committed catalogs and repository rows in memory.
#[derive(Default)]
pub struct MemoryStorage {
    staged: Mutex<HashMap<i64, Vec<Product>>>,
    catalogs: Mutex<HashMap<i64, Vec<Product>>>,
    repositories: Mutex<HashMap<i64, Repository>>,
    pub rollbacks: Mutex<Vec<i64>>,
    pub stage_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn catalog(&self, id: i64) -> Option<Vec<Product>> {
        self.catalogs.lock().unwrap().get(&id).cloned()
    }

    pub fn repository(&self, id: i64) -> Option<Repository> {
        self.repositories.lock().unwrap().get(&id).cloned()
    }

    pub fn staged(&self, id: i64) -> Option<Vec<Product>> {
        self.staged.lock().unwrap().get(&id).cloned()
    }

    pub fn product(&self, id: i64, package_name: &str) -> Product {
        self.catalog(id)
            .unwrap()
            .into_iter()
            .find(|product| product.package_name == package_name)
            .unwrap()
    }
}

impl CatalogStorage for MemoryStorage {
    fn begin_catalog(&self, repository_id: i64) -> Result<(), StorageError> {
        self.staged.lock().unwrap().insert(repository_id, Vec::new());
        Ok(())
    }

    fn stage_products(&self, repository_id: i64, products: &[Product]) -> Result<(), StorageError> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.staged
            .lock()
            .unwrap()
            .entry(repository_id)
            .or_default()
            .extend_from_slice(products);
        Ok(())
    }

    fn replace_catalog(&self, repository: &Repository) -> Result<(), StorageError> {
        let staged = self
            .staged
            .lock()
            .unwrap()
            .remove(&repository.id)
            .ok_or("nothing staged")?;
        self.catalogs.lock().unwrap().insert(repository.id, staged);
        self.repositories
            .lock()
            .unwrap()
            .insert(repository.id, repository.clone());
        Ok(())
    }

    fn rollback(&self, repository: &Repository) -> Result<(), StorageError> {
        self.staged.lock().unwrap().remove(&repository.id);
        self.rollbacks.lock().unwrap().push(repository.id);
        Ok(())
    }

    fn mark_disabled_or_deleted(&self, repositories: &[(i64, bool)]) -> Result<(), StorageError> {
        for (id, deleted) in repositories {
            self.catalogs.lock().unwrap().remove(id);
            if *deleted {
                self.repositories.lock().unwrap().remove(id);
            }
        }
        Ok(())
    }
}

pub struct Harness {
    pub downloader: Arc<ScriptedDownloader>,
    pub storage: Arc<MemoryStorage>,
    pub updater: RepositoryUpdater,
    pub cache: tempfile::TempDir,
}

impl Harness {
    pub fn new(downloader: ScriptedDownloader) -> Self {
        Self::with_storage(downloader, Arc::new(MemoryStorage::default()))
    }

    /// A harness over existing storage, so a later sync sees what an
    /// earlier one committed.
    pub fn with_storage(downloader: ScriptedDownloader, storage: Arc<MemoryStorage>) -> Self {
        let cache = tempfile::tempdir().unwrap();
        let downloader = Arc::new(downloader);
        let updater = RepositoryUpdater::new(
            downloader.clone(),
            storage.clone(),
            Arc::new(device()),
            cache.path(),
        );
        Self {
            downloader,
            storage,
            updater,
            cache,
        }
    }

    /// Files left behind in the cache directory.
    pub fn leftovers(&self) -> usize {
        fs::read_dir(self.cache.path()).unwrap().count()
    }
}
