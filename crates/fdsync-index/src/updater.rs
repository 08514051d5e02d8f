//! End-to-end repository sync.
//!
//! A sync downloads the signed index, decodes it into staged products,
//! verifies who signed it and finally swaps the staged catalog in. Downloads
//! of different repositories may overlap; everything after the download runs
//! under one lock so only a single catalog is staged at a time.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use fdsync_dl::{DownloadError, Downloader, FetchOutcome, FetchRequest};
use fdsync_events::SyncStage;
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use crate::{
    certificate,
    error::{ParseError, Result, UpdateError},
    format::IndexFormat,
    interrupt::Interrupt,
    jar::JarFile,
    merger::IndexMerger,
    model::{Product, Release, Repository},
    parser::{parser_for, IndexCallback, RepositoryMeta},
    progress::ProgressReader,
    storage::CatalogStorage,
    transform::{transform, DeviceSnapshot, HostEnvironment},
};

/// Records handed to storage or the merger at once.
pub const BATCH_SIZE: usize = 50;

/// Stage progress: `(stage, current, total)`.
pub type ProgressFn<'a> = dyn Fn(SyncStage, u64, Option<u64>) + Sync + 'a;

/// Result of a sync that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The server reported the index unchanged; nothing was written.
    NotModified,
    /// A new catalog was committed for the contained repository.
    Updated(Repository),
}

enum Fetched {
    NotModified,
    Http(u16),
    Archive {
        file: NamedTempFile,
        last_modified: String,
        entity_tag: String,
    },
}

pub struct RepositoryUpdater {
    downloader: Arc<dyn Downloader>,
    storage: Arc<dyn CatalogStorage>,
    host: Arc<dyn HostEnvironment>,
    cache_dir: PathBuf,
    updater_lock: Mutex<()>,
    /// Repositories seen disabled by the previous [`cleanup`](Self::cleanup).
    cleanup_lock: Mutex<HashSet<i64>>,
}

impl RepositoryUpdater {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        storage: Arc<dyn CatalogStorage>,
        host: Arc<dyn HostEnvironment>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            storage,
            host,
            cache_dir: cache_dir.into(),
            updater_lock: Mutex::new(()),
            cleanup_lock: Mutex::new(HashSet::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn CatalogStorage> {
        &self.storage
    }

    /// Blocks until no sync is processing.
    pub fn await_idle(&self) {
        drop(
            self.updater_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Drops catalogs of repositories that became disabled since the last
    /// call and removes deleted repositories.
    ///
    /// `repositories` lists every disabled or deleted repository as
    /// `(id, deleted)`.
    pub fn cleanup(&self, repositories: &[(i64, bool)]) -> Result<()> {
        let mut last_disabled = self
            .cleanup_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let disabled: HashSet<i64> = repositories
            .iter()
            .filter(|(_, deleted)| !deleted)
            .map(|(id, _)| *id)
            .collect();
        let mut pending: Vec<(i64, bool)> = disabled
            .difference(&last_disabled)
            .map(|id| (*id, false))
            .collect();
        pending.extend(
            repositories
                .iter()
                .filter(|(_, deleted)| *deleted)
                .map(|(id, _)| (*id, true)),
        );
        pending.sort_unstable();
        pending.dedup();
        *last_disabled = disabled;

        if pending.is_empty() {
            return Ok(());
        }
        debug!("cleaning up {} repositories", pending.len());
        self.storage
            .mark_disabled_or_deleted(&pending)
            .map_err(UpdateError::Storage)
    }

    /// Syncs `repository`, trying each index format in turn while the
    /// server answers 404.
    pub fn update(
        &self,
        repository: &Repository,
        allow_unstable: bool,
        interrupt: &Interrupt,
        progress: &ProgressFn,
    ) -> Result<CommitOutcome> {
        let mut formats = IndexFormat::CANDIDATES.into_iter().peekable();
        while let Some(format) = formats.next() {
            match self.download(repository, format, interrupt, progress)? {
                Fetched::NotModified => {
                    info!("{} is up to date", repository.name);
                    return Ok(CommitOutcome::NotModified);
                }
                Fetched::Http(404) if formats.peek().is_some() => {
                    warn!(
                        "{} has no {}, trying the next index format",
                        repository.name,
                        format.jar_name()
                    );
                }
                Fetched::Http(code) => return Err(UpdateError::Http { code }),
                Fetched::Archive {
                    file,
                    last_modified,
                    entity_tag,
                } => {
                    let updated = self.process_file(
                        repository,
                        format,
                        file.path(),
                        last_modified,
                        entity_tag,
                        allow_unstable,
                        interrupt,
                        progress,
                    )?;
                    return Ok(CommitOutcome::Updated(updated));
                }
            }
        }
        Err(UpdateError::Http { code: 404 })
    }

    fn download(
        &self,
        repository: &Repository,
        format: IndexFormat,
        interrupt: &Interrupt,
        progress: &ProgressFn,
    ) -> Result<Fetched> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| {
            UpdateError::Io {
                action: format!("creating {}", self.cache_dir.display()),
                source,
            }
        })?;
        let file = tempfile::Builder::new()
            .prefix("index-")
            .suffix(".jar")
            .tempfile_in(&self.cache_dir)
            .map_err(|source| {
                UpdateError::Io {
                    action: format!("creating temporary file in {}", self.cache_dir.display()),
                    source,
                }
            })?;

        let url = repository
            .file_url(format.jar_name())
            .map_err(|source| {
                DownloadError::InvalidUrl {
                    url: repository.address.clone(),
                    source,
                }
            })?;
        debug!("downloading {url}");

        let request = FetchRequest {
            url,
            destination: file.path().to_path_buf(),
            last_modified: repository.last_modified.clone(),
            entity_tag: repository.entity_tag.clone(),
            authentication: repository.authentication.clone(),
        };
        let outcome = self.downloader.fetch(&request, &mut |read, total| {
            progress(SyncStage::Download, read, total)
        })?;
        interrupt.check()?;

        Ok(match outcome {
            FetchOutcome::NotModified => Fetched::NotModified,
            FetchOutcome::Http(code) => {
                debug!("{} answered HTTP {code}", request.url);
                Fetched::Http(code)
            }
            FetchOutcome::Success {
                last_modified,
                entity_tag,
            } => {
                Fetched::Archive {
                    file,
                    last_modified,
                    entity_tag,
                }
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn process_file(
        &self,
        repository: &Repository,
        format: IndexFormat,
        file: &Path,
        last_modified: String,
        entity_tag: String,
        allow_unstable: bool,
        interrupt: &Interrupt,
        progress: &ProgressFn,
    ) -> Result<Repository> {
        let _guard = self
            .updater_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let result = self.process_locked(
            repository,
            format,
            file,
            last_modified,
            entity_tag,
            allow_unstable,
            interrupt,
            progress,
        );
        if let Err(err) = &result {
            debug!("sync of {} failed: {err}", repository.name);
            if let Err(rollback) = self.storage.rollback(repository) {
                warn!("failed to roll back {}: {rollback}", repository.name);
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn process_locked(
        &self,
        repository: &Repository,
        format: IndexFormat,
        file: &Path,
        last_modified: String,
        entity_tag: String,
        allow_unstable: bool,
        interrupt: &Interrupt,
        progress: &ProgressFn,
    ) -> Result<Repository> {
        self.storage
            .begin_catalog(repository.id)
            .map_err(UpdateError::Storage)?;

        let mut jar = JarFile::open(file)?;
        let entry_name = format.content_name();
        if !jar.contains(entry_name) {
            return Err(ParseError::MissingEntry(entry_name.to_string()).into());
        }
        let total = jar.entry_size(entry_name)?;
        let device = DeviceSnapshot::capture(self.host.as_ref());

        let meta = {
            let entry = jar.entry(entry_name)?;
            let mut reader = ProgressReader::new(entry, |read| {
                progress(SyncStage::Process, read, Some(total))
            });
            let parser = parser_for(format, repository.id);
            match format {
                IndexFormat::Legacy => {
                    let mut sink = StagingSink::new(
                        repository.id,
                        self.storage.as_ref(),
                        &device,
                        allow_unstable,
                        interrupt,
                    );
                    parser.parse(&mut reader, &mut sink)?;
                    interrupt.check()?;
                    sink.finish()?
                }
                IndexFormat::Current => {
                    let mut merger = IndexMerger::open(&self.cache_dir)?;
                    let mut sink = MergingSink::new(&mut merger, interrupt);
                    parser.parse(&mut reader, &mut sink)?;
                    interrupt.check()?;
                    let meta = sink.finish()?;
                    self.stage_merged(
                        repository.id,
                        &mut merger,
                        &device,
                        allow_unstable,
                        interrupt,
                        progress,
                    )?;
                    meta
                }
            }
        };

        let work = match &meta {
            Some(meta) => {
                repository.update(
                    meta.mirrors.clone(),
                    meta.name.clone(),
                    meta.description.clone(),
                    meta.version,
                    last_modified,
                    entity_tag,
                    meta.timestamp,
                )
            }
            None => repository.clone(),
        };
        if work.timestamp < repository.timestamp {
            return Err(UpdateError::Validation(format!(
                "New index is older than current index: {} < {}",
                work.timestamp, repository.timestamp
            )));
        }

        let signers = jar.code_signers(entry_name)?;
        let fingerprint = certificate::verify(&signers)?;
        let fingerprint = if format.certificate_from_index() {
            let declared = meta.as_ref().and_then(|meta| meta.certificate.as_deref());
            certificate::verify_declared(&fingerprint, declared)?
        } else {
            fingerprint
        };
        let commit = certificate::trust(&work, &fingerprint)?;

        interrupt.check()?;
        progress(SyncStage::Commit, 0, None);
        {
            let _cleanup = self
                .cleanup_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.storage
                .replace_catalog(&commit)
                .map_err(UpdateError::Storage)?;
        }
        info!("committed index of {}", commit.name);
        Ok(commit)
    }

    fn stage_merged(
        &self,
        repository_id: i64,
        merger: &mut IndexMerger,
        device: &DeviceSnapshot,
        allow_unstable: bool,
        interrupt: &Interrupt,
        progress: &ProgressFn,
    ) -> Result<()> {
        let mut done = 0u64;
        for batch in merger.replay(BATCH_SIZE)? {
            let batch = batch?;
            interrupt.check()?;
            done += batch.products.len() as u64;
            progress(SyncStage::Merge, done, Some(batch.total as u64));

            let products: Vec<Product> = batch
                .products
                .into_iter()
                .map(|product| transform(product, device, allow_unstable))
                .collect();
            self.storage
                .stage_products(repository_id, &products)
                .map_err(UpdateError::Storage)?;
        }
        trace!("staged {done} merged products");
        Ok(())
    }
}

/// Transforms products as they are decoded and stages them in batches.
struct StagingSink<'a> {
    repository_id: i64,
    storage: &'a dyn CatalogStorage,
    device: &'a DeviceSnapshot,
    allow_unstable: bool,
    interrupt: &'a Interrupt,
    meta: Option<RepositoryMeta>,
    pending: Vec<Product>,
}

impl<'a> StagingSink<'a> {
    fn new(
        repository_id: i64,
        storage: &'a dyn CatalogStorage,
        device: &'a DeviceSnapshot,
        allow_unstable: bool,
        interrupt: &'a Interrupt,
    ) -> Self {
        Self {
            repository_id,
            storage,
            device,
            allow_unstable,
            interrupt,
            meta: None,
            pending: Vec::with_capacity(BATCH_SIZE),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        trace!("staging {} products", self.pending.len());
        self.storage
            .stage_products(self.repository_id, &self.pending)
            .map_err(UpdateError::Storage)?;
        self.pending.clear();
        Ok(())
    }

    fn finish(mut self) -> Result<Option<RepositoryMeta>> {
        self.flush()?;
        Ok(self.meta)
    }
}

impl IndexCallback for StagingSink<'_> {
    fn on_repository(&mut self, meta: RepositoryMeta) -> Result<()> {
        self.meta = Some(meta);
        Ok(())
    }

    fn on_product(&mut self, product: Product) -> Result<()> {
        self.interrupt.check()?;
        self.pending
            .push(transform(product, self.device, self.allow_unstable));
        if self.pending.len() >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    fn on_releases(&mut self, package_name: String, _releases: Vec<Release>) -> Result<()> {
        self.interrupt.check()?;
        warn!("ignoring detached releases of {package_name}");
        Ok(())
    }
}

/// Spills decoded products and releases into the merger in batches.
struct MergingSink<'a> {
    merger: &'a mut IndexMerger,
    interrupt: &'a Interrupt,
    meta: Option<RepositoryMeta>,
    products: Vec<Product>,
    releases: Vec<(String, Vec<Release>)>,
}

impl<'a> MergingSink<'a> {
    fn new(merger: &'a mut IndexMerger, interrupt: &'a Interrupt) -> Self {
        Self {
            merger,
            interrupt,
            meta: None,
            products: Vec::with_capacity(BATCH_SIZE),
            releases: Vec::with_capacity(BATCH_SIZE),
        }
    }

    fn flush_products(&mut self) -> Result<()> {
        if !self.products.is_empty() {
            self.merger.add_products(&self.products)?;
            self.products.clear();
        }
        Ok(())
    }

    fn flush_releases(&mut self) -> Result<()> {
        if !self.releases.is_empty() {
            self.merger.add_releases(&self.releases)?;
            self.releases.clear();
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Option<RepositoryMeta>> {
        self.flush_products()?;
        self.flush_releases()?;
        Ok(self.meta)
    }
}

impl IndexCallback for MergingSink<'_> {
    fn on_repository(&mut self, meta: RepositoryMeta) -> Result<()> {
        self.meta = Some(meta);
        Ok(())
    }

    fn on_product(&mut self, product: Product) -> Result<()> {
        self.interrupt.check()?;
        self.products.push(product);
        if self.products.len() >= BATCH_SIZE {
            self.flush_products()?;
        }
        Ok(())
    }

    fn on_releases(&mut self, package_name: String, releases: Vec<Release>) -> Result<()> {
        self.interrupt.check()?;
        self.releases.push((package_name, releases));
        if self.releases.len() >= BATCH_SIZE {
            self.flush_releases()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc, Mutex,
        },
        thread,
        time::Duration,
    };

    use fdsync_config::device::DeviceProfile;

    use super::*;
    use crate::error::{ErrorKind, StorageError};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl CatalogStorage for Recorder {
        fn begin_catalog(&self, id: i64) -> std::result::Result<(), StorageError> {
            self.calls.lock().unwrap().push(format!("begin {id}"));
            Ok(())
        }

        fn stage_products(
            &self,
            id: i64,
            products: &[Product],
        ) -> std::result::Result<(), StorageError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("stage {id} {}", products.len()));
            Ok(())
        }

        fn replace_catalog(&self, repository: &Repository) -> std::result::Result<(), StorageError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("replace {}", repository.id));
            Ok(())
        }

        fn rollback(&self, repository: &Repository) -> std::result::Result<(), StorageError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("rollback {}", repository.id));
            Ok(())
        }

        fn mark_disabled_or_deleted(
            &self,
            repositories: &[(i64, bool)],
        ) -> std::result::Result<(), StorageError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("cleanup {repositories:?}"));
            Ok(())
        }
    }

    struct Answer(FetchOutcome);

    impl Downloader for Answer {
        fn fetch(
            &self,
            _request: &FetchRequest,
            _on_bytes: &mut dyn FnMut(u64, Option<u64>),
        ) -> std::result::Result<FetchOutcome, DownloadError> {
            Ok(self.0.clone())
        }
    }

    fn updater(outcome: FetchOutcome, cache: &Path) -> (RepositoryUpdater, Arc<Recorder>) {
        let storage = Arc::new(Recorder::default());
        let updater = RepositoryUpdater::new(
            Arc::new(Answer(outcome)),
            storage.clone(),
            Arc::new(DeviceProfile::host()),
            cache,
        );
        (updater, storage)
    }

    #[test]
    fn test_cleanup_reports_newly_disabled_once() {
        let dir = tempfile::tempdir().unwrap();
        let (updater, storage) = updater(FetchOutcome::NotModified, dir.path());

        updater.cleanup(&[(1, false), (2, true)]).unwrap();
        updater.cleanup(&[(1, false)]).unwrap();
        updater.cleanup(&[(1, false), (3, false)]).unwrap();
        updater.cleanup(&[]).unwrap();

        let calls = storage.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "cleanup [(1, false), (2, true)]".to_string(),
                "cleanup [(3, false)]".to_string(),
            ]
        );
    }

    #[test]
    fn test_not_modified_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (updater, storage) = updater(FetchOutcome::NotModified, dir.path());
        let repository = Repository::new("https://example.org/repo", "", "");

        let outcome = updater
            .update(&repository, false, &Interrupt::new(), &|_, _, _| {})
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NotModified);
        assert!(storage.calls.lock().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let (updater, _) = updater(FetchOutcome::Http(500), dir.path());
        let repository = Repository::new("https://example.org/repo", "", "");

        let err = updater
            .update(&repository, false, &Interrupt::new(), &|_, _, _| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.to_string(), "Invalid response: HTTP 500");
    }

    #[test]
    fn test_garbage_archive_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (updater, storage) = updater(
            FetchOutcome::Success {
                last_modified: String::new(),
                entity_tag: String::new(),
            },
            dir.path(),
        );
        let repository = Repository {
            id: 7,
            ..Repository::new("https://example.org/repo", "", "")
        };

        let err = updater
            .update(&repository, false, &Interrupt::new(), &|_, _, _| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parsing);
        assert_eq!(
            storage.calls.lock().unwrap().clone(),
            vec!["begin 7".to_string(), "rollback 7".to_string()]
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_await_idle_returns() {
        let dir = tempfile::tempdir().unwrap();
        let (updater, _) = updater(FetchOutcome::NotModified, dir.path());
        updater.await_idle();
    }

    /// Holds `begin_catalog` until the test lets it go.
    struct Gate {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl CatalogStorage for Gate {
        fn begin_catalog(&self, _id: i64) -> std::result::Result<(), StorageError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(())
        }

        fn stage_products(
            &self,
            _id: i64,
            _products: &[Product],
        ) -> std::result::Result<(), StorageError> {
            Ok(())
        }

        fn replace_catalog(&self, _repository: &Repository) -> std::result::Result<(), StorageError> {
            Ok(())
        }

        fn rollback(&self, _repository: &Repository) -> std::result::Result<(), StorageError> {
            Ok(())
        }

        fn mark_disabled_or_deleted(
            &self,
            _repositories: &[(i64, bool)],
        ) -> std::result::Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn test_await_idle_waits_for_processing() {
        let dir = tempfile::tempdir().unwrap();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let updater = Arc::new(RepositoryUpdater::new(
            Arc::new(Answer(FetchOutcome::Success {
                last_modified: String::new(),
                entity_tag: String::new(),
            })),
            Arc::new(Gate {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            Arc::new(DeviceProfile::host()),
            dir.path(),
        ));

        let worker = {
            let updater = updater.clone();
            thread::spawn(move || {
                let repository = Repository::new("https://example.org/repo", "", "");
                updater.update(&repository, false, &Interrupt::new(), &|_, _, _| {})
            })
        };
        entered_rx.recv().unwrap();

        let idle = Arc::new(AtomicBool::new(false));
        let waiter = {
            let updater = updater.clone();
            let idle = idle.clone();
            thread::spawn(move || {
                updater.await_idle();
                idle.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!idle.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        waiter.join().unwrap();
        assert!(idle.load(Ordering::SeqCst));
        assert!(worker.join().unwrap().is_err());
    }
}
