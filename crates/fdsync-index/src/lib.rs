//! Index synchronization for F-Droid compatible repositories.
//!
//! This crate fetches a repository's signed index, verifies who signed it,
//! decodes the catalog it carries and commits it through a
//! [`CatalogStorage`].
//!
//! # Overview
//!
//! Two index formats are understood:
//! - **Current**: `index-v1.jar` carrying `index-v1.json`, whose apps and
//!   packages are merged on disk before they are committed
//! - **Legacy**: `index.jar` carrying `index.xml`, which also declares the
//!   signing key inline
//!
//! A sync tries the current format first and falls back to the legacy one
//! when the server does not have it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fdsync_config::device::DeviceProfile;
//! use fdsync_dl::HttpDownloader;
//! use fdsync_index::{CatalogStorage, CommitOutcome, Interrupt, Repository, RepositoryUpdater};
//!
//! fn sync(storage: Arc<dyn CatalogStorage>, repository: &Repository) -> fdsync_index::Result<()> {
//!     let updater = RepositoryUpdater::new(
//!         Arc::new(HttpDownloader::new()),
//!         storage,
//!         Arc::new(DeviceProfile::host()),
//!         "/tmp/fdsync",
//!     );
//!     match updater.update(repository, false, &Interrupt::new(), &|_, _, _| {})? {
//!         CommitOutcome::NotModified => println!("up to date"),
//!         CommitOutcome::Updated(repository) => println!("synced {}", repository.name),
//!     }
//!     Ok(())
//! }
//! ```

pub mod certificate;
pub mod error;
pub mod format;
pub mod interrupt;
pub mod jar;
pub mod merger;
pub mod model;
pub mod parser;
pub mod progress;
pub mod storage;
pub mod transform;
pub mod updater;

pub use error::{ErrorKind, ParseError, Result, StorageError, UpdateError};
pub use format::IndexFormat;
pub use interrupt::Interrupt;
pub use model::{Product, Release, Repository};
pub use storage::CatalogStorage;
pub use transform::{DeviceSnapshot, HostEnvironment};
pub use updater::{CommitOutcome, RepositoryUpdater, BATCH_SIZE};
