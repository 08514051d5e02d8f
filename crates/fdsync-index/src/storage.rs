//! Where synced catalogs end up.

use crate::{
    error::StorageError,
    model::{Product, Repository},
};

/// Persistence the updater commits through.
///
/// A sync stages products incrementally and then swaps them in at once, so
/// readers either see the previous catalog or the new one.
pub trait CatalogStorage: Send + Sync {
    /// Discards anything staged for `repository_id` and starts a new
    /// catalog.
    fn begin_catalog(&self, repository_id: i64) -> Result<(), StorageError>;

    fn stage_products(&self, repository_id: i64, products: &[Product])
        -> Result<(), StorageError>;

    /// Atomically replaces the catalog of `repository` with the staged
    /// products and writes the repository row.
    fn replace_catalog(&self, repository: &Repository) -> Result<(), StorageError>;

    /// Drops whatever was staged for `repository`.
    fn rollback(&self, repository: &Repository) -> Result<(), StorageError>;

    /// Removes the catalogs of repositories that were disabled, and the
    /// repositories themselves where the flag is `true`.
    fn mark_disabled_or_deleted(&self, repositories: &[(i64, bool)]) -> Result<(), StorageError>;
}
