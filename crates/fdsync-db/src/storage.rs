//! [`CatalogStorage`] backed by the catalog database.

use diesel::Connection;
use fdsync_index::{CatalogStorage, Product, Repository, StorageError};
use tracing::debug;

use crate::{
    connection::SharedConnection,
    error::DbError,
    repository::{ProductStore, RepositoryStore},
};

pub struct SqliteStorage {
    conn: SharedConnection,
}

impl SqliteStorage {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl CatalogStorage for SqliteStorage {
    fn begin_catalog(&self, repository_id: i64) -> Result<(), StorageError> {
        ProductStore::clear_staging(self.conn.lock().conn(), repository_id).map_err(DbError::from)?;
        Ok(())
    }

    fn stage_products(&self, repository_id: i64, products: &[Product]) -> Result<(), StorageError> {
        ProductStore::stage(self.conn.lock().conn(), repository_id, products)?;
        Ok(())
    }

    fn replace_catalog(&self, repository: &Repository) -> Result<(), StorageError> {
        ProductStore::swap(self.conn.lock().conn(), repository)?;
        Ok(())
    }

    fn rollback(&self, repository: &Repository) -> Result<(), StorageError> {
        let dropped =
            ProductStore::clear_staging(self.conn.lock().conn(), repository.id).map_err(DbError::from)?;
        debug!("dropped {dropped} staged products of {}", repository.name);
        Ok(())
    }

    fn mark_disabled_or_deleted(&self, repositories: &[(i64, bool)]) -> Result<(), StorageError> {
        let mut db = self.conn.lock();
        db.conn().transaction(|conn| {
            for &(id, deleted) in repositories {
                ProductStore::remove_catalog(conn, id)?;
                ProductStore::clear_staging(conn, id)?;
                if deleted {
                    RepositoryStore::purge(conn, id)?;
                }
            }
            Ok::<_, DbError>(())
        })?;
        Ok(())
    }
}
