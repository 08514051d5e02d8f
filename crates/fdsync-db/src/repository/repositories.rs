//! Repository rows.

use diesel::prelude::*;
use fdsync_index::Repository;
use tracing::debug;

use crate::{
    error::{DbError, Result},
    models::{NewRepository, RepositoryRecord},
    schema::repository,
};

pub struct RepositoryStore;

impl RepositoryStore {
    /// Lists repositories that were not deleted, oldest first.
    pub fn list(conn: &mut SqliteConnection) -> Result<Vec<Repository>> {
        repository::table
            .filter(repository::deleted.eq(false))
            .order(repository::id.asc())
            .select(RepositoryRecord::as_select())
            .load(conn)?
            .into_iter()
            .map(RepositoryRecord::into_repository)
            .collect()
    }

    pub fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Repository>> {
        repository::table
            .filter(repository::id.eq(id))
            .filter(repository::deleted.eq(false))
            .select(RepositoryRecord::as_select())
            .first(conn)
            .optional()?
            .map(RepositoryRecord::into_repository)
            .transpose()
    }

    pub fn find_by_address(
        conn: &mut SqliteConnection,
        address: &str,
    ) -> Result<Option<Repository>> {
        repository::table
            .filter(repository::address.eq(address))
            .filter(repository::deleted.eq(false))
            .select(RepositoryRecord::as_select())
            .first(conn)
            .optional()?
            .map(RepositoryRecord::into_repository)
            .transpose()
    }

    /// Stores a new repository and returns it with its assigned id.
    pub fn insert(conn: &mut SqliteConnection, repo: &Repository) -> Result<Repository> {
        if Self::find_by_address(conn, &repo.address)?.is_some() {
            return Err(DbError::AlreadyExists(repo.address.clone()));
        }
        let id: i64 = diesel::insert_into(repository::table)
            .values(NewRepository::from_repository(repo)?)
            .returning(repository::id)
            .get_result(conn)?;
        debug!("added repository {} as {id}", repo.address);
        Ok(Repository {
            id,
            ..repo.clone()
        })
    }

    pub fn update(conn: &mut SqliteConnection, repo: &Repository) -> Result<()> {
        let updated = diesel::update(
            repository::table
                .filter(repository::id.eq(repo.id))
                .filter(repository::deleted.eq(false)),
        )
        .set(NewRepository::from_repository(repo)?)
        .execute(conn)?;
        if updated == 0 {
            return Err(DbError::NotFound(repo.id.to_string()));
        }
        Ok(())
    }

    /// Hides the repository; its rows are purged by the next cleanup.
    pub fn mark_deleted(conn: &mut SqliteConnection, id: i64) -> Result<()> {
        let updated = diesel::update(repository::table.filter(repository::id.eq(id)))
            .set((repository::deleted.eq(true), repository::enabled.eq(false)))
            .execute(conn)?;
        if updated == 0 {
            return Err(DbError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// `(id, deleted)` of every repository that is disabled or deleted.
    pub fn disabled_or_deleted(conn: &mut SqliteConnection) -> QueryResult<Vec<(i64, bool)>> {
        repository::table
            .filter(
                repository::enabled
                    .eq(false)
                    .or(repository::deleted.eq(true)),
            )
            .order(repository::id.asc())
            .select((repository::id, repository::deleted))
            .load(conn)
    }

    pub fn purge(conn: &mut SqliteConnection, id: i64) -> QueryResult<usize> {
        diesel::delete(repository::table.filter(repository::id.eq(id))).execute(conn)
    }

    /// Inserts the built-in repositories into an empty table.
    pub fn seed_defaults(conn: &mut SqliteConnection) -> Result<usize> {
        let existing: i64 = repository::table.count().get_result(conn)?;
        if existing > 0 {
            return Ok(0);
        }
        conn.transaction(|conn| {
            let defaults = Repository::defaults();
            for repo in &defaults {
                Self::insert(conn, repo)?;
            }
            Ok(defaults.len())
        })
    }
}
