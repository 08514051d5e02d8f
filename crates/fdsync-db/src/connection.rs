//! Database connection management.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use diesel::{sql_query, Connection, ConnectionError, RunQueryDsl, SqliteConnection};
use tracing::debug;

use crate::migration::apply_migrations;

/// Database connection wrapper with migration support.
pub struct DbConnection {
    conn: SqliteConnection,
}

impl DbConnection {
    /// Opens the catalog database at `path` and brings its schema up to
    /// date.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConnectionError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("opening database {path_str}");
        let mut conn = SqliteConnection::establish(&path_str)?;

        // Readers keep working while a sync commits
        sql_query("PRAGMA journal_mode = WAL;")
            .execute(&mut conn)
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        Self::prepare(conn)
    }

    /// A private database that lives as long as the connection.
    pub fn open_in_memory() -> Result<Self, ConnectionError> {
        Self::prepare(SqliteConnection::establish(":memory:")?)
    }

    fn prepare(mut conn: SqliteConnection) -> Result<Self, ConnectionError> {
        sql_query("PRAGMA busy_timeout = 5000;")
            .execute(&mut conn)
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        apply_migrations(&mut conn).map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Wraps the connection for sharing between the CLI and the sync
    /// workers.
    pub fn shared(self) -> SharedConnection {
        SharedConnection(Arc::new(Mutex::new(self)))
    }
}

impl std::ops::Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// A [`DbConnection`] behind a mutex.
#[derive(Clone)]
pub struct SharedConnection(Arc<Mutex<DbConnection>>);

impl SharedConnection {
    pub fn lock(&self) -> MutexGuard<'_, DbConnection> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
