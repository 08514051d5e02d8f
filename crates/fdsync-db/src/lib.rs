//! SQLite persistence for fdsync.
//!
//! Holds the configured repositories and the catalog each of them last
//! synced. Catalogs are written to a staging table while a sync runs and
//! swapped in with a single transaction, see [`SqliteStorage`].

pub mod connection;
pub mod error;
pub mod migration;
pub mod models;
pub mod repository;
pub mod schema;
pub mod storage;

pub use connection::{DbConnection, SharedConnection};
pub use error::{DbError, Result};
pub use repository::{ProductStore, RepositoryStore};
pub use storage::SqliteStorage;
