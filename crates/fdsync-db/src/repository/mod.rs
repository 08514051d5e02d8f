//! Repository pattern implementations for database operations.
//!
//! - [`RepositoryStore`] - Configured repositories and their sync state
//! - [`ProductStore`] - Staged and committed catalogs

pub mod products;
pub mod repositories;

pub use products::ProductStore;
pub use repositories::RepositoryStore;
