//! Errors the `fdsync` binary reports.

use fdsync_config::error::ConfigError;
use fdsync_db::DbError;
use fdsync_index::UpdateError;
use fdsync_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    #[diagnostic(code(fdsync::path))]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(fdsync::filesystem))]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(fdsync::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository not found: {0}")]
    #[diagnostic(
        code(fdsync::repository_not_found),
        help("Run 'fdsync repos' to list known repositories")
    )]
    RepositoryNotFound(String),

    #[error("{count} of {total} repositories failed to sync")]
    #[diagnostic(code(fdsync::sync_failed))]
    SyncFailed { count: usize, total: usize },

    #[error("{0}")]
    #[diagnostic(code(fdsync::error))]
    Custom(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            CliError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
