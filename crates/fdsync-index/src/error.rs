//! Error types for the sync engine.
//!
//! [`UpdateError`] is what a sync reports to its caller. Decoder failures are
//! collected in [`ParseError`] and jar verification failures in [`JarError`];
//! both fold into `UpdateError` with the kind the caller expects.

use fdsync_dl::DownloadError;
use miette::Diagnostic;
use thiserror::Error;

/// Error type storage implementations report through.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Http,
    Validation,
    Parsing,
    Cancelled,
    Storage,
    Io,
}

/// Errors that end a repository sync.
#[derive(Error, Diagnostic, Debug)]
pub enum UpdateError {
    #[error("Network error: {0}")]
    #[diagnostic(
        code(fdsync_index::network),
        help("Check your network connection and the repository address")
    )]
    Network(#[source] DownloadError),

    #[error("Invalid response: HTTP {code}")]
    #[diagnostic(code(fdsync_index::http))]
    Http { code: u16 },

    #[error("{0}")]
    #[diagnostic(
        code(fdsync_index::validation),
        help("The index may have been tampered with or the repository fingerprint is wrong")
    )]
    Validation(String),

    #[error("Error parsing index: {0}")]
    #[diagnostic(
        code(fdsync_index::parsing),
        help("The index file may be corrupted or in an unsupported format")
    )]
    Parsing(#[source] ParseError),

    #[error("Sync was cancelled")]
    #[diagnostic(code(fdsync_index::cancelled))]
    Cancelled,

    #[error("Storage error: {0}")]
    #[diagnostic(code(fdsync_index::storage))]
    Storage(#[source] StorageError),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(fdsync_index::io))]
    Io {
        action: String,
        source: std::io::Error,
    },
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::Network(_) => ErrorKind::Network,
            UpdateError::Http { .. } => ErrorKind::Http,
            UpdateError::Validation(_) => ErrorKind::Validation,
            UpdateError::Parsing(_) => ErrorKind::Parsing,
            UpdateError::Cancelled => ErrorKind::Cancelled,
            UpdateError::Storage(_) => ErrorKind::Storage,
            UpdateError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn storage(err: impl Into<StorageError>) -> Self {
        UpdateError::Storage(err.into())
    }
}

impl From<ParseError> for UpdateError {
    fn from(err: ParseError) -> Self {
        UpdateError::Parsing(err)
    }
}

impl From<DownloadError> for UpdateError {
    fn from(err: DownloadError) -> Self {
        match err {
            err @ DownloadError::InvalidUrl { .. } => UpdateError::Validation(err.to_string()),
            DownloadError::Io { path, source } => {
                UpdateError::Io {
                    action: format!("writing {path}"),
                    source,
                }
            }
            err @ DownloadError::Network(_) => UpdateError::Network(err),
        }
    }
}

/// Failures while decoding an index or merging its records.
#[derive(Error, Diagnostic, Debug)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    #[diagnostic(code(fdsync_index::parse::xml))]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed JSON: {0}")]
    #[diagnostic(code(fdsync_index::parse::json))]
    Json(#[from] serde_json::Error),

    #[error("Invalid archive: {0}")]
    #[diagnostic(code(fdsync_index::parse::zip))]
    Zip(#[from] zip::result::ZipError),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(fdsync_index::parse::io))]
    Io {
        action: String,
        source: std::io::Error,
    },

    #[error("Merge database error: {0}")]
    #[diagnostic(code(fdsync_index::parse::merge))]
    Merge(String),

    #[error("Archive has no {0} entry")]
    #[diagnostic(code(fdsync_index::parse::missing_entry))]
    MissingEntry(String),

    #[error("{0}")]
    #[diagnostic(code(fdsync_index::parse::malformed))]
    Malformed(String),
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ParseError::Xml(err.into())
    }
}

impl From<diesel::result::Error> for ParseError {
    fn from(err: diesel::result::Error) -> Self {
        ParseError::Merge(err.to_string())
    }
}

impl From<diesel::ConnectionError> for ParseError {
    fn from(err: diesel::ConnectionError) -> Self {
        ParseError::Merge(err.to_string())
    }
}

/// Jar signature verification failures.
#[derive(Error, Diagnostic, Debug)]
pub enum JarError {
    #[error(transparent)]
    #[diagnostic(code(fdsync_index::jar::zip))]
    Zip(#[from] zip::result::ZipError),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(fdsync_index::jar::io))]
    Io {
        action: String,
        source: std::io::Error,
    },

    #[error("Invalid signature block {name}: {reason}")]
    #[diagnostic(code(fdsync_index::jar::signature_block))]
    SignatureBlock { name: String, reason: String },

    #[error("{0}")]
    #[diagnostic(code(fdsync_index::jar::tampered))]
    Tampered(String),
}

impl From<JarError> for UpdateError {
    fn from(err: JarError) -> Self {
        match err {
            JarError::Zip(err) => UpdateError::Parsing(ParseError::Zip(err)),
            JarError::Io { action, source } => {
                UpdateError::Parsing(ParseError::Io { action, source })
            }
            err @ (JarError::SignatureBlock { .. } | JarError::Tampered(_)) => {
                UpdateError::Validation(err.to_string())
            }
        }
    }
}

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Wraps the error with a description of the failed action.
    fn with_context<C>(self, context: C) -> std::result::Result<T, ParseError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, ParseError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            ParseError::Io {
                action: context(),
                source: err,
            }
        })
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UpdateError::Http { code: 500 };
        assert_eq!(err.to_string(), "Invalid response: HTTP 500");
        assert_eq!(err.kind(), ErrorKind::Http);

        let err = UpdateError::Validation("Certificate fingerprints do not match".into());
        assert_eq!(err.to_string(), "Certificate fingerprints do not match");

        let err: UpdateError = ParseError::MissingEntry("index-v1.json".into()).into();
        assert_eq!(err.kind(), ErrorKind::Parsing);
        assert_eq!(
            err.to_string(),
            "Error parsing index: Archive has no index-v1.json entry"
        );
    }

    #[test]
    fn test_jar_error_kinds() {
        let err: UpdateError = JarError::Tampered("digest mismatch".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: UpdateError = JarError::Zip(zip::result::ZipError::FileNotFound).into();
        assert_eq!(err.kind(), ErrorKind::Parsing);
    }

    #[test]
    fn test_download_error_kinds() {
        let err: UpdateError = DownloadError::InvalidUrl {
            url: "not a url".into(),
            source: url::ParseError::RelativeUrlWithoutBase,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Invalid URL: not a url");

        let err: UpdateError = DownloadError::Io {
            path: "/tmp/index.jar".into(),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "Error while writing /tmp/index.jar: disk full");
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::other("boom"));
        let err = result.with_context(|| "reading index".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Error while reading index: boom");
    }

    #[test]
    fn test_storage_error() {
        let err = UpdateError::storage("database is locked");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.to_string(), "Storage error: database is locked");
    }
}
