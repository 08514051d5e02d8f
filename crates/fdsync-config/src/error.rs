use fdsync_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(fdsync_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(fdsync_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(fdsync_config::already_exists),
        help("Remove the existing config file or set FDSYNC_CONFIG to another location")
    )]
    ConfigAlreadyExists,

    #[error("Duplicate repository name: {0}")]
    #[diagnostic(
        code(fdsync_config::duplicate_repo),
        help("Each repository must have a unique name")
    )]
    DuplicateRepositoryName(String),

    #[error("Invalid address for repository '{name}': {address}")]
    #[diagnostic(
        code(fdsync_config::invalid_address),
        help("Repository addresses must be absolute http(s) URLs, e.g. https://f-droid.org/repo")
    )]
    InvalidRepositoryAddress { name: String, address: String },

    #[error("Invalid fingerprint for repository '{name}': {fingerprint}")]
    #[diagnostic(
        code(fdsync_config::invalid_fingerprint),
        help("A fingerprint is the 64 character hex SHA-256 of the signing certificate")
    )]
    InvalidFingerprint { name: String, fingerprint: String },

    #[error("Repository '{0}' has a password but no username")]
    #[diagnostic(
        code(fdsync_config::missing_username),
        help("Set `username` alongside `password` or remove both")
    )]
    MissingUsername(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(fdsync_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(fdsync_config::path))]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(fdsync_config::filesystem))]
    FileSystem(#[from] FileSystemError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(fdsync_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(fdsync_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
