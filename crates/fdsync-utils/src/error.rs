use std::{error::Error, fmt, path::PathBuf};

#[derive(Debug)]
pub enum HashError {
    InvalidHex { input: String, reason: String },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::InvalidHex { input, reason } => {
                let shown: String = input.chars().take(16).collect();
                write!(f, "`{shown}...` is not valid hex: {reason}")
            }
        }
    }
}

impl Error for HashError {}

#[derive(Debug)]
pub enum PathError {
    Empty,

    NoHome,

    MissingEnvVar { var: String, input: String },

    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "Path is empty"),
            PathError::NoHome => write!(f, "Unable to determine the home directory"),
            PathError::MissingEnvVar { var, input } => {
                write!(f, "Environment variable `{var}` is not set (in `{input}`)")
            }
            PathError::UnclosedVariable { input } => {
                write!(f, "Unclosed `${{` in `{input}`")
            }
        }
    }
}

impl Error for PathError {}

#[derive(Debug)]
pub enum FileSystemError {
    Io {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    NotADirectory {
        path: PathBuf,
    },
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::Io {
                path,
                action,
                source,
            } => write!(f, "Failed to {action} `{}`: {source}", path.display()),
            FileSystemError::NotADirectory { path } => {
                write!(f, "`{}` exists but is not a directory", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::Io { source, .. } => Some(source),
            FileSystemError::NotADirectory { .. } => None,
        }
    }
}

pub type HashResult<T> = std::result::Result<T, HashError>;
pub type PathResult<T> = std::result::Result<T, PathError>;
pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_hash_error_truncates_input() {
        let err = HashError::InvalidHex {
            input: "zz".repeat(40),
            reason: "Invalid character 'z' at position 0".into(),
        };
        let shown = err.to_string();
        assert!(shown.starts_with("`zzzzzzzzzzzzzzzz...`"));
        assert!(shown.contains("position 0"));
    }

    #[test]
    fn test_path_error_display() {
        assert_eq!(PathError::Empty.to_string(), "Path is empty");
        assert_eq!(
            PathError::UnclosedVariable {
                input: "${HOME".into()
            }
            .to_string(),
            "Unclosed `${` in `${HOME`"
        );
        assert_eq!(
            PathError::MissingEnvVar {
                var: "NOPE".into(),
                input: "$NOPE/x".into()
            }
            .to_string(),
            "Environment variable `NOPE` is not set (in `$NOPE/x`)"
        );
    }

    #[test]
    fn test_filesystem_error_source() {
        let err = FileSystemError::Io {
            path: PathBuf::from("/tmp/cache"),
            action: "create directory",
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create directory `/tmp/cache`: denied"
        );
        assert!(err.source().is_some());

        let err = FileSystemError::NotADirectory {
            path: PathBuf::from("/etc/hosts"),
        };
        assert!(err.source().is_none());
    }
}
