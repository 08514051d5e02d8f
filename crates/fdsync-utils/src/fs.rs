use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates `path` and any missing parents.
///
/// Fails with [`FileSystemError::NotADirectory`] when something other than a
/// directory already occupies the path.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    fs::create_dir_all(path).map_err(|source| FileSystemError::Io {
        path: path.to_path_buf(),
        action: "create directory",
        source,
    })
}

/// Removes a file or directory tree. A missing path is not an error.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };

    result.map_err(|source| FileSystemError::Io {
        path: path.to_path_buf(),
        action: "remove",
        source,
    })
}

/// Returns the parent directory of `path`, creating it first.
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> FileSystemResult<Option<PathBuf>> {
    match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            ensure_dir_exists(parent)?;
            Ok(Some(parent.to_path_buf()))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        // second call is a no-op
        ensure_dir_exists(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists_rejects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();

        let err = ensure_dir_exists(&file).unwrap_err();
        assert!(matches!(err, FileSystemError::NotADirectory { .. }));
    }

    #[test]
    fn test_safe_remove() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        let sub = dir.path().join("sub");
        fs::write(&file, b"x").unwrap();
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner"), b"y").unwrap();

        safe_remove(&file).unwrap();
        safe_remove(&sub).unwrap();
        assert!(!file.exists());
        assert!(!sub.exists());

        safe_remove(dir.path().join("missing")).unwrap();
    }

    #[test]
    fn test_ensure_parent_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("db/fdsync.db");
        let parent = ensure_parent_dir(&target).unwrap();
        assert_eq!(parent, Some(dir.path().join("db")));
        assert!(dir.path().join("db").is_dir());

        assert_eq!(ensure_parent_dir("relative.db").unwrap(), None);
    }
}
