use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use tracing::warn;

use crate::error::{CodecError, Result};

/// Open a source file for buffered reading.
///
/// A missing file is reported as [`CodecError::NotFound`].
pub fn open_source(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CodecError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Refuse a destination that resolves to the source file itself.
///
/// Creating the destination would truncate the source before it is read.
pub fn ensure_distinct(source: &Path, dest: &Path) -> Result<()> {
    let same = match (std::fs::canonicalize(source), std::fs::canonicalize(dest)) {
        (Ok(source), Ok(dest)) => source == dest,
        _ => false,
    };
    if same {
        return Err(CodecError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is both source and destination", dest.display()),
        )));
    }
    Ok(())
}

/// Create (or truncate) a destination file.
pub fn create_dest(path: &Path) -> Result<File> {
    Ok(File::create(path)?)
}

/// Release a finished destination file.
///
/// Syncing is part of cleanup: a failure here is logged and does not change
/// the outcome of the operation that produced the file.
pub fn finish_dest(file: File, path: &Path) {
    if let Err(e) = file.sync_all() {
        warn!("Error closing {}: {}", path.display(), e);
    }
}

/// Remove the destination of a failed operation, logging any failure.
pub fn remove_failed_output(path: &Path) {
    let removed = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match removed {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove incomplete output {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(&dir.path().join("absent.txt")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[test]
    fn same_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, b"data").unwrap();

        let err = ensure_distinct(&path, &dir.path().join(".").join("data.txt")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Io);
        assert!(ensure_distinct(&path, &dir.path().join("data.txt.gz")).is_ok());
    }

    #[test]
    fn remove_failed_output_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.gz");
        std::fs::write(&path, b"partial").unwrap();
        remove_failed_output(&path);
        assert!(!path.exists());
        remove_failed_output(&path);
    }
}
