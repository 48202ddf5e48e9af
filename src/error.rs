//! Error taxonomy shared by the stream codec, archive codec and I/O helpers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the compression core.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The source file does not exist.
    #[error("Source file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The input is not a valid GZIP stream or ZIP archive.
    #[error("Invalid compressed data: {0}")]
    Format(String),

    /// Any other read or write fault.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A skippable per-entry problem while building an archive.
    #[error("Skipped entry: {0}")]
    Partial(String),
}

/// Coarse classification of a [`CodecError`], kept in failed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Format,
    Io,
    Partial,
}

impl CodecError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CodecError::NotFound { .. } => FailureKind::NotFound,
            CodecError::Format(_) => FailureKind::Format,
            CodecError::Io(_) => FailureKind::Io,
            CodecError::Partial(_) => FailureKind::Partial,
        }
    }

    /// Classify an error produced while *reading* decoded data.
    ///
    /// Decoders report a bad header, corrupt payload, checksum mismatch and
    /// truncated input through these kinds; everything else is a real I/O
    /// fault on the underlying source.
    pub(crate) fn from_decode(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                CodecError::Format(err.to_string())
            }
            _ => CodecError::Io(err),
        }
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn decode_errors_map_to_format() {
        let err = CodecError::from_decode(io::Error::new(
            io::ErrorKind::InvalidInput,
            "corrupt deflate stream",
        ));
        assert_eq!(err.kind(), FailureKind::Format);

        let err = CodecError::from_decode(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(err.kind(), FailureKind::Format);
    }

    #[test]
    fn other_read_errors_stay_io() {
        let err = CodecError::from_decode(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), FailureKind::Io);
    }

    #[test]
    fn messages_name_the_failure() {
        let err = CodecError::NotFound {
            path: PathBuf::from("missing.txt"),
        };
        assert_eq!(err.to_string(), "Source file not found: missing.txt");
        assert!(CodecError::Format("bad magic".into())
            .to_string()
            .starts_with("Invalid compressed data"));
        assert!(CodecError::Partial("a.txt".into())
            .to_string()
            .starts_with("Skipped entry"));
    }
}
