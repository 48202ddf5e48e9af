//! Operation outcome record and size formatting.

use crate::error::{CodecError, FailureKind};

/// Immutable outcome of a single-stream operation.
///
/// Built once when the operation finishes; there are no setters.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    success: bool,
    message: String,
    original_size: u64,
    compressed_size: u64,
    ratio: f64,
    failure: Option<FailureKind>,
}

impl OperationResult {
    /// A successful result; the ratio is derived from the two sizes.
    pub fn success(message: impl Into<String>, original_size: u64, compressed_size: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            original_size,
            compressed_size,
            ratio: compression_ratio(original_size, compressed_size),
            failure: None,
        }
    }

    /// A failed result carrying the error's message and kind.
    pub fn failure(err: &CodecError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            original_size: 0,
            compressed_size: 0,
            ratio: 0.0,
            failure: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Percentage of space saved.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Why the operation failed, `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }
}

/// Space saved as a percentage: `(1 - compressed / original) * 100`.
///
/// Returns `0.0` when `original_size` is zero.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - compressed_size as f64 / original_size as f64) * 100.0
}

/// Format a byte size into a human-readable string.
///
/// Sizes below 1 KiB are printed as an integer number of bytes; larger sizes
/// use KB, MB or GB with two decimal places.
///
/// # Examples
///
/// ```
/// use filepress::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} B", size)
    }
}
