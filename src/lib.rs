//! # filepress
//!
//! GZIP and ZIP compression for single files and file sets, usable from the
//! command line or through an HTTP upload form.
//!
//! The library is split into a small synchronous core and a thin front end:
//!
//! - [`gzip`]: stream codec that compresses and decompresses one byte stream
//!   through a fixed 8 KiB buffer
//! - [`zip`]: archive codec that builds and extracts multi-entry ZIP archives
//! - [`multipart`]: raw `multipart/form-data` decoder used to recover uploads
//! - [`stats`]: the immutable [`OperationResult`] and [`format_size`]
//! - [`server`]: axum front end running the codecs on a bounded worker pool
//!
//! Core operations never share state, so any number of them may run in
//! parallel as long as each has its own source and destination paths.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use filepress::{compress_file, format_size};
//!
//! let result = compress_file(Path::new("report.csv"), Path::new("report.csv.gz"));
//! if result.is_success() {
//!     println!(
//!         "{} -> {} ({:.2}% saved)",
//!         format_size(result.original_size()),
//!         format_size(result.compressed_size()),
//!         result.ratio()
//!     );
//! } else {
//!     eprintln!("{}", result.message());
//! }
//! ```

pub mod cli;
pub mod error;
pub mod gzip;
pub mod io;
pub mod multipart;
pub mod server;
pub mod stats;
pub mod zip;

pub use cli::Cli;
pub use error::{CodecError, FailureKind};
pub use gzip::{compress_file, compress_stream, decompress_file, decompress_stream};
pub use multipart::{decode, extract_boundary};
pub use stats::{OperationResult, format_size};
pub use zip::{ArchiveEntry, ZipExtractor, ZipFileEntry, ZipWriter, build_archive, extract_archive};
