//! ZIP archive building and extraction.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`writer`]: Streaming archive builder
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: High-level extraction API for end users
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) and DEFLATE methods when reading
//! - DEFLATE entries with data descriptors and directory entries when writing
//!
//! ## Limitations
//!
//! - No ZIP64: archives and entries are limited to 4 GiB and 65534 entries
//! - No encryption support
//! - No multi-disk archive support

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{ZipWriter, file_entry_name};

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{error, info, warn};

use crate::error::{CodecError, Result};
use crate::io::{create_dest, finish_dest, open_source, remove_failed_output};

/// Outcome of writing an archive from files on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Names of the file entries written.
    pub added: Vec<String>,
    /// Entries skipped for a bad name or a source that could not be opened.
    pub skipped: Vec<String>,
}

/// Stream the named source files into a ZIP archive written to `dest`.
///
/// An entry whose name is unusable or whose source cannot be opened is
/// skipped with a warning; any failure writing the archive itself is
/// returned.
pub fn write_archive<W, N, P>(entries: &[(N, P)], dest: W) -> Result<(W, BuildSummary)>
where
    W: Write,
    N: AsRef<str>,
    P: AsRef<Path>,
{
    let mut writer = ZipWriter::new(dest);
    let mut summary = BuildSummary::default();

    for (name, path) in entries {
        let (name, path) = (name.as_ref(), path.as_ref());

        let mut source = match open_entry(name, path) {
            Ok(source) => source,
            Err(e) => {
                let skipped = CodecError::Partial(format!("{name}: {e}"));
                warn!("{}", skipped);
                summary.skipped.push(name.to_string());
                continue;
            }
        };

        writer.add_file(name, &mut source)?;
        info!("Added to ZIP: {}", name);
        summary.added.push(name.to_string());
    }

    Ok((writer.finish()?, summary))
}

/// Check an entry before anything is written for it.
fn open_entry(name: &str, path: &Path) -> Result<BufReader<File>> {
    file_entry_name(name)?;
    if path.is_dir() {
        return Err(CodecError::Format(format!("{} is a directory", path.display())));
    }
    open_source(path)
}

/// Build a ZIP archive at `dest` from `(entry name, source path)` pairs.
///
/// Returns `true` when the archive was produced, even if some sources were
/// missing and skipped; `false` only when writing the archive failed, in
/// which case the partial archive is removed.
pub fn build_archive<N, P>(entries: &[(N, P)], dest: &Path) -> bool
where
    N: AsRef<str>,
    P: AsRef<Path>,
{
    match try_build_archive(entries, dest) {
        Ok(summary) => {
            info!(
                added = summary.added.len(),
                skipped = summary.skipped.len(),
                "ZIP file created successfully: {}",
                dest.display()
            );
            true
        }
        Err(e) => {
            error!("Error creating ZIP file {}: {}", dest.display(), e);
            false
        }
    }
}

fn try_build_archive<N, P>(entries: &[(N, P)], dest: &Path) -> Result<BuildSummary>
where
    N: AsRef<str>,
    P: AsRef<Path>,
{
    let file = create_dest(dest)?;

    let written = (|| -> Result<_> {
        let (writer, summary) = write_archive(entries, BufWriter::new(file))?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        finish_dest(file, dest);
        Ok(summary)
    })();

    if written.is_err() {
        remove_failed_output(dest);
    }
    written
}

/// Extract the ZIP archive at `source` into `dest_dir`, creating it first.
///
/// Returns `false` on any failure; entries extracted before the failure
/// stay on disk.
pub fn extract_archive(source: &Path, dest_dir: &Path) -> bool {
    match try_extract_archive(source, dest_dir) {
        Ok(count) => {
            info!(
                entries = count,
                "ZIP file extracted successfully to: {}",
                dest_dir.display()
            );
            true
        }
        Err(e) => {
            error!("Error extracting ZIP file {}: {}", source.display(), e);
            false
        }
    }
}

fn try_extract_archive(source: &Path, dest_dir: &Path) -> Result<usize> {
    let mut extractor = ZipExtractor::new(open_source(source)?)?;
    extractor.extract_all(dest_dir)
}

/// List the entries of the ZIP archive at `source`, in archive order.
pub fn list_archive(source: &Path) -> Result<Vec<ZipFileEntry>> {
    let reader: BufReader<File> = open_source(source)?;
    ZipExtractor::new(reader)?.list_files()
}
