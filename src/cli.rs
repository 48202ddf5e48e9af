use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "filepress")]
#[command(version)]
#[command(about = "Compress files with GZIP or ZIP, from the shell or a browser", long_about = None)]
#[command(after_help = "Examples:\n  \
  filepress compress notes.txt              write notes.txt.gz\n  \
  filepress zip bundle.zip a.txt b.txt      archive two files\n  \
  filepress unzip bundle.zip -d out         extract into out/\n  \
  filepress serve --port 8080               start the upload server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Show debug output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compress a file with GZIP
    Compress {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Output file (default: SOURCE.gz)
        #[arg(value_name = "DEST")]
        dest: Option<PathBuf>,
    },

    /// Decompress a GZIP file
    Decompress {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Output file (default: SOURCE without .gz)
        #[arg(value_name = "DEST")]
        dest: Option<PathBuf>,
    },

    /// Pack files into a ZIP archive
    Zip {
        #[arg(value_name = "DEST")]
        dest: PathBuf,
        /// Files to add; each is stored under its base name
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// Extract a ZIP archive
    Unzip {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Extract files into exdir (default: SOURCE without .zip + "_extracted")
        #[arg(short = 'd', value_name = "DIR")]
        extract_dir: Option<PathBuf>,
    },

    /// List the entries of a ZIP archive
    List {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
    },

    /// Serve the upload form over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        #[arg(short = 'p', long, default_value_t = 8080)]
        port: u16,
        /// Number of uploads processed concurrently
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
        workers: u16,
        /// Largest accepted upload, in MiB
        #[arg(long, value_name = "MB", default_value_t = 100)]
        max_upload_mb: usize,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default tracing filter directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.is_quiet() {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

impl Command {
    /// Server settings for `serve`, `None` for the other commands.
    pub fn server_config(&self) -> Option<ServerConfig> {
        match *self {
            Command::Serve {
                bind,
                port,
                workers,
                max_upload_mb,
            } => Some(ServerConfig {
                bind,
                port,
                workers: workers as usize,
                max_upload: max_upload_mb.saturating_mul(1024 * 1024),
            }),
            _ => None,
        }
    }
}

/// `name.gz` next to the source.
pub fn default_gzip_dest(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Source without `.gz`, or `SOURCE_decompressed` when there is no such suffix.
pub fn default_gunzip_dest(source: &Path) -> PathBuf {
    match source.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("gz") => source.with_extension(""),
        _ => suffixed(source, "_decompressed"),
    }
}

/// Source without `.zip`, plus `_extracted`.
pub fn default_unzip_dir(source: &Path) -> PathBuf {
    match source.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("zip") => suffixed(&source.with_extension(""), "_extracted"),
        _ => suffixed(source, "_extracted"),
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
