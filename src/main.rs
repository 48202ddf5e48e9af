//! Main entry point for the filepress CLI application.
//!
//! Each subcommand calls one core operation and prints its outcome; `serve`
//! starts the HTTP upload front end instead.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use filepress::cli::{self, Cli, Command};
use filepress::{OperationResult, format_size, server, zip};

/// Application entry point.
///
/// Sets up logging, parses command-line arguments and dispatches to the
/// handler for the chosen subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(config) = cli.command.server_config() {
        return server::serve(config).await;
    }

    // The codecs block; keep them off the async workers.
    tokio::task::spawn_blocking(move || run(&cli)).await?
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Compress { source, dest } => {
            let dest = dest.clone().unwrap_or_else(|| cli::default_gzip_dest(source));
            let result = filepress::compress_file(source, &dest);
            report(cli, &result, "Compressed", &dest)
        }
        Command::Decompress { source, dest } => {
            let dest = dest.clone().unwrap_or_else(|| cli::default_gunzip_dest(source));
            let result = filepress::decompress_file(source, &dest);
            report(cli, &result, "Decompressed", &dest)
        }
        Command::Zip { dest, files } => {
            let entries: Vec<(String, PathBuf)> = files
                .iter()
                .map(|path| (entry_name(path), path.clone()))
                .collect();
            if !filepress::build_archive(&entries, dest) {
                bail!("Failed to create {}", dest.display());
            }
            if !cli.is_quiet() {
                println!("Created: {}", dest.display());
            }
            Ok(())
        }
        Command::Unzip {
            source,
            extract_dir,
        } => {
            let dir = extract_dir
                .clone()
                .unwrap_or_else(|| cli::default_unzip_dir(source));
            if !filepress::extract_archive(source, &dir) {
                bail!("Failed to extract {}", source.display());
            }
            if !cli.is_quiet() {
                println!("Extracted to: {}", dir.display());
            }
            Ok(())
        }
        Command::List { source } => list_files(source),
        Command::Serve { .. } => bail!("serve needs the async runtime and is started from main"),
    }
}

/// Print the outcome of a single-stream operation.
fn report(cli: &Cli, result: &OperationResult, verb: &str, dest: &Path) -> Result<()> {
    if !result.is_success() {
        bail!("{}", result.message());
    }

    if !cli.is_quiet() {
        println!("{}: {}", verb, dest.display());
        println!("Original size:   {}", format_size(result.original_size()));
        println!("Compressed size: {}", format_size(result.compressed_size()));
        println!("Ratio:           {:.2}%", result.ratio());
    }
    Ok(())
}

/// Entry name for a file added from the command line: its base name.
fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// List entries in the ZIP archive as a table with size, compression
/// ratio and timestamps.
fn list_files(source: &Path) -> Result<()> {
    let entries = zip::list_archive(source)?;

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            percent(entry.uncompressed_size, entry.compressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        percent(total_uncompressed, total_compressed),
        "",
        file_count
    );

    Ok(())
}

/// Space saved as a right-aligned whole percentage.
fn percent(uncompressed: u64, compressed: u64) -> String {
    format!(
        "{:>4.0}%",
        filepress::stats::compression_ratio(uncompressed, compressed)
    )
}
