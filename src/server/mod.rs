//! HTTP upload front end.
//!
//! Uploads arrive as `multipart/form-data`; the body is decoded with
//! [`multipart::decode`](crate::multipart::decode) and the first file is run
//! through the codec on a blocking worker. Each request works inside its own
//! temporary directory, and a semaphore bounds how many codec jobs run at
//! once.

mod render;

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::multipart;
use crate::{gzip, zip};

/// Settings for [`serve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Maximum number of codec jobs running at once.
    pub workers: usize,
    /// Largest accepted request body, in bytes.
    pub max_upload: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            workers: 10,
            max_upload: 100 * 1024 * 1024,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    workers: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
        }
    }

    /// Run a blocking codec job once a worker slot is free.
    async fn run<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.workers.clone().acquire_owned().await?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await?
    }
}

/// Build the application router.
pub fn router(config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/compress", post(compress_upload))
        .route("/api/decompress", post(decompress_upload))
        .layer(DefaultBodyLimit::max(config.max_upload))
        .with_state(AppState::new(config))
}

/// Listen on the configured address until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr = SocketAddr::new(config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        workers = config.workers,
        "Server started on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, router(&config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn index() -> Html<String> {
    Html(render::index_page())
}

async fn compress_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (filename, data) = match first_upload(&headers, &body) {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    info!(file = %filename, size = data.len(), "compress request");
    respond(state.run(move || compress_job(&filename, &data)).await)
}

async fn decompress_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (filename, data) = match first_upload(&headers, &body) {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    info!(file = %filename, size = data.len(), "decompress request");
    respond(state.run(move || decompress_job(&filename, &data)).await)
}

/// Pull the first uploaded file out of a multipart request.
fn first_upload(headers: &HeaderMap, body: &[u8]) -> std::result::Result<(String, Vec<u8>), Response> {
    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(multipart::extract_boundary);

    let Some(boundary) = boundary else {
        warn!("upload without a multipart boundary");
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Expected a multipart/form-data upload.",
        ));
    };

    multipart::decode(body, boundary)
        .into_iter()
        .next()
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "No file was uploaded."))
}

fn respond(outcome: Result<String>) -> Response {
    match outcome {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("request failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Html(render::error_page(message))).into_response()
}

fn scratch_dir() -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix("filepress-")
        .tempdir()
        .context("failed to create a temporary directory")
}

fn compress_job(filename: &str, data: &[u8]) -> Result<String> {
    let dir = scratch_dir()?;
    let input = dir.path().join("upload");
    let output = dir.path().join("upload.gz");
    fs::write(&input, data)?;

    let result = gzip::compress_file(&input, &output);
    if !result.is_success() {
        bail!("Compression failed: {}", result.message());
    }

    let compressed = fs::read(&output)?;
    Ok(render::compress_result(filename, &result, &compressed))
}

fn decompress_job(filename: &str, data: &[u8]) -> Result<String> {
    let dir = scratch_dir()?;

    if let Some(stem) = strip_suffix_ignore_case(filename, ".zip") {
        let archive = dir.path().join("upload.zip");
        let extract_dir = dir.path().join("extracted");
        fs::write(&archive, data)?;

        if !zip::extract_archive(&archive, &extract_dir) {
            bail!("Failed to extract ZIP file.");
        }
        let Some(first) = first_file(&extract_dir)? else {
            bail!("ZIP file extracted but no files found inside.");
        };

        let contents = fs::read(&first)?;
        let output_name = first
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{stem}_extracted"));
        return Ok(render::decompress_result(
            filename,
            data.len() as u64,
            &output_name,
            &contents,
        ));
    }

    let output_name = match strip_suffix_ignore_case(filename, ".gz") {
        Some(stem) => stem.to_string(),
        None => format!("{filename}_decompressed"),
    };

    let input = dir.path().join("upload.gz");
    let output = dir.path().join("decompressed");
    fs::write(&input, data)?;

    let result = gzip::decompress_file(&input, &output);
    if !result.is_success() {
        bail!("Decompression failed: {}", result.message());
    }

    let contents = fs::read(&output)?;
    Ok(render::decompress_result(
        filename,
        result.compressed_size(),
        &output_name,
        &contents,
    ))
}

/// First regular file directly inside `dir`, by name.
fn first_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files.into_iter().next())
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) || !name[split..].eq_ignore_ascii_case(suffix) {
        return None;
    }
    Some(&name[..split])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_match_case_insensitively() {
        assert_eq!(strip_suffix_ignore_case("Report.GZ", ".gz"), Some("Report"));
        assert_eq!(strip_suffix_ignore_case("bundle.zip", ".zip"), Some("bundle"));
        assert_eq!(strip_suffix_ignore_case("notes.txt", ".gz"), None);
        assert_eq!(strip_suffix_ignore_case("gz", ".gz"), None);
        assert_eq!(strip_suffix_ignore_case("é.gz", ".gz"), Some("é"));
    }

    #[test]
    fn first_file_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a-dir")).unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("c.txt"), b"c").unwrap();
        assert_eq!(first_file(dir.path()).unwrap(), Some(dir.path().join("b.txt")));
    }

    #[test]
    fn decompress_job_names_gzip_output() {
        let mut packed = Vec::new();
        gzip::compress_stream(&mut &b"plain text"[..], &mut packed).unwrap();
        let page = decompress_job("notes.txt.gz", &packed).unwrap();
        assert!(page.contains("notes.txt"));
        assert!(page.contains("download=\"notes.txt\""));
    }

    #[test]
    fn decompress_job_reports_bad_input() {
        let err = decompress_job("broken.gz", b"not gzip").unwrap_err();
        assert!(err.to_string().starts_with("Decompression failed"));
    }

    #[test]
    fn default_config_uses_ten_workers() {
        let config = ServerConfig::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.port, 8080);
    }
}
