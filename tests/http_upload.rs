use std::io::{Cursor, Read, Write};

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use tower::ServiceExt;

use filepress::server::{ServerConfig, router};

const BOUNDARY: &str = "----filepressTestBoundary7MA4YWxkTrZu0gW";

fn multipart_body(filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    write!(
        body,
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .unwrap();
    body.extend_from_slice(data);
    write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();
    body
}

async fn upload(uri: &str, filename: &str, data: &[u8]) -> (StatusCode, String) {
    let request = Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(filename, data)))
        .unwrap();

    let response = router(&ServerConfig::default())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Decode the payload of the page's `data:` download link.
fn download_payload(page: &str) -> Vec<u8> {
    let start = page.find(";base64,").expect("download link") + ";base64,".len();
    let end = start + page[start..].find('"').expect("closing quote");
    STANDARD.decode(&page[start..end]).unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut packed = Vec::new();
    filepress::compress_stream(&mut &data[..], &mut packed).unwrap();
    packed
}

#[tokio::test]
async fn index_serves_the_upload_form() {
    let response = router(&ServerConfig::default())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(page.to_vec()).unwrap();
    assert!(page.contains("action=\"/api/compress\""));
    assert!(page.contains("action=\"/api/decompress\""));
}

#[tokio::test]
async fn compress_returns_a_gzip_download() {
    let data = b"lorem ipsum dolor sit amet ".repeat(200);
    let (status, page) = upload("/api/compress", "lorem.txt", &data).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert!(page.contains("download=\"lorem.txt.gz\""));
    assert!(page.contains("5.27 KB"));

    let mut unpacked = Vec::new();
    GzDecoder::new(&download_payload(&page)[..])
        .read_to_end(&mut unpacked)
        .unwrap();
    assert_eq!(unpacked, data);
}

#[tokio::test]
async fn decompress_strips_the_gz_suffix() {
    let data = b"binary\0payload\r\n--not-a-boundary\r\n".repeat(50);
    let (status, page) = upload("/api/decompress", "dump.bin.gz", &gzip(&data)).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert!(page.contains("download=\"dump.bin\""));
    assert_eq!(download_payload(&page), data);
}

#[tokio::test]
async fn decompress_names_unknown_extensions() {
    let (status, page) = upload("/api/decompress", "blob", &gzip(b"blob contents")).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert!(page.contains("download=\"blob_decompressed\""));
    assert_eq!(download_payload(&page), b"blob contents");
}

#[tokio::test]
async fn decompress_returns_the_first_file_of_a_zip() {
    let mut writer = filepress::ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_file("b-second.txt", &mut &b"second"[..]).unwrap();
    writer.add_file("a-first.txt", &mut &b"first"[..]).unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let (status, page) = upload("/api/decompress", "Bundle.ZIP", &archive).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert!(page.contains("download=\"a-first.txt\""));
    assert_eq!(download_payload(&page), b"first");
}

#[tokio::test]
async fn corrupt_gzip_is_a_server_error() {
    let (status, page) = upload("/api/decompress", "bad.gz", b"not gzip at all").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(page.contains("Decompression failed"));
}

#[tokio::test]
async fn missing_boundary_is_rejected() {
    let request = Request::post("/api/compress")
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from("raw bytes"))
        .unwrap();
    let response = router(&ServerConfig::default())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn form_without_a_file_is_rejected() {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::post("/api/compress")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary=\"{BOUNDARY}\""),
        )
        .body(Body::from(body))
        .unwrap();
    let response = router(&ServerConfig::default())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn compress_endpoint_only_accepts_post() {
    let response = router(&ServerConfig::default())
        .oneshot(Request::get("/api/compress").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
