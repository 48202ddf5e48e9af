//! HTML pages returned by the upload endpoints.
//!
//! Results embed the whole output file as a base64 `data:` link.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::stats::{OperationResult, compression_ratio, format_size};

const STYLE: &str = "body{font-family:sans-serif;max-width:40em;margin:2em auto}\
    .stat{margin:.3em 0}.error{color:#b00020}a.download{display:inline-block;margin-top:1em}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body><h1>{title}</h1>{body}\
         <p><a href=\"/\">Back</a></p></body></html>"
    )
}

pub fn index_page() -> String {
    page(
        "File Compression",
        "<h2>Compress (GZIP)</h2>\
         <form action=\"/api/compress\" method=\"post\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" required> <button>Compress</button></form>\
         <h2>Decompress (.gz or .zip)</h2>\
         <form action=\"/api/decompress\" method=\"post\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" accept=\".gz,.zip\" required> \
         <button>Decompress</button></form>",
    )
}

pub fn compress_result(filename: &str, result: &OperationResult, compressed: &[u8]) -> String {
    let download = format!("{filename}.gz");
    let body = format!(
        "<p>{}</p>{}{}{}{}",
        escape(filename),
        stat("Original size", &format_size(result.original_size())),
        stat("Compressed size", &format_size(result.compressed_size())),
        stat("Space saved", &format!("{:.2}%", result.ratio())),
        download_link("application/gzip", &download, compressed),
    );
    page("Compression Complete", &body)
}

pub fn decompress_result(
    filename: &str,
    compressed_size: u64,
    output_name: &str,
    contents: &[u8],
) -> String {
    let decompressed_size = contents.len() as u64;
    let body = format!(
        "<p>{} &rarr; {}</p>{}{}{}{}",
        escape(filename),
        escape(output_name),
        stat("Compressed size", &format_size(compressed_size)),
        stat("Decompressed size", &format_size(decompressed_size)),
        stat(
            "Space saved",
            &format!("{:.2}%", compression_ratio(decompressed_size, compressed_size))
        ),
        download_link("application/octet-stream", output_name, contents),
    );
    page("Decompression Complete", &body)
}

pub fn error_page(message: &str) -> String {
    page(
        "Error",
        &format!("<p class=\"error\">{}</p>", escape(message)),
    )
}

fn stat(label: &str, value: &str) -> String {
    format!("<div class=\"stat\">{label}: <b>{value}</b></div>")
}

fn download_link(mime: &str, name: &str, data: &[u8]) -> String {
    format!(
        "<a class=\"download\" href=\"data:{mime};base64,{}\" download=\"{}\">Download {}</a>",
        STANDARD.encode(data),
        escape(name),
        escape(name)
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
