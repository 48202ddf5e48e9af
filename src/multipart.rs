//! Minimal `multipart/form-data` decoder for file uploads.
//!
//! The body is treated as raw bytes: boundaries and part headers are matched
//! byte-for-byte, and only the `filename` value is ever turned into text.
//! Plain form fields (parts without a filename) are dropped.

use std::collections::BTreeMap;

const HEADER_END: &[u8] = b"\r\n\r\n";
const FILENAME_ATTR: &[u8] = b"filename=\"";

/// Files recovered from a multipart body, keyed by their declared filename.
pub type UploadedFiles = BTreeMap<String, Vec<u8>>;

/// Extract the boundary token from a `Content-Type` header value.
///
/// Returns the text after `boundary=`, up to the next `;`, without
/// surrounding quotes. The `--` delimiter prefix is *not* included.
///
/// ```
/// use filepress::multipart::extract_boundary;
///
/// assert_eq!(
///     extract_boundary("multipart/form-data; boundary=----WebKitFormBoundary7MA4"),
///     Some("----WebKitFormBoundary7MA4")
/// );
/// assert_eq!(extract_boundary("application/json"), None);
/// ```
pub fn extract_boundary(content_type: &str) -> Option<&str> {
    let start = content_type.find("boundary=")? + "boundary=".len();
    let rest = &content_type[start..];
    let token = rest.split(';').next().unwrap_or(rest).trim();
    let token = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token);

    (!token.is_empty()).then_some(token)
}

/// Decode a multipart body into `filename -> bytes`.
///
/// `boundary` is the bare token from the `Content-Type` header; parts are
/// delimited by `--` followed by the token. Each part's headers end at the
/// first `\r\n\r\n`; the payload runs to the next delimiter, minus the CRLF
/// that precedes it. When a filename repeats, the later part wins.
///
/// Never fails: a body without the boundary, or without any file part,
/// yields an empty map.
pub fn decode(body: &[u8], boundary: &str) -> UploadedFiles {
    let mut files = UploadedFiles::new();
    if boundary.is_empty() {
        return files;
    }

    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary.as_bytes());

    let mut start = 0;
    while let Some(pos) = index_of(body, &delimiter, start) {
        let part_start = pos + delimiter.len();
        let part_end = index_of(body, &delimiter, part_start).unwrap_or(body.len());

        if let Some((name, payload)) = parse_part(&body[part_start..part_end]) {
            files.insert(name, payload.to_vec());
        }

        start = part_end;
    }

    files
}

/// Split one part into its filename and payload, if it carries a file.
fn parse_part(part: &[u8]) -> Option<(String, &[u8])> {
    let header_end = index_of(part, HEADER_END, 0)?;
    // Parts without any header text (e.g. the closing delimiter) carry no file.
    if header_end == 0 {
        return None;
    }

    let headers = &part[..header_end];
    let name_start = index_of(headers, FILENAME_ATTR, 0)? + FILENAME_ATTR.len();
    let name_end = name_start + headers[name_start..].iter().position(|&b| b == b'"')?;
    if name_end == name_start {
        return None;
    }
    let filename = String::from_utf8_lossy(&headers[name_start..name_end]).into_owned();

    let content_start = header_end + HEADER_END.len();
    let content_end = if part.ends_with(b"\r\n") {
        part.len() - 2
    } else {
        part.len()
    };

    Some((filename, &part[content_start..content_end.max(content_start)]))
}

/// Position of the first occurrence of `pattern` in `data` at or after `from`.
///
/// A plain scan: upload bodies are bounded and boundaries short.
fn index_of(data: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    if pattern.is_empty() || from > data.len() || data.len() - from < pattern.len() {
        return None;
    }
    data[from..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----formdata-boundary-42";

    fn body(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (headers, payload) in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n{headers}\r\n\r\n").as_bytes());
            out.extend_from_slice(payload);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        out
    }

    #[test]
    fn ignores_parts_without_a_filename() {
        let body = body(&[
            ("Content-Disposition: form-data; name=\"comment\"", &b"just text"[..]),
            (
                "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain",
                &b"file contents\r\nwith a CRLF inside"[..],
            ),
        ]);

        let files = decode(&body, BOUNDARY);
        assert_eq!(files.len(), 1);
        assert_eq!(files["a.txt"], b"file contents\r\nwith a CRLF inside");
    }

    #[test]
    fn keeps_binary_payloads_exact() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let body = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"blob.bin\"",
            &payload[..],
        )]);

        assert_eq!(decode(&body, BOUNDARY)["blob.bin"], payload);
    }

    #[test]
    fn empty_upload_is_kept() {
        let body = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"empty.txt\"",
            &b""[..],
        )]);
        assert_eq!(decode(&body, BOUNDARY)["empty.txt"], b"");
    }

    #[test]
    fn later_part_wins_for_repeated_filenames() {
        let body = body(&[
            ("Content-Disposition: form-data; name=\"a\"; filename=\"x.txt\"", &b"first"[..]),
            ("Content-Disposition: form-data; name=\"b\"; filename=\"x.txt\"", &b"second"[..]),
        ]);
        assert_eq!(decode(&body, BOUNDARY)["x.txt"], b"second");
    }

    #[test]
    fn missing_boundary_yields_nothing() {
        let body = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"",
            &b"data"[..],
        )]);
        assert!(decode(&body, "some-other-boundary").is_empty());
        assert!(decode(&body, "").is_empty());
        assert!(decode(b"", BOUNDARY).is_empty());
    }

    #[test]
    fn empty_filename_is_ignored() {
        let body = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"\"",
            &b"data"[..],
        )]);
        assert!(decode(&body, BOUNDARY).is_empty());
    }

    #[test]
    fn utf8_filenames_survive() {
        let body = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"résumé.pdf\"",
            &b"%PDF"[..],
        )]);
        assert!(decode(&body, BOUNDARY).contains_key("résumé.pdf"));
    }

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=abc123"),
            Some("abc123")
        );
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"quoted token\"; charset=utf-8"),
            Some("quoted token")
        );
        assert_eq!(extract_boundary("multipart/form-data; boundary="), None);
        assert_eq!(extract_boundary("text/plain"), None);
    }

    #[test]
    fn index_of_handles_edges() {
        assert_eq!(index_of(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(index_of(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(index_of(b"abc", b"abcd", 0), None);
        assert_eq!(index_of(b"abc", b"c", 5), None);
    }
}
