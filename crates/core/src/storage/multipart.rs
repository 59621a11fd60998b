//! `multipart/related` upload parsing (spec.md §4.1 "Object upload —
//! multipart"): a JSON metadata part followed by a binary content part,
//! separated by a boundary from the request's `Content-Type` header.
//!
//! axum's built-in `Multipart` extractor only understands
//! `multipart/form-data`; this request shape needs its own minimal
//! boundary splitter instead of a dependency that doesn't fit (see
//! DESIGN.md).

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct UploadMetadata {
    pub name: Option<String>,
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The parsed two parts of a `multipart/related` upload body.
pub struct RelatedParts {
    pub metadata: UploadMetadata,
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Extracts the `boundary=` parameter from a `Content-Type: multipart/related; boundary=...` header.
pub fn extract_boundary(content_type: &str) -> Result<String, ApiError> {
    content_type
        .split(';')
        .skip(1)
        .find_map(|param| param.trim().strip_prefix("boundary=").map(|b| b.trim_matches('"').to_string()))
        .ok_or_else(|| ApiError::Invalid("multipart/related Content-Type is missing a boundary".to_string()))
}

/// Splits `body` on `--<boundary>` markers and parses exactly two parts: a
/// JSON metadata part and a binary content part, in either order (spec.md
/// allows metadata to precede content, which is the only order observed in
/// practice, but the parser does not assume it).
pub fn parse(body: &[u8], boundary: &str) -> Result<RelatedParts, ApiError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let parts = split_parts(body, &delimiter);
    if parts.len() != 2 {
        return Err(ApiError::Invalid(format!(
            "multipart/related body must contain exactly 2 parts, found {}",
            parts.len()
        )));
    }

    let mut metadata: Option<UploadMetadata> = None;
    let mut content: Option<(Vec<u8>, String)> = None;

    for raw in parts {
        let (headers, payload) = split_headers_body(raw)?;
        let part_content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        if part_content_type.starts_with("application/json") {
            let parsed: UploadMetadata = serde_json::from_slice(payload)
                .map_err(|e| ApiError::Invalid(format!("invalid JSON metadata part: {e}")))?;
            metadata = Some(parsed);
        } else {
            content = Some((payload.to_vec(), if part_content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                part_content_type
            }));
        }
    }

    let metadata = metadata.ok_or_else(|| ApiError::Invalid("multipart/related body is missing a JSON metadata part".to_string()))?;
    let (content, content_type) = content.ok_or_else(|| ApiError::Invalid("multipart/related body is missing a content part".to_string()))?;

    Ok(RelatedParts { metadata, content, content_type })
}

/// Splits on boundary markers (`--<boundary>`), discarding the preamble
/// before the first marker and the epilogue after the closing
/// `--<boundary>--` marker.
fn split_parts<'a>(body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    while let Some(pos) = find(&body[start..], delimiter) {
        let abs = start + pos;
        segments.push(&body[start..abs]);
        start = abs + delimiter.len();
    }
    segments.push(&body[start..]);

    // segments[0] is the preamble before the first boundary; the final
    // segment starts with "--" (the closing boundary) and is the epilogue.
    segments
        .into_iter()
        .skip(1)
        .filter(|s| !s.starts_with(b"--"))
        .map(|s| strip_trailing_crlf(strip_leading_crlf(s)))
        .collect()
}

fn strip_leading_crlf(b: &[u8]) -> &[u8] {
    b.strip_prefix(b"\r\n").unwrap_or(b)
}

fn strip_trailing_crlf(b: &[u8]) -> &[u8] {
    b.strip_suffix(b"\r\n").unwrap_or(b)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len().max(1)).position(|w| w == needle)
}

/// Splits one part into its header block and body, separated by a blank
/// line (`\r\n\r\n`).
fn split_headers_body(part: &[u8]) -> Result<(Vec<(String, String)>, &[u8]), ApiError> {
    let sep = b"\r\n\r\n";
    let pos = find(part, sep).ok_or_else(|| ApiError::Invalid("multipart part is missing a header/body separator".to_string()))?;
    let header_block = std::str::from_utf8(&part[..pos])
        .map_err(|_| ApiError::Invalid("multipart part headers are not valid UTF-8".to_string()))?;
    let body = &part[pos + sep.len()..];

    let headers = header_block
        .lines()
        .filter_map(|line| line.split_once(':').map(|(k, v)| (k.trim().to_string(), v.trim().to_string())))
        .collect();
    Ok((headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body(boundary: &str) -> Vec<u8> {
        format!(
            "--{boundary}\r\nContent-Type: application/json\r\n\r\n{{\"name\":\"hello.txt\"}}\r\n--{boundary}\r\nContent-Type: text/plain\r\n\r\nhello world\r\n--{boundary}--\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn extracts_boundary_from_content_type() {
        let boundary = extract_boundary("multipart/related; boundary=foo_bar_123").unwrap();
        assert_eq!(boundary, "foo_bar_123");
    }

    #[test]
    fn parses_metadata_and_content_parts() {
        let body = sample_body("xyz");
        let parsed = parse(&body, "xyz").unwrap();
        assert_eq!(parsed.metadata.name.as_deref(), Some("hello.txt"));
        assert_eq!(parsed.content, b"hello world");
        assert_eq!(parsed.content_type, "text/plain");
    }

    #[test]
    fn rejects_body_with_wrong_part_count() {
        let body = b"--xyz\r\nContent-Type: application/json\r\n\r\n{}\r\n--xyz--\r\n".to_vec();
        assert!(parse(&body, "xyz").is_err());
    }
}
