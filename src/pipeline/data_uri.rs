//! `data:<mime>;base64,<payload>` helpers.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Borrowed view of a base64 data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    pub payload: &'a str,
}

/// Split a base64 data URI into mime type and payload.
///
/// Returns `None` for plain base64 text and for non-base64 data URIs.
pub fn parse(value: &str) -> Option<DataUri<'_>> {
    let (header, payload) = value.strip_prefix("data:")?.split_once(',')?;
    let mut params = header.split(';');
    let mime_type = params.next().unwrap_or_default().trim();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return None;
    }
    Some(DataUri { mime_type, payload })
}

/// Wrap already-encoded base64 text.
pub fn wrap(mime_type: &str, encoded: &str) -> String {
    format!("data:{};base64,{}", mime_type, encoded)
}

/// Encode raw bytes into a data URI.
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    wrap(mime_type, &STANDARD.encode(bytes))
}

/// Drop parameters from a `Content-Type` value: `image/png; q=1` → `image/png`.
pub fn media_type(content_type: &str) -> Option<&str> {
    let media = content_type.split(';').next()?.trim();
    if media.contains('/') {
        Some(media)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base64_uri() {
        let uri = parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(uri.mime_type, "image/png");
        assert_eq!(uri.payload, "iVBORw0KGgo=");
    }

    #[test]
    fn test_parse_rejects_plain_and_non_base64() {
        assert!(parse("iVBORw0KGgo=").is_none());
        assert!(parse("data:text/plain,hello").is_none());
        assert!(parse("data:image/png;base64").is_none());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("image/gif", b"GIF89a"), "data:image/gif;base64,R0lGODlh");
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("image/png; charset=binary"), Some("image/png"));
        assert_eq!(media_type(" image/webp "), Some("image/webp"));
        assert_eq!(media_type(""), None);
    }
}
