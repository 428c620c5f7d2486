use base64::Engine as _;
use std::path::Path;

pub fn detect_mime_type<P: AsRef<Path>>(path: P) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("image/jpeg")
        .to_string()
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Token counts arrive as decimal strings. Anything that is not an
/// unsigned integer counts as zero.
pub fn parse_token_count(raw: &str) -> u64 {
    raw.trim().parse::<u64>().unwrap_or(0)
}

pub fn encode_byte_to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token_count_accepts_only_unsigned_decimals() {
        assert_eq!(parse_token_count("42"), 42);
        assert_eq!(parse_token_count(" 7 "), 7);
        assert_eq!(parse_token_count(""), 0);
        assert_eq!(parse_token_count("-5"), 0);
        assert_eq!(parse_token_count("12abc"), 0);
    }

    #[test]
    fn image_mime_detection() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime(" IMAGE/JPEG"));
        assert!(!is_image_mime("application/pdf"));
    }

    #[test]
    fn http_url_detection() {
        assert!(is_http_url("https://pin.it/abc"));
        assert!(!is_http_url("ftp://example.com"));
    }
}
