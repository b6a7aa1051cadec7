//! Utility functions for source URL handling.

/// Characters stripped from the end of an extracted URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Extract the first `http://` or `https://` URL from free-form text.
///
/// The URL ends at the first whitespace or quote character; trailing
/// sentence punctuation is dropped. Returns `None` when no URL is present.
pub fn extract_url(input: &str) -> Option<String> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| input.find(scheme))
        .min()?;

    let rest = &input[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '\'' || c == '"')
        .unwrap_or(rest.len());

    let url = rest[..end].trim_end_matches(TRAILING_PUNCTUATION);
    let scheme_len = if url.starts_with("https://") { 8 } else { 7 };
    if url.len() <= scheme_len {
        return None;
    }

    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_url() {
        assert_eq!(
            extract_url("https://youtube.com/watch?v=abc"),
            Some("https://youtube.com/watch?v=abc".to_string())
        );
    }

    #[test]
    fn test_extract_from_sentence() {
        assert_eq!(
            extract_url("check this out: https://youtu.be/xyz!!"),
            Some("https://youtu.be/xyz".to_string())
        );
        assert_eq!(
            extract_url("see 'http://example.com/v.mp4', thanks"),
            Some("http://example.com/v.mp4".to_string())
        );
    }

    #[test]
    fn test_extract_first_of_many() {
        assert_eq!(
            extract_url("http://a.com/1 and https://b.com/2"),
            Some("http://a.com/1".to_string())
        );
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_url("no links here"), None);
        assert_eq!(extract_url("https://"), None);
    }
}
