/// Make a possibly-relative upstream URL absolute.
///
/// The upstream mixes absolute, host-relative and protocol-relative URLs in
/// the same payloads; protocol-relative links always get https.
pub fn absolutize(base: &str, url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if url.starts_with("http") {
        return url.to_string();
    }
    format!("{}{}", base.trim_end_matches('/'), url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shikimori.one";

    #[test]
    fn test_relative_url_gets_base() {
        assert_eq!(
            absolutize(BASE, "/system/animes/original/1.jpg"),
            "https://shikimori.one/system/animes/original/1.jpg"
        );
    }

    #[test]
    fn test_absolute_url_unchanged() {
        assert_eq!(
            absolutize(BASE, "https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn test_protocol_relative_becomes_https() {
        assert_eq!(
            absolutize(BASE, "//kodik.info/seria/12/abc/720p"),
            "https://kodik.info/seria/12/abc/720p"
        );
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(absolutize(BASE, ""), "");
    }
}
