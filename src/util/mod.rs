use sha2::{Digest, Sha256};

/// Format a packed ARGB color as a CSS `rgba()` value.
///
/// The alpha byte becomes a fractional value rounded to two decimals, so
/// `0x1E1E1E1E` renders as `rgba(30,30,30,0.12)`.
pub fn css_color(argb: u32) -> String {
    let alpha = (argb >> 24) & 0xff;
    let red = (argb >> 16) & 0xff;
    let green = (argb >> 8) & 0xff;
    let blue = argb & 0xff;
    format!(
        "rgba({},{},{},{:.2})",
        red,
        green,
        blue,
        alpha as f64 / 255.0
    )
}

/// Parse a `#AARRGGBB` or `#RRGGBB` color string (alpha defaults to opaque).
pub fn parse_color(source: &str) -> Option<u32> {
    let hex = source.strip_prefix('#')?;
    match hex.len() {
        8 => u32::from_str_radix(hex, 16).ok(),
        6 => u32::from_str_radix(hex, 16).ok().map(|r| 0xff00_0000 | r),
        _ => None,
    }
}

/// Trim the input and return `None` if nothing remains.
pub fn null_if_empty(source: &str) -> Option<String> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Strip markup tags and decode HTML entities, for titles and terminal output.
pub fn clean_string(source: &str) -> String {
    let mut text = String::with_capacity(source.len());
    let mut in_tag = false;
    for c in source.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag => {}
            _ => text.push(c),
        }
    }
    html_escape::decode_html_entities(&text).trim().to_string()
}

/// Compute a content fingerprint for deduplicating items across feeds.
///
/// Servers older than 8.1 don't send one, so it is derived locally from the
/// same inputs the server hashes.
pub fn fingerprint(title: &str, url: Option<&str>, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(url.unwrap_or("").as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_color_fractional_alpha() {
        assert_eq!(css_color(0x1E1E1E1E), "rgba(30,30,30,0.12)");
    }

    #[test]
    fn test_css_color_opaque() {
        assert_eq!(css_color(0xFF000000), "rgba(0,0,0,1.00)");
        assert_eq!(css_color(0xFFFFFFFF), "rgba(255,255,255,1.00)");
    }

    #[test]
    fn test_css_color_channels_roundtrip() {
        for argb in [0x1E102030u32, 0x80FF0000, 0x0000FF7F] {
            let rendered = css_color(argb);
            let inner = rendered
                .strip_prefix("rgba(")
                .and_then(|s| s.strip_suffix(')'))
                .unwrap();
            let parts: Vec<&str> = inner.split(',').collect();
            assert_eq!(parts[0].parse::<u32>().unwrap(), (argb >> 16) & 0xff);
            assert_eq!(parts[1].parse::<u32>().unwrap(), (argb >> 8) & 0xff);
            assert_eq!(parts[2].parse::<u32>().unwrap(), argb & 0xff);
        }
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#1E1E1E1E"), Some(0x1E1E1E1E));
        assert_eq!(parse_color("#333333"), Some(0xFF333333));
        assert_eq!(parse_color("333333"), None);
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn test_null_if_empty() {
        assert_eq!(null_if_empty(""), None);
        assert_eq!(null_if_empty(" "), None);
        assert_eq!(null_if_empty(" Hello "), Some("Hello".to_string()));
    }

    #[test]
    fn test_clean_string_strips_tags() {
        assert_eq!(clean_string("<b>Hello</b> world"), "Hello world");
        assert_eq!(clean_string("a &amp; b"), "a & b");
        assert_eq!(clean_string("  plain  "), "plain");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint("Title", Some("https://example.com/a"), "body");
        let b = fingerprint("Title", Some("https://example.com/a"), "body");
        let c = fingerprint("Title", Some("https://example.com/b"), "body");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_missing_url() {
        assert_eq!(
            fingerprint("t", None, "b"),
            fingerprint("t", Some(""), "b")
        );
    }
}
