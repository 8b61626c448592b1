//! Text helpers shared by the generators and the Telegram views.

// lazy_regex! uses once_cell internally and validates patterns at compile time
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

static RE_HTML_TAG: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"<[^>]*>");

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use research_post_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Truncates to `max_chars` and appends `...` when something was cut.
///
/// # Examples
///
/// ```
/// use research_post_bot::utils::ellipsize;
/// assert_eq!(ellipsize("Rust vs Go benchmarks", 7), "Rust vs...");
/// assert_eq!(ellipsize("short", 7), "short");
/// ```
#[must_use]
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    let truncated = truncate_str(s, max_chars);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

/// Text Telegram shows for an HTML message: tags removed, entities decoded.
///
/// # Examples
///
/// ```
/// use research_post_bot::utils::html_to_plain;
/// assert_eq!(html_to_plain("<b>1 &lt; 2</b>"), "1 < 2");
/// ```
#[must_use]
pub fn html_to_plain(html: &str) -> String {
    let stripped = RE_HTML_TAG.replace_all(html, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let s = "日本語のテキスト";
        assert_eq!(truncate_str(s, 3), "日本語");
        assert_eq!(truncate_str(s, 100), s);
        assert_eq!(truncate_str("", 5), "");
        assert_eq!(truncate_str("abc", 0), "");
    }

    #[test]
    fn test_truncate_exact_boundary() {
        assert_eq!(truncate_str("abcde", 5), "abcde");
        assert_eq!(truncate_str("abcdef", 5), "abcde");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("🦀🦀🦀", 2), "🦀🦀...");
        assert_eq!(ellipsize("🦀🦀", 2), "🦀🦀");
    }

    #[test]
    fn test_html_to_plain_drops_links_markup() {
        assert_eq!(
            html_to_plain("• <a href=\"https://example.com/a?b=1&amp;c=2\">Title</a>"),
            "• Title"
        );
    }
}
