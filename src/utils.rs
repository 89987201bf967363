use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Turns a search-hit highlight fragment into plain text.
///
/// Every text node ends up on its own trimmed line and blank lines are dropped.
pub fn clean_highlights(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let text = HTML_TAG.replace_all(html, "\n");
    let text = decode_entities(&text);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Returns at most `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Formats a similarity in [0, 1] as a percentage with two decimals (`0.91` -> `91.00%`).
pub fn format_percentage(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_highlights() {
        let html = "the <span class=\"match\">zero</span> fare &amp; transit\n\n  rules ";
        assert_eq!(clean_highlights(html), "the\nzero\nfare & transit\nrules");
    }

    #[test]
    fn test_clean_highlights_empty() {
        assert_eq!(clean_highlights(""), "");
        assert_eq!(clean_highlights("   "), "");
        assert_eq!(clean_highlights("<br/>"), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        // multi-byte characters count once
        assert_eq!(truncate_chars("ção e mais", 3), "ção");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.91), "91.00%");
        assert_eq!(format_percentage(0.1234), "12.34%");
        assert_eq!(format_percentage(1.0), "100.00%");
    }
}
