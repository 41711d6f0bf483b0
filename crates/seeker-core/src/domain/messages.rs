//! User-facing texts. Replies are sent with Markdown parse mode.

use super::file::FileItem;

pub const PROCESSING_ERROR: &str = "Sorry, I couldn't process your request right now.";

pub const NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that as a file search. \
     Try something like \"find the Q1 report as pdf\".";

pub const SEARCHING: &str = "Searching your files...";

pub const NOTHING_FOUND: &str = "No files matched your search.";

pub const RESULTS_HEADER: &str = "I found these files for you:";

/// Longest provider error detail quoted back to the user, in characters.
pub const MAX_DETAIL_CHARS: usize = 300;

/// Search failure reply. The detail is provider text: it is shortened and its
/// Markdown control characters are escaped.
pub fn search_failed(detail: &str) -> String {
    let mut quoted = escape_markdown(truncate_chars(detail.trim(), MAX_DETAIL_CHARS));
    if detail.trim().chars().count() > MAX_DETAIL_CHARS {
        quoted.push_str("...");
    }
    format!("An error occurred while searching your files: {quoted}")
}

/// Prefix of `text` holding at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Backslash-escape the characters Telegram's legacy Markdown treats as markup.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Header plus one `- [name](link)` line per item, in order, at most `page_size` lines.
pub fn format_results(items: &[FileItem], page_size: usize) -> String {
    if items.is_empty() || page_size == 0 {
        return NOTHING_FOUND.to_string();
    }

    let mut text = String::from(RESULTS_HEADER);
    for item in items.iter().take(page_size) {
        text.push_str("\n- [");
        text.push_str(&escape_link_text(&item.name));
        text.push_str("](");
        text.push_str(&item.link);
        text.push(')');
    }
    text
}

fn escape_link_text(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '[' => out.push('('),
            ']' => out.push(')'),
            '`' => out.push('\''),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<FileItem> {
        (0..n)
            .map(|i| FileItem::new(format!("file-{i}.pdf"), format!("http://x/{i}")))
            .collect()
    }

    #[test]
    fn empty_results_use_fixed_message() {
        assert_eq!(format_results(&[], 10), NOTHING_FOUND);
    }

    #[test]
    fn one_line_per_item_in_order() {
        let text = format_results(&items(3), 10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], RESULTS_HEADER);
        assert_eq!(
            &lines[1..],
            &[
                "- [file-0.pdf](http://x/0)",
                "- [file-1.pdf](http://x/1)",
                "- [file-2.pdf](http://x/2)",
            ]
        );
    }

    #[test]
    fn capped_at_page_size() {
        let text = format_results(&items(25), 10);
        assert_eq!(text.lines().count(), 1 + 10);
        assert!(text.contains("file-9.pdf"));
        assert!(!text.contains("file-10.pdf"));
    }

    #[test]
    fn brackets_in_names_do_not_break_links() {
        let text = format_results(&[FileItem::new("Q1 [draft].pdf", "http://x")], 10);
        assert!(text.ends_with("- [Q1 (draft).pdf](http://x)"));
    }

    #[test]
    fn search_failure_carries_detail() {
        assert!(search_failed("HTTP 403: forbidden").contains("HTTP 403: forbidden"));
    }

    #[test]
    fn search_failure_escapes_markdown_in_detail() {
        let text = search_failed(r#"HTTP 401: {"reason": "ACCESS_TOKEN_TYPE_UNSUPPORTED"}"#);
        assert!(text.ends_with(r#"{"reason": "ACCESS\_TOKEN\_TYPE\_UNSUPPORTED"}"#));

        let text = search_failed("a*b `c` [d]");
        assert!(text.ends_with(r"a\*b \`c\` \[d]"));
    }

    #[test]
    fn search_failure_truncates_long_detail() {
        let detail = "é".repeat(MAX_DETAIL_CHARS * 4);
        let text = search_failed(&detail);
        assert!(text.ends_with("..."));
        assert_eq!(text.matches('é').count(), MAX_DETAIL_CHARS);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
