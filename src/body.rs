//! Turning user-entered plain text into an HTML mail body.

/// Escape HTML-significant characters and turn each newline into `<br>` plus
/// a newline, so paragraphs survive in HTML mail clients.
///
/// CRLF line endings (as submitted by browser textareas) count as one newline.
#[must_use]
pub fn prepare(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => out.push_str("<br>\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::prepare;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            prepare(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn newlines_become_line_breaks() {
        assert_eq!(prepare("a\n\nb\n"), "a<br>\n<br>\nb<br>\n");
        assert_eq!(prepare("a\r\nb"), "a<br>\nb");
    }

    #[test]
    fn plain_text_only_changes_at_newlines() {
        let raw = "Bonjour à tous,\nRéunion jeudi 18h.\nAmitiés";
        assert_eq!(prepare(raw).replace("<br>\n", "\n"), raw);
    }

    #[test]
    fn no_raw_markup_survives() {
        let out = prepare("<script>alert(1)</script> & \"x\" 'y' > <");
        assert!(!out.contains(['<', '>', '"', '\'']));
        assert_eq!(prepare(""), "");
    }
}
