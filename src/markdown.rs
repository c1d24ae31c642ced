//! Markdown message bodies for the command-line sender.

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};

/// A Markdown document rendered to an HTML mail body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Text of the leading heading, when the document starts with one
    pub subject: Option<String>,
    /// HTML of everything after that heading
    pub html: String,
}

/// Render `source` to HTML. A heading at the very top becomes the subject and
/// is left out of the body.
#[must_use]
pub fn render(source: &str) -> Rendered {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut events = Parser::new_ext(source, options).peekable();

    let mut subject = None;
    if matches!(events.peek(), Some(Event::Start(Tag::Heading { .. }))) {
        let mut title = String::new();
        for event in events.by_ref() {
            match event {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(text) | Event::Code(text) => title.push_str(&text),
                Event::SoftBreak | Event::HardBreak => title.push(' '),
                _ => {}
            }
        }
        let title = title.trim();
        if !title.is_empty() {
            subject = Some(title.to_string());
        }
    }

    let mut body = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut body, events);
    Rendered {
        subject,
        html: body,
    }
}
