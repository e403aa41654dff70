//! Presentation helpers
//!
//! Builds the HTML fragments that the page drops into its display regions:
//! preview markup, message/loading/error blocks, and the editor buffer edits.

pub mod markdown;
pub mod typeset;

pub use markdown::render_markdown;
pub use typeset::{typeset_region, MathMarkup, Typesetter};

use serde::{Deserialize, Serialize};

/// Severity of an inline message block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
}

impl MessageKind {
    fn alert_class(self) -> &'static str {
        match self {
            MessageKind::Info => "alert-info",
            MessageKind::Success => "alert-success",
            MessageKind::Warning => "alert-warning",
            MessageKind::Error => "alert-danger",
        }
    }
}

/// Escape text for safe insertion between HTML tags or inside attribute quotes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A message block whose text is escaped.
pub fn message_block(kind: MessageKind, text: &str) -> String {
    message_block_html(kind, &escape_html(text))
}

/// A message block around already-rendered HTML.
pub fn message_block_html(kind: MessageKind, inner_html: &str) -> String {
    let extra = if kind == MessageKind::Error { "error-message " } else { "" };
    format!(
        r#"<div class="{}alert {} mt-2">{}</div>"#,
        extra,
        kind.alert_class(),
        inner_html
    )
}

/// Loading indicator shown while a request is in flight.
pub fn loading_block(text: &str) -> String {
    format!(
        r#"<div class="loading-message">{} <div class="spinner-border spinner-border-sm" role="status"><span class="visually-hidden">Loading...</span></div></div>"#,
        escape_html(text)
    )
}

/// Error block with a bold heading and a detail paragraph.
pub fn error_block(title: &str, detail: &str) -> String {
    message_block_html(
        MessageKind::Error,
        &format!(
            "<strong>{}</strong><p class=\"mb-0\">{}</p>",
            escape_html(title),
            escape_html(detail)
        ),
    )
}

/// Display markup for a formula: a block wrapper the typesetter picks up.
pub fn math_block(latex: &str) -> String {
    format!(
        r#"<div class="mathjax-wrapper">$${}$$</div>"#,
        escape_html(latex)
    )
}

/// One display region of the page.
///
/// `set` replaces the content, `append` keeps what is already shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    html: String,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn set(&mut self, html: impl Into<String>) {
        self.html = html.into();
    }

    pub fn append(&mut self, html: &str) {
        self.html.push_str(html);
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

/// Preview of raw editor input. Blank input clears the region.
pub fn preview_region(latex: &str) -> Region {
    if latex.trim().is_empty() {
        Region::new()
    } else {
        Region::with_html(math_block(latex))
    }
}

/// Text buffer with a selection, mirroring a textarea.
///
/// Offsets count characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorBuffer {
    pub text: String,
    #[serde(rename = "selectionStart")]
    pub selection_start: usize,
    #[serde(rename = "selectionEnd")]
    pub selection_end: usize,
}

impl EditorBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.chars().count();
        Self {
            text,
            selection_start: end,
            selection_end: end,
        }
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.text
            .char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    /// Replace the selection with `insert` and put the cursor right after it.
    pub fn insert_at_cursor(&mut self, insert: &str) {
        let len = self.text.chars().count();
        let start = self.selection_start.min(len);
        let end = self.selection_end.clamp(start, len);
        let (start_byte, end_byte) = (self.byte_offset(start), self.byte_offset(end));

        self.text.replace_range(start_byte..end_byte, insert);
        let cursor = start + insert.chars().count();
        self.selection_start = cursor;
        self.selection_end = cursor;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.selection_start = 0;
        self.selection_end = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_preview_region() {
        assert!(preview_region("   ").is_empty());
        assert_eq!(
            preview_region("x<1").html(),
            r#"<div class="mathjax-wrapper">$$x&lt;1$$</div>"#
        );
    }

    #[test]
    fn test_region_append_keeps_content() {
        let mut region = Region::with_html("<p>a</p>");
        region.append(&message_block(MessageKind::Warning, "w"));
        assert!(region.html().starts_with("<p>a</p>"));
        assert!(region.html().contains("alert-warning"));
        region.set("b");
        assert_eq!(region.html(), "b");
    }

    #[test]
    fn test_error_block_escapes() {
        let html = error_block("Failed", "1 < 2");
        assert!(html.contains("error-message alert alert-danger"));
        assert!(html.contains("1 &lt; 2"));
    }

    #[test]
    fn test_insert_at_cursor_replaces_selection() {
        let mut buffer = EditorBuffer {
            text: "a + b".to_string(),
            selection_start: 2,
            selection_end: 3,
        };
        buffer.insert_at_cursor("\\cdot");
        assert_eq!(buffer.text, "a \\cdot b");
        assert_eq!(buffer.selection_start, 7);
        assert_eq!(buffer.selection_end, 7);
    }

    #[test]
    fn test_insert_at_cursor_multibyte_and_out_of_range() {
        let mut buffer = EditorBuffer {
            text: "αβ".to_string(),
            selection_start: 1,
            selection_end: 1,
        };
        buffer.insert_at_cursor("x");
        assert_eq!(buffer.text, "αxβ");

        let mut past_end = EditorBuffer {
            text: "ab".to_string(),
            selection_start: 10,
            selection_end: 12,
        };
        past_end.insert_at_cursor("c");
        assert_eq!(past_end.text, "abc");
        assert_eq!(past_end.selection_start, 3);
    }
}
