//! Markdown to HTML for model replies.
//!
//! Math spans are lifted out before parsing so emphasis rules never touch
//! `_` or `*` inside formulas, then put back verbatim (escaped) afterwards.
//! Raw HTML in a reply is shown as text, never passed through as markup.

use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use std::sync::OnceLock;

use super::escape_html;
use crate::types::{AppError, AppResult};

fn math_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\$[\s\S]+?\$\$|\$[^$\n]+?\$").unwrap())
}

fn placeholder(index: usize) -> String {
    format!("LATEXLABMATH{}X", index)
}

/// Render `text` as HTML. Fails when a math span does not survive the pass.
pub fn render_markdown(text: &str) -> AppResult<String> {
    let mut spans = Vec::new();
    let protected = math_span().replace_all(text, |caps: &regex::Captures| {
        spans.push(caps[0].to_string());
        placeholder(spans.len() - 1)
    });

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(&protected, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut body = String::with_capacity(protected.len() * 3 / 2);
    html::push_html(&mut body, parser);

    for (index, span) in spans.iter().enumerate().rev() {
        let marker = placeholder(index);
        if !body.contains(&marker) {
            return Err(AppError::Render(format!("math span {} was lost during markdown rendering", index)));
        }
        body = body.replace(&marker, &escape_html(span));
    }
    Ok(body)
}

/// Like [`render_markdown`] but degrades to preformatted raw text.
pub fn render_markdown_or_raw(text: &str) -> String {
    match render_markdown(text) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("Markdown rendering failed, showing raw text: {}", e);
            format!("<pre>{}</pre>", escape_html(text))
        }
    }
}
