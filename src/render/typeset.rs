//! Math typesetting seam.
//!
//! The browser runs MathJax; on the server side a [`Typesetter`] prepares
//! region markup for it. [`MathMarkup`] rewrites `$…$` and `$$…$$` into the
//! `\(…\)` and `\[…\]` delimiters MathJax is configured with.

use tracing::warn;

use super::{message_block, MessageKind, Region};
use crate::types::{AppError, AppResult};

pub trait Typesetter: Send + Sync {
    /// Typeset the math inside `html`, returning the new markup.
    fn typeset(&self, html: &str) -> AppResult<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MathMarkup;

/// Tags whose content is copied through untouched.
const VERBATIM_TAGS: [&str; 2] = ["code", "pre"];

impl MathMarkup {
    /// Length of the opening verbatim tag and its whole element starting at `rest`, if any.
    fn verbatim_element(rest: &str) -> Option<usize> {
        VERBATIM_TAGS.iter().find_map(|tag| {
            let open = format!("<{}", tag);
            let after = rest.get(open.len()..)?;
            if !rest.starts_with(&open) || !(after.starts_with('>') || after.starts_with(' ')) {
                return None;
            }
            let close = format!("</{}>", tag);
            Some(rest.find(&close).map(|i| i + close.len()).unwrap_or(rest.len()))
        })
    }
}

impl Typesetter for MathMarkup {
    fn typeset(&self, html: &str) -> AppResult<String> {
        let mut out = String::with_capacity(html.len() + 16);
        let mut open: Option<(bool, usize)> = None;
        let mut i = 0;

        while i < html.len() {
            let rest = &html[i..];
            if open.is_none() {
                if let Some(len) = Self::verbatim_element(rest) {
                    out.push_str(&rest[..len]);
                    i += len;
                    continue;
                }
            }
            if rest.starts_with("\\$") {
                out.push_str("\\$");
                i += 2;
                continue;
            }
            if rest.starts_with('$') {
                let display = rest.starts_with("$$");
                match open {
                    None => {
                        out.push_str(if display { "\\[" } else { "\\(" });
                        open = Some((display, i));
                    }
                    Some((true, _)) if display => {
                        out.push_str("\\]");
                        open = None;
                    }
                    Some((false, _)) if !display => {
                        out.push_str("\\)");
                        open = None;
                    }
                    Some((_, start)) => {
                        return Err(AppError::Render(format!(
                            "mismatched math delimiter at offset {} (opened at {})",
                            i, start
                        )));
                    }
                }
                i += if display { 2 } else { 1 };
                continue;
            }
            let c = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            out.push_str(&rest[..c]);
            i += c;
        }

        match open {
            Some((_, start)) => Err(AppError::Render(format!(
                "unclosed math delimiter opened at offset {}",
                start
            ))),
            None => Ok(out),
        }
    }
}

/// Typeset a region in place.
///
/// Without a typesetter, or when typesetting fails, the existing content stays
/// and a message is appended beneath it.
pub fn typeset_region(region: &mut Region, typesetter: Option<&dyn Typesetter>, context: &str) {
    let Some(typesetter) = typesetter else {
        warn!(context, "Math typesetting is unavailable");
        region.append(&message_block(
            MessageKind::Warning,
            "The math typesetting engine is not available, so formulas are shown as raw text.",
        ));
        return;
    };
    match typesetter.typeset(region.html()) {
        Ok(html) => region.set(html),
        Err(e) => {
            warn!(context, "Math typesetting failed: {}", e);
            region.append(&message_block(
                MessageKind::Error,
                &format!("Problem while typesetting formulas: {}", e),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Typesetter for Broken {
        fn typeset(&self, _html: &str) -> AppResult<String> {
            Err(AppError::Render("engine crashed".to_string()))
        }
    }

    #[test]
    fn test_delimiters_are_rewritten() {
        let html = MathMarkup.typeset("<p>Let $x$ be</p>$$x^2$$").unwrap();
        assert_eq!(html, "<p>Let \\(x\\) be</p>\\[x^2\\]");
    }

    #[test]
    fn test_escaped_dollar_and_code_are_kept() {
        let html = MathMarkup.typeset("costs \\$5 <code>$HOME</code>").unwrap();
        assert_eq!(html, "costs \\$5 <code>$HOME</code>");
    }

    #[test]
    fn test_unbalanced_is_rejected() {
        assert!(MathMarkup.typeset("a $x").is_err());
        assert!(MathMarkup.typeset("$$x$").is_err());
    }

    #[test]
    fn test_missing_typesetter_appends_warning() {
        let mut region = Region::with_html("<p>$x$</p>");
        typeset_region(&mut region, None, "preview");
        assert!(region.html().starts_with("<p>$x$</p>"));
        assert!(region.html().contains("alert-warning"));
    }

    #[test]
    fn test_failure_appends_error_and_keeps_content() {
        let mut region = Region::with_html("<p>kept</p>");
        typeset_region(&mut region, Some(&Broken), "preview");
        assert!(region.html().starts_with("<p>kept</p>"));
        assert!(region.html().contains("engine crashed"));
    }

    #[test]
    fn test_success_replaces_content() {
        let mut region = Region::with_html("$$y$$");
        typeset_region(&mut region, Some(&MathMarkup), "preview");
        assert_eq!(region.html(), "\\[y\\]");
    }
}
