//! HTML helpers for outgoing text.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static pattern"));

/// Escapes the characters that are significant in HTML markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Removes tags and decodes the entities produced by [`escape_html`].
pub fn strip_html(text: &str) -> String {
    PlainText::parse(text).text
}

const ENTITIES: [(&str, char); 4] = [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>'), ("&quot;", '"')];

/// The visible text of an HTML fragment, with a map back into the markup.
#[derive(Debug, Clone)]
pub(crate) struct PlainText {
    pub text: String,
    /// For each byte of `text`, the markup byte range it was decoded from.
    origins: Vec<(usize, usize)>,
}

impl PlainText {
    pub fn parse(markup: &str) -> Self {
        let mut text = String::with_capacity(markup.len());
        let mut origins = Vec::with_capacity(markup.len());
        let mut at = 0;

        while let Some(c) = markup[at..].chars().next() {
            if c == '<'
                && let Some(tag) = TAG.find_at(markup, at)
                && tag.start() == at
            {
                at = tag.end();
                continue;
            }

            if c == '&'
                && let Some((entity, decoded)) =
                    ENTITIES.iter().find(|(entity, _)| markup[at..].starts_with(entity))
            {
                text.push(*decoded);
                origins.push((at, at + entity.len()));
                at += entity.len();
                continue;
            }

            text.push(c);
            origins.extend((at..at + c.len_utf8()).map(|i| (i, i + 1)));
            at += c.len_utf8();
        }

        Self { text, origins }
    }

    /// The markup range behind `range` of the visible text.
    ///
    /// `None` when the range is empty or out of bounds.
    pub fn markup_range(&self, range: Range<usize>) -> Option<Range<usize>> {
        if range.is_empty() {
            return None;
        }
        let (start, _) = *self.origins.get(range.start)?;
        let (_, end) = *self.origins.get(range.end - 1)?;
        Some(start..end)
    }
}
