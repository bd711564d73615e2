//! Grep pipes.
//!
//! A command may end with `| grep <pattern>` to filter its own output by line:
//!
//! ```text
//! .modules | grep -i voice
//! ```
//!
//! [`strip_grep`] removes the clause from the message before the handler sees
//! it and returns an [`OutputFilter`]. The filter is attached to the handler's
//! [`Context`](crate::Context) and applied to every text the handler sends.
//! Writing `|| grep` escapes the clause: it is unescaped to `| grep` and left
//! in the text.
//!
//! Pattern tokens `-i` (ignore case) and `-v` (invert) may appear anywhere in
//! the pattern. The rest is matched literally.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::markup::PlainText;
use courier_core::Message;

/// Shown instead of the output when no line survives the filter.
pub const NO_LINES: &str = "✂️ <b>No lines to grep</b>";

static ESCAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\| ?grep").expect("static pattern"));
static CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+\| ?grep (.+)").expect("static pattern"));
static SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\| ?grep.+").expect("static pattern"));

/// A pending line filter for a handler's output.
#[derive(Debug, Clone)]
pub struct OutputFilter {
    matcher: Option<Regex>,
    invert: bool,
}

impl OutputFilter {
    /// Parses the text that followed `grep`.
    pub fn parse(args: &str) -> Result<Self, regex::Error> {
        let tokens: Vec<&str> = args.split(' ').collect();
        let ignore_case = tokens.contains(&"-i");
        let invert = tokens.contains(&"-v");

        let pattern = tokens
            .iter()
            .filter(|t| **t != "-i" && **t != "-v")
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        let pattern = pattern.trim();

        let matcher = if pattern.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(ignore_case)
                    .build()?,
            )
        };

        Ok(Self { matcher, invert })
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Filters `text` line by line.
    ///
    /// Lines are tested with markup stripped. Kept lines have their first
    /// match wrapped for highlighting, unless the match spans a tag.
    pub fn apply(&self, text: &str) -> String {
        let mut kept = Vec::new();

        for line in text.lines() {
            let plain = PlainText::parse(line);
            let found = match &self.matcher {
                Some(re) => {
                    let lead = plain.text.len() - plain.text.trim_start().len();
                    re.find(plain.text.trim()).map(|m| m.start() + lead..m.end() + lead)
                }
                None => Some(0..0),
            };

            if found.is_some() == self.invert {
                continue;
            }

            match found.and_then(|range| plain.markup_range(range)) {
                Some(span) if !line[span.clone()].contains('<') => kept.push(format!(
                    "{}<u><i>{}</i></u>{}",
                    &line[..span.start],
                    &line[span.clone()],
                    &line[span.end..]
                )),
                _ => kept.push(line.to_string()),
            }
        }

        let output = kept.join("\n");
        if output.trim().is_empty() {
            NO_LINES.to_string()
        } else {
            output
        }
    }
}

/// Strips a grep clause from `message`.
///
/// Returns the filter to attach when a clause was found. An escaped clause is
/// unescaped in place and yields no filter; so does a message that was
/// already stripped.
pub fn strip_grep(message: &mut Message) -> Option<OutputFilter> {
    if ESCAPED.is_match(message.raw_text()) {
        message.rewrite_text(|s| ESCAPED.replace_all(s, "| grep").into_owned());
        return None;
    }

    if message.is_grepped() {
        return None;
    }

    let args = CLAUSE
        .captures(message.raw_text())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())?;

    message.rewrite_text(|s| SUFFIX.replace_all(s, "").trim_end().to_string());
    message.mark_grepped();

    match OutputFilter::parse(&args) {
        Ok(filter) => Some(filter),
        Err(e) => {
            warn!(pattern = %args, error = %e, "Unusable grep pattern, output left unfiltered");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Chat;

    fn msg(text: &str) -> Message {
        Message::new(1, Chat::private(1), text).outgoing()
    }

    #[test]
    fn test_strip_grep_extracts_clause() {
        let mut m = msg(".mycommand arg | grep foo");
        let filter = strip_grep(&mut m);
        assert!(filter.is_some());
        assert_eq!(m.raw_text(), ".mycommand arg");
        assert_eq!(m.storage(), ".mycommand arg");
        assert_eq!(m.text(), ".mycommand arg");
        assert!(m.is_grepped());
    }

    #[test]
    fn test_strip_grep_without_space_before_grep() {
        let mut m = msg(".cmd|grep foo");
        assert!(strip_grep(&mut m).is_some());
        assert_eq!(m.raw_text(), ".cmd");
    }

    #[test]
    fn test_strip_grep_clears_every_line() {
        let mut m = msg(".cmd | grep foo\nnext | grep bar");
        assert!(strip_grep(&mut m).is_some());
        assert_eq!(m.raw_text(), ".cmd\nnext");
        assert_eq!(m.text(), ".cmd\nnext");
    }

    #[test]
    fn test_strip_grep_is_idempotent() {
        let mut m = msg(".cmd | grep foo");
        assert!(strip_grep(&mut m).is_some());
        assert!(strip_grep(&mut m).is_none());
        assert_eq!(m.raw_text(), ".cmd");
    }

    #[test]
    fn test_escaped_clause_is_unescaped() {
        let mut m = msg(".echo a || grep b");
        assert!(strip_grep(&mut m).is_none());
        assert_eq!(m.raw_text(), ".echo a | grep b");
        assert!(!m.is_grepped());

        let mut m = msg(".echo a ||grep b");
        assert!(strip_grep(&mut m).is_none());
        assert_eq!(m.raw_text(), ".echo a | grep b");
    }

    #[test]
    fn test_no_clause() {
        let mut m = msg(".echo hello");
        assert!(strip_grep(&mut m).is_none());
        assert_eq!(m.raw_text(), ".echo hello");
    }

    #[test]
    fn test_filter_keeps_matching_lines() {
        let filter = OutputFilter::parse("foo").unwrap();
        let out = filter.apply("foo one\nbar two\nmore foo");
        assert_eq!(out, "<u><i>foo</i></u> one\nmore <u><i>foo</i></u>");
    }

    #[test]
    fn test_filter_highlights_first_match_only() {
        let filter = OutputFilter::parse("ab").unwrap();
        assert_eq!(filter.apply("ab ab"), "<u><i>ab</i></u> ab");
    }

    #[test]
    fn test_filter_invert() {
        let filter = OutputFilter::parse("-v foo").unwrap();
        assert!(filter.is_inverted());
        assert_eq!(filter.apply("foo one\nbar two"), "bar two");
    }

    #[test]
    fn test_filter_ignore_case() {
        let filter = OutputFilter::parse("-i FOO").unwrap();
        assert_eq!(filter.apply("Foo here\nnothing"), "<u><i>Foo</i></u> here");
    }

    #[test]
    fn test_filter_matches_literally() {
        let filter = OutputFilter::parse("a.c").unwrap();
        assert_eq!(filter.apply("abc\na.c"), "<u><i>a.c</i></u>");
    }

    #[test]
    fn test_filter_ignores_markup_when_matching() {
        let filter = OutputFilter::parse("bold").unwrap();
        assert_eq!(filter.apply("<b>bold</b> text\nplain"), "<b><u><i>bold</i></u></b> text");
    }

    #[test]
    fn test_highlight_keeps_entities_whole() {
        let filter = OutputFilter::parse("&").unwrap();
        assert_eq!(filter.apply("a &amp; b"), "a <u><i>&amp;</i></u> b");

        let filter = OutputFilter::parse("a").unwrap();
        assert_eq!(filter.apply("&amp; a"), "&amp; <u><i>a</i></u>");
    }

    #[test]
    fn test_highlight_never_lands_inside_a_tag() {
        let filter = OutputFilter::parse("b").unwrap();
        assert_eq!(filter.apply("<b>bold</b>"), "<b><u><i>b</i></u>old</b>");
    }

    #[test]
    fn test_match_across_tags_is_kept_unhighlighted() {
        let filter = OutputFilter::parse("bold").unwrap();
        assert_eq!(filter.apply("<b>bo</b>ld"), "<b>bo</b>ld");
    }

    #[test]
    fn test_filter_nothing_left() {
        let filter = OutputFilter::parse("zzz").unwrap();
        assert_eq!(filter.apply("foo\nbar"), NO_LINES);
    }

    #[test]
    fn test_empty_pattern_keeps_everything() {
        let filter = OutputFilter::parse("-i").unwrap();
        assert_eq!(filter.apply("one\ntwo"), "one\ntwo");
    }
}
