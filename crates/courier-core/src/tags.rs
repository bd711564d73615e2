//! Handler tags.
//!
//! A tag is a named filter attached to a handler at registration time. The
//! set of tags is closed: [`Tag::ALL`] lists every tag in the order the
//! predicate engine evaluates them, and the first failing one is reported
//! as the rejection reason.
//!
//! A handler carries its tags as a [`TagSet`]: a map from [`Tag`] to a
//! [`TagValue`]. Most tags are plain flags; a few take a parameter
//! (`startswith` takes the expected prefix, `from_id` the expected sender).
//!
//! ```rust
//! use courier_core::{Tag, TagSet};
//!
//! let tags = TagSet::new()
//!     .flag(Tag::NoMedia)
//!     .startswith("hello")
//!     .from_id(42);
//!
//! assert!(tags.is_set(Tag::NoMedia));
//! assert_eq!(tags.text(Tag::Startswith), Some("hello"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::event::Update;

/// A custom predicate attached through the `filter` tag.
pub type FilterFn = Arc<dyn Fn(&Update) -> bool + Send + Sync>;

macro_rules! define_tags {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Every tag a handler may carry, in evaluation order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Tag {
            $($variant,)*
        }

        impl Tag {
            /// All tags in evaluation order.
            pub const ALL: &'static [Tag] = &[$(Tag::$variant,)*];

            /// The tag's registration name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Tag::$variant => $name,)*
                }
            }
        }

        impl FromStr for Tag {
            type Err = UnknownTag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Tag::$variant),)*
                    other => Err(UnknownTag(other.to_string())),
                }
            }
        }
    };
}

define_tags! {
    NoCommands => "no_commands",
    OnlyCommands => "only_commands",
    Out => "out",
    In => "in",
    OnlyMessages => "only_messages",
    Editable => "editable",
    NoMedia => "no_media",
    OnlyMedia => "only_media",
    OnlyPhotos => "only_photos",
    OnlyVideos => "only_videos",
    OnlyAudios => "only_audios",
    OnlyDocs => "only_docs",
    OnlyStickers => "only_stickers",
    OnlyInline => "only_inline",
    OnlyChannels => "only_channels",
    OnlyGroups => "only_groups",
    OnlyPm => "only_pm",
    NoPm => "no_pm",
    NoChannels => "no_channels",
    NoGroups => "no_groups",
    NoInline => "no_inline",
    NoStickers => "no_stickers",
    NoDocs => "no_docs",
    NoAudios => "no_audios",
    NoVideos => "no_videos",
    NoPhotos => "no_photos",
    NoForwards => "no_forwards",
    NoReply => "no_reply",
    NoMention => "no_mention",
    Mention => "mention",
    OnlyReply => "only_reply",
    OnlyForwards => "only_forwards",
    Startswith => "startswith",
    Endswith => "endswith",
    Contains => "contains",
    Regex => "regex",
    Filter => "filter",
    FromId => "from_id",
    ChatId => "chat_id",
    ThumbUrl => "thumb_url",
    Alias => "alias",
    Aliases => "aliases",
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not a known tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tag: {0}")]
pub struct UnknownTag(pub String);

// ============================================================================
// Tag values
// ============================================================================

/// The value a handler attaches to a tag.
#[derive(Clone)]
pub enum TagValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
    Pattern(Regex),
    Id(i64),
    Filter(FilterFn),
}

impl TagValue {
    /// Whether the tag counts as declared.
    ///
    /// Disabled flags and empty texts or lists are treated as absent.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Flag(on) => *on,
            Self::Text(text) => !text.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Pattern(_) | Self::Id(_) | Self::Filter(_) => true,
        }
    }
}

impl fmt::Debug for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(on) => f.debug_tuple("Flag").field(on).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Filter(_) => f.write_str("Filter(..)"),
        }
    }
}

// ============================================================================
// Tag set
// ============================================================================

/// The tags declared on one handler.
///
/// Iteration follows [`Tag::ALL`] order.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    entries: BTreeMap<Tag, TagValue>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `value` to `tag`, replacing any previous value.
    pub fn with(mut self, tag: Tag, value: TagValue) -> Self {
        self.entries.insert(tag, value);
        self
    }

    /// Declares a boolean tag.
    pub fn flag(self, tag: Tag) -> Self {
        self.with(tag, TagValue::Flag(true))
    }

    pub fn startswith(self, prefix: impl Into<String>) -> Self {
        self.with(Tag::Startswith, TagValue::Text(prefix.into()))
    }

    pub fn endswith(self, suffix: impl Into<String>) -> Self {
        self.with(Tag::Endswith, TagValue::Text(suffix.into()))
    }

    pub fn contains(self, needle: impl Into<String>) -> Self {
        self.with(Tag::Contains, TagValue::Text(needle.into()))
    }

    pub fn regex(self, pattern: Regex) -> Self {
        self.with(Tag::Regex, TagValue::Pattern(pattern))
    }

    pub fn filter<F>(self, f: F) -> Self
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        self.with(Tag::Filter, TagValue::Filter(Arc::new(f)))
    }

    pub fn from_id(self, sender_id: i64) -> Self {
        self.with(Tag::FromId, TagValue::Id(sender_id))
    }

    /// Restricts to one chat; channel-marked ids are accepted.
    pub fn chat_id(self, chat_id: i64) -> Self {
        self.with(Tag::ChatId, TagValue::Id(chat_id))
    }

    pub fn thumb_url(self, url: impl Into<String>) -> Self {
        self.with(Tag::ThumbUrl, TagValue::Text(url.into()))
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        self.with(Tag::Alias, TagValue::Text(alias.into()))
    }

    pub fn aliases<I, S>(self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(
            Tag::Aliases,
            TagValue::List(aliases.into_iter().map(Into::into).collect()),
        )
    }

    pub fn get(&self, tag: Tag) -> Option<&TagValue> {
        self.entries.get(&tag)
    }

    /// Whether `tag` is declared with a truthy value.
    pub fn is_set(&self, tag: Tag) -> bool {
        self.get(tag).is_some_and(TagValue::is_set)
    }

    /// Declared tags in evaluation order.
    pub fn declared(&self) -> impl Iterator<Item = (Tag, &TagValue)> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_set())
            .map(|(t, v)| (*t, v))
    }

    pub fn is_empty(&self) -> bool {
        self.declared().next().is_none()
    }

    pub fn text(&self, tag: Tag) -> Option<&str> {
        match self.get(tag) {
            Some(TagValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn id(&self, tag: Tag) -> Option<i64> {
        match self.get(tag) {
            Some(TagValue::Id(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn pattern(&self, tag: Tag) -> Option<&Regex> {
        match self.get(tag) {
            Some(TagValue::Pattern(re)) => Some(re),
            _ => None,
        }
    }

    pub fn filter_fn(&self, tag: Tag) -> Option<&FilterFn> {
        match self.get(tag) {
            Some(TagValue::Filter(f)) => Some(f),
            _ => None,
        }
    }

    /// All alias names from the `alias` and `aliases` tags.
    pub fn alias_names(&self) -> Vec<&str> {
        let single = self.text(Tag::Alias).into_iter();
        let many = match self.get(Tag::Aliases) {
            Some(TagValue::List(items)) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        single.chain(many).collect()
    }
}
