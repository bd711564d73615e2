//! Event model for the Courier dispatcher.
//!
//! This module provides the inbound data types the transport hands over:
//!
//! - [`Update`] - One incoming unit of activity (new/edited/deleted message or raw update)
//! - [`Message`] - A chat message with its three text views and content flags
//! - [`Chat`] / [`ChatKind`] - Where the message was posted
//! - [`Media`] / [`MediaKind`] - Attached media and its mime type
//!
//! # Text Views
//!
//! A message carries three views of its text: the plain `raw` text that tag
//! predicates match against, the `display` text with markup, and the
//! `storage` text the transport persists. They can only be changed through
//! [`Message`] methods that rewrite every view at once, so they never diverge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker prepended to channel and supergroup ids by some transports.
const CHANNEL_ID_MARKER: &str = "-100";

/// Strips the channel marker from a chat id, if present.
///
/// `-1001234567` becomes `1234567`; every other id is returned as-is.
pub fn normalize_chat_id(id: i64) -> i64 {
    let repr = id.to_string();
    match repr.strip_prefix(CHANNEL_ID_MARKER) {
        Some(rest) if !rest.is_empty() => rest.parse().unwrap_or(id),
        _ => id,
    }
}

// ============================================================================
// Chat
// ============================================================================

/// Classification of the chat a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-to-one conversation.
    #[default]
    Private,
    /// Basic group.
    Group,
    /// Supergroup: a group that is also a channel on the protocol level.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

/// The chat a message was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id as delivered by the transport (may carry the channel marker).
    pub id: i64,
    /// Chat classification.
    pub kind: ChatKind,
}

impl Chat {
    /// Creates a private chat.
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
        }
    }

    /// Creates a basic group chat.
    pub fn group(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
        }
    }

    /// Creates a supergroup chat.
    pub fn supergroup(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Supergroup,
        }
    }

    /// Creates a broadcast channel.
    pub fn channel(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Channel,
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }

    /// Basic groups and supergroups.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group | ChatKind::Supergroup)
    }

    /// Broadcast channels and supergroups.
    pub fn is_channel(&self) -> bool {
        matches!(self.kind, ChatKind::Channel | ChatKind::Supergroup)
    }
}

// ============================================================================
// Media
// ============================================================================

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Voice,
    Sticker,
    Document,
    /// Link previews, polls, locations and everything else.
    Other,
}

/// Media attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Media {
    /// Creates media of the given kind without an explicit mime type.
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            mime_type: None,
        }
    }

    /// Sets the mime type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Resolves the mime type, falling back to the kind's default.
    pub fn mime_type(&self) -> &str {
        match (&self.mime_type, self.kind) {
            (Some(mime), _) => mime,
            (None, MediaKind::Photo) => "image/jpeg",
            (None, MediaKind::Sticker) => "image/webp",
            (None, MediaKind::Voice) => "audio/ogg",
            _ => "",
        }
    }

    /// Whether the media is carried as a document by the protocol.
    ///
    /// Everything except photos and non-file media is a document.
    pub fn is_document(&self) -> bool {
        !matches!(self.kind, MediaKind::Photo | MediaKind::Other)
    }
}

// ============================================================================
// Message
// ============================================================================

/// The three text views of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TextViews {
    raw: String,
    display: String,
    storage: String,
}

impl TextViews {
    fn uniform(text: String) -> Self {
        Self {
            raw: text.clone(),
            display: text.clone(),
            storage: text,
        }
    }
}

/// A chat message as seen by the dispatcher.
///
/// # Example
///
/// ```rust
/// use courier_core::{Chat, Message};
///
/// let msg = Message::new(1, Chat::group(-100_42), ".ping")
///     .outgoing()
///     .from_sender(7);
///
/// assert_eq!(msg.chat_id(), 42);
/// assert_eq!(msg.raw_text(), ".ping");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Message id within its chat.
    pub id: i64,
    /// Author, if known (channels may post anonymously).
    pub sender_id: Option<i64>,
    /// Chat the message was posted in.
    pub chat: Chat,
    /// Whether the message was sent by the client itself.
    pub out: bool,
    /// Whether the client is mentioned.
    pub mentioned: bool,
    /// Attached media.
    pub media: Option<Media>,
    /// Origin id of a forwarded message.
    pub fwd_from: Option<i64>,
    /// Id of the message this one replies to.
    pub reply_to_msg_id: Option<i64>,
    /// Inline bot the message was sent through.
    pub via_bot_id: Option<i64>,
    texts: TextViews,
    grepped: bool,
}

impl Message {
    /// Creates a message whose three text views all hold `text`.
    pub fn new(id: i64, chat: Chat, text: impl Into<String>) -> Self {
        Self {
            id,
            chat,
            texts: TextViews::uniform(text.into()),
            ..Default::default()
        }
    }

    /// Marks the message as sent by the client.
    pub fn outgoing(mut self) -> Self {
        self.out = true;
        self
    }

    pub fn from_sender(mut self, sender_id: i64) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    pub fn mentioning(mut self) -> Self {
        self.mentioned = true;
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    pub fn forwarded_from(mut self, origin: i64) -> Self {
        self.fwd_from = Some(origin);
        self
    }

    pub fn replying_to(mut self, msg_id: i64) -> Self {
        self.reply_to_msg_id = Some(msg_id);
        self
    }

    pub fn via_bot(mut self, bot_id: i64) -> Self {
        self.via_bot_id = Some(bot_id);
        self
    }

    /// Replaces the display view with a markup rendering of the same text.
    pub fn with_display(mut self, markup: impl Into<String>) -> Self {
        self.texts.display = markup.into();
        self
    }

    /// Plain text, used by tag predicates.
    pub fn raw_text(&self) -> &str {
        &self.texts.raw
    }

    /// Markup text, used for display.
    pub fn text(&self) -> &str {
        &self.texts.display
    }

    /// Text as persisted by the transport, used for prefix resolution.
    pub fn storage(&self) -> &str {
        &self.texts.storage
    }

    /// Replaces all three views with `text`, discarding any markup.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.texts = TextViews::uniform(text.into());
    }

    /// Applies the same rewrite to every text view.
    pub fn rewrite_text<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        self.texts.raw = f(&self.texts.raw);
        self.texts.display = f(&self.texts.display);
        self.texts.storage = f(&self.texts.storage);
    }

    /// Chat id with the channel marker stripped.
    pub fn chat_id(&self) -> i64 {
        normalize_chat_id(self.chat.id)
    }

    pub fn is_private(&self) -> bool {
        self.chat.is_private()
    }

    pub fn is_group(&self) -> bool {
        self.chat.is_group()
    }

    pub fn is_channel(&self) -> bool {
        self.chat.is_channel()
    }

    /// Mime type of the attached media, or `""` when there is none.
    pub fn mime_type(&self) -> &str {
        self.media.as_ref().map_or("", Media::mime_type)
    }

    pub fn is_sticker(&self) -> bool {
        self.media
            .as_ref()
            .is_some_and(|m| m.kind == MediaKind::Sticker)
    }

    pub fn has_document(&self) -> bool {
        self.media.as_ref().is_some_and(Media::is_document)
    }

    /// Whether a grep clause has already been stripped from this message.
    pub fn is_grepped(&self) -> bool {
        self.grepped
    }

    pub fn mark_grepped(&mut self) {
        self.grepped = true;
    }
}

// ============================================================================
// Update
// ============================================================================

/// A low-level protocol update not modelled as a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUpdate {
    /// Protocol name of the update, matched against raw handler kinds.
    pub kind: String,
    /// Undecoded update body.
    #[serde(default)]
    pub payload: Value,
}

impl RawUpdate {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// One incoming unit of activity delivered by the transport.
#[derive(Debug, Clone)]
pub enum Update {
    /// A freshly posted message.
    NewMessage(Message),
    /// An existing message was edited.
    MessageEdited(Message),
    /// Messages were deleted.
    MessageDeleted {
        /// Chat the messages were deleted from, when the protocol reports it.
        chat_id: Option<i64>,
        message_ids: Vec<i64>,
    },
    /// Anything else.
    Raw(RawUpdate),
}

impl Update {
    /// Name used to match raw handlers against this update.
    pub fn kind(&self) -> &str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::MessageEdited(_) => "message_edited",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::Raw(raw) => &raw.kind,
        }
    }

    /// The message carried by this update, if it carries one.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::NewMessage(m) | Self::MessageEdited(m) => Some(m),
            _ => None,
        }
    }

    pub fn message_mut(&mut self) -> Option<&mut Message> {
        match self {
            Self::NewMessage(m) | Self::MessageEdited(m) => Some(m),
            _ => None,
        }
    }

    /// Normalized chat id, if the update is tied to a chat.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::NewMessage(m) | Self::MessageEdited(m) => Some(m.chat_id()),
            Self::MessageDeleted { chat_id, .. } => chat_id.map(normalize_chat_id),
            Self::Raw(_) => None,
        }
    }
}

impl From<Message> for Update {
    fn from(message: Message) -> Self {
        Self::NewMessage(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_chat_id() {
        assert_eq!(normalize_chat_id(-1001234567), 1234567);
        assert_eq!(normalize_chat_id(-100), -100);
        assert_eq!(normalize_chat_id(-42), -42);
        assert_eq!(normalize_chat_id(777), 777);
    }

    #[test]
    fn test_chat_kinds() {
        assert!(Chat::supergroup(1).is_group());
        assert!(Chat::supergroup(1).is_channel());
        assert!(Chat::channel(1).is_channel());
        assert!(!Chat::channel(1).is_group());
        assert!(Chat::private(1).is_private());
    }

    #[test]
    fn test_rewrite_text_touches_every_view() {
        let mut msg = Message::new(1, Chat::private(1), "hello").with_display("<b>hello</b>");
        msg.rewrite_text(|s| s.replace("hello", "bye"));
        assert_eq!(msg.raw_text(), "bye");
        assert_eq!(msg.storage(), "bye");
        assert_eq!(msg.text(), "<b>bye</b>");
    }

    #[test]
    fn test_mime_type_resolution() {
        let photo = Message::new(1, Chat::private(1), "").with_media(Media::new(MediaKind::Photo));
        assert_eq!(photo.mime_type(), "image/jpeg");
        assert!(!photo.has_document());

        let video = Message::new(2, Chat::private(1), "")
            .with_media(Media::new(MediaKind::Video).with_mime("video/mp4"));
        assert_eq!(video.mime_type(), "video/mp4");
        assert!(video.has_document());

        let plain = Message::new(3, Chat::private(1), "hi");
        assert_eq!(plain.mime_type(), "");
    }

    #[test]
    fn test_update_kind_and_chat() {
        let update = Update::MessageDeleted {
            chat_id: Some(-1009),
            message_ids: vec![1, 2],
        };
        assert_eq!(update.kind(), "message_deleted");
        assert_eq!(update.chat_id(), Some(9));
        assert!(update.message().is_none());

        let raw = Update::Raw(RawUpdate::new("user_typing", Value::Null));
        assert_eq!(raw.kind(), "user_typing");
        assert_eq!(raw.chat_id(), None);
    }
}
