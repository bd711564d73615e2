//! Tag predicates.
//!
//! Each [`Tag`] maps to one predicate over the update. Non-message updates
//! (deletions, raw updates) have no message attributes; every attribute reads
//! as absent except `out`, which reads as set.
//!
//! `no_commands` and `only_commands` need the command resolver and are
//! evaluated by the dispatcher; this module skips them. Metadata tags
//! (`thumb_url`, `alias`, `aliases`) have no predicate and always pass.

use courier_core::{Message, Tag, TagSet, TagValue, Update, normalize_chat_id};

fn mime_starts(m: Option<&Message>, kind: &str) -> bool {
    m.is_some_and(|m| m.mime_type().starts_with(kind))
}

fn text_test(m: Option<&Message>, test: impl FnOnce(&str) -> bool) -> bool {
    m.is_some_and(|m| test(m.raw_text()))
}

/// Evaluates the predicate for `tag` with the handler's `value`.
pub fn holds(tag: Tag, value: &TagValue, update: &Update) -> bool {
    let m = update.message();
    let attr = |f: fn(&Message) -> bool| m.is_some_and(f);

    match tag {
        Tag::NoCommands | Tag::OnlyCommands => true,
        Tag::Out => m.is_none_or(|m| m.out),
        Tag::In => attr(|m| !m.out),
        Tag::OnlyMessages => m.is_some(),
        Tag::Editable => !attr(|m| m.out || m.fwd_from.is_some() || m.is_sticker() || m.via_bot_id.is_some()),
        Tag::NoMedia => !attr(|m| m.media.is_some()),
        Tag::OnlyMedia => attr(|m| m.media.is_some()),
        Tag::OnlyPhotos => mime_starts(m, "image/"),
        Tag::OnlyVideos => mime_starts(m, "video/"),
        Tag::OnlyAudios => mime_starts(m, "audio/"),
        Tag::OnlyDocs => attr(Message::has_document),
        Tag::OnlyStickers => attr(Message::is_sticker),
        Tag::OnlyInline => attr(|m| m.via_bot_id.is_some()),
        Tag::OnlyChannels => attr(|m| m.is_channel() && !m.is_group()),
        Tag::OnlyGroups => {
            attr(Message::is_group) || (!attr(Message::is_private) && !attr(Message::is_channel))
        }
        Tag::OnlyPm => attr(Message::is_private),
        Tag::NoPm => !attr(Message::is_private),
        Tag::NoChannels => !attr(Message::is_channel),
        Tag::NoGroups => {
            !attr(Message::is_group) || attr(Message::is_private) || attr(Message::is_channel)
        }
        Tag::NoInline => !attr(|m| m.via_bot_id.is_some()),
        Tag::NoStickers => !attr(Message::is_sticker),
        Tag::NoDocs => !attr(Message::has_document),
        Tag::NoAudios => !mime_starts(m, "audio/"),
        Tag::NoVideos => !mime_starts(m, "video/"),
        Tag::NoPhotos => !mime_starts(m, "image/"),
        Tag::NoForwards => !attr(|m| m.fwd_from.is_some()),
        Tag::NoReply => !attr(|m| m.reply_to_msg_id.is_some()),
        Tag::NoMention => !attr(|m| m.mentioned),
        Tag::Mention => attr(|m| m.mentioned),
        Tag::OnlyReply => attr(|m| m.reply_to_msg_id.is_some()),
        Tag::OnlyForwards => attr(|m| m.fwd_from.is_some()),
        Tag::Startswith => match value {
            TagValue::Text(prefix) => text_test(m, |t| t.starts_with(prefix.as_str())),
            _ => false,
        },
        Tag::Endswith => match value {
            TagValue::Text(suffix) => text_test(m, |t| t.ends_with(suffix.as_str())),
            _ => false,
        },
        Tag::Contains => match value {
            TagValue::Text(needle) => text_test(m, |t| t.contains(needle.as_str())),
            _ => false,
        },
        Tag::Regex => match value {
            TagValue::Pattern(re) => text_test(m, |t| re.is_match(t)),
            _ => false,
        },
        Tag::Filter => match value {
            TagValue::Filter(f) => f(update),
            _ => false,
        },
        Tag::FromId => match value {
            TagValue::Id(id) => m.and_then(|m| m.sender_id) == Some(*id),
            _ => false,
        },
        Tag::ChatId => match value {
            TagValue::Id(id) => update.chat_id() == Some(normalize_chat_id(*id)),
            _ => false,
        },
        Tag::ThumbUrl | Tag::Alias | Tag::Aliases => true,
    }
}

/// The first declared tag whose predicate fails, in evaluation order.
pub fn first_failing(update: &Update, tags: &TagSet) -> Option<Tag> {
    tags.declared()
        .find(|(tag, value)| !holds(*tag, value, update))
        .map(|(tag, _)| tag)
}
