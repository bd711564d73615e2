//! Prefix resolution and command token parsing.
//!
//! The prefix setting is a map from account id (as a string) to prefix. Older
//! stores hold a single string instead; the first read migrates it to a map
//! keyed by the client's own id.
//!
//! The effective prefix for a message is the sender's entry if present.
//! Otherwise outgoing messages use the client's own entry and everything else
//! uses the fallback.

use serde_json::{Map, Value};
use tracing::info;

use courier_core::{Identity, Message};

use crate::layout::translate;
use crate::security::SecurityCheck;
use crate::settings::Settings;

/// Prefix used when nothing else applies.
pub const DEFAULT_PREFIX: &str = ".";

/// Prefix reserved for the set-prefix command; never treated as escapable.
const RESERVED_PREFIX: &str = "s";

/// Reads the prefix map, migrating a legacy scalar value.
pub fn prefix_map(settings: &Settings<'_>, client_id: i64) -> Map<String, Value> {
    match settings.raw_prefix() {
        Some(Value::Object(map)) => map,
        Some(Value::String(prefix)) if !prefix.is_empty() => {
            let mut map = Map::new();
            map.insert(client_id.to_string(), Value::String(prefix));
            info!(client_id, "Migrating scalar command prefix to per-account map");
            settings.set_prefix_map(map.clone());
            map
        }
        _ => Map::new(),
    }
}

fn entry<'m>(map: &'m Map<String, Value>, id: i64) -> Option<&'m str> {
    map.get(&id.to_string())
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
}

/// The prefix that applies to `message`.
pub fn resolve_prefix(
    settings: &Settings<'_>,
    client_id: i64,
    message: &Message,
    fallback: &str,
) -> String {
    let map = prefix_map(settings, client_id);
    let own = if message.out {
        entry(&map, client_id).unwrap_or(fallback)
    } else {
        fallback
    };

    message
        .sender_id
        .and_then(|sender| entry(&map, sender))
        .unwrap_or(own)
        .to_string()
}

fn has_other_char(text: &str, prefix: &str) -> bool {
    let mut buf = [0u8; 4];
    text.chars().any(|c| &*c.encode_utf8(&mut buf) != prefix)
}

/// Whether `message` escapes a command by doubling the prefix.
///
/// `..ping` is sent as the literal text `.ping`. The doubled prefix may also
/// be typed in the other keyboard layout.
pub fn is_escaped(message: &Message, prefix: &str) -> bool {
    let text = message.storage();
    if !message.out
        || prefix == RESERVED_PREFIX
        || text.chars().count() <= prefix.chars().count() * 2
    {
        return false;
    }

    let swapped = translate(prefix);
    (text.starts_with(&prefix.repeat(2)) && has_other_char(text, prefix))
        || (text.starts_with(&swapped.repeat(2)) && has_other_char(text, &swapped))
}

/// Copy of `message` with one prefix removed from the start of every view.
pub fn unescape(message: &Message, prefix: &str) -> Message {
    let width = prefix.chars().count();
    let mut edited = message.clone();
    edited.rewrite_text(|s| s.chars().skip(width).collect());
    edited
}

// ============================================================================
// Command token
// ============================================================================

/// The command token following the prefix, e.g. `ping@courierbot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToken {
    /// The token as typed, suffix included.
    pub token: String,
    /// The command name without the suffix.
    pub name: String,
    /// Text after `@`, if present.
    pub suffix: Option<String>,
}

impl CommandToken {
    /// Extracts the token from `text`, which must start with `prefix`.
    ///
    /// Returns `None` when nothing but whitespace follows the prefix.
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let token = text.strip_prefix(prefix)?.split_whitespace().next()?;
        let (name, suffix) = match token.split_once('@') {
            Some((name, suffix)) => (name, Some(suffix.to_string())),
            None => (token, None),
        };
        Some(Self {
            token: token.to_string(),
            name: name.to_string(),
            suffix,
        })
    }

    /// Whether the `@suffix` addresses this client.
    ///
    /// `@me` is only valid on the client's own messages. A numeric suffix must
    /// be the client's id; anything else must be one of its usernames.
    pub fn addresses(&self, identity: &Identity, known_names: &[String], out: bool) -> bool {
        match self.suffix.as_deref() {
            None => true,
            Some("me") => out,
            Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                digits.parse::<i64>().is_ok_and(|id| id == identity.id)
            }
            Some(name) => known_names.contains(&name.to_lowercase()),
        }
    }

    /// Rewrites the token in `text` to `canonical`, dropping any suffix.
    ///
    /// Texts that do not start with `prefix` are returned unchanged.
    pub fn canonicalize(&self, text: &str, prefix: &str, canonical: &str) -> String {
        let Some(rest) = text.strip_prefix(prefix) else {
            return text.to_string();
        };
        match rest.trim_start().strip_prefix(self.token.as_str()) {
            Some(tail) => format!("{prefix}{canonical}{tail}"),
            None => text.to_string(),
        }
    }
}

/// Whether an unsuffixed command in a group must be ignored.
///
/// Outgoing messages and private chats never need a nickname. Elsewhere the
/// `no_nickname` switch, the `nonickcmds`, `nonickusers` and `nonickchats`
/// lists, or a targeted security grant lift the requirement.
pub fn nickname_required(
    settings: &Settings<'_>,
    security: &dyn SecurityCheck,
    message: &Message,
    command: &str,
) -> bool {
    if message.out || message.is_private() || settings.no_nickname() {
        return false;
    }

    let initiator = message.sender_id.unwrap_or(0);
    !(settings.nonick_commands().contains(command)
        || settings.nonick_users().contains(initiator)
        || security.has_command_exemption(initiator, command)
        || settings.nonick_chats().contains(message.chat_id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::AllowAll;
    use crate::settings::{MAIN_NAMESPACE, keys};
    use courier_core::{Chat, ConfigStore, MemoryStore};
    use serde_json::json;

    const ME: i64 = 100;

    fn out(text: &str) -> Message {
        Message::new(1, Chat::supergroup(-100_5), text).outgoing().from_sender(ME)
    }

    fn incoming(text: &str, sender: i64) -> Message {
        Message::new(1, Chat::supergroup(-100_5), text).from_sender(sender)
    }

    #[test]
    fn test_scalar_prefix_is_migrated() {
        let store = MemoryStore::new();
        store.set(MAIN_NAMESPACE, keys::COMMAND_PREFIX, json!("!"));
        let settings = Settings::new(&store);

        assert_eq!(resolve_prefix(&settings, ME, &out("!ping"), "."), "!");
        assert_eq!(
            store.get(MAIN_NAMESPACE, keys::COMMAND_PREFIX),
            Some(json!({ "100": "!" }))
        );
    }

    #[test]
    fn test_sender_entry_wins() {
        let store = MemoryStore::new();
        store.set(MAIN_NAMESPACE, keys::COMMAND_PREFIX, json!({ "100": "!", "7": "?" }));
        let settings = Settings::new(&store);

        assert_eq!(resolve_prefix(&settings, ME, &incoming("?ping", 7), "."), "?");
        // Strangers do not inherit the client's own prefix.
        assert_eq!(resolve_prefix(&settings, ME, &incoming(".ping", 8), "."), ".");
        assert_eq!(resolve_prefix(&settings, ME, &out("!ping"), "."), "!");
    }

    #[test]
    fn test_unset_prefix_uses_fallback() {
        let store = MemoryStore::new();
        let settings = Settings::new(&store);
        assert_eq!(resolve_prefix(&settings, ME, &out(".ping"), "."), ".");
        assert_eq!(store.get(MAIN_NAMESPACE, keys::COMMAND_PREFIX), None);
    }

    #[test]
    fn test_escape_detection() {
        assert!(is_escaped(&out("..foo"), "."));
        assert!(is_escaped(&out("ююfoo"), "."));
        assert!(!is_escaped(&out("..."), "."));
        assert!(!is_escaped(&out(".."), "."));
        assert!(!is_escaped(&out(".foo"), "."));
        assert!(!is_escaped(&incoming("..foo", 7), "."));
        assert!(!is_escaped(&out("ssfoo"), "s"));
    }

    #[test]
    fn test_unescape_strips_one_prefix() {
        assert_eq!(unescape(&out("..foo"), ".").raw_text(), ".foo");
    }

    #[test]
    fn test_command_token() {
        let token = CommandToken::parse(".ping@CourierBot now", ".").unwrap();
        assert_eq!(token.name, "ping");
        assert_eq!(token.suffix.as_deref(), Some("CourierBot"));
        assert!(CommandToken::parse(".", ".").is_none());
        assert!(CommandToken::parse(".   ", ".").is_none());
    }

    #[test]
    fn test_suffix_addressing() {
        let identity = Identity::new(ME).with_username("CourierBot");
        let names = identity.known_names();
        let parse = |s: &str| CommandToken::parse(s, ".").unwrap();

        assert!(parse(".ping@courierbot").addresses(&identity, &names, false));
        assert!(!parse(".ping@otherbot").addresses(&identity, &names, false));
        assert!(parse(".ping@100").addresses(&identity, &names, false));
        assert!(!parse(".ping@101").addresses(&identity, &names, false));
        assert!(parse(".ping@me").addresses(&identity, &names, true));
        assert!(!parse(".ping@me").addresses(&identity, &names, false));
    }

    #[test]
    fn test_canonicalize() {
        let token = CommandToken::parse(".p@me arg", ".").unwrap();
        assert_eq!(token.canonicalize(".p@me arg", ".", "ping"), ".ping arg");
        let token = CommandToken::parse(".P", ".").unwrap();
        assert_eq!(token.canonicalize(".P", ".", "ping"), ".ping");
    }

    #[test]
    fn test_nickname_rules() {
        let store = MemoryStore::new();
        let settings = Settings::new(&store);
        let group = incoming(".ping", 7);
        let pm = Message::new(1, Chat::private(7), ".ping").from_sender(7);

        assert!(nickname_required(&settings, &AllowAll, &group, "ping"));
        assert!(!nickname_required(&settings, &AllowAll, &pm, "ping"));
        assert!(!nickname_required(&settings, &AllowAll, &out(".ping"), "ping"));

        store.set(MAIN_NAMESPACE, keys::NONICK_CMDS, json!(["ping"]));
        assert!(!nickname_required(&settings, &AllowAll, &group, "ping"));
        store.set(MAIN_NAMESPACE, keys::NONICK_CMDS, json!([]));

        store.set(MAIN_NAMESPACE, keys::NONICK_USERS, json!([7]));
        assert!(!nickname_required(&settings, &AllowAll, &group, "ping"));
        store.set(MAIN_NAMESPACE, keys::NONICK_USERS, json!([]));

        store.set(MAIN_NAMESPACE, keys::NONICK_CHATS, json!([5]));
        assert!(!nickname_required(&settings, &AllowAll, &group, "ping"));
        store.set(MAIN_NAMESPACE, keys::NONICK_CHATS, json!([]));

        store.set(MAIN_NAMESPACE, keys::NO_NICKNAME, json!(true));
        assert!(!nickname_required(&settings, &AllowAll, &group, "ping"));
    }
}
