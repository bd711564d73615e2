//! Chat and module access lists.
//!
//! List entries are stored as JSON numbers or strings and compared in their
//! string form, so `-100123`, `"-100123"` and the composite module key
//! `"123.weather"` all live in the same kind of list.
//!
//! Blacklists always win. A non-empty whitelist turns absence into denial.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;

use courier_core::Message;

/// A set of list entries in their string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList {
    entries: HashSet<String>,
}

impl KeyList {
    /// Reads a JSON array; anything else yields an empty list.
    pub fn from_value(value: Option<Value>) -> Self {
        let entries = match value {
            Some(Value::Array(items)) => items.iter().filter_map(entry_key).collect(),
            _ => HashSet::new(),
        };
        Self { entries }
    }

    pub fn contains(&self, key: impl fmt::Display) -> bool {
        self.entries.contains(&key.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KeyList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn entry_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Composite key naming a module within a chat.
pub fn module_key(chat_id: i64, module: &str) -> String {
    format!("{chat_id}.{module}")
}

/// Why an access list rejected an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    ChatBlacklisted,
    ChatNotWhitelisted,
    ModuleBlacklisted,
    ModuleNotWhitelisted,
}

impl fmt::Display for AccessDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChatBlacklisted => "chat is blacklisted",
            Self::ChatNotWhitelisted => "chat is not whitelisted",
            Self::ModuleBlacklisted => "module is blacklisted in this chat",
            Self::ModuleNotWhitelisted => "module is not whitelisted in this chat",
        })
    }
}

/// The four access lists, as read for one update.
#[derive(Debug, Clone, Default)]
pub struct AccessLists {
    pub blacklist_chats: KeyList,
    pub whitelist_chats: KeyList,
    pub blacklist_modules: KeyList,
    pub whitelist_modules: KeyList,
}

impl AccessLists {
    /// Checks the chat gate.
    pub fn check_chat(&self, chat_id: i64) -> Result<(), AccessDenial> {
        if self.blacklist_chats.contains(chat_id) {
            return Err(AccessDenial::ChatBlacklisted);
        }
        if !self.whitelist_chats.is_empty() && !self.whitelist_chats.contains(chat_id) {
            return Err(AccessDenial::ChatNotWhitelisted);
        }
        Ok(())
    }

    /// Checks the module gate for `module` in `chat_id`.
    ///
    /// Composite keys are honoured in `blacklist_chats` as well.
    pub fn check_module(&self, chat_id: i64, module: &str) -> Result<(), AccessDenial> {
        let key = module_key(chat_id, module);
        if self.blacklist_modules.contains(&key) || self.blacklist_chats.contains(&key) {
            return Err(AccessDenial::ModuleBlacklisted);
        }
        if !self.whitelist_modules.is_empty() && !self.whitelist_modules.contains(&key) {
            return Err(AccessDenial::ModuleNotWhitelisted);
        }
        Ok(())
    }
}

// ============================================================================
// Disabled watchers
// ============================================================================

/// Where a watcher is switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableScope {
    /// `"*"`
    Everywhere,
    /// `"only_chats"`: disabled in private chats, so it only runs in chats.
    PrivateChats,
    /// `"only_pm"`: disabled outside private chats.
    Chats,
    /// A specific chat id.
    Chat(String),
}

impl DisableScope {
    fn parse(key: String) -> Self {
        match key.as_str() {
            "*" => Self::Everywhere,
            "only_chats" => Self::PrivateChats,
            "only_pm" => Self::Chats,
            _ => Self::Chat(key),
        }
    }

    fn covers(&self, message: &Message) -> bool {
        match self {
            Self::Everywhere => true,
            Self::PrivateChats => message.is_private(),
            Self::Chats => !message.is_private(),
            Self::Chat(id) => *id == message.chat_id().to_string(),
        }
    }
}

/// `disabled_watchers`: watcher display name to disable scopes.
#[derive(Debug, Clone, Default)]
pub struct DisabledWatchers {
    scopes: HashMap<String, Vec<DisableScope>>,
}

impl DisabledWatchers {
    pub fn from_value(value: Option<Value>) -> Self {
        let mut scopes = HashMap::new();
        if let Some(Value::Object(map)) = value {
            for (name, entries) in map {
                let Value::Array(entries) = entries else {
                    continue;
                };
                let parsed = entries
                    .iter()
                    .filter_map(entry_key)
                    .map(DisableScope::parse)
                    .collect();
                scopes.insert(name, parsed);
            }
        }
        Self { scopes }
    }

    /// Whether the watcher named `name` is disabled for `message`.
    pub fn is_disabled(&self, name: &str, message: &Message) -> bool {
        self.scopes
            .get(name)
            .is_some_and(|scopes| scopes.iter().any(|s| s.covers(message)))
    }
}
