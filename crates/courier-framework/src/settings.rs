//! Dispatcher settings read from the [`ConfigStore`].
//!
//! Everything lives in the [`MAIN_NAMESPACE`] namespace. Keys are read fresh
//! for every update so changes made by running handlers apply immediately.

use serde_json::{Map, Value};

use courier_core::{ConfigStore, ConfigStoreExt};

use crate::access::{AccessLists, DisabledWatchers, KeyList};

/// Namespace holding every dispatcher setting.
pub const MAIN_NAMESPACE: &str = "courier.main";

/// Setting keys.
pub mod keys {
    pub const COMMAND_PREFIX: &str = "command_prefix";
    pub const BLACKLIST_CHATS: &str = "blacklist_chats";
    pub const WHITELIST_CHATS: &str = "whitelist_chats";
    pub const BLACKLIST_MODULES: &str = "blacklist_modules";
    pub const WHITELIST_MODULES: &str = "whitelist_modules";
    pub const NO_NICKNAME: &str = "no_nickname";
    pub const NONICK_CMDS: &str = "nonickcmds";
    pub const NONICK_USERS: &str = "nonickusers";
    pub const NONICK_CHATS: &str = "nonickchats";
    pub const GREP: &str = "grep";
    pub const INLINE_LOGS: &str = "inlinelogs";
    pub const DISABLED_WATCHERS: &str = "disabled_watchers";
}

/// Typed read access to the dispatcher settings.
#[derive(Clone, Copy)]
pub struct Settings<'a> {
    store: &'a dyn ConfigStore,
}

impl<'a> Settings<'a> {
    pub fn new(store: &'a dyn ConfigStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a dyn ConfigStore {
        self.store
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.store.get_or(MAIN_NAMESPACE, key, default)
    }

    fn list(&self, key: &str) -> KeyList {
        KeyList::from_value(self.store.get(MAIN_NAMESPACE, key))
    }

    /// The stored prefix setting as-is (scalar or map).
    pub fn raw_prefix(&self) -> Option<Value> {
        self.store.get(MAIN_NAMESPACE, keys::COMMAND_PREFIX)
    }

    pub fn set_prefix_map(&self, map: Map<String, Value>) {
        self.store
            .set(MAIN_NAMESPACE, keys::COMMAND_PREFIX, Value::Object(map));
    }

    pub fn access_lists(&self) -> AccessLists {
        AccessLists {
            blacklist_chats: self.list(keys::BLACKLIST_CHATS),
            whitelist_chats: self.list(keys::WHITELIST_CHATS),
            blacklist_modules: self.list(keys::BLACKLIST_MODULES),
            whitelist_modules: self.list(keys::WHITELIST_MODULES),
        }
    }

    pub fn no_nickname(&self) -> bool {
        self.flag(keys::NO_NICKNAME, false)
    }

    pub fn nonick_commands(&self) -> KeyList {
        self.list(keys::NONICK_CMDS)
    }

    pub fn nonick_users(&self) -> KeyList {
        self.list(keys::NONICK_USERS)
    }

    pub fn nonick_chats(&self) -> KeyList {
        self.list(keys::NONICK_CHATS)
    }

    /// Whether `| grep` pipes are honoured.
    pub fn grep_enabled(&self) -> bool {
        self.flag(keys::GREP, false)
    }

    /// Whether failure reports include the error chain.
    pub fn inline_logs(&self) -> bool {
        self.flag(keys::INLINE_LOGS, true)
    }

    pub fn disabled_watchers(&self) -> DisabledWatchers {
        DisabledWatchers::from_value(self.store.get(MAIN_NAMESPACE, keys::DISABLED_WATCHERS))
    }
}
