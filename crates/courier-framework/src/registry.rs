//! Handler records and the module registry.
//!
//! The dispatcher only reads from a [`ModuleRegistry`]. Loading, unloading
//! and organizing modules belongs to whoever implements it; [`Modules`] is
//! the in-memory implementation shipped for embedding and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! let modules = Modules::new();
//! modules.register_command(
//!     CommandHandler::new("ping", "tester", ping)
//!         .with_tags(TagSet::new().alias("p")),
//! );
//!
//! let (canonical, handler) = modules.dispatch("P");
//! assert_eq!(canonical, "ping");
//! assert!(handler.is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use courier_core::TagSet;

use crate::handler::{BoxedHandler, Handler, into_handler};

// ============================================================================
// Records
// ============================================================================

/// A command registered under a canonical name.
pub struct CommandHandler {
    pub name: String,
    /// Owning module, used for composite access keys.
    pub module: String,
    pub tags: TagSet,
    pub handler: BoxedHandler,
}

impl CommandHandler {
    pub fn new(name: impl Into<String>, module: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            tags: TagSet::new(),
            handler: into_handler(handler),
        }
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}

/// A passive handler run for every update that passes its gates.
pub struct Watcher {
    pub module: String,
    /// Name used as the key in `disabled_watchers`.
    pub display_name: String,
    pub tags: TagSet,
    pub handler: BoxedHandler,
}

impl Watcher {
    pub fn new(
        module: impl Into<String>,
        display_name: impl Into<String>,
        handler: impl Handler,
    ) -> Self {
        Self {
            module: module.into(),
            display_name: display_name.into(),
            tags: TagSet::new(),
            handler: into_handler(handler),
        }
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}

/// A handler for low-level updates, matched by update kind.
pub struct RawHandler {
    pub id: String,
    pub module: String,
    /// Update kinds this handler accepts; empty accepts every kind.
    pub kinds: Vec<String>,
    /// Tags are only evaluated when at least one is declared.
    pub tags: TagSet,
    pub handler: BoxedHandler,
}

impl RawHandler {
    pub fn new(id: impl Into<String>, module: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            id: id.into(),
            module: module.into(),
            kinds: Vec::new(),
            tags: TagSet::new(),
            handler: into_handler(handler),
        }
    }

    pub fn with_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Whether this handler accepts updates of `kind`.
    pub fn accepts(&self, kind: &str) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|k| k == kind)
    }
}

macro_rules! debug_record {
    ($ty:ident, $($field:ident),*) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))*
                    .finish_non_exhaustive()
            }
        }
    };
}

debug_record!(CommandHandler, name, module, tags);
debug_record!(Watcher, module, display_name, tags);
debug_record!(RawHandler, id, module, kinds, tags);

// ============================================================================
// Registry contract
// ============================================================================

/// Read access to registered handlers.
pub trait ModuleRegistry: Send + Sync + 'static {
    /// Resolves a typed command token.
    ///
    /// Returns the canonical name (the token itself when nothing matched) and
    /// the handler, if any.
    fn dispatch(&self, command: &str) -> (String, Option<Arc<CommandHandler>>);

    /// Every registered watcher.
    fn watchers(&self) -> Vec<Arc<Watcher>>;

    /// Every registered raw handler.
    fn raw_handlers(&self) -> Vec<Arc<RawHandler>> {
        Vec::new()
    }
}

// ============================================================================
// In-memory registry
// ============================================================================

/// An in-memory [`ModuleRegistry`].
#[derive(Default)]
pub struct Modules {
    commands: RwLock<HashMap<String, Arc<CommandHandler>>>,
    aliases: RwLock<HashMap<String, String>>,
    watchers: RwLock<Vec<Arc<Watcher>>>,
    raw: RwLock<Vec<Arc<RawHandler>>>,
}

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command along with the aliases declared in its tags.
    ///
    /// A command registered under an existing name replaces it.
    pub fn register_command(&self, command: CommandHandler) {
        let name = command.name.to_lowercase();
        {
            let mut aliases = self.aliases.write();
            for alias in command.tags.alias_names() {
                aliases.insert(alias.to_lowercase(), name.clone());
            }
        }
        debug!(command = %name, module = %command.module, "Registered command");
        self.commands.write().insert(name, Arc::new(command));
    }

    pub fn register_watcher(&self, watcher: Watcher) {
        debug!(watcher = %watcher.display_name, module = %watcher.module, "Registered watcher");
        self.watchers.write().push(Arc::new(watcher));
    }

    pub fn register_raw(&self, handler: RawHandler) {
        debug!(id = %handler.id, module = %handler.module, "Registered raw handler");
        self.raw.write().push(Arc::new(handler));
    }

    /// Points `alias` at `command`. Fails when the command is unknown.
    pub fn add_alias(&self, alias: &str, command: &str) -> bool {
        let command = command.to_lowercase();
        if !self.commands.read().contains_key(&command) {
            return false;
        }
        self.aliases.write().insert(alias.to_lowercase(), command);
        true
    }

    pub fn remove_alias(&self, alias: &str) -> bool {
        self.aliases.write().remove(&alias.to_lowercase()).is_some()
    }

    /// Drops every handler owned by `module` and the aliases pointing at its
    /// commands.
    pub fn unregister_module(&self, module: &str) {
        let mut commands = self.commands.write();
        commands.retain(|_, c| c.module != module);
        self.aliases
            .write()
            .retain(|_, target| commands.contains_key(target));
        drop(commands);

        self.watchers.write().retain(|w| w.module != module);
        self.raw.write().retain(|r| r.module != module);
        debug!(module, "Unregistered module");
    }
}

impl ModuleRegistry for Modules {
    fn dispatch(&self, command: &str) -> (String, Option<Arc<CommandHandler>>) {
        let key = command.to_lowercase();
        let commands = self.commands.read();

        if let Some(handler) = commands.get(&key) {
            return (handler.name.clone(), Some(handler.clone()));
        }

        if let Some(target) = self.aliases.read().get(&key)
            && let Some(handler) = commands.get(target)
        {
            return (handler.name.clone(), Some(handler.clone()));
        }

        (command.to_string(), None)
    }

    fn watchers(&self) -> Vec<Arc<Watcher>> {
        self.watchers.read().clone()
    }

    fn raw_handlers(&self) -> Vec<Arc<RawHandler>> {
        self.raw.read().clone()
    }
}
