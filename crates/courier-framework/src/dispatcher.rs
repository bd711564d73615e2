//! Update dispatcher.
//!
//! The [`Dispatcher`] decides which handlers an [`Update`] reaches and spawns
//! them. It runs three independent paths for every update:
//!
//! 1. **Commands** (`handle_command`): the message text is resolved against
//!    the prefix and the registry, then gated. At most one handler runs.
//! 2. **Watchers** (`handle_incoming`): every watcher whose gates pass runs.
//! 3. **Raw handlers** (`handle_raw`): every raw handler accepting the update
//!    kind runs, gated by the chat lists and by its tags when it declares any.
//!
//! Command resolution walks these stages and stops at the first rejection:
//!
//! ```text
//! Received → prefix (escape?) → layout → chat gate → token → @suffix
//!          → nickname rules → registry → security → canonicalize
//!          → module gate → tags → grep → Dispatched
//! ```
//!
//! Rejections are logged at debug level and are otherwise silent. An escaped
//! command (`..ping`) is the one rejection with a side effect: the message is
//! edited to the literal text with one prefix removed.
//!
//! Gating happens on the caller's task; handlers always run on their own
//! tasks, so `handle` returns as soon as everything is spawned.
//!
//! # Example
//!
//! ```rust,ignore
//! let modules = Arc::new(Modules::new());
//! modules.register_command(CommandHandler::new("ping", "tester", ping));
//!
//! let dispatcher = Dispatcher::builder(client)
//!     .modules(modules.clone())
//!     .build();
//!
//! dispatcher.handle(update).await;
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span};

use courier_core::{BoxedClient, ConfigStore, MemoryStore, Message, Tag, TagSet, Update};

use crate::access::AccessDenial;
use crate::context::Context;
use crate::grep::{OutputFilter, strip_grep};
use crate::layout::translate_layout;
use crate::predicate::first_failing;
use crate::prefix::{
    CommandToken, DEFAULT_PREFIX, is_escaped, nickname_required, resolve_prefix, unescape,
};
use crate::registry::{CommandHandler, ModuleRegistry, Modules};
use crate::runner::{CommandFailure, FailureHandler, TaskKind, TaskRunner, WatcherFailure};
use crate::security::{OwnerOnly, SecurityCheck};
use crate::settings::Settings;

// ============================================================================
// Resolution
// ============================================================================

/// Whether a resolution is real or a side-effect-free probe.
///
/// Probes back the `no_commands` / `only_commands` tags. They skip grep
/// stripping and never evaluate those two tags themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Dispatch,
    Probe,
}

/// Why an update did not resolve to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoMessage,
    EmptyText,
    NoPrefix,
    Access(AccessDenial),
    OnlyPrefix,
    ForeignSuffix(String),
    NicknameRequired,
    UnknownCommand(String),
    Forbidden,
    Tag(Tag),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMessage => f.write_str("update carries no message"),
            Self::EmptyText => f.write_str("message has no text"),
            Self::NoPrefix => f.write_str("text does not start with the prefix"),
            Self::Access(denial) => denial.fmt(f),
            Self::OnlyPrefix => f.write_str("message is just the prefix"),
            Self::ForeignSuffix(suffix) => write!(f, "command is addressed to @{suffix}"),
            Self::NicknameRequired => f.write_str("command needs a nickname in this chat"),
            Self::UnknownCommand(name) => write!(f, "no command named {name}"),
            Self::Forbidden => f.write_str("security check failed"),
            Self::Tag(tag) => write!(f, "tag {tag} rejected the update"),
        }
    }
}

/// A command ready to be spawned.
#[derive(Debug)]
pub struct Resolved {
    /// The update with its text translated, canonicalized and grep-stripped.
    pub update: Update,
    pub prefix: String,
    /// Canonical command name.
    pub command: String,
    pub handler: Arc<CommandHandler>,
    pub filter: Option<OutputFilter>,
}

/// Outcome of resolving an update.
#[derive(Debug)]
pub enum Resolution {
    /// A doubled-prefix escape; holds the message as it should be edited.
    Escaped(Box<Message>),
    Rejected(Rejection),
    Command(Box<Resolved>),
}

impl Resolution {
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Command(_))
    }
}

impl From<Rejection> for Resolution {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

// ============================================================================
// Spawned tasks
// ============================================================================

/// The tasks spawned for one update.
#[derive(Debug, Default)]
pub struct Spawned {
    /// The command task, or the escape edit.
    pub command: Option<JoinHandle<()>>,
    pub watchers: Vec<JoinHandle<()>>,
    pub raw: Vec<JoinHandle<()>>,
}

impl Spawned {
    /// Number of spawned tasks.
    pub fn len(&self) -> usize {
        usize::from(self.command.is_some()) + self.watchers.len() + self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for every spawned task to finish.
    pub async fn wait(self) {
        let handles = self.command.into_iter().chain(self.watchers).chain(self.raw);
        for result in join_all(handles).await {
            if let Err(e) = result {
                debug!(error = %e, "Handler task did not complete");
            }
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

struct Inner {
    client: BoxedClient,
    store: Arc<dyn ConfigStore>,
    modules: Arc<dyn ModuleRegistry>,
    security: Arc<dyn SecurityCheck>,
    command_failure: Arc<dyn FailureHandler>,
    watcher_failure: Arc<dyn FailureHandler>,
    fallback_prefix: String,
    runner: TaskRunner,
}

/// Routes updates to command, watcher and raw handlers.
///
/// Cloning is cheap; clones share all collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn builder(client: BoxedClient) -> DispatcherBuilder {
        DispatcherBuilder::new(client)
    }

    pub fn client(&self) -> &BoxedClient {
        &self.inner.client
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.inner.store
    }

    pub fn modules(&self) -> &Arc<dyn ModuleRegistry> {
        &self.inner.modules
    }

    fn settings(&self) -> Settings<'_> {
        Settings::new(self.inner.store.as_ref())
    }

    /// Runs the command, watcher and raw paths for `update`, in that order.
    pub async fn handle(&self, update: Update) -> Spawned {
        let span = debug_span!("update", kind = %update.kind(), chat = ?update.chat_id());

        async {
            Spawned {
                command: self.handle_command(&update).await,
                watchers: self.handle_incoming(&update).await,
                raw: self.handle_raw(&update).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Resolves `update` as a command and spawns its handler.
    ///
    /// Returns the handler task, or the edit task of an escaped command.
    pub async fn handle_command(&self, update: &Update) -> Option<JoinHandle<()>> {
        match self.resolve(update, ResolveMode::Dispatch).await {
            Resolution::Escaped(message) => {
                debug!(message_id = message.id, "Escaped command, editing to literal text");
                let client = self.inner.client.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = client.edit(&message, message.storage()).await {
                        debug!(error = %e, "Could not edit escaped command");
                    }
                }))
            }
            Resolution::Rejected(reason) => {
                debug!(%reason, "Not a command");
                None
            }
            Resolution::Command(resolved) => {
                let Resolved {
                    update,
                    prefix,
                    command,
                    handler,
                    filter,
                } = *resolved;
                debug!(%command, module = %handler.module, "Dispatching command");

                let ctx = Context::new(update, self.inner.client.clone())
                    .with_command(prefix, command.clone())
                    .with_filter(filter);
                Some(self.inner.runner.spawn(
                    TaskKind::Command,
                    &command,
                    handler.handler.clone(),
                    Arc::new(ctx),
                    self.inner.command_failure.clone(),
                ))
            }
        }
    }

    /// Spawns every watcher whose gates pass for `update`.
    pub async fn handle_incoming(&self, update: &Update) -> Vec<JoinHandle<()>> {
        let settings = self.settings();
        let access = settings.access_lists();
        let chat_id = update.chat_id();

        if let Some(chat_id) = chat_id
            && let Err(denial) = access.check_chat(chat_id)
        {
            debug!(%denial, "Skipping watchers");
            return Vec::new();
        }

        let disabled = settings.disabled_watchers();
        let mut spawned = Vec::new();

        for watcher in self.inner.modules.watchers() {
            if let Some(message) = update.message()
                && disabled.is_disabled(&watcher.display_name, message)
            {
                continue;
            }
            if let Some(chat_id) = chat_id
                && access.check_module(chat_id, &watcher.module).is_err()
            {
                continue;
            }
            if let Some(tag) = self.check_tags(update, &watcher.tags, ResolveMode::Dispatch).await {
                debug!(watcher = %watcher.display_name, %tag, "Watcher rejected by tag");
                continue;
            }

            let ctx = Context::new(update.clone(), self.inner.client.clone());
            spawned.push(self.inner.runner.spawn(
                TaskKind::Watcher,
                &watcher.display_name,
                watcher.handler.clone(),
                Arc::new(ctx),
                self.inner.watcher_failure.clone(),
            ));
        }

        spawned
    }

    /// Spawns every raw handler accepting the kind of `update`.
    ///
    /// Updates from a chat denied by the chat gate reach no raw handler.
    pub async fn handle_raw(&self, update: &Update) -> Vec<JoinHandle<()>> {
        if let Some(chat_id) = update.chat_id()
            && let Err(denial) = self.settings().access_lists().check_chat(chat_id)
        {
            debug!(%denial, "Skipping raw handlers");
            return Vec::new();
        }

        let mut spawned = Vec::new();

        for handler in self.inner.modules.raw_handlers() {
            if !handler.accepts(update.kind()) {
                continue;
            }
            if !handler.tags.is_empty()
                && let Some(tag) = self.check_tags(update, &handler.tags, ResolveMode::Dispatch).await
            {
                debug!(id = %handler.id, %tag, "Raw handler rejected by tag");
                continue;
            }

            let ctx = Context::new(update.clone(), self.inner.client.clone());
            spawned.push(self.inner.runner.spawn(
                TaskKind::Raw,
                &handler.id,
                handler.handler.clone(),
                Arc::new(ctx),
                self.inner.watcher_failure.clone(),
            ));
        }

        spawned
    }

    /// Evaluates `tags` against `update`, returning the first failing tag.
    ///
    /// Outside a probe, `no_commands` and `only_commands` are checked first by
    /// probing whether the update itself resolves as a command.
    pub async fn check_tags(&self, update: &Update, tags: &TagSet, mode: ResolveMode) -> Option<Tag> {
        let no_commands = tags.is_set(Tag::NoCommands);
        let only_commands = tags.is_set(Tag::OnlyCommands);

        if mode == ResolveMode::Dispatch && (no_commands || only_commands) {
            let is_command = self.resolve(update, ResolveMode::Probe).await.is_command();
            if no_commands && is_command {
                return Some(Tag::NoCommands);
            }
            if only_commands && !is_command {
                return Some(Tag::OnlyCommands);
            }
        }

        first_failing(update, tags)
    }

    /// Resolves `update` to a command without spawning anything.
    pub fn resolve<'a>(&'a self, update: &'a Update, mode: ResolveMode) -> BoxFuture<'a, Resolution> {
        Box::pin(self.resolve_command(update, mode))
    }

    async fn resolve_command(&self, update: &Update, mode: ResolveMode) -> Resolution {
        let mut update = update.clone();
        let Some(message) = update.message_mut() else {
            return Rejection::NoMessage.into();
        };

        let identity = self.inner.client.identity();
        let settings = self.settings();
        let prefix = resolve_prefix(&settings, identity.id, message, &self.inner.fallback_prefix);

        if message.storage().is_empty() {
            return Rejection::EmptyText.into();
        }

        if is_escaped(message, &prefix) {
            return Resolution::Escaped(Box::new(unescape(message, &prefix)));
        }

        if let Some(translated) = translate_layout(message.storage(), &prefix) {
            message.set_text(translated);
        }
        if !message.storage().starts_with(prefix.as_str()) {
            return Rejection::NoPrefix.into();
        }

        let access = settings.access_lists();
        let chat_id = message.chat_id();
        if let Err(denial) = access.check_chat(chat_id) {
            return Rejection::Access(denial).into();
        }

        let Some(token) = CommandToken::parse(message.storage(), &prefix) else {
            return Rejection::OnlyPrefix.into();
        };

        let known_names = identity.known_names();
        if !token.addresses(identity, &known_names, message.out) {
            return Rejection::ForeignSuffix(token.suffix.unwrap_or_default()).into();
        }
        if token.suffix.is_none()
            && nickname_required(&settings, self.inner.security.as_ref(), message, &token.token)
        {
            return Rejection::NicknameRequired.into();
        }

        let (command, handler) = self.inner.modules.dispatch(&token.name);
        let Some(handler) = handler else {
            return Rejection::UnknownCommand(command).into();
        };
        if !self.inner.security.check(message, &handler, &known_names).await {
            return Rejection::Forbidden.into();
        }

        message.rewrite_text(|text| token.canonicalize(text, &prefix, &command));

        if let Err(denial) = access.check_module(chat_id, &handler.module) {
            return Rejection::Access(denial).into();
        }

        if let Some(tag) = self.check_tags(&update, &handler.tags, mode).await {
            return Rejection::Tag(tag).into();
        }

        let mut filter = None;
        if mode == ResolveMode::Dispatch
            && settings.grep_enabled()
            && let Some(message) = update.message_mut()
        {
            filter = strip_grep(message);
        }

        Resolution::Command(Box::new(Resolved {
            update,
            prefix,
            command,
            handler,
            filter,
        }))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("fallback_prefix", &self.inner.fallback_prefix)
            .field("watchers", &self.inner.modules.watchers().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Dispatcher`].
///
/// Every collaborator except the client has a default: an empty
/// [`MemoryStore`], an empty [`Modules`] registry, and [`OwnerOnly`] security
/// with no extra owners.
pub struct DispatcherBuilder {
    client: BoxedClient,
    store: Option<Arc<dyn ConfigStore>>,
    modules: Option<Arc<dyn ModuleRegistry>>,
    security: Option<Arc<dyn SecurityCheck>>,
    command_failure: Option<Arc<dyn FailureHandler>>,
    watcher_failure: Option<Arc<dyn FailureHandler>>,
    fallback_prefix: String,
}

impl DispatcherBuilder {
    pub fn new(client: BoxedClient) -> Self {
        Self {
            client,
            store: None,
            modules: None,
            security: None,
            command_failure: None,
            watcher_failure: None,
            fallback_prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn modules(mut self, modules: Arc<dyn ModuleRegistry>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn security(mut self, security: Arc<dyn SecurityCheck>) -> Self {
        self.security = Some(security);
        self
    }

    /// Replaces the handler that reports command failures.
    pub fn command_failure(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.command_failure = Some(handler);
        self
    }

    /// Replaces the handler for watcher and raw handler failures.
    pub fn watcher_failure(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.watcher_failure = Some(handler);
        self
    }

    /// Prefix used when the store has no entry for the acting account.
    pub fn fallback_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.fallback_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Dispatcher {
        let store: Arc<dyn ConfigStore> = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let command_failure = self
            .command_failure
            .unwrap_or_else(|| Arc::new(CommandFailure::new(store.clone())));

        Dispatcher {
            inner: Arc::new(Inner {
                client: self.client,
                modules: self.modules.unwrap_or_else(|| Arc::new(Modules::new())),
                security: self
                    .security
                    .unwrap_or_else(|| Arc::new(OwnerOnly::default())),
                command_failure,
                watcher_failure: self.watcher_failure.unwrap_or_else(|| Arc::new(WatcherFailure)),
                fallback_prefix: self.fallback_prefix,
                runner: TaskRunner,
                store,
            }),
        }
    }
}
