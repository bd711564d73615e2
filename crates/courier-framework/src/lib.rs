//! # Courier Framework
//!
//! The command dispatcher and everything it is built from.
//!
//! This layer provides:
//! - [`Dispatcher`]: prefix and alias resolution, gating, and fan-out to
//!   command, watcher and raw handlers
//! - Tag predicates, access lists and nickname rules
//! - Keyboard layout translation and `| grep` output filtering
//! - [`TaskRunner`]: one task per handler, with failures routed into a
//!   [`FailureHandler`]
//! - [`Modules`]: an in-memory [`ModuleRegistry`]
//!
//! Handlers are plain async functions over an `Arc<Context>`:
//!
//! ```rust,ignore
//! use courier_framework::{CommandHandler, Context, Modules};
//!
//! async fn ping(ctx: Arc<Context>) -> anyhow::Result<()> {
//!     ctx.answer("pong").await?;
//!     Ok(())
//! }
//!
//! let modules = Modules::new();
//! modules.register_command(CommandHandler::new("ping", "tester", ping));
//! ```

pub mod access;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod grep;
pub mod handler;
pub mod layout;
pub mod markup;
pub mod predicate;
pub mod prefix;
pub mod registry;
pub mod runner;
pub mod security;
pub mod settings;

pub use access::{AccessDenial, AccessLists, DisableScope, DisabledWatchers, KeyList, module_key};
pub use context::{Context, SharedContext};
pub use dispatcher::{
    Dispatcher, DispatcherBuilder, Rejection, ResolveMode, Resolution, Resolved, Spawned,
};
pub use error::{HandlerError, HandlerResult};
pub use grep::{NO_LINES, OutputFilter, strip_grep};
pub use handler::{BoxFuture, BoxedHandler, Handler, IntoHandlerResult, into_handler};
pub use layout::{translate, translate_layout};
pub use markup::{escape_html, strip_html};
pub use predicate::{first_failing, holds};
pub use prefix::{CommandToken, DEFAULT_PREFIX};
pub use registry::{CommandHandler, ModuleRegistry, Modules, RawHandler, Watcher};
pub use runner::{CommandFailure, FailureHandler, TaskKind, TaskRunner, WatcherFailure, format_wait};
pub use security::{AllowAll, OwnerOnly, SecurityCheck};
pub use settings::{MAIN_NAMESPACE, Settings, keys};
