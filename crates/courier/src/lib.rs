//! # Courier
//!
//! Message routing for userbot-style chat automation.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────┐     ┌────────────┐────▶ command handler (own task)
//! │ Transport │────▶│ Runtime │────▶│ Dispatcher │────▶ watchers        (own task each)
//! │ (Client)  │     │ ingress │     │            │────▶ raw handlers    (own task each)
//! └───────────┘     └─────────┘     └────────────┘
//! ```
//!
//! - **Transport**: implements [`Client`](core::Client) and feeds updates into
//!   an [`EventSender`](runtime::EventSender)
//! - **Runtime**: configuration, logging, and the serial ingress loop
//! - **Dispatcher**: prefix and alias resolution, access lists, nickname
//!   rules, tag predicates, `| grep` filtering
//! - **Handlers**: async functions over `Arc<Context>`; failures are reported,
//!   never propagated
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn ping(ctx: Arc<Context>) -> anyhow::Result<()> {
//!     ctx.answer("🏓 Pong").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let modules = Arc::new(Modules::new());
//!     modules.register_command(
//!         CommandHandler::new("ping", "tester", ping)
//!             .with_tags(TagSet::new().alias("p")),
//!     );
//!
//!     let runtime = CourierRuntime::builder(client).modules(modules).build()?;
//!     transport.start(runtime.sender());
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: `courier.toml` configuration files (default)
//! - `yaml-config`: `courier.yaml` configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

/// Commonly used types for writing modules and wiring a runtime.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use courier_runtime::{ConfigLoader, CourierConfig, CourierRuntime, EventSender};

    // Registration
    pub use courier_framework::{CommandHandler, ModuleRegistry, Modules, RawHandler, Watcher};

    // Handlers
    pub use courier_framework::{Context, HandlerError, HandlerResult};

    // Dispatch
    pub use courier_framework::{Dispatcher, OwnerOnly, SecurityCheck};

    // Core types
    pub use courier_core::{
        Chat, Client, ConfigStore, ConfigStoreExt, Identity, MemoryStore, Message, RawUpdate,
        Tag, TagSet, TransportError, TransportResult, Update,
    };

    // Logging
    pub use courier_runtime::prelude::*;
}
