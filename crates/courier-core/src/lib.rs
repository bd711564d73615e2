//! # Courier Core
//!
//! Data model and collaborator contracts for the Courier dispatcher.
//!
//! This crate holds everything the dispatcher consumes but does not own:
//!
//! - **Events**: [`Update`], [`Message`] and their chat/media descriptors
//! - **Tags**: the closed [`Tag`] enumeration and per-handler [`TagSet`]
//! - **Transport**: the [`Client`] contract and the client's [`Identity`]
//! - **Settings**: the namespaced [`ConfigStore`] contract and [`MemoryStore`]
//! - **Errors**: [`TransportError`] as reported by the transport
//!
//! ```text
//! ┌───────────┐  Update   ┌────────────┐  Arc<Context>  ┌──────────┐
//! │ Transport │──────────▶│ Dispatcher │───────────────▶│ Handler  │
//! │ (Client)  │◀──────────│            │                │  task    │
//! └───────────┘  edit /   └────────────┘                └──────────┘
//!                reply          │ get / set
//!                               ▼
//!                        ┌─────────────┐
//!                        │ ConfigStore │
//!                        └─────────────┘
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod store;
pub mod tags;

pub use client::{BoxedClient, Client, Identity};
pub use error::{TransportError, TransportResult};
pub use event::{Chat, ChatKind, Media, MediaKind, Message, RawUpdate, Update, normalize_chat_id};
pub use store::{ConfigStore, ConfigStoreExt, MemoryStore};
pub use tags::{FilterFn, Tag, TagSet, TagValue, UnknownTag};
