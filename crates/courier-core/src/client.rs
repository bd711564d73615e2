//! Transport client contract.
//!
//! The dispatcher never talks to the messaging platform directly. It only
//! calls the operations of a [`Client`] supplied by the transport layer, and
//! reads the client's own [`Identity`] to validate `@username` suffixes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::event::Message;

/// Who the client is logged in as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Account id.
    pub id: i64,
    /// Primary username, without `@`.
    pub username: Option<String>,
    /// Additional collectible usernames, without `@`.
    pub usernames: Vec<String>,
}

impl Identity {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_usernames<I, S>(mut self, usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.usernames.extend(usernames.into_iter().map(Into::into));
        self
    }

    /// Lowercased names the client answers to.
    ///
    /// The primary username comes first; an account without one is known by
    /// its id instead.
    pub fn known_names(&self) -> Vec<String> {
        let primary = self
            .username
            .as_deref()
            .map_or_else(|| self.id.to_string(), str::to_lowercase);

        std::iter::once(primary)
            .chain(self.usernames.iter().map(|u| u.to_lowercase()))
            .collect()
    }
}

/// Operations the transport exposes for answering events.
///
/// Implementations deliver the text verbatim; any output filtering has
/// already been applied by the caller.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Returns the identity of the logged-in account.
    fn identity(&self) -> &Identity;

    /// Replaces the text of `message`.
    async fn edit(&self, message: &Message, text: &str) -> TransportResult<()>;

    /// Sends `text` as a reply to `message`.
    async fn reply(&self, message: &Message, text: &str) -> TransportResult<()>;

    /// Sends `text` to a chat without quoting anything.
    async fn respond(&self, chat_id: i64, text: &str) -> TransportResult<()>;
}

/// A type-erased, shareable client.
pub type BoxedClient = Arc<dyn Client>;
