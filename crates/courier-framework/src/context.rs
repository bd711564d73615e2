//! Handler context.
//!
//! Every handler receives an `Arc<Context>`. It carries the update as the
//! dispatcher left it (prefix translated, alias canonicalized, grep clause
//! stripped), the transport client, and the pending [`OutputFilter`] if the
//! command was piped into grep.
//!
//! All outbound text goes through [`Context::edit`], [`Context::reply`],
//! [`Context::respond`] or [`Context::answer`], which apply the filter before
//! handing the text to the client.
//!
//! ```rust,ignore
//! async fn ping(ctx: Arc<Context>) -> anyhow::Result<()> {
//!     ctx.answer(&format!("pong {}", ctx.args())).await?;
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use courier_core::{BoxedClient, Message, TransportError, TransportResult, Update};

use crate::grep::OutputFilter;

/// The context handed to handlers.
pub struct Context {
    update: Update,
    client: BoxedClient,
    filter: Option<OutputFilter>,
    prefix: Option<String>,
    command: Option<String>,
}

impl Context {
    /// Creates a context for a watcher or raw handler.
    pub fn new(update: Update, client: BoxedClient) -> Self {
        Self {
            update,
            client,
            filter: None,
            prefix: None,
            command: None,
        }
    }

    /// Records the command this context was dispatched for.
    pub fn with_command(mut self, prefix: impl Into<String>, command: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self.command = Some(command.into());
        self
    }

    /// Attaches an output filter.
    pub fn with_filter(mut self, filter: Option<OutputFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    /// The message, if the update carries one.
    pub fn message(&self) -> Option<&Message> {
        self.update.message()
    }

    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    /// The grep filter applied to outbound text, if any.
    pub fn filter(&self) -> Option<&OutputFilter> {
        self.filter.as_ref()
    }

    /// Prefix the command was typed with.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Canonical command name.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Plain message text, `""` for updates without a message.
    pub fn text(&self) -> &str {
        self.message().map_or("", Message::raw_text)
    }

    /// Everything after the first whitespace-delimited token.
    pub fn args(&self) -> &str {
        let text = self.text().trim_start();
        text.split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest.trim())
    }

    fn render<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match &self.filter {
            Some(filter) => Cow::Owned(filter.apply(text)),
            None => Cow::Borrowed(text),
        }
    }

    fn require_message(&self) -> TransportResult<&Message> {
        self.message().ok_or(TransportError::NoMessage)
    }

    /// Replaces the text of the message.
    pub async fn edit(&self, text: &str) -> TransportResult<()> {
        let message = self.require_message()?;
        self.client.edit(message, &self.render(text)).await
    }

    /// Replies to the message.
    pub async fn reply(&self, text: &str) -> TransportResult<()> {
        let message = self.require_message()?;
        self.client.reply(message, &self.render(text)).await
    }

    /// Sends text to the update's chat.
    pub async fn respond(&self, text: &str) -> TransportResult<()> {
        let chat_id = self.update.chat_id().ok_or(TransportError::NoMessage)?;
        self.client.respond(chat_id, &self.render(text)).await
    }

    /// Edits the client's own messages and replies to everyone else's.
    pub async fn answer(&self, text: &str) -> TransportResult<()> {
        if self.require_message()?.out {
            self.edit(text).await
        } else {
            self.reply(text).await
        }
    }

    /// Like [`answer`](Self::answer), but bypasses the output filter.
    pub async fn answer_unfiltered(&self, text: &str) -> TransportResult<()> {
        let message = self.require_message()?;
        if message.out {
            self.client.edit(message, text).await
        } else {
            self.client.reply(message, text).await
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("update", &self.update)
            .field("command", &self.command)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

/// A shared context.
pub type SharedContext = Arc<Context>;
