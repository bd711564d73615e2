//! Permission checks.
//!
//! The dispatcher treats security as a single yes/no question asked after a
//! command has been resolved. [`SecurityCheck::has_command_exemption`] is the
//! second, narrower question used by the nickname rules: whether a user was
//! granted a specific command outright.

use async_trait::async_trait;

use courier_core::Message;

use crate::registry::CommandHandler;

/// The security collaborator.
#[async_trait]
pub trait SecurityCheck: Send + Sync + 'static {
    /// Whether `message` may run `handler`.
    ///
    /// `usernames` are the lowercased names the client answers to.
    async fn check(&self, message: &Message, handler: &CommandHandler, usernames: &[String])
    -> bool;

    /// Whether `user_id` holds a targeted grant for `command`.
    fn has_command_exemption(&self, _user_id: i64, _command: &str) -> bool {
        false
    }
}

/// Allows the client's own messages and a fixed set of owners.
#[derive(Debug, Clone, Default)]
pub struct OwnerOnly {
    owners: Vec<i64>,
}

impl OwnerOnly {
    pub fn new<I: IntoIterator<Item = i64>>(owners: I) -> Self {
        Self {
            owners: owners.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SecurityCheck for OwnerOnly {
    async fn check(&self, message: &Message, _: &CommandHandler, _: &[String]) -> bool {
        message.out || message.sender_id.is_some_and(|id| self.owners.contains(&id))
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl SecurityCheck for AllowAll {
    async fn check(&self, _: &Message, _: &CommandHandler, _: &[String]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use courier_core::Chat;
    use std::sync::Arc;

    async fn noop(_ctx: Arc<Context>) {}

    #[tokio::test]
    async fn test_owner_only() {
        let security = OwnerOnly::new([7]);
        let handler = CommandHandler::new("ping", "tester", noop);

        let own = Message::new(1, Chat::group(1), ".ping").outgoing();
        let owner = Message::new(2, Chat::group(1), ".ping").from_sender(7);
        let stranger = Message::new(3, Chat::group(1), ".ping").from_sender(8);

        assert!(security.check(&own, &handler, &[]).await);
        assert!(security.check(&owner, &handler, &[]).await);
        assert!(!security.check(&stranger, &handler, &[]).await);
        assert!(!security.has_command_exemption(8, "ping"));
    }
}
