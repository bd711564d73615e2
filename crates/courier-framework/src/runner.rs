//! Task runner and failure isolation.
//!
//! Every handler invocation runs on its own tokio task. The task awaits the
//! handler, catches panics, and hands any failure to a [`FailureHandler`].
//! Nothing a handler does can reach the dispatcher's control flow.
//!
//! ```text
//! Dispatcher ──spawn──▶ ┌──────────── task ────────────┐
//!                       │ catch_unwind(handler(ctx))   │
//!                       │   Ok(Ok(()))  → done         │
//!                       │   Ok(Err(e))  → on_failure   │
//!                       │   Err(panic)  → on_failure   │
//!                       └──────────────────────────────┘
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span};

use courier_core::{ConfigStore, TransportError};

use crate::context::Context;
use crate::error::HandlerError;
use crate::handler::BoxedHandler;
use crate::markup::escape_html;
use crate::settings::Settings;

/// Receives the failure of a spawned handler.
#[async_trait]
pub trait FailureHandler: Send + Sync + 'static {
    async fn on_failure(&self, ctx: &Context, error: HandlerError);
}

/// What kind of handler a task runs, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Command,
    Watcher,
    Raw,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Watcher => "watcher",
            Self::Raw => "raw",
        }
    }
}

/// Spawns handler invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRunner;

impl TaskRunner {
    /// Starts `handler` on the current runtime and returns immediately.
    pub fn spawn(
        &self,
        kind: TaskKind,
        name: &str,
        handler: BoxedHandler,
        ctx: Arc<Context>,
        on_failure: Arc<dyn FailureHandler>,
    ) -> JoinHandle<()> {
        let span = info_span!("handler", kind = kind.as_str(), name = %name);

        let task = async move {
            let invocation = AssertUnwindSafe(async { handler.call(ctx.clone()).await });
            let error = match invocation.catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e,
                Err(panic) => HandlerError::from_panic(panic),
            };
            on_failure.on_failure(&ctx, error).await;
        };

        tokio::spawn(task.instrument(span))
    }
}

// ============================================================================
// Command failures
// ============================================================================

/// Reports command failures back into the chat.
pub struct CommandFailure {
    store: Arc<dyn ConfigStore>,
}

impl CommandFailure {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Builds the report shown for `error`.
    pub fn report(&self, command: &str, error: &HandlerError) -> String {
        let call = format!("<b>Call</b> <code>{}</code>", escape_html(command));

        match error.transport() {
            Some(TransportError::FloodWait { seconds, request }) => format!(
                "⏳ {call} <b>failed due to FloodWait. Wait {} ({})</b>",
                format_wait(*seconds),
                escape_html(request)
            ),
            Some(transport) => format!(
                "🚫 {call} <b>failed due to RPC (Telegram) error:</b> <code>{}</code>",
                escape_html(&transport.to_string())
            ),
            None if Settings::new(self.store.as_ref()).inline_logs() => format!(
                "🚫 {call} <b>failed!</b>\n\n<b>🧾 Logs:</b>\n<pre><code class=\"language-logs\">{}</code></pre>",
                escape_html(&error.details())
            ),
            None => format!("🚫 {call} <b>failed!</b>"),
        }
    }
}

#[async_trait]
impl FailureHandler for CommandFailure {
    async fn on_failure(&self, ctx: &Context, error: HandlerError) {
        error!(error = %error.details(), "Command failed");

        let report = self.report(ctx.text(), &error);
        if let Err(e) = ctx.answer_unfiltered(&report).await {
            debug!(error = %e, "Could not deliver failure report");
        }
    }
}

/// Logs watcher and raw handler failures without touching the chat.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatcherFailure;

#[async_trait]
impl FailureHandler for WatcherFailure {
    async fn on_failure(&self, _ctx: &Context, error: HandlerError) {
        error!(error = %error.details(), "Error running watcher");
    }
}

/// Renders a wait as `H hours, M minutes, S seconds`, omitting zero parts.
pub fn format_wait(total: u64) -> String {
    let parts = [
        (total / 3600, "hours"),
        ((total % 3600) / 60, "minutes"),
        (total % 60, "seconds"),
    ];
    let rendered: Vec<String> = parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}"))
        .collect();

    if rendered.is_empty() {
        "0 seconds".to_string()
    } else {
        rendered.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::into_handler;
    use crate::settings::{MAIN_NAMESPACE, keys};
    use courier_core::{Chat, Client, Identity, MemoryStore, Message, TransportResult};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct RecordingClient {
        identity: Identity,
        sent: Mutex<Vec<(&'static str, String)>>,
        fail: bool,
    }

    impl RecordingClient {
        fn record(&self, op: &'static str, text: &str) -> TransportResult<()> {
            self.sent.lock().push((op, text.to_string()));
            if self.fail {
                Err(TransportError::Disconnected("gone".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Client for RecordingClient {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        async fn edit(&self, _: &Message, text: &str) -> TransportResult<()> {
            self.record("edit", text)
        }
        async fn reply(&self, _: &Message, text: &str) -> TransportResult<()> {
            self.record("reply", text)
        }
        async fn respond(&self, _: i64, text: &str) -> TransportResult<()> {
            self.record("respond", text)
        }
    }

    fn context(client: Arc<RecordingClient>, out: bool) -> Arc<Context> {
        let mut message = Message::new(1, Chat::private(1), ".boom <x>");
        message.out = out;
        Arc::new(Context::new(message.into(), client))
    }

    fn failure(inline_logs: bool) -> Arc<CommandFailure> {
        let store = MemoryStore::new();
        store.set(MAIN_NAMESPACE, keys::INLINE_LOGS, json!(inline_logs));
        Arc::new(CommandFailure::new(Arc::new(store)))
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(3725), "1 hours, 2 minutes, 5 seconds");
        assert_eq!(format_wait(120), "2 minutes");
        assert_eq!(format_wait(3600), "1 hours");
        assert_eq!(format_wait(0), "0 seconds");
    }

    #[test]
    fn test_flood_wait_report() {
        let err = HandlerError::from(TransportError::flood_wait(65, "SendMessage"));
        let report = failure(true).report(".spam", &err);
        assert!(report.starts_with("⏳"));
        assert!(report.contains("<code>.spam</code>"));
        assert!(report.contains("1 minutes, 5 seconds"));
        assert!(report.contains("SendMessage"));
    }

    #[test]
    fn test_rpc_report_shows_raw_error() {
        let err = HandlerError::from(TransportError::rpc(400, "MESSAGE_EMPTY", "EditMessage"));
        let report = failure(true).report(".x", &err);
        assert!(report.contains("RPC (Telegram) error"));
        assert!(report.contains("MESSAGE_EMPTY"));
    }

    #[test]
    fn test_generic_report_honours_inline_logs() {
        let err = HandlerError::msg("division by zero");
        let verbose = failure(true).report(".calc", &err);
        assert!(verbose.contains("🧾 Logs:"));
        assert!(verbose.contains("division by zero"));

        let quiet = failure(false).report(".calc", &err);
        assert_eq!(quiet, "🚫 <b>Call</b> <code>.calc</code> <b>failed!</b>");
    }

    #[tokio::test]
    async fn test_failed_command_is_reported_by_edit_when_outgoing() {
        let client = Arc::new(RecordingClient::default());
        let handler = into_handler(|_ctx: Arc<Context>| async { Err::<(), _>(HandlerError::msg("bad")) });

        let handle = TaskRunner.spawn(
            TaskKind::Command,
            "boom",
            handler,
            context(client.clone(), true),
            failure(false),
        );
        assert_ok!(handle.await);

        let sent = client.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "edit");
        assert!(sent[0].1.contains("<code>.boom &lt;x&gt;</code>"));
    }

    async fn explode(_ctx: Arc<Context>) {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn test_panic_is_reported_by_reply_when_incoming() {
        let client = Arc::new(RecordingClient::default());
        let handler = into_handler(explode);

        let handle = TaskRunner.spawn(
            TaskKind::Command,
            "boom",
            handler,
            context(client.clone(), false),
            failure(true),
        );
        assert_ok!(handle.await, "panic must not escape the task");

        let sent = client.sent.lock().clone();
        assert_eq!(sent[0].0, "reply");
        assert!(sent[0].1.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_report_delivery_failure_is_swallowed() {
        let client = Arc::new(RecordingClient {
            fail: true,
            ..Default::default()
        });
        let handler = into_handler(|_ctx: Arc<Context>| async { Err::<(), _>(HandlerError::msg("bad")) });

        let handle = TaskRunner.spawn(
            TaskKind::Command,
            "boom",
            handler,
            context(client.clone(), true),
            failure(false),
        );
        assert!(handle.await.is_ok());
        assert_eq!(client.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_watcher_failure_stays_silent() {
        let client = Arc::new(RecordingClient::default());
        let handler = into_handler(|_ctx: Arc<Context>| async { Err::<(), _>(HandlerError::msg("bad")) });

        TaskRunner
            .spawn(
                TaskKind::Watcher,
                "Tester",
                handler,
                context(client.clone(), true),
                Arc::new(WatcherFailure),
            )
            .await
            .unwrap();

        assert!(client.sent.lock().is_empty());
    }
}
