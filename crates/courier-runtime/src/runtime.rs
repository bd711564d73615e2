//! Runtime orchestration.
//!
//! The transport pushes updates into an [`EventSender`]. One ingress loop
//! drains the bounded queue and hands each update to the [`Dispatcher`] in
//! arrival order. Gating is serial; handlers run on their own tasks, so a slow
//! handler never holds up the next update.
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::builder(client)
//!     .modules(modules)
//!     .build()?;
//!
//! let events = runtime.sender();
//! tokio::spawn(async move { transport.forward_into(events).await });
//!
//! // Until Ctrl+C or SIGTERM
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{BoxedClient, ConfigStore, MemoryStore, Update};
use courier_framework::{Dispatcher, ModuleRegistry, Modules, OwnerOnly, SecurityCheck};

use crate::config::{ConfigLoader, CourierConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

// =============================================================================
// EventSender
// =============================================================================

/// Handle the transport uses to feed updates into the runtime.
///
/// Cloning is cheap; all clones feed the same queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Update>,
}

impl EventSender {
    /// Queues `update`, waiting while the queue is full.
    pub async fn send(&self, update: impl Into<Update>) -> RuntimeResult<()> {
        self.tx
            .send(update.into())
            .await
            .map_err(|_| RuntimeError::IngressClosed)
    }

    /// Queues `update` without waiting.
    pub fn try_send(&self, update: impl Into<Update>) -> RuntimeResult<()> {
        self.tx.try_send(update.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RuntimeError::IngressFull,
            mpsc::error::TrySendError::Closed(_) => RuntimeError::IngressClosed,
        })
    }

    /// Whether the ingress loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// CourierRuntime
// =============================================================================

/// Owns the dispatcher and its ingress loop.
pub struct CourierRuntime {
    config: CourierConfig,
    dispatcher: Dispatcher,
    sender: EventSender,
    receiver: Mutex<Option<mpsc::Receiver<Update>>>,
    shutdown: CancellationToken,
}

impl CourierRuntime {
    pub fn builder(client: BoxedClient) -> RuntimeBuilder {
        RuntimeBuilder::new(client)
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A new handle for feeding updates in.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Token that stops the ingress loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Asks a running ingress loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Runs until Ctrl+C, SIGTERM, or [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Courier runtime is now running. Press Ctrl+C to stop.");
        let signals = wait_for_signal();
        tokio::pin!(signals);

        let token = self.shutdown.clone();
        let mut signal_error = None;
        self.run_until(async {
            tokio::select! {
                result = &mut signals => signal_error = result.err(),
                _ = token.cancelled() => {}
            }
        })
        .await?;

        signal_error.map_or(Ok(()), |e| Err(RuntimeError::Signal(e)))
    }

    /// Runs until `shutdown` resolves or [`shutdown`](Self::shutdown) is called.
    ///
    /// Updates still queued at that point are dropped. Running handlers get
    /// `dispatcher.shutdown_grace_ms` to finish and are left detached after it.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::AlreadyStarted)?;
        tokio::pin!(shutdown);

        info!("Ingress loop started");
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.shutdown.cancelled() => break,
                next = receiver.recv() => {
                    let Some(update) = next else { break };
                    let spawned = self.dispatcher.handle(update).await;
                    if !spawned.is_empty() {
                        inflight.spawn(spawned.wait());
                    }
                }
            }

            while inflight.try_join_next().is_some() {}
        }

        self.shutdown.cancel();
        receiver.close();
        let dropped = std::iter::from_fn(|| receiver.try_recv().ok()).count();
        if dropped > 0 {
            debug!(dropped, "Dropped queued updates on shutdown");
        }

        self.drain(inflight).await;
        info!("Ingress loop stopped");
        Ok(())
    }

    async fn drain(&self, mut inflight: JoinSet<()>) {
        if inflight.is_empty() {
            return;
        }

        let grace = Duration::from_millis(self.config.dispatcher.shutdown_grace_ms);
        let finished = tokio::time::timeout(grace, async {
            while inflight.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            warn!(
                running = inflight.len(),
                "Handlers still running after grace period, leaving them detached"
            );
            inflight.detach_all();
        }
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("stopped", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`CourierRuntime`].
///
/// Without [`config`](Self::config), configuration is loaded from
/// `courier.toml` in the current directory, `COURIER_*` variables, and the
/// rest of the [`ConfigLoader`] layers.
pub struct RuntimeBuilder {
    client: BoxedClient,
    config_loader: ConfigLoader,
    config: Option<CourierConfig>,
    store: Option<Arc<dyn ConfigStore>>,
    modules: Option<Arc<dyn ModuleRegistry>>,
    security: Option<Arc<dyn SecurityCheck>>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new(client: BoxedClient) -> Self {
        Self {
            client,
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            store: None,
            modules: None,
            security: None,
            init_logging: true,
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `store` instead of an in-memory one.
    ///
    /// Seed values from the configuration are written only for keys the
    /// store does not already hold.
    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn modules(mut self, modules: Arc<dyn ModuleRegistry>) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Replaces the default owner-only security check.
    pub fn security(mut self, security: Arc<dyn SecurityCheck>) -> Self {
        self.security = Some(security);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = match self.config {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let store: Arc<dyn ConfigStore> = match self.store {
            Some(store) => {
                seed_missing(store.as_ref(), &config);
                store
            }
            None => Arc::new(MemoryStore::from_value(config.store_seed())),
        };

        let security = self
            .security
            .unwrap_or_else(|| Arc::new(OwnerOnly::new(config.dispatcher.owners.iter().copied())));

        let dispatcher = Dispatcher::builder(self.client)
            .store(store)
            .modules(self.modules.unwrap_or_else(|| Arc::new(Modules::new())))
            .security(security)
            .fallback_prefix(config.dispatcher.fallback_prefix.clone())
            .build();

        let (tx, rx) = mpsc::channel(config.dispatcher.ingress_capacity);

        info!(
            log_level = %config.logging.level,
            fallback_prefix = %config.dispatcher.fallback_prefix,
            ingress_capacity = config.dispatcher.ingress_capacity,
            "Runtime initialized from configuration"
        );

        Ok(CourierRuntime {
            config,
            dispatcher,
            sender: EventSender { tx },
            receiver: Mutex::new(Some(rx)),
            shutdown: CancellationToken::new(),
        })
    }
}

fn seed_missing(store: &dyn ConfigStore, config: &CourierConfig) {
    for (namespace, keys) in &config.store {
        let Some(keys) = keys.as_object() else { continue };
        for (key, value) in keys {
            if store.get(namespace, key).is_none() {
                store.set(namespace, key, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_core::{Chat, Client, Identity, Message, TransportResult};
    use courier_framework::{CommandHandler, Context, MAIN_NAMESPACE, keys};
    use serde_json::json;
    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    struct MockClient {
        identity: Identity,
        edits: SyncMutex<Vec<String>>,
    }

    #[async_trait]
    impl Client for MockClient {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        async fn edit(&self, _: &Message, text: &str) -> TransportResult<()> {
            self.edits.lock().push(text.to_string());
            Ok(())
        }
        async fn reply(&self, _: &Message, _: &str) -> TransportResult<()> {
            Ok(())
        }
        async fn respond(&self, _: i64, _: &str) -> TransportResult<()> {
            Ok(())
        }
    }

    fn client() -> Arc<MockClient> {
        Arc::new(MockClient {
            identity: Identity::new(100).with_username("CourierBot"),
            edits: SyncMutex::new(Vec::new()),
        })
    }

    fn own(text: &str) -> Message {
        Message::new(1, Chat::private(5), text).outgoing().from_sender(100)
    }

    struct Fixture {
        client: Arc<MockClient>,
        runtime: Arc<CourierRuntime>,
        seen: Arc<SyncMutex<Vec<String>>>,
        notify: Arc<Notify>,
    }

    fn fixture(config: CourierConfig) -> Fixture {
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());
        let modules = Modules::new();
        {
            let seen = seen.clone();
            let notify = notify.clone();
            modules.register_command(CommandHandler::new(
                "ping",
                "tester",
                move |ctx: Arc<Context>| {
                    let seen = seen.clone();
                    let notify = notify.clone();
                    async move {
                        seen.lock().push(ctx.args().to_string());
                        notify.notify_one();
                    }
                },
            ));
        }

        let client = client();
        let runtime = CourierRuntime::builder(client.clone())
            .config(config)
            .modules(Arc::new(modules))
            .without_logging()
            .build()
            .unwrap();

        Fixture {
            client,
            runtime: Arc::new(runtime),
            seen,
            notify,
        }
    }

    #[tokio::test]
    async fn test_ingress_dispatches_in_arrival_order() {
        let fx = fixture(CourierConfig::default());
        let events = fx.runtime.sender();
        let runtime = fx.runtime.clone();
        let task = tokio::spawn(async move { runtime.run_until(std::future::pending()).await });

        for n in 0..3 {
            assert_ok!(events.send(own(&format!(".ping {n}"))).await);
            fx.notify.notified().await;
        }

        fx.runtime.shutdown();
        assert_ok!(task.await.unwrap());
        assert_eq!(*fx.seen.lock(), vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_escaped_command_is_edited_through_client() {
        let fx = fixture(CourierConfig::default());
        let events = fx.runtime.sender();
        let runtime = fx.runtime.clone();
        let task = tokio::spawn(async move { runtime.run_until(std::future::pending()).await });

        assert_ok!(events.send(own("..ping")).await);
        assert_ok!(events.send(own(".ping after")).await);
        fx.notify.notified().await;

        fx.runtime.shutdown();
        assert_ok!(task.await.unwrap());
        assert_eq!(*fx.client.edits.lock(), vec![".ping"]);
        assert_eq!(*fx.seen.lock(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_store_is_seeded_from_config() {
        let mut config = CourierConfig::default();
        config.store.insert(
            MAIN_NAMESPACE.into(),
            json!({ "command_prefix": { "100": "!" } }),
        );
        let fx = fixture(config);
        let dispatcher = fx.runtime.dispatcher();

        assert!(dispatcher.handle(own(".ping").into()).await.is_empty());

        let spawned = dispatcher.handle(own("!ping seeded").into()).await;
        assert_eq!(spawned.len(), 1);
        spawned.wait().await;
        assert_eq!(*fx.seen.lock(), vec!["seeded"]);
    }

    #[tokio::test]
    async fn test_supplied_store_keeps_existing_keys() {
        let store = Arc::new(MemoryStore::new());
        store.set(MAIN_NAMESPACE, keys::GREP, json!(false));

        let mut config = CourierConfig::default();
        config.store.insert(
            MAIN_NAMESPACE.into(),
            json!({ "grep": true, "inlinelogs": false }),
        );

        let runtime = CourierRuntime::builder(client())
            .config(config)
            .store(store.clone())
            .without_logging()
            .build()
            .unwrap();

        assert_eq!(runtime.dispatcher().store().get(MAIN_NAMESPACE, keys::GREP), Some(json!(false)));
        assert_eq!(store.get(MAIN_NAMESPACE, keys::INLINE_LOGS), Some(json!(false)));
    }

    #[tokio::test]
    async fn test_fallback_prefix_from_config() {
        let mut config = CourierConfig::default();
        config.dispatcher.fallback_prefix = "#".into();
        let fx = fixture(config);

        let spawned = fx.runtime.dispatcher().handle(own("#ping x").into()).await;
        assert_eq!(spawned.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = CourierConfig::default();
        config.dispatcher.ingress_capacity = 0;
        let result = CourierRuntime::builder(client())
            .config(config)
            .without_logging()
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn test_sender_closes_after_shutdown() {
        let fx = fixture(CourierConfig::default());
        let events = fx.runtime.sender();

        assert_ok!(fx.runtime.run_until(async {}).await);
        assert!(events.is_closed());
        assert_err!(events.send(own(".ping")).await);
        assert!(matches!(
            events.try_send(own(".ping")),
            Err(RuntimeError::IngressClosed)
        ));
    }

    #[tokio::test]
    async fn test_runtime_runs_once() {
        let fx = fixture(CourierConfig::default());
        assert_ok!(fx.runtime.run_until(async {}).await);
        assert!(matches!(
            fx.runtime.run_until(async {}).await,
            Err(RuntimeError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        let mut config = CourierConfig::default();
        config.dispatcher.ingress_capacity = 1;
        let fx = fixture(config);
        let events = fx.runtime.sender();

        assert_ok!(events.try_send(own(".ping")));
        assert!(matches!(
            events.try_send(own(".ping")),
            Err(RuntimeError::IngressFull)
        ));
    }
}
