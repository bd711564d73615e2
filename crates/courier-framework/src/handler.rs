//! Handler abstraction.
//!
//! A handler is any async function taking an `Arc<Context>`. The return value
//! may be `()` or a `Result` whose error converts into [`HandlerError`], so
//! both of these register the same way:
//!
//! ```rust,ignore
//! async fn ping(ctx: Arc<Context>) {
//!     let _ = ctx.answer("pong").await;
//! }
//!
//! async fn echo(ctx: Arc<Context>) -> anyhow::Result<()> {
//!     ctx.answer(ctx.args()).await?;
//!     Ok(())
//! }
//! ```
//!
//! Registries store handlers type-erased as [`BoxedHandler`].

use std::future::Future;
use std::sync::Arc;

pub use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

// ============================================================================
// Return values
// ============================================================================

/// Conversion of a handler's return value into a [`HandlerResult`].
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<HandlerError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// Something the dispatcher can invoke for an update.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler to completion.
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn Handler>;

/// Boxes a handler function.
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}
