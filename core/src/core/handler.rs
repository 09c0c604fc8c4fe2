// marketflow/src/core/handler.rs
use super::{Control, Shared};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by a handler.
pub type HandlerFuture<E> = Pin<Box<dyn Future<Output = Result<Control, E>> + Send>>;

/// A step handler. It receives its own clone of the run's [`Shared`] context.
pub type Handler<T, E> = Box<dyn Fn(Shared<T>) -> HandlerFuture<E> + Send + Sync>;

/// Boxes a user closure, converting its error type into the pipeline's.
pub(crate) fn boxed<T, E, F, Fut, UserErr>(handler_fn: F) -> Handler<T, E>
where
  T: Send + Sync + 'static,
  F: Fn(Shared<T>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Control, UserErr>> + Send + 'static,
  UserErr: Into<E> + 'static,
  E: 'static,
{
  Box::new(move |ctx| {
    let fut = handler_fn(ctx);
    Box::pin(async move { fut.await.map_err(Into::into) })
  })
}
