//! Handler trait and type erasure.
//!
//! The server calls a handler exactly once per connection, after the
//! request has been fully parsed, with a fresh [`ResponseWriter`] over the
//! connection's write half. The handler drives the writer through its
//! three stages; wireline does no routing of its own.
//!
//! ```text
//! async fn handle(w: ResponseWriter, req: Request) -> …   ← user writes this
//!        ↓ Server::start(handle)
//! handle.into_boxed_handler()                              ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(handle))                              ← shared by every connection task
//!        ↓
//! handler.call(writer, req)                                ← one vtable dispatch per connection
//! ```

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::{ResponseWriter, default_headers};
use crate::status::Status;

/// The error a handler reports back to the server.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A heap-allocated, type-erased handler future.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, writer: ResponseWriter, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid connection handler.
///
/// Satisfied automatically by any `async fn` with the signature:
///
/// ```text
/// async fn name(w: ResponseWriter, req: Request) -> impl IntoOutcome
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, writer: ResponseWriter, req: Request) -> BoxFuture {
        let fut = (self.0)(writer, req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// What a handler may return.
///
/// `()` always succeeds. `Result<(), E>` reports `E` to the server, which
/// logs it; the connection is closed either way.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> { Ok(()) }
}

impl<E> IntoOutcome for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> { self.map_err(Into::into) }
}

// ── HandlerError ──────────────────────────────────────────────────────────────

/// A complete error response: status plus a plain-text message.
///
/// ```rust,no_run
/// use wireline::{HandlerError, Request, ResponseWriter, Status};
///
/// async fn handle(mut w: ResponseWriter, req: Request) -> Result<(), wireline::Error> {
///     if req.target() == "/broken" {
///         return HandlerError::new(Status::InternalServerError, "My bad\n").write_to(&mut w).await;
///     }
///     // …
///     # Ok(())
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HandlerError {
    pub status: Status,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// Writes the status line, default headers sized to the message, and
    /// the message as body. `w` must not have been written to yet.
    pub async fn write_to<W>(&self, w: &mut ResponseWriter<W>) -> Result<(), Error>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        w.write_status_line(self.status).await?;
        w.write_headers(&default_headers(self.message.len())).await?;
        w.write_body(self.message.as_bytes()).await
    }
}
