//! # wireline
//!
//! An HTTP/1.1 server engine written against raw byte streams. No hyper,
//! no borrowed HTTP stack: wireline parses the request itself and writes
//! the response itself.
//!
//! ## The contract
//!
//! One connection carries exactly one request and one response. The
//! engine owns the protocol; your [`Handler`] owns the answer.
//!
//! - **Parsing** — [`Request::from_reader`] reassembles a request from
//!   however the network fragments it. Request line, headers (folded,
//!   case-insensitive, see [`HeaderStore`]), and a `Content-Length` body.
//! - **Writing** — [`ResponseWriter`] takes status line, headers, body, in
//!   that order, and refuses anything else.
//! - **Serving** — [`Server`] accepts connections and runs each on its own
//!   tokio task. A request with a malformed request line or header section
//!   gets `400 Bad Request`; one whose body falls short of its
//!   `Content-Length` is dropped without a response. The handler sees
//!   neither.
//!
//! What wireline deliberately does not do: keep-alive, chunked
//! transfer-encoding, pipelining, TLS, timeouts, connection limits.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use wireline::{Error, Request, ResponseWriter, Server, Status, default_headers};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let server = Server::bind("0.0.0.0:42069")?.start(handle).await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop();
//!     Ok(())
//! }
//!
//! async fn handle(mut w: ResponseWriter, req: Request) -> Result<(), Error> {
//!     let (status, body) = match req.target() {
//!         "/" => (Status::Ok, "All good\n"),
//!         _   => (Status::NotFound, "Nothing here\n"),
//!     };
//!     w.write_status_line(status).await?;
//!     w.write_headers(&default_headers(body.len())).await?;
//!     w.write_body(body.as_bytes()).await
//! }
//! ```

mod buffer;
mod error;
mod handler;
mod headers;
mod method;
mod request;
mod response;
mod server;
mod status;

pub use buffer::DEFAULT_READ_BUFFER_CAPACITY;
pub use error::Error;
pub use handler::{BoxError, Handler, HandlerError, IntoOutcome};
pub use headers::HeaderStore;
pub use method::Method;
pub use request::{HTTP_VERSION, ParseState, Request, RequestLine};
pub use response::{BoxedSink, ResponseWriter, WriterState, default_headers};
pub use server::{Server, ServerHandle, serve_connection, start};
pub use status::Status;
