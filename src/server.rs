//! TCP accept loop and per-connection handling.
//!
//! [`Server::start`] binds, spawns the accept loop and returns a
//! [`ServerHandle`] straight away. Every accepted connection becomes its own
//! tokio task that:
//!
//! 1. parses one [`Request`] from the connection,
//! 2. answers `400 Bad Request` and closes if that fails, or
//! 3. hands a fresh [`ResponseWriter`] and the request to the handler,
//!    then closes.
//!
//! One exchange per connection. No keep-alive, no timeouts, no cap on the
//! number of connections in flight. Connection tasks share nothing with
//! each other; the accept loop and [`ServerHandle::stop`] share only the
//! running flag.
//!
//! # Logging
//!
//! Events go to the `tracing` dispatcher given to
//! [`Server::with_subscriber`], or, when none is given, to the dispatcher
//! that is current when [`Server::start`] runs. The library never installs
//! a global subscriber.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::instrument::{Instrument, WithSubscriber};
use tracing::{Dispatch, debug, error, info, info_span, warn};

use crate::buffer::DEFAULT_READ_BUFFER_CAPACITY;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::{BoxedSink, ResponseWriter, default_headers};
use crate::status::Status;

/// Server configuration. Consumed by [`start`](Server::start).
pub struct Server {
    addr: SocketAddr,
    read_buffer_capacity: usize,
    dispatch: Option<Dispatch>,
}

impl Server {
    /// Configures the server to listen on `addr` (`host:port`).
    ///
    /// ```rust
    /// use wireline::Server;
    /// let server = Server::bind("127.0.0.1:0").unwrap();
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self::from_addr(addr))
    }

    /// Configures the server to listen on `0.0.0.0:<port>`.
    pub fn port(port: u16) -> Self {
        Self::from_addr(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    fn from_addr(addr: SocketAddr) -> Self {
        Self { addr, read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY, dispatch: None }
    }

    /// Initial size of each connection's read buffer. It doubles on demand.
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.read_buffer_capacity = capacity.max(1);
        self
    }

    /// Sends this server's events to `subscriber` instead of the ambient
    /// dispatcher.
    pub fn with_subscriber(mut self, subscriber: impl Into<Dispatch>) -> Self {
        self.dispatch = Some(subscriber.into());
        self
    }

    /// Binds the listener, spawns the accept loop and returns without
    /// waiting for any connection.
    pub async fn start(self, handler: impl Handler) -> Result<ServerHandle, Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        let dispatch = self
            .dispatch
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));

        let running = Arc::new(AtomicBool::new(true));
        let accept = AcceptLoop {
            listener,
            running: Arc::clone(&running),
            handler: handler.into_boxed_handler(),
            read_buffer_capacity: self.read_buffer_capacity,
            dispatch: dispatch.clone(),
        };

        tracing::dispatcher::with_default(&dispatch, || {
            info!(addr = %local_addr, "wireline listening");
        });
        tokio::spawn(accept.run().with_subscriber(dispatch));

        Ok(ServerHandle { local_addr, running })
    }
}

/// Shorthand for `Server::port(port).start(handler)`.
pub async fn start(port: u16, handler: impl Handler) -> Result<ServerHandle, Error> {
    Server::port(port).start(handler).await
}

/// A running server.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
}

impl ServerHandle {
    /// The bound address. Useful after binding port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag.
    ///
    /// The accept loop notices on its next iteration: an `accept` already
    /// in progress is not interrupted, so one more connection may still be
    /// served. Connections in flight run to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

struct AcceptLoop {
    listener: TcpListener,
    running: Arc<AtomicBool>,
    handler: BoxedHandler,
    read_buffer_capacity: usize,
    dispatch: Dispatch,
}

impl AcceptLoop {
    async fn run(self) {
        while self.running.load(Ordering::Acquire) {
            let (stream, peer) = match self.listener.accept().await {
                Ok(v) => v,
                Err(e) => {
                    error!("accept error: {e}");
                    continue;
                }
            };
            debug!(%peer, "connection accepted");

            let handler = Arc::clone(&self.handler);
            let capacity = self.read_buffer_capacity;
            tokio::spawn(
                async move {
                    // The outcome is already logged inside.
                    let _ = handle_connection(stream, &handler, capacity).await;
                }
                .instrument(info_span!("conn", %peer))
                .with_subscriber(self.dispatch.clone()),
            );
        }
        info!("accept loop stopped");
    }
}

/// Serves one request/response exchange over any duplex byte stream.
///
/// Returns the request error if the request could not be parsed. A
/// request-framing error ([`Error::is_bad_request`]) has then already been
/// answered with a best-effort `400 Bad Request`; a body that never matched
/// its `Content-Length`, or a read failure, closes the stream without a
/// response. Handler failures are logged, not returned. The stream is
/// closed on return.
pub async fn serve_connection<S>(stream: S, handler: impl Handler) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    handle_connection(stream, &handler.into_boxed_handler(), DEFAULT_READ_BUFFER_CAPACITY).await
}

async fn handle_connection<S>(stream: S, handler: &BoxedHandler, capacity: usize) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);

    let req = match Request::from_reader_with_capacity(&mut reader, capacity).await {
        Ok(req) => req,
        Err(e) if e.is_bad_request() => {
            warn!(error = %e, "rejecting request");
            if let Err(write_err) = reject(writer).await {
                debug!(error = %write_err, "could not send 400");
            }
            return Err(e);
        }
        Err(e) => {
            warn!(error = %e, "dropping connection");
            return Err(e);
        }
    };

    info!(method = req.method(), target = req.target(), body = req.body().len(), "request");
    let writer = ResponseWriter::new(Box::new(writer) as BoxedSink);
    if let Err(e) = handler.call(writer, req).await {
        error!(error = %e, "handler failed");
    }
    Ok(())
}

/// `400 Bad Request` with an empty body, then shut the write side.
async fn reject<W>(sink: W) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = ResponseWriter::new(sink);
    writer.write_status_line(Status::BadRequest).await?;
    writer.write_headers(&default_headers(0)).await?;
    writer.into_inner().shutdown().await?;
    Ok(())
}
