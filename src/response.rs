//! Ordered response writer.
//!
//! A response goes out in three stages, and the [`ResponseWriter`] refuses
//! to take them out of order:
//!
//! ```text
//! write_status_line ──► write_headers ──► write_body (repeatable)
//! ```
//!
//! A refused call writes nothing and leaves the writer where it was. A write
//! that fails after some of its bytes reached the sink moves the writer to
//! [`WriterState::Failed`], which refuses everything, so a connection never
//! sees two status lines or two header blocks.
//!
//! ```rust,no_run
//! use wireline::{Request, ResponseWriter, Status, default_headers};
//!
//! async fn hello(mut w: ResponseWriter, _req: Request) -> Result<(), wireline::Error> {
//!     let body = b"hello\n";
//!     w.write_status_line(Status::Ok).await?;
//!     w.write_headers(&default_headers(body.len())).await?;
//!     w.write_body(body).await
//! }
//! ```

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::Error;
use crate::headers::{CRLF, HeaderStore};
use crate::request::HTTP_VERSION;
use crate::status::Status;

/// The type-erased write half handed to handlers by the server.
pub type BoxedSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Which stage the writer accepts next.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriterState {
    #[default]
    AwaitingStatusLine,
    AwaitingHeaders,
    AwaitingBody,
    /// A stage failed part-way. Nothing more can be written.
    Failed,
}

impl WriterState {
    /// The state after a successful write in `self`. `AwaitingBody` loops.
    fn next(self) -> Self {
        match self {
            Self::AwaitingStatusLine => Self::AwaitingHeaders,
            Self::AwaitingHeaders    => Self::AwaitingBody,
            Self::AwaitingBody       => Self::AwaitingBody,
            Self::Failed             => Self::Failed,
        }
    }
}

/// Writes one response onto a sink, stage by stage.
pub struct ResponseWriter<W = BoxedSink> {
    sink: W,
    state: WriterState,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, state: WriterState::default() }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Writes `HTTP/1.1 <code> <reason>\r\n`.
    ///
    /// Accepts a [`Status`] or a raw `u16`; codes without a reason phrase
    /// fail with [`Error::UnknownStatusCode`] and write nothing.
    pub async fn write_status_line(&mut self, code: impl Into<u16>) -> Result<(), Error> {
        self.require(WriterState::AwaitingStatusLine)?;
        let status = Status::try_from(code.into())?;

        let line = format!("{HTTP_VERSION} {} {}\r\n", u16::from(status), status.reason());
        self.write_fully(line.as_bytes()).await?;
        trace!(status = u16::from(status), "wrote status line");
        self.advance();
        Ok(())
    }

    /// Serializes `headers` followed by the blank line, in a single write.
    pub async fn write_headers(&mut self, headers: &HeaderStore) -> Result<(), Error> {
        self.require(WriterState::AwaitingHeaders)?;

        let mut buf = BytesMut::new();
        headers.for_each(|key, value| {
            buf.put_slice(key.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value);
            buf.put_slice(CRLF);
        });
        buf.put_slice(CRLF);

        self.write_fully(&buf).await?;
        trace!(count = headers.len(), bytes = buf.len(), "wrote headers");
        self.advance();
        Ok(())
    }

    /// Writes body bytes. May be called any number of times once the
    /// headers are out.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<(), Error> {
        self.require(WriterState::AwaitingBody)?;
        self.write_fully(body).await?;
        trace!(bytes = body.len(), "wrote body");
        self.advance();
        Ok(())
    }

    fn require(&self, expected: WriterState) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::OutOfOrderWrite { expected, actual: self.state });
        }
        Ok(())
    }

    fn advance(&mut self) {
        self.state = self.state.next();
    }

    /// Writes all of `bytes`, failing with [`Error::PartialWrite`] if the
    /// sink stops accepting them.
    ///
    /// Any failure after the first byte went out leaves the writer
    /// [`Failed`](WriterState::Failed).
    async fn write_fully(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut written = 0;
        while written < bytes.len() {
            let n = match self.sink.write(&bytes[written..]).await {
                Ok(0) => Err(Error::PartialWrite { written, expected: bytes.len() }),
                Ok(n) => Ok(n),
                Err(e) => Err(Error::Io(e)),
            };
            match n {
                Ok(n) => written += n,
                Err(e) => return Err(self.fail_after(written, e)),
            }
        }
        if let Err(e) = self.sink.flush().await {
            return Err(self.fail_after(written, Error::Io(e)));
        }
        Ok(())
    }

    fn fail_after(&mut self, written: usize, e: Error) -> Error {
        if written > 0 {
            self.state = WriterState::Failed;
        }
        e
    }
}

/// `Content-Length`, `Connection: close` and `Content-Type: text/plain`.
///
/// Add or [`replace`](HeaderStore::replace) entries before passing the
/// store to [`ResponseWriter::write_headers`].
pub fn default_headers(content_length: usize) -> HeaderStore {
    let mut headers = HeaderStore::new();
    headers.set("Content-Length", &content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}
