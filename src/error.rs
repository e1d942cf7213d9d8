//! Unified error type.

use std::fmt;

use crate::request::ParseState;
use crate::response::WriterState;

/// The error type returned by wireline's fallible operations.
///
/// Three families live here:
///
/// - **Request framing** — the peer sent bytes that are not a valid
///   HTTP/1.1 request. The server answers these with a synthetic
///   `400 Bad Request` (see [`Error::is_bad_request`]).
/// - **Body framing** — the declared `Content-Length` was never satisfied.
///   The connection is dropped without a response.
/// - **Writer misuse** — a handler drove the [`ResponseWriter`] out of
///   order or asked for a status code it cannot emit.
///
/// Transport failures (reset, broken pipe) surface as [`Error::Io`].
///
/// [`ResponseWriter`]: crate::ResponseWriter
#[derive(Debug)]
pub enum Error {
    /// Leading whitespace, missing parts or extra parts in the request line.
    MalformedRequestLine(String),
    /// The method is not made of uppercase ASCII letters.
    InvalidMethod(String),
    /// The request target is not a well-formed URI reference.
    InvalidRequestTarget(String),
    /// Anything other than the literal `HTTP/1.1`.
    InvalidProtocolVersion(String),
    /// A field-line could not be parsed.
    HeaderParse { reason: &'static str, line: String },
    /// The stream ended before the header section was complete.
    IncompleteRequest(ParseState),
    /// The stream ended before `Content-Length` bytes of body arrived.
    TruncatedBody { declared: usize, received: usize },
    /// The parser finished but the body does not match `Content-Length`.
    BodyLengthMismatch { declared: usize, received: usize },
    /// A writer stage was called in the wrong state.
    OutOfOrderWrite { expected: WriterState, actual: WriterState },
    /// The status code has no reason phrase in the writer's table.
    UnknownStatusCode(u16),
    /// The sink stopped accepting bytes before the whole buffer was written.
    PartialWrite { written: usize, expected: usize },
    /// The bind address could not be parsed.
    InvalidAddress(String),
    Io(std::io::Error),
}

impl Error {
    /// Returns `true` for request-framing errors, the ones answered with
    /// `400 Bad Request` before the connection is closed.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequestLine(_)
                | Self::InvalidMethod(_)
                | Self::InvalidRequestTarget(_)
                | Self::InvalidProtocolVersion(_)
                | Self::HeaderParse { .. }
                | Self::IncompleteRequest(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequestLine(line) => write!(f, "malformed request line: {line:?}"),
            Self::InvalidMethod(method) => write!(f, "invalid method: {method:?}"),
            Self::InvalidRequestTarget(target) => write!(f, "invalid request target: {target:?}"),
            Self::InvalidProtocolVersion(version) => {
                write!(f, "invalid protocol version: {version:?}")
            }
            Self::HeaderParse { reason, line } => {
                write!(f, "header parse error: {reason}: {line:?}")
            }
            Self::IncompleteRequest(state) => {
                write!(f, "stream closed while {state:?}")
            }
            Self::TruncatedBody { declared, received } => write!(
                f,
                "truncated body: content-length {declared}, stream closed after {received} bytes"
            ),
            Self::BodyLengthMismatch { declared, received } => write!(
                f,
                "body length mismatch: content-length {declared}, body is {received} bytes"
            ),
            Self::OutOfOrderWrite { expected, actual } => {
                write!(f, "out of order write: requires {expected:?}, writer is {actual:?}")
            }
            Self::UnknownStatusCode(code) => write!(f, "unknown status code: {code}"),
            Self::PartialWrite { written, expected } => {
                write!(f, "partial write: {written} of {expected} bytes")
            }
            Self::InvalidAddress(addr) => write!(f, "invalid socket address: {addr:?}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
