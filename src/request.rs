//! Incoming HTTP request type and its streaming parser.
//!
//! A [`Request`] is built by a small state machine:
//!
//! ```text
//! AwaitingRequestLine ──► AwaitingHeaders ──► AwaitingBody ──► Done
//! ```
//!
//! [`Request::parse`] feeds it bytes and reports how many it consumed.
//! [`Request::from_reader`] runs the read loop around it: read into a
//! growable arena, parse everything available, drop the consumed prefix,
//! repeat until `Done` or end-of-stream. Fragmentation is invisible to the
//! result: one byte per read and one read for the whole request parse the
//! same way.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::buffer::{DEFAULT_READ_BUFFER_CAPACITY, ReadBuffer};
use crate::error::Error;
use crate::headers::{CRLF, HeaderStore, find_crlf};
use crate::method::Method;

/// The only protocol version accepted on the request line.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Where the parser is in the request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ParseState {
    #[default]
    AwaitingRequestLine,
    AwaitingHeaders,
    AwaitingBody,
    Done,
}

/// `<method> <target> HTTP/1.1`
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// An incoming HTTP request, parsed from the raw byte stream.
#[derive(Debug, Default, PartialEq)]
pub struct Request {
    line: RequestLine,
    headers: HeaderStore,
    body: BytesMut,
    state: ParseState,
}

impl Request {
    /// An empty request awaiting its request line.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_line(&self) -> &RequestLine { &self.line }
    pub fn method(&self) -> &str { &self.line.method }
    pub fn target(&self) -> &str { &self.line.target }
    pub fn version(&self) -> &str { &self.line.version }
    pub fn headers(&self) -> &HeaderStore { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn state(&self) -> ParseState { self.state }
    pub fn is_done(&self) -> bool { self.state == ParseState::Done }

    /// Case-insensitive header lookup. Values that are not UTF-8 are only
    /// visible through [`HeaderStore::get_bytes`].
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The method as a [`Method`], if it is one of the RFC 9110 methods.
    ///
    /// The parser accepts any uppercase token, so `BREW` parses fine and
    /// maps to `None` here.
    pub fn known_method(&self) -> Option<Method> {
        self.line.method.parse().ok()
    }

    pub fn into_body(self) -> Bytes {
        self.body.freeze()
    }

    /// Declared `Content-Length`; absent, unparseable or negative is `0`.
    fn content_length(&self) -> usize {
        // A negative length fails the conversion and reads as no body.
        usize::try_from(self.headers.get_int("content-length", 0)).unwrap_or(0)
    }

    /// Advances the state machine over `data` and returns how many bytes
    /// were consumed. Unconsumed bytes must be offered again, with more
    /// appended, on the next call.
    ///
    /// Once the request is [`Done`](ParseState::Done) every call consumes
    /// nothing and succeeds.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, Error> {
        let mut consumed = 0;
        loop {
            let rest = &data[consumed..];
            let n = match self.state {
                ParseState::AwaitingRequestLine => match parse_request_line(rest)? {
                    Some((line, n)) => {
                        self.line = line;
                        self.state = ParseState::AwaitingHeaders;
                        n
                    }
                    None => break,
                },
                ParseState::AwaitingHeaders => {
                    let (n, done) = self.headers.parse(rest)?;
                    if done {
                        self.state = ParseState::AwaitingBody;
                    } else if n == 0 {
                        break;
                    }
                    n
                }
                ParseState::AwaitingBody => {
                    let declared = self.content_length();
                    if declared == 0 {
                        // Bytes after the header section without a
                        // Content-Length are never read into the body.
                        self.state = ParseState::Done;
                        continue;
                    }
                    let take = (declared - self.body.len()).min(rest.len());
                    if take == 0 {
                        break;
                    }
                    self.body.extend_from_slice(&rest[..take]);
                    if self.body.len() == declared {
                        self.state = ParseState::Done;
                    }
                    take
                }
                ParseState::Done => break,
            };
            consumed += n;
        }
        Ok(consumed)
    }

    /// Reads and parses one request from `reader`.
    pub async fn from_reader<R>(reader: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        Self::from_reader_with_capacity(reader, DEFAULT_READ_BUFFER_CAPACITY).await
    }

    /// Like [`from_reader`](Self::from_reader) with an explicit initial
    /// read-buffer capacity. The buffer doubles whenever a read fills it.
    pub async fn from_reader_with_capacity<R>(reader: &mut R, capacity: usize) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = ReadBuffer::with_capacity(capacity);
        let mut req = Self::new();

        while !req.is_done() {
            let n = reader.read(buf.spare_mut()).await?;
            if n == 0 {
                return Err(req.end_of_stream_error());
            }
            buf.commit(n);

            let consumed = req.parse(buf.filled())?;
            buf.consume(consumed);
            trace!(read = n, consumed, capacity = buf.capacity(), state = ?req.state, "parsed chunk");
        }

        req.verify_body_length()?;
        Ok(req)
    }

    /// The error for a stream that ended before `Done`.
    fn end_of_stream_error(&self) -> Error {
        match self.state {
            ParseState::AwaitingBody | ParseState::Done => Error::TruncatedBody {
                declared: self.content_length(),
                received: self.body.len(),
            },
            state => Error::IncompleteRequest(state),
        }
    }

    fn verify_body_length(&self) -> Result<(), Error> {
        let declared = self.content_length();
        if declared > 0 && self.body.len() != declared {
            return Err(Error::BodyLengthMismatch { declared, received: self.body.len() });
        }
        Ok(())
    }
}

/// Parses the request line at the front of `data`.
///
/// `Ok(None)` means no CRLF yet. On success returns the line and the number
/// of bytes it occupied, CRLF included.
fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, Error> {
    if data.first() == Some(&b' ') {
        let end = find_crlf(data).unwrap_or(data.len());
        return Err(Error::MalformedRequestLine(
            String::from_utf8_lossy(&data[..end]).into_owned(),
        ));
    }
    let Some(end) = find_crlf(data) else {
        return Ok(None);
    };

    let raw = &data[..end];
    let line = std::str::from_utf8(raw)
        .map_err(|_| Error::MalformedRequestLine(String::from_utf8_lossy(raw).into_owned()))?;

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(Error::MalformedRequestLine(line.to_owned()));
    };

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(Error::InvalidMethod((*method).to_owned()));
    }
    if target.parse::<http::Uri>().is_err() {
        return Err(Error::InvalidRequestTarget((*target).to_owned()));
    }
    if *version != HTTP_VERSION {
        return Err(Error::InvalidProtocolVersion((*version).to_owned()));
    }

    let line = RequestLine {
        method: (*method).to_owned(),
        target: (*target).to_owned(),
        version: (*version).to_owned(),
    };
    Ok(Some((line, end + CRLF.len())))
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use proptest::prelude::*;
    use tokio::io::ReadBuf;

    use super::*;

    /// Hands out at most `per_read` bytes per read, then EOF.
    struct ChunkReader {
        data: Vec<u8>,
        per_read: usize,
        pos: usize,
    }

    impl ChunkReader {
        fn new(data: impl Into<Vec<u8>>, per_read: usize) -> Self {
            Self { data: data.into(), per_read, pos: 0 }
        }
    }

    impl AsyncRead for ChunkReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let end = (self.pos + self.per_read).min(self.data.len());
            let n = (end - self.pos).min(buf.remaining());
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    async fn parse_chunked(data: &str, per_read: usize) -> Result<Request, Error> {
        Request::from_reader(&mut ChunkReader::new(data, per_read)).await
    }

    const GET: &str =
        "GET / HTTP/1.1\r\nHost: localhost:42069\r\nUser-Agent: curl/7.81.0\r\nAccept: */*\r\n\r\n";

    #[tokio::test]
    async fn good_get_request_line() {
        let r = parse_chunked(GET, 3).await.unwrap();
        assert_eq!(r.method(), "GET");
        assert_eq!(r.target(), "/");
        assert_eq!(r.version(), "HTTP/1.1");
        assert_eq!(r.known_method(), Some(Method::Get));
    }

    #[tokio::test]
    async fn accepts_every_target_form() {
        for (target, host) in [
            ("/coffee", "localhost"),
            ("/coffee?q=val", "localhost"),
            ("http://www.example.org/pub/WWW/TheProject.html", "www.example.org"),
            ("www.example.com:80", "www.example.com:80"),
            ("*", "localhost"),
        ] {
            let data = format!("OPTIONS {target} HTTP/1.1\r\nHost: {host}\r\n\r\n");
            let r = parse_chunked(&data, 1).await.unwrap();
            assert_eq!(r.target(), target);
            assert_eq!(r.header("host"), Some(host));
        }
    }

    #[tokio::test]
    async fn wrong_part_count_is_malformed() {
        for line in ["/coffee HTTP/1.1", "GET /coffee HTTP/1.1 TEST ", "GET  /coffee HTTP/1.1"] {
            let err = parse_chunked(&format!("{line}\r\nHost: x\r\n\r\n"), 1).await.unwrap_err();
            assert!(matches!(err, Error::MalformedRequestLine(_)), "{line}: {err}");
        }
    }

    #[test]
    fn leading_space_fails_before_crlf_arrives() {
        let mut req = Request::new();
        let err = req.parse(b"  GET /coff").unwrap_err();
        assert!(matches!(err, Error::MalformedRequestLine(_)));
    }

    #[tokio::test]
    async fn method_must_be_uppercase_letters() {
        for method in ["gEt", "123", "GE-T"] {
            let err = parse_chunked(&format!("{method} /coffee HTTP/1.1\r\n\r\n"), 1)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidMethod(_)), "{method}: {err}");
        }
        let r = parse_chunked("BREW /pot HTTP/1.1\r\n\r\n", 4).await.unwrap();
        assert_eq!(r.method(), "BREW");
        assert_eq!(r.known_method(), None);
    }

    #[tokio::test]
    async fn version_must_be_http_1_1() {
        for version in ["HTTP/2.0", "HTTP/3.0", "FTP/1.1", "HTTP/1.0", "http/1.1"] {
            let err = parse_chunked(&format!("GET /coffee {version}\r\n\r\n"), 1)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidProtocolVersion(_)), "{version}: {err}");
        }
    }

    #[test]
    fn empty_target_is_invalid() {
        let mut req = Request::new();
        let err = req.parse(b"GET  HTTP/1.1\r\n").unwrap_err();
        assert!(matches!(err, Error::InvalidRequestTarget(_)));
    }

    #[tokio::test]
    async fn headers_are_parsed() {
        let r = parse_chunked(GET, 3).await.unwrap();
        assert_eq!(r.header("HOST"), Some("localhost:42069"));
        assert_eq!(r.header("user-agent"), Some("curl/7.81.0"));
        assert_eq!(r.header("accept"), Some("*/*"));
        assert!(r.body().is_empty());
    }

    #[tokio::test]
    async fn malformed_header_fails() {
        let err = parse_chunked("GET / HTTP/1.1\r\nHost localhost:42069\r\n\r\n", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HeaderParse { .. }));
    }

    #[tokio::test]
    async fn body_is_read_to_content_length() {
        let data = "POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 13\r\n\r\nhello world!\n";
        let r = parse_chunked(data, 3).await.unwrap();
        assert_eq!(r.body(), b"hello world!\n");
        assert_eq!(r.into_body(), Bytes::from_static(b"hello world!\n"));
    }

    #[tokio::test]
    async fn zero_content_length_on_closed_stream_is_empty() {
        let data = "POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let r = parse_chunked(data, 1).await.unwrap();
        assert!(r.body().is_empty());
        assert!(r.is_done());
    }

    #[tokio::test]
    async fn body_without_content_length_is_dropped() {
        let data = "POST / HTTP/1.1\r\nHost: localhost\r\n\r\nignored body";
        let r = parse_chunked(data, 5).await.unwrap();
        assert!(r.body().is_empty());
    }

    #[tokio::test]
    async fn unparseable_content_length_means_no_body() {
        let data = "POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\nabc";
        let r = parse_chunked(data, 64).await.unwrap();
        assert!(r.body().is_empty());
    }

    #[tokio::test]
    async fn negative_content_length_means_no_body() {
        let data = "POST / HTTP/1.1\r\nContent-Length: -5\r\n\r\nabc";
        let r = parse_chunked(data, 64).await.unwrap();
        assert!(r.is_done());
        assert!(r.body().is_empty());
    }

    #[test]
    fn non_utf8_header_value_reaches_the_request() {
        let mut r = Request::new();
        let data = b"GET / HTTP/1.1\r\nX-Name: caf\xe9\r\n\r\n";
        assert_eq!(r.parse(data).unwrap(), data.len());
        assert!(r.is_done());
        assert_eq!(r.headers().get_bytes("x-name"), Some(&b"caf\xe9"[..]));
        assert_eq!(r.header("x-name"), None);
    }

    #[tokio::test]
    async fn short_body_is_truncated() {
        let data = "POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 20\r\n\r\npartial content\n";
        let err = parse_chunked(data, 3).await.unwrap_err();
        assert!(
            matches!(err, Error::TruncatedBody { declared: 20, received: 16 }),
            "{err}"
        );
    }

    #[tokio::test]
    async fn stream_closing_mid_headers_is_incomplete() {
        let err = parse_chunked("GET / HTTP/1.1\r\nHost: local", 4).await.unwrap_err();
        assert!(matches!(err, Error::IncompleteRequest(ParseState::AwaitingHeaders)));

        let err = parse_chunked("", 4).await.unwrap_err();
        assert!(matches!(err, Error::IncompleteRequest(ParseState::AwaitingRequestLine)));
    }

    #[test]
    fn body_consumes_only_what_is_declared() {
        let mut req = Request::new();
        let data = b"PUT /x HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcdEXTRA";
        let n = req.parse(data).unwrap();
        assert_eq!(n, data.len() - "EXTRA".len());
        assert_eq!(req.body(), b"abcd");
        assert!(req.is_done());
    }

    #[test]
    fn done_is_idempotent() {
        let mut req = Request::new();
        req.parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.state(), ParseState::Done);
        assert_eq!(req.parse(b"more bytes\r\n").unwrap(), 0);
        assert_eq!(req.parse(b"  garbage").unwrap(), 0);
        assert_eq!(req.state(), ParseState::Done);
    }

    #[test]
    fn states_advance_in_order() {
        let mut req = Request::new();
        assert_eq!(req.parse(b"GET / HT").unwrap(), 0);
        assert_eq!(req.state(), ParseState::AwaitingRequestLine);
        assert_eq!(req.parse(b"GET / HTTP/1.1\r\nHost").unwrap(), 16);
        assert_eq!(req.state(), ParseState::AwaitingHeaders);
        assert_eq!(req.parse(b"Host: a\r\nContent-Length: 2\r\n\r\n").unwrap(), 30);
        assert_eq!(req.state(), ParseState::AwaitingBody);
        assert_eq!(req.parse(b"o").unwrap(), 1);
        assert_eq!(req.parse(b"k").unwrap(), 1);
        assert_eq!(req.state(), ParseState::Done);
        assert_eq!(req.body(), b"ok");
    }

    #[test]
    fn final_check_catches_body_mismatch() {
        let mut req = Request::new();
        req.parse(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab").unwrap();
        req.state = ParseState::Done;
        let err = req.verify_body_length().unwrap_err();
        assert!(matches!(err, Error::BodyLengthMismatch { declared: 5, received: 2 }));
    }

    #[tokio::test]
    async fn long_lines_grow_the_buffer() {
        let target = format!("/{}", "a".repeat(5000));
        let data = format!("GET {target} HTTP/1.1\r\n\r\n");
        let r = Request::from_reader_with_capacity(&mut ChunkReader::new(data, 700), 8)
            .await
            .unwrap();
        assert_eq!(r.target(), target);
    }

    fn request_text() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["GET", "POST", "PUT", "DELETE", "PATCH"]),
            "/[a-z0-9/]{0,20}",
            prop::collection::vec(("X-[A-Za-z]{1,8}", "[a-zA-Z0-9,;=/]{0,16}"), 0..6),
            "[ -~]{0,64}",
        )
            .prop_map(|(method, target, headers, body)| {
                let mut text = format!("{method} {target} HTTP/1.1\r\n");
                for (name, value) in headers {
                    text.push_str(&format!("{name}: {value}\r\n"));
                }
                if !body.is_empty() {
                    text.push_str(&format!("Content-Length: {}\r\n", body.len()));
                }
                text.push_str("\r\n");
                text.push_str(&body);
                text
            })
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_the_result(text in request_text(), per_read in 1usize..32) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let whole = rt.block_on(parse_chunked(&text, text.len().max(1))).unwrap();
            let chunked = rt.block_on(parse_chunked(&text, per_read)).unwrap();
            prop_assert_eq!(whole, chunked);
        }
    }
}
