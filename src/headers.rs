//! Case-insensitive header store with HTTP field folding.
//!
//! Field names are lower-cased before they are stored or looked up, so
//! `Host`, `HOST` and `host` all address the same entry. A name that appears
//! more than once is folded into a single comma-joined value:
//!
//! ```text
//! Example-Field: Foo, Bar
//! Example-Field: Baz          →   example-field = "Foo, Bar, Baz"
//! ```
//!
//! [`HeaderStore::parse`] is incremental: it consumes every complete
//! field-line in the chunk it is given and leaves partial lines for the next
//! call, so the request parser can feed it straight from the network buffer.

use std::collections::HashMap;

use crate::error::Error;

pub(crate) const CRLF: &[u8] = b"\r\n";

/// Index of the first CRLF in `data`, if any. A bare LF does not count.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

/// A mapping from lower-cased field-name to one folded value.
///
/// Values are kept as the bytes that arrived on the wire. HTTP allows
/// `obs-text` (0x80-0xFF) in field values, so a value is not necessarily
/// UTF-8: [`get`](Self::get) only sees values that are, and
/// [`get_bytes`](Self::get_bytes) sees all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderStore {
    entries: HashMap<String, Vec<u8>>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, folding into an existing entry as
    /// `"<old>, <value>"`.
    pub fn set(&mut self, key: &str, value: impl AsRef<[u8]>) {
        let value = value.as_ref();
        self.entries
            .entry(key.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.extend_from_slice(b", ");
                existing.extend_from_slice(value);
            })
            .or_insert_with(|| value.to_vec());
    }

    /// Inserts `value` under `key`, discarding any previous value.
    pub fn replace(&mut self, key: &str, value: impl AsRef<[u8]>) {
        self.entries.insert(key.to_ascii_lowercase(), value.as_ref().to_vec());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    /// The value under `key` as text. `None` when absent or not UTF-8.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_bytes(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// The raw value under `key`.
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(&key.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Parses the value under `key` as an integer. Absent or unparseable
    /// values yield `default`.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(default)
    }

    /// Calls `f` once per entry. Order is unspecified.
    pub fn for_each(&self, mut f: impl FnMut(&str, &[u8])) {
        for (key, value) in &self.entries {
            f(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes every complete field-line at the front of `chunk`.
    ///
    /// Returns `(consumed, done)`. `done` is `true` once the blank line that
    /// ends the header section has been consumed. When `chunk` holds no full
    /// line the result is `(0, false)`: supply more bytes and call again.
    ///
    /// On error nothing is consumed and the store is left as it was.
    pub fn parse(&mut self, chunk: &[u8]) -> Result<(usize, bool), Error> {
        let mut consumed = 0;
        let mut done = false;
        let mut fields = Vec::new();

        while let Some(end) = find_crlf(&chunk[consumed..]) {
            if end == 0 {
                consumed += CRLF.len();
                done = true;
                break;
            }
            fields.push(parse_field_line(&chunk[consumed..consumed + end])?);
            consumed += end + CRLF.len();
        }

        for (name, value) in fields {
            self.set(name, value);
        }
        Ok((consumed, done))
    }
}

/// Splits one field-line (without its CRLF) into name and trimmed value.
fn parse_field_line(line: &[u8]) -> Result<(&str, &[u8]), Error> {
    let fail = |reason| Error::HeaderParse {
        reason,
        line: String::from_utf8_lossy(line).into_owned(),
    };

    let colon = line.iter().position(|&b| b == b':').ok_or_else(|| fail("missing colon"))?;
    let (name, value) = (&line[..colon], line[colon + 1..].trim_ascii());

    if name.is_empty() || !name.iter().copied().all(is_token_byte) {
        return Err(fail("invalid field-name"));
    }
    if value.iter().any(|&b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(fail("invalid field-value byte"));
    }

    // Token bytes are ASCII, so the name is always valid UTF-8.
    let name = std::str::from_utf8(name).map_err(|_| fail("invalid field-name"))?;
    Ok((name, value))
}

/// `tchar` from RFC 9110 §5.6.2.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}
