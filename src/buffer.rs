//! Growable read arena for the request read loop.

/// Initial capacity used when none is configured.
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 1024;

/// A byte arena with a fill cursor.
///
/// Bytes are read into [`spare_mut`](Self::spare_mut), made visible with
/// [`commit`](Self::commit), and dropped from the front with
/// [`consume`](Self::consume), which compacts what is left. The arena only
/// grows when it is completely full, and then it doubles.
#[derive(Debug)]
pub(crate) struct ReadBuffer {
    bytes: Vec<u8>,
    filled: usize,
}

impl ReadBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { bytes: vec![0; capacity.max(1)], filled: 0 }
    }

    /// Writable tail of the arena. Never empty.
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        if self.filled == self.bytes.len() {
            let doubled = self.bytes.len() * 2;
            self.bytes.resize(doubled, 0);
        }
        &mut self.bytes[self.filled..]
    }

    pub(crate) fn commit(&mut self, n: usize) {
        debug_assert!(self.filled + n <= self.bytes.len());
        self.filled += n;
    }

    /// Bytes read but not yet consumed.
    pub(crate) fn filled(&self) -> &[u8] {
        &self.bytes[..self.filled]
    }

    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.filled);
        self.bytes.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_only_when_full() {
        let mut buf = ReadBuffer::with_capacity(4);
        assert_eq!(buf.spare_mut().len(), 4);
        buf.spare_mut()[..3].copy_from_slice(b"abc");
        buf.commit(3);
        assert_eq!(buf.spare_mut().len(), 1);
        assert_eq!(buf.capacity(), 4);

        buf.spare_mut()[0] = b'd';
        buf.commit(1);
        assert_eq!(buf.spare_mut().len(), 4);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.filled(), b"abcd");
    }

    #[test]
    fn consume_compacts_to_front() {
        let mut buf = ReadBuffer::with_capacity(8);
        buf.spare_mut()[..6].copy_from_slice(b"GET /x");
        buf.commit(6);
        buf.consume(4);
        assert_eq!(buf.filled(), b"/x");
        assert_eq!(buf.spare_mut().len(), 6);
    }

    #[test]
    fn zero_capacity_is_bumped() {
        let mut buf = ReadBuffer::with_capacity(0);
        assert_eq!(buf.spare_mut().len(), 1);
    }
}
