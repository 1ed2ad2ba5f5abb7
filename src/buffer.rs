/// Default capacity of the staging buffer owned by each reader and writer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A fixed capacity byte region with two cursors.
///
/// Bytes in `[first, last)` are valid and not yet consumed. New bytes are written into the spare
/// tail `[last, capacity)` and then committed with [`ByteBuffer::extend`]. The buffer never grows:
/// its owner has to drain it (or [`clear`](ByteBuffer::clear) it once empty) before the tail can be
/// reused.
#[derive(Debug)]
pub struct ByteBuffer {
    bytes: Box<[u8]>,
    first: usize,
    last: usize,
}

impl ByteBuffer {
    pub fn new(capacity: usize) -> ByteBuffer {
        assert!(capacity > 0, "buffer capacity must be at least one byte");

        ByteBuffer {
            bytes: vec![0; capacity].into_boxed_slice(),
            first: 0,
            last: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of valid, unconsumed bytes.
    pub fn len(&self) -> usize {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    /// True when no spare tail is left to write into.
    pub fn is_full(&self) -> bool {
        self.last == self.capacity()
    }

    pub fn clear(&mut self) {
        self.first = 0;
        self.last = 0;
    }

    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "consumed past the end of valid data");
        self.first += n;
    }

    pub fn extend(&mut self, n: usize) {
        assert!(n <= self.capacity() - self.last, "extended past capacity");
        self.last += n;
    }

    /// The valid, unconsumed bytes.
    pub fn filled(&self) -> &[u8] {
        &self.bytes[self.first..self.last]
    }

    /// The writable tail after the valid bytes.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.last..]
    }

    /// Copies as much of `src` as fits into the tail, returning the number of bytes taken.
    pub fn put(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.capacity() - self.last);
        self.spare_mut()[..n].copy_from_slice(&src[..n]);
        self.extend(n);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty() {
        let buffer = ByteBuffer::new(8);

        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn extend_then_consume_moves_cursors() {
        let mut buffer = ByteBuffer::new(8);

        buffer.spare_mut()[..3].copy_from_slice(b"abc");
        buffer.extend(3);
        assert_eq!(buffer.filled(), b"abc");

        buffer.consume(2);
        assert_eq!(buffer.filled(), b"c");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.spare_mut().len(), 5);
    }

    #[test]
    fn put_stops_at_capacity() {
        let mut buffer = ByteBuffer::new(4);

        assert_eq!(buffer.put(b"hello"), 4);
        assert!(buffer.is_full());
        assert_eq!(buffer.filled(), b"hell");
        assert_eq!(buffer.put(b"o"), 0);
    }

    #[test]
    fn clear_reclaims_the_tail() {
        let mut buffer = ByteBuffer::new(4);
        buffer.put(b"abcd");
        buffer.consume(4);

        assert!(buffer.is_empty());
        assert!(buffer.is_full());

        buffer.clear();
        assert!(!buffer.is_full());
        assert_eq!(buffer.put(b"xy"), 2);
        assert_eq!(buffer.filled(), b"xy");
    }

    #[test]
    #[should_panic(expected = "consumed past the end of valid data")]
    fn consume_more_than_available_panics() {
        let mut buffer = ByteBuffer::new(4);
        buffer.put(b"ab");
        buffer.consume(3);
    }
}
