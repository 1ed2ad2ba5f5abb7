use std::io;

use bytes::Bytes;
use tracing::trace;

use crate::buffer::{ByteBuffer, DEFAULT_CAPACITY};
use crate::codec::{Error, RawRead};
use crate::frame::{DataType, Frame};

/// Default number of aggregate levels a frame may nest.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default upper bound for a single bulk payload or simple line (Redis `proto-max-bulk-len`).
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

// Declared counts and lengths come from the peer, so only this much is reserved up front.
const MAX_PREALLOCATED_FRAMES: usize = 1024;
const MAX_PREALLOCATED_BYTES: usize = 64 * 1024;

/// Bounds applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    pub max_bulk_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: DEFAULT_MAX_DEPTH,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
        }
    }
}

/// Decodes one [`Frame`] per [`read_frame`](FrameReader::read_frame) call from bytes pulled
/// through a [`RawRead`].
///
/// Bytes are staged in a fixed capacity [`ByteBuffer`] which is topped up only when it runs dry,
/// so a frame may arrive in any number of short reads.
pub struct FrameReader<R> {
    reader: R,
    buffer: ByteBuffer,
    limits: Limits,
}

impl<R: RawRead> FrameReader<R> {
    pub fn new(reader: R) -> FrameReader<R> {
        FrameReader::with_capacity(reader, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> FrameReader<R> {
        FrameReader {
            reader,
            buffer: ByteBuffer::new(capacity),
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> FrameReader<R> {
        self.limits = limits;
        self
    }

    /// Number of bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops every buffered byte. After an `Invalid` error the buffer position is not known to be
    /// a frame boundary; this lets the caller resume at the next raw read instead.
    pub fn discard_buffered(&mut self) {
        self.buffer.clear();
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads exactly one frame.
    ///
    /// Fails with [`Error::EndOfStream`] if the peer closes the stream, even halfway through a
    /// frame, with [`Error::Io`] if the raw read fails, with [`Error::LimitExceeded`] when a length
    /// or the nesting depth is over [`Limits`] and with [`Error::Invalid`] on other malformed data.
    pub fn read_frame(&mut self) -> Result<Frame, Error> {
        self.read_nested(0)
    }

    fn read_nested(&mut self, depth: usize) -> Result<Frame, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let data_type = DataType::try_from(self.next_byte()?)?;

        match data_type {
            DataType::SimpleString => self.next_text("simple string").map(Frame::Simple),
            DataType::SimpleError => self.next_text("simple error").map(Frame::Error),
            DataType::Integer => self.next_integer().map(Frame::Integer),
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = self.next_integer()?;

                // RESP2 null bulk string, `$-1\r\n`.
                if length < 0 {
                    return Ok(Frame::Null);
                }

                let length = self.bulk_len(length, "bulk string")?;
                self.next_bulk(length, "bulk string").map(Frame::Bulk)
            }
            // !<length>\r\n<error>\r\n
            DataType::BulkError => {
                let length = self.next_integer()?;
                let length = self.bulk_len(length, "bulk error")?;
                self.next_bulk(length, "bulk error").map(Frame::BulkError)
            }
            // =<length>\r\n<encoding>:<data>\r\n
            DataType::VerbatimString => {
                let length = self.next_integer()?;

                // The declared length covers the 3 byte encoding and the colon.
                if length < 4 {
                    return Err(Error::invalid("invalid verbatim string length"));
                }

                let length = self.bulk_len(length, "verbatim string")?;
                let mut encoding = [0; 3];
                self.next_exact(&mut encoding)?;
                if self.next_byte()? != b':' {
                    return Err(Error::invalid("expected ':' after verbatim string encoding"));
                }

                let data = self.next_bulk(length - 4, "verbatim string")?;
                Ok(Frame::Verbatim { encoding, data })
            }
            DataType::BigNumber => self.next_text("big number").map(Frame::BigNumber),
            DataType::Double => {
                let text = self.next_text("double")?;
                text.parse::<f64>()
                    .map(Frame::Double)
                    .map_err(|_| Error::invalid(format!("invalid double '{}'", text)))
            }
            DataType::Boolean => {
                let value = match self.next_byte()? {
                    b't' => true,
                    b'f' => false,
                    _ => return Err(Error::invalid("invalid boolean")),
                };
                self.expect_crlf("boolean")?;

                Ok(Frame::Boolean(value))
            }
            DataType::Null => {
                self.expect_crlf("null")?;

                Ok(Frame::Null)
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = self.next_integer()?;

                // RESP2 null array, `*-1\r\n`.
                if length < 0 {
                    return Ok(Frame::Null);
                }

                self.next_frames(length, depth, "array").map(Frame::Array)
            }
            DataType::Set => {
                let length = self.next_integer()?;
                self.next_frames(length, depth, "set").map(Frame::Set)
            }
            DataType::Push => {
                let length = self.next_integer()?;
                self.next_frames(length, depth, "push").map(Frame::Push)
            }
            // %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
            DataType::Map => {
                let length = self.next_integer()?;
                let length = self.aggregate_len(length, depth, "map")?;

                let mut pairs = Vec::with_capacity(length.min(MAX_PREALLOCATED_FRAMES));
                for _ in 0..length {
                    let key = self.read_nested(depth + 1)?;
                    let value = self.read_nested(depth + 1)?;
                    pairs.push((key, value));
                }

                Ok(Frame::Map(pairs))
            }
        }
    }

    fn next_frames(
        &mut self,
        length: i64,
        depth: usize,
        what: &str,
    ) -> Result<Vec<Frame>, Error> {
        let length = self.aggregate_len(length, depth, what)?;

        let mut frames = Vec::with_capacity(length.min(MAX_PREALLOCATED_FRAMES));
        for _ in 0..length {
            frames.push(self.read_nested(depth + 1)?);
        }

        Ok(frames)
    }

    fn aggregate_len(&self, length: i64, depth: usize, what: &str) -> Result<usize, Error> {
        if depth >= self.limits.max_depth {
            return Err(Error::limit_exceeded(format!("{} nesting too deep", what)));
        }

        usize::try_from(length).map_err(|_| Error::invalid(format!("invalid {} length", what)))
    }

    fn bulk_len(&self, length: i64, what: &str) -> Result<usize, Error> {
        let length =
            usize::try_from(length).map_err(|_| Error::invalid(format!("invalid {} length", what)))?;

        if length > self.limits.max_bulk_len {
            return Err(Error::limit_exceeded(format!("{} length exceeds limit", what)));
        }

        Ok(length)
    }

    /// Reads `length` payload bytes followed by CRLF. Payload content is never scanned.
    fn next_bulk(&mut self, length: usize, what: &str) -> Result<Bytes, Error> {
        let mut data = Vec::with_capacity(length.min(MAX_PREALLOCATED_BYTES));

        while data.len() < length {
            self.fill_if_empty()?;
            let available = self.buffer.filled();
            let n = available.len().min(length - data.len());
            data.extend_from_slice(&available[..n]);
            self.buffer.consume(n);
        }

        self.expect_crlf(what)?;

        Ok(Bytes::from(data))
    }

    fn next_text(&mut self, what: &str) -> Result<String, Error> {
        let line = self.next_line()?;

        String::from_utf8(line).map_err(|_| Error::invalid(format!("{} is not valid UTF-8", what)))
    }

    fn next_integer(&mut self) -> Result<i64, Error> {
        let line = self.next_line()?;

        parse_integer(&line)
            .ok_or_else(|| Error::invalid(format!("invalid integer '{}'", line.escape_ascii())))
    }

    /// Reads a simple-encoded line. The CRLF terminator is consumed but not returned.
    fn next_line(&mut self) -> Result<Vec<u8>, Error> {
        let mut line = Vec::new();

        loop {
            self.fill_if_empty()?;
            let available = self.buffer.filled();
            let end = available.iter().position(|&b| b == b'\r' || b == b'\n');
            let n = end.unwrap_or(available.len());
            line.extend_from_slice(&available[..n]);

            if line.len() > self.limits.max_bulk_len {
                return Err(Error::limit_exceeded("line length exceeds limit"));
            }

            match end {
                Some(end) => {
                    let terminator = available[end];
                    self.buffer.consume(end + 1);

                    if terminator == b'\n' || self.next_byte()? != b'\n' {
                        return Err(Error::invalid("expected CRLF line terminator"));
                    }

                    break;
                }
                None => self.buffer.consume(n),
            }
        }

        Ok(line)
    }

    fn expect_crlf(&mut self, what: &str) -> Result<(), Error> {
        if self.next_byte()? != b'\r' || self.next_byte()? != b'\n' {
            return Err(Error::invalid(format!("expected CRLF after {}", what)));
        }

        Ok(())
    }

    fn next_exact(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let mut off = 0;

        while off < out.len() {
            self.fill_if_empty()?;
            let n = self.buffer.len().min(out.len() - off);
            out[off..off + n].copy_from_slice(&self.buffer.filled()[..n]);
            self.buffer.consume(n);
            off += n;
        }

        Ok(())
    }

    fn next_byte(&mut self) -> Result<u8, Error> {
        self.fill_if_empty()?;
        let byte = self.buffer.filled()[0];
        self.buffer.consume(1);

        Ok(byte)
    }

    fn fill_if_empty(&mut self) -> Result<(), Error> {
        if !self.buffer.is_empty() {
            return Ok(());
        }

        // Nothing is buffered, so the whole capacity is free again.
        self.buffer.clear();

        loop {
            let spare = self.buffer.spare_mut();
            let capacity = spare.len();

            match self.reader.read_raw(spare) {
                Ok(0) => return Err(Error::EndOfStream),
                Ok(n) if n > capacity => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "raw read reported more bytes than requested",
                    )))
                }
                Ok(n) => {
                    trace!(bytes = n, "filled read buffer");
                    self.buffer.extend(n);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}

/// Parses an optionally signed decimal, digit by digit. `None` on empty input, stray bytes or
/// overflow.
fn parse_integer(line: &[u8]) -> Option<i64> {
    let (negative, digits) = match line.split_first()? {
        (b'-', rest) => (true, rest),
        (b'+', rest) => (false, rest),
        _ => (false, line),
    };

    if digits.is_empty() {
        return None;
    }

    digits.iter().try_fold(0i64, |value, &byte| {
        if !byte.is_ascii_digit() {
            return None;
        }

        let digit = i64::from(byte - b'0');
        let value = value.checked_mul(10)?;
        if negative {
            value.checked_sub(digit)
        } else {
            value.checked_add(digit)
        }
    })
}
