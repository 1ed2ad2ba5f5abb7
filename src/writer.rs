use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::buffer::{ByteBuffer, DEFAULT_CAPACITY};
use crate::codec::{Error, RawWrite};
use crate::frame::{DataType, Frame, CRLF};

/// Encodes frames into a fixed capacity [`ByteBuffer`] and drains it through a [`RawWrite`].
///
/// Bytes are only pushed to the sink when the buffer fills up or when [`flush`](Self::flush) is
/// called, so callers must flush after every complete reply.
pub struct FrameWriter<W> {
    writer: W,
    buffer: ByteBuffer,
}

impl<W: RawWrite> FrameWriter<W> {
    pub fn new(writer: W) -> FrameWriter<W> {
        FrameWriter::with_capacity(writer, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(writer: W, capacity: usize) -> FrameWriter<W> {
        FrameWriter {
            writer,
            buffer: ByteBuffer::new(capacity),
        }
    }

    /// Number of encoded bytes not yet handed to the sink.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        match frame {
            // +<data>\r\n
            Frame::Simple(s) => self.write_simple(DataType::SimpleString, s.as_bytes()),
            // -<data>\r\n
            Frame::Error(s) => self.write_simple(DataType::SimpleError, s.as_bytes()),
            // :<integer>\r\n
            Frame::Integer(i) => self.write_simple(DataType::Integer, i.to_string().as_bytes()),
            // $<length>\r\n<data>\r\n
            Frame::Bulk(bytes) => self.write_bulk(DataType::BulkString, bytes),
            // !<length>\r\n<error>\r\n
            Frame::BulkError(bytes) => self.write_bulk(DataType::BulkError, bytes),
            // =<length>\r\n<encoding>:<data>\r\n, the length includes "<encoding>:".
            Frame::Verbatim { encoding, data } => {
                self.write_header(DataType::VerbatimString, data.len() + 4)?;
                self.put(encoding)?;
                self.put(b":")?;
                self.put(data)?;
                self.put(CRLF)
            }
            // (<big-number>\r\n
            Frame::BigNumber(n) => self.write_simple(DataType::BigNumber, n.as_bytes()),
            // ,<floating-point-number>\r\n
            Frame::Double(d) => self.write_simple(DataType::Double, format_double(*d).as_bytes()),
            // #<t|f>\r\n
            Frame::Boolean(b) => {
                self.write_simple(DataType::Boolean, if *b { b"t" } else { b"f" })
            }
            // _\r\n
            Frame::Null => self.write_simple(DataType::Null, b""),
            // *<number-of-elements>\r\n<element-1>...<element-n>
            Frame::Array(frames) => self.write_aggregate(DataType::Array, frames),
            Frame::Set(frames) => self.write_aggregate(DataType::Set, frames),
            Frame::Push(frames) => self.write_aggregate(DataType::Push, frames),
            // %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
            Frame::Map(pairs) => {
                self.write_header(DataType::Map, pairs.len())?;
                for (key, value) in pairs {
                    self.write_frame(key)?;
                    self.write_frame(value)?;
                }
                Ok(())
            }
        }
    }

    /// Hands every buffered byte to the sink. A no-op, with no raw writes, when nothing is
    /// buffered.
    pub fn flush(&mut self) -> Result<(), Error> {
        while !self.buffer.is_empty() {
            match self.writer.write_raw(self.buffer.filled()) {
                Ok(0) => return Err(Error::EndOfStream),
                Ok(n) if n > self.buffer.len() => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "raw write reported more bytes than given",
                    )))
                }
                Ok(n) => {
                    trace!(bytes = n, "drained write buffer");
                    self.buffer.consume(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        self.buffer.clear();

        Ok(())
    }

    fn write_simple(&mut self, data_type: DataType, data: &[u8]) -> Result<(), Error> {
        self.put(&[u8::from(data_type)])?;
        self.put(data)?;
        self.put(CRLF)
    }

    fn write_bulk(&mut self, data_type: DataType, data: &[u8]) -> Result<(), Error> {
        self.write_header(data_type, data.len())?;
        self.put(data)?;
        self.put(CRLF)
    }

    fn write_aggregate(&mut self, data_type: DataType, frames: &[Frame]) -> Result<(), Error> {
        self.write_header(data_type, frames.len())?;
        for frame in frames {
            self.write_frame(frame)?;
        }
        Ok(())
    }

    fn write_header(&mut self, data_type: DataType, length: usize) -> Result<(), Error> {
        self.write_simple(data_type, length.to_string().as_bytes())
    }

    fn put(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            if self.buffer.is_full() {
                self.flush()?;
            }
            let n = self.buffer.put(bytes);
            bytes = &bytes[n..];
        }
        Ok(())
    }
}

/// RESP3 spells the special values `inf`, `-inf` and `nan`; everything else uses the shortest
/// representation that parses back to the same value.
fn format_double(d: f64) -> String {
    if d.is_nan() {
        "nan".to_string()
    } else if d == f64::INFINITY {
        "inf".to_string()
    } else if d == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        d.to_string()
    }
}

/// A [`FrameWriter`] that can be shared by several producers on one connection.
///
/// [`send`](SharedWriter::send) holds the lock for one whole `write_frame` + `flush`, so replies
/// and out-of-band pushes are never interleaved on the wire.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<FrameWriter<W>>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        SharedWriter {
            inner: self.inner.clone(),
        }
    }
}

impl<W: RawWrite> SharedWriter<W> {
    pub fn new(writer: FrameWriter<W>) -> SharedWriter<W> {
        SharedWriter {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn send(&self, frame: &Frame) -> Result<(), Error> {
        // Keep serving after a producer panicked while holding the lock.
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        writer.write_frame(frame)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn encode(frame: &Frame) -> String {
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(|bytes: &[u8]| -> io::Result<usize> {
            out.extend_from_slice(bytes);
            Ok(bytes.len())
        });
        writer.write_frame(frame).unwrap();
        writer.flush().unwrap();
        drop(writer);

        String::from_utf8(out).unwrap()
    }

    #[test]
    fn serialize_simple_frames() {
        assert_eq!(encode(&Frame::Simple("OK".to_string())), "+OK\r\n");
        assert_eq!(encode(&Frame::Error("ERR oops".to_string())), "-ERR oops\r\n");
        assert_eq!(encode(&Frame::Integer(-42)), ":-42\r\n");
        assert_eq!(encode(&Frame::Null), "_\r\n");
        assert_eq!(encode(&Frame::Boolean(true)), "#t\r\n");
        assert_eq!(encode(&Frame::Boolean(false)), "#f\r\n");
        assert_eq!(
            encode(&Frame::BigNumber("-3492890328409238509324850943850943825024385".to_string())),
            "(-3492890328409238509324850943850943825024385\r\n"
        );
    }

    #[test]
    fn serialize_bulk_frames() {
        assert_eq!(encode(&Frame::Bulk(Bytes::from("hello"))), "$5\r\nhello\r\n");
        assert_eq!(encode(&Frame::Bulk(Bytes::new())), "$0\r\n\r\n");
        assert_eq!(
            encode(&Frame::BulkError(Bytes::from("ERR bad"))),
            "!7\r\nERR bad\r\n"
        );
        assert_eq!(
            encode(&Frame::BulkError(Bytes::from_static(b"ERR\r\n\0x"))),
            "!7\r\nERR\r\n\0x\r\n"
        );
    }

    #[test]
    fn serialize_verbatim_frame() {
        let frame = Frame::verbatim(*b"txt", "Some string");

        assert_eq!(encode(&frame), "=15\r\ntxt:Some string\r\n");
    }

    #[test]
    fn serialize_double_frames() {
        assert_eq!(encode(&Frame::Double(1.23)), ",1.23\r\n");
        assert_eq!(encode(&Frame::Double(10.0)), ",10\r\n");
        assert_eq!(encode(&Frame::Double(f64::INFINITY)), ",inf\r\n");
        assert_eq!(encode(&Frame::Double(f64::NEG_INFINITY)), ",-inf\r\n");
        assert_eq!(encode(&Frame::Double(f64::NAN)), ",nan\r\n");
    }

    #[test]
    fn serialize_aggregate_frames() {
        assert_eq!(encode(&Frame::Array(vec![])), "*0\r\n");
        assert_eq!(
            encode(&Frame::Array(vec![Frame::Integer(1), Frame::Integer(2)])),
            "*2\r\n:1\r\n:2\r\n"
        );
        assert_eq!(
            encode(&Frame::Set(vec![Frame::Boolean(true)])),
            "~1\r\n#t\r\n"
        );
        assert_eq!(
            encode(&Frame::Push(vec![Frame::Simple("pong".to_string())])),
            ">1\r\n+pong\r\n"
        );
        assert_eq!(
            encode(&Frame::Map(vec![
                (Frame::Simple("first".to_string()), Frame::Integer(1)),
                (Frame::Simple("second".to_string()), Frame::Integer(2)),
            ])),
            "%2\r\n+first\r\n:1\r\n+second\r\n:2\r\n"
        );
    }

    #[test]
    fn flush_with_empty_buffer_performs_no_raw_writes() {
        let mut calls = 0;
        let mut writer = FrameWriter::new(|bytes: &[u8]| -> io::Result<usize> {
            calls += 1;
            Ok(bytes.len())
        });

        writer.flush().unwrap();
        writer.flush().unwrap();
        drop(writer);

        assert_eq!(calls, 0);
    }

    #[test]
    fn nothing_is_written_before_flush() {
        let mut calls = 0;
        let mut writer = FrameWriter::new(|bytes: &[u8]| -> io::Result<usize> {
            calls += 1;
            Ok(bytes.len())
        });

        writer.write_frame(&Frame::Simple("OK".to_string())).unwrap();
        assert_eq!(writer.buffered(), 5);
        drop(writer);

        assert_eq!(calls, 0);
    }

    #[test]
    fn full_buffer_is_flushed_before_accepting_more() {
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let mut writer = FrameWriter::with_capacity(
            |bytes: &[u8]| -> io::Result<usize> {
                chunks.push(bytes.to_vec());
                Ok(bytes.len())
            },
            4,
        );

        writer.write_frame(&Frame::Bulk(Bytes::from("hello"))).unwrap();
        writer.flush().unwrap();
        drop(writer);

        assert!(chunks.iter().all(|chunk| chunk.len() <= 4));
        assert_eq!(chunks.concat(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn short_raw_writes_are_retried_until_drained() {
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(|bytes: &[u8]| -> io::Result<usize> {
            // Accept a single byte per call.
            out.push(bytes[0]);
            Ok(1)
        });

        writer.write_frame(&Frame::Simple("PONG".to_string())).unwrap();
        writer.flush().unwrap();
        drop(writer);

        assert_eq!(out, b"+PONG\r\n");
    }

    #[test]
    fn zero_byte_raw_write_is_end_of_stream() {
        let mut writer = FrameWriter::new(|_: &[u8]| -> io::Result<usize> { Ok(0) });

        writer.write_frame(&Frame::Null).unwrap();

        assert!(matches!(writer.flush(), Err(Error::EndOfStream)));
    }

    #[test]
    fn raw_write_failure_is_an_io_error() {
        let mut writer = FrameWriter::new(|_: &[u8]| -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        });

        writer.write_frame(&Frame::Null).unwrap();

        assert!(
            matches!(writer.flush(), Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::BrokenPipe)
        );
    }

    #[test]
    fn shared_writer_sends_whole_frames() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        let writer = SharedWriter::new(FrameWriter::with_capacity(
            move |bytes: &[u8]| -> io::Result<usize> {
                sink.lock().unwrap().extend_from_slice(bytes);
                Ok(bytes.len())
            },
            8,
        ));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        writer
                            .send(&Frame::Bulk(Bytes::from(format!("reply-{}", i))))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let out = out.lock().unwrap();
        let mut remaining = &out[..];
        let mut frames = 0;
        while !remaining.is_empty() {
            let frame = crate::codec::decode(remaining).unwrap();
            let length = Vec::<u8>::from(&frame).len();
            assert!(matches!(frame, Frame::Bulk(ref b) if b.starts_with(b"reply-")));
            remaining = &remaining[length..];
            frames += 1;
        }
        assert_eq!(frames, 100);
    }
}
