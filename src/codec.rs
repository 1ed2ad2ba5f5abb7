//! Pieces shared by [`FrameReader`] and [`FrameWriter`]: the error type and the raw I/O
//! capabilities both of them are parameterised by.
//!
//! Neither side owns a socket. A reader pulls bytes through a [`RawRead`] and a writer pushes
//! bytes through a [`RawWrite`], so the same codec runs over a TCP stream, a pipe or an in-memory
//! slice.

use std::io;

use thiserror::Error as ThisError;

use crate::frame::Frame;
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The raw read or write capability failed. Terminal for the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer shut down cleanly: a raw read or write transferred zero bytes.
    #[error("end of stream reached")]
    EndOfStream,
    /// Malformed protocol data. Only the value being parsed is abandoned.
    #[error("Protocol error: {0}")]
    Invalid(String),
    /// A declared length or nesting depth exceeds the reader's limits. The rest of the oversized
    /// value is still on the wire, so the stream cannot be resumed.
    #[error("Protocol error: {0}")]
    LimitExceeded(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Error {
        Error::Invalid(msg.into())
    }

    pub(crate) fn limit_exceeded(msg: impl Into<String>) -> Error {
        Error::LimitExceeded(msg.into())
    }

    /// `Io` and `EndOfStream` both end the connection; `Invalid` and `LimitExceeded` do not come
    /// from the transport.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::EndOfStream)
    }
}

/// Source of raw bytes. Returns how many bytes were copied into `buf`; `Ok(0)` means end of
/// stream.
pub trait RawRead {
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<F> RawRead for F
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self(buf)
    }
}

/// Sink for raw bytes. Returns how many bytes of `buf` were accepted; `Ok(0)` means the peer
/// stopped accepting data.
pub trait RawWrite {
    fn write_raw(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<F> RawWrite for F
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    fn write_raw(&mut self, buf: &[u8]) -> io::Result<usize> {
        self(buf)
    }
}

/// Encodes a single frame into a freshly allocated byte vector.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::new();
    let mut writer = FrameWriter::new(|bytes: &[u8]| -> io::Result<usize> {
        out.extend_from_slice(bytes);
        Ok(bytes.len())
    });

    let result = writer.write_frame(frame).and_then(|()| writer.flush());
    debug_assert!(result.is_ok());
    drop(writer);

    out
}

/// Decodes the first frame found in `src`. Trailing bytes are ignored.
pub fn decode(src: &[u8]) -> Result<Frame, Error> {
    let mut remaining = src;
    let mut reader = FrameReader::new(move |buf: &mut [u8]| -> io::Result<usize> {
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        remaining = &remaining[n..];
        Ok(n)
    });

    reader.read_frame()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn encode_then_decode_command() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("ECHO")),
            Frame::Bulk(Bytes::from("hey")),
        ]);

        let bytes = encode(&frame);

        assert_eq!(bytes, b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n");
        assert_eq!(decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn decode_truncated_input_reports_end_of_stream() {
        let err = decode(b"$5\r\nhel").unwrap_err();

        assert!(matches!(err, Error::EndOfStream));
        assert!(err.is_io());
    }

    #[test]
    fn invalid_is_not_an_io_error() {
        let err = decode(b"?\r\n").unwrap_err();

        assert!(matches!(err, Error::Invalid(_)));
        assert!(!err.is_io());
        assert_eq!(err.to_string(), "Protocol error: unknown type tag '?'");
    }

    #[test]
    fn limit_errors_read_like_protocol_errors() {
        let err = Error::limit_exceeded("bulk string length exceeds limit");

        assert!(!err.is_io());
        assert_eq!(
            err.to_string(),
            "Protocol error: bulk string length exceeds limit"
        );
    }

    #[test]
    fn vec_conversion_matches_encode() {
        let frame = Frame::Simple("OK".to_string());

        let bytes: Vec<u8> = frame.into();

        assert_eq!(bytes, b"+OK\r\n");
    }
}
