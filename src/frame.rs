// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Bytes;

use crate::codec::Error;

pub(crate) static CRLF: &[u8; 2] = b"\r\n";

/// A single protocol value, as decoded by [`FrameReader`](crate::reader::FrameReader) or encoded
/// by [`FrameWriter`](crate::writer::FrameWriter).
///
/// Aggregates keep their elements in wire order. `Map` is a sequence of pairs rather than a
/// dictionary and `Set` keeps duplicates: deduplication, if any, belongs to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    BulkError(Bytes),
    /// RESP3 verbatim string: a bulk payload tagged with a 3 byte encoding such as `txt`.
    Verbatim {
        encoding: [u8; 3],
        data: Bytes,
    },
    /// Arbitrary precision integer, kept as the decimal text received on the wire.
    BigNumber(String),
    Double(f64),
    Boolean(bool),
    Null,
    Array(Vec<Frame>),
    Map(Vec<(Frame, Frame)>),
    Set(Vec<Frame>),
    Push(Vec<Frame>),
}

impl Frame {
    pub fn data_type(&self) -> DataType {
        match self {
            Frame::Simple(_) => DataType::SimpleString,
            Frame::Error(_) => DataType::SimpleError,
            Frame::Integer(_) => DataType::Integer,
            Frame::Bulk(_) => DataType::BulkString,
            Frame::BulkError(_) => DataType::BulkError,
            Frame::Verbatim { .. } => DataType::VerbatimString,
            Frame::BigNumber(_) => DataType::BigNumber,
            Frame::Double(_) => DataType::Double,
            Frame::Boolean(_) => DataType::Boolean,
            Frame::Null => DataType::Null,
            Frame::Array(_) => DataType::Array,
            Frame::Map(_) => DataType::Map,
            Frame::Set(_) => DataType::Set,
            Frame::Push(_) => DataType::Push,
        }
    }

    /// Builds a verbatim string frame, e.g. `Frame::verbatim(*b"txt", "Some string")`.
    pub fn verbatim(encoding: [u8; 3], data: impl Into<Bytes>) -> Frame {
        Frame::Verbatim {
            encoding,
            data: data.into(),
        }
    }
}

impl From<&Frame> for Vec<u8> {
    fn from(frame: &Frame) -> Self {
        crate::codec::encode(frame)
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        crate::codec::encode(&frame)
    }
}

// Human readable rendering used for logging, not the wire encoding.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::BulkError(bytes) => write!(f, "!{}", String::from_utf8_lossy(bytes)),
            Frame::Verbatim { encoding, data } => write!(
                f,
                "={}:{}",
                String::from_utf8_lossy(encoding),
                String::from_utf8_lossy(data)
            ),
            Frame::BigNumber(n) => write!(f, "({}", n),
            Frame::Double(d) => write!(f, ",{}", d),
            Frame::Boolean(b) => write!(f, "#{}", if *b { 't' } else { 'f' }),
            Frame::Null => write!(f, "_"),
            Frame::Array(frames) => write_aggregate(f, '*', frames),
            Frame::Set(frames) => write_aggregate(f, '~', frames),
            Frame::Push(frames) => write_aggregate(f, '>', frames),
            Frame::Map(pairs) => {
                write!(f, "%{}", pairs.len())?;
                for (key, value) in pairs {
                    write!(f, " {} => {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

fn write_aggregate(f: &mut fmt::Formatter<'_>, tag: char, frames: &[Frame]) -> fmt::Result {
    write!(f, "{}{}", tag, frames.len())?;
    for frame in frames {
        write!(f, " {}", frame)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    SimpleString,   // '+'
    BulkString,     // '$'
    VerbatimString, // '='
    SimpleError,    // '-'
    BulkError,      // '!'
    Boolean,        // '#'
    Integer,        // ':'
    Double,         // ','
    BigNumber,      // '('
    Array,          // '*'
    Map,            // '%'
    Set,            // '~'
    Push,           // '>'
    // Due to historical reasons, RESP2 features two specially crafted values for representing null
    // values of bulk strings and arrays. This duality has always been a redundancy that added zero
    // semantical value to the protocol itself. The null type, introduced in RESP3, aims to fix
    // this wrong.
    Null, // '_'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'!' => Ok(Self::BulkError),
            b'*' => Ok(Self::Array),
            b'_' => Ok(Self::Null),
            b'#' => Ok(Self::Boolean),
            b',' => Ok(Self::Double),
            b'(' => Ok(Self::BigNumber),
            b'=' => Ok(Self::VerbatimString),
            b'%' => Ok(Self::Map),
            b'~' => Ok(Self::Set),
            b'>' => Ok(Self::Push),
            _ => Err(Error::invalid(format!(
                "unknown type tag '{}'",
                byte.escape_ascii()
            ))),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::BulkError => b'!',
            DataType::Array => b'*',
            DataType::Null => b'_',
            DataType::Boolean => b'#',
            DataType::Double => b',',
            DataType::BigNumber => b'(',
            DataType::VerbatimString => b'=',
            DataType::Map => b'%',
            DataType::Set => b'~',
            DataType::Push => b'>',
        }
    }
}
