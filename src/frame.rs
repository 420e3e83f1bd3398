// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

// Upper bound for the capacity reserved up front for aggregate frames, the declared length comes
// from the peer and is not trusted.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    /// Invalid message encoding.
    #[error("{0}")]
    Other(crate::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
    /// Key/value pairs flattened into one sequence: `[key1, value1, key2, value2, ...]`.
    Map(Vec<Frame>),
    Set(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let bytes = get_line(src)?.to_vec();
                let string = String::from_utf8(bytes)?;
                Ok(Frame::Simple(string))
            }
            DataType::SimpleError => {
                let bytes = get_line(src)?.to_vec();
                let string = String::from_utf8(bytes)?;
                Ok(Frame::Error(string))
            }
            DataType::Integer => {
                let integer = get_decimal(src)?;
                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = get_decimal(src)?;

                if length == -1 {
                    return Ok(Frame::Null);
                }

                let data = get_bulk(src, length)?;
                Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
            }
            // !<length>\r\n<error>\r\n
            DataType::BulkError => {
                let length = get_decimal(src)?;

                // NOTE: the protocol does not specify a way to represent a null bulk error
                if length == -1 {
                    return Ok(Frame::Null);
                }

                let msg = get_bulk(src, length)?.to_vec();
                let msg = String::from_utf8(msg)?;

                Ok(Frame::Error(msg))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = get_decimal(src)?;

                if length == -1 {
                    return Ok(Frame::Null);
                }

                let frames = parse_many(src, length)?;
                Ok(Frame::Array(frames))
            }
            // #<t|f>\r\n, the numeric form is accepted as well.
            DataType::Boolean => match get_line(src)? {
                b"1" | b"t" => Ok(Frame::Boolean(true)),
                b"0" | b"f" => Ok(Frame::Boolean(false)),
                other => Err(format!(
                    "protocol error; invalid boolean {:?}",
                    String::from_utf8_lossy(other)
                )
                .into()),
            },
            // ,[<+|->]<integral>[.<fractional>][<E|e>[sign]<exponent>]\r\n
            DataType::Double => {
                let line = String::from_utf8(get_line(src)?.to_vec())?;
                let double = line
                    .parse::<f64>()
                    .map_err(|e| -> crate::Error { Box::new(e) })
                    .map_err(Error::Other)?;

                Ok(Frame::Double(double))
            }
            // %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
            DataType::Map => {
                let entries = get_decimal(src)?;
                let length = entries
                    .checked_mul(2)
                    .ok_or_else(|| Error::from("protocol error; invalid map length"))?;

                let frames = parse_many(src, length)?;
                Ok(Frame::Map(frames))
            }
            // ~<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Set => {
                let length = get_decimal(src)?;
                let frames = parse_many(src, length)?;
                Ok(Frame::Set(frames))
            }
            DataType::Null => {
                // Advance the cursor to the end of the frame.
                let _ = get_line(src)?;

                Ok(Frame::Null)
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => write_line(bytes, DataType::SimpleString, &single_line(s)),
            Frame::Error(s) => write_line(bytes, DataType::SimpleError, &single_line(s)),
            Frame::Integer(i) => write_line(bytes, DataType::Integer, i.to_string().as_bytes()),
            Frame::Double(d) => write_line(bytes, DataType::Double, format_double(*d).as_bytes()),
            Frame::Boolean(b) => {
                let value: &[u8] = if *b { b"1" } else { b"0" };
                write_line(bytes, DataType::Boolean, value)
            }
            Frame::Bulk(data) => {
                write_line(bytes, DataType::BulkString, data.len().to_string().as_bytes());
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
            }
            // Always the RESP2 null bulk string, every client understands it.
            Frame::Null => bytes.extend_from_slice(b"$-1\r\n"),
            Frame::Array(frames) => write_aggregate(bytes, DataType::Array, frames.len(), frames),
            Frame::Map(frames) => write_aggregate(bytes, DataType::Map, frames.len() / 2, frames),
            Frame::Set(frames) => write_aggregate(bytes, DataType::Set, frames.len(), frames),
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Double(d) => write!(f, ",{}", format_double(*d)),
            Frame::Boolean(b) => write!(f, "#{}", if *b { "t" } else { "f" }),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(frames) => write_elements(f, '*', frames.len(), frames),
            Frame::Map(frames) => write_elements(f, '%', frames.len() / 2, frames),
            Frame::Set(frames) => write_elements(f, '~', frames.len(), frames),
        }
    }
}

fn write_elements(
    f: &mut fmt::Formatter<'_>,
    marker: char,
    length: usize,
    frames: &[Frame],
) -> fmt::Result {
    write!(f, "{}{}", marker, length)?;
    for frame in frames {
        write!(f, " {}", frame)?;
    }
    Ok(())
}

fn write_line(bytes: &mut Vec<u8>, data_type: DataType, line: &[u8]) {
    bytes.push(u8::from(data_type));
    bytes.extend_from_slice(line);
    bytes.extend_from_slice(CRLF);
}

// Simple strings and errors end at the first CRLF, line breaks inside them are sent as spaces.
fn single_line(s: &str) -> Vec<u8> {
    s.bytes()
        .map(|b| match b {
            b'\r' | b'\n' => b' ',
            b => b,
        })
        .collect()
}

fn write_aggregate(bytes: &mut Vec<u8>, data_type: DataType, length: usize, frames: &[Frame]) {
    write_line(bytes, data_type, length.to_string().as_bytes());
    for frame in frames {
        frame.write_to(bytes);
    }
}

fn format_double(double: f64) -> String {
    if double.is_nan() {
        "nan".to_string()
    } else if double.is_infinite() && double.is_sign_positive() {
        "inf".to_string()
    } else if double.is_infinite() {
        "-inf".to_string()
    } else {
        double.to_string()
    }
}

fn parse_many(src: &mut Cursor<&[u8]>, length: i64) -> Result<Vec<Frame>, Error> {
    let length = usize::try_from(length)
        .map_err(|_| Error::from(format!("protocol error; invalid length {}", length)))?;

    let mut frames = Vec::with_capacity(length.min(MAX_PREALLOCATED_ELEMENTS));
    for _ in 0..length {
        frames.push(Frame::parse(src)?);
    }

    Ok(frames)
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    let line_end_position = src.get_ref()[start..end]
        .windows(2)
        .position(|window| window == CRLF)
        .ok_or(Error::Incomplete)
        .map(|index| start + index)?;

    src.set_position((line_end_position + CRLF.len()) as u64);

    Ok(&src.get_ref()[start..line_end_position])
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    let line = std::str::from_utf8(line)
        .map_err(|_| Error::from("protocol error; invalid frame format"))?;

    line.parse::<i64>()
        .map_err(|e| -> crate::Error { Box::new(e) })
        .map_err(Error::Other)
}

// Bulk payloads are length prefixed and may contain CRLF themselves, so they are read by length
// rather than by scanning for the line terminator.
fn get_bulk<'a>(src: &mut Cursor<&'a [u8]>, length: i64) -> Result<&'a [u8], Error> {
    let length = usize::try_from(length)
        .map_err(|_| Error::from(format!("protocol error; invalid bulk length {}", length)))?;

    let start = src.position() as usize;
    let data_end = start + length;
    let frame_end = data_end + CRLF.len();

    if src.get_ref().len() < frame_end {
        return Err(Error::Incomplete);
    }

    if &src.get_ref()[data_end..frame_end] != CRLF {
        return Err("protocol error; bulk data is not terminated by CRLF".into());
    }

    src.set_position(frame_end as u64);

    Ok(&src.get_ref()[start..data_end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    BulkString,   // '$'
    SimpleError,  // '-'
    BulkError,    // '!'
    Boolean,      // '#'
    Integer,      // ':'
    Double,       // ','
    Array,        // '*'
    Map,          // '%'
    Set,          // '~'
    // Due to historical reasons, RESP2 features two specially crafted values for representing null
    // values of bulk strings and arrays. The null type, introduced in RESP3, is accepted on input
    // but never written.
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
            b'%' => Ok(Self::Map),
            b'~' => Ok(Self::Set),
            _ => Err(Error::InvalidDataType(byte)),
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
            DataType::Map => b'%',
            DataType::Set => b'~',
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "protocol error; invalid frame format".into()
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Other(src.into())
    }
}
