// https://redis.io/docs/reference/protocol-spec

use std::borrow::Cow;
use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("unsupported frame data type: {0:?}")]
    UnsupportedDataType(char),
    /// Invalid message encoding.
    #[error("{0}")]
    Other(crate::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        let first_byte = get_byte(src)?;

        match DataType::try_from(first_byte)? {
            DataType::SimpleString => Ok(Frame::Simple(get_line(src)?)),
            DataType::SimpleError => Ok(Frame::Error(get_line(src)?)),
            DataType::Integer => Ok(Frame::Integer(get_integer(src)?)),
            // $<length>\r\n<data>\r\n
            DataType::BulkString => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => Ok(Frame::Bulk(get_exact(src, length)?)),
            },
            // !<length>\r\n<error>\r\n
            DataType::BulkError => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let msg = get_exact(src, length)?;
                    Ok(Frame::Error(String::from_utf8(msg.to_vec())?))
                }
            },
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let mut frames = Vec::with_capacity(length.min(1024));
                    for _ in 0..length {
                        frames.push(Self::parse(src)?);
                    }
                    Ok(Frame::Array(frames))
                }
            },
            DataType::Null => {
                get_frame_bytes(src)?;
                Ok(Frame::Null)
            }
            data_type => Err(Error::UnsupportedDataType(u8::from(data_type) as char)),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => write_line(out, DataType::SimpleString, single_line(s).as_bytes()),
            Frame::Error(s) => write_line(out, DataType::SimpleError, single_line(s).as_bytes()),
            Frame::Integer(i) => write_line(out, DataType::Integer, i.to_string().as_bytes()),
            Frame::Bulk(data) => {
                write_line(out, DataType::BulkString, data.len().to_string().as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(CRLF);
            }
            // RESP2 null bulk string, understood by every client.
            Frame::Null => write_line(out, DataType::BulkString, b"-1"),
            Frame::Array(frames) => {
                write_line(out, DataType::Array, frames.len().to_string().as_bytes());
                for frame in frames {
                    frame.write_to(out);
                }
            }
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
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

/// Simple strings and errors end at the first CRLF, so line breaks inside them are replaced with
/// spaces.
pub fn single_line(s: &str) -> Cow<'_, str> {
    const LINE_BREAKS: &[char] = &['\r', '\n'];

    if s.contains(LINE_BREAKS) {
        Cow::Owned(s.replace(LINE_BREAKS, " "))
    } else {
        Cow::Borrowed(s)
    }
}

fn write_line(out: &mut Vec<u8>, data_type: DataType, content: &[u8]) {
    out.push(u8::from(data_type));
    out.extend_from_slice(content);
    out.extend_from_slice(CRLF);
}

fn get_frame_bytes<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_line(src: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let bytes = get_frame_bytes(src)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    line.parse::<i64>()
        .map_err(|_| format!("protocol error; invalid integer {:?}", line).into())
}

/// Reads a length prefix. `None` stands for the RESP2 null (`-1`).
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    match get_integer(src)? {
        -1 => Ok(None),
        length if length < 0 => Err("protocol error; invalid length".into()),
        length => Ok(Some(length as usize)),
    }
}

/// Reads exactly `length` bytes followed by CRLF. Bulk payloads may contain CRLF themselves.
fn get_exact(src: &mut Cursor<&[u8]>, length: usize) -> Result<Bytes, Error> {
    let start = src.position() as usize;
    let buf = src.get_ref();

    if buf.len() < start + length + CRLF.len() {
        return Err(Error::Incomplete);
    }
    if &buf[start + length..start + length + CRLF.len()] != CRLF {
        return Err("protocol error; bulk payload is not terminated by CRLF".into());
    }

    let data = Bytes::copy_from_slice(&buf[start..start + length]);
    src.set_position((start + length + CRLF.len()) as u64);

    Ok(data)
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
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
    Null,           // '_'
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
            DataType::BigNumber => b'(',
            DataType::VerbatimString => b'=',
            DataType::Map => b'%',
            DataType::Set => b'~',
            DataType::Push => b'>',
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Result<Frame, Error> {
        let mut cursor = Cursor::new(data);
        Frame::parse(&mut cursor)
    }

    #[test]
    fn parse_simple_and_error_lines() {
        assert!(matches!(parse(b"+OK\r\n"), Ok(Frame::Simple(ref s)) if s == "OK"));
        assert!(matches!(
            parse(b"-ERR boom\r\n"),
            Ok(Frame::Error(ref s)) if s == "ERR boom"
        ));
    }

    #[test]
    fn parse_integers() {
        assert!(matches!(parse(b":1000\r\n"), Ok(Frame::Integer(1000))));
        assert!(matches!(parse(b":-7\r\n"), Ok(Frame::Integer(-7))));
        assert!(matches!(parse(b":+3\r\n"), Ok(Frame::Integer(3))));
        assert!(matches!(parse(b":abc\r\n"), Err(Error::Other(_))));
    }

    #[test]
    fn parse_bulk_string_with_embedded_crlf() {
        let frame = parse(b"$12\r\nreturn 1\r\n--\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(ref b)) if b == &Bytes::from("return 1\r\n--")
        ));
    }

    #[test]
    fn parse_nulls() {
        assert!(matches!(parse(b"$-1\r\n"), Ok(Frame::Null)));
        assert!(matches!(parse(b"*-1\r\n"), Ok(Frame::Null)));
        assert!(matches!(parse(b"_\r\n"), Ok(Frame::Null)));
    }

    #[test]
    fn parse_incomplete_input() {
        assert!(matches!(parse(b"$5\r\nhel"), Err(Error::Incomplete)));
        assert!(matches!(parse(b"*2\r\n$3\r\nGET\r\n"), Err(Error::Incomplete)));
        assert!(matches!(parse(b""), Err(Error::Incomplete)));
    }

    #[test]
    fn parse_nested_array_with_null() {
        let frame = parse(b"*3\r\n$4\r\nEVAL\r\n$-1\r\n*1\r\n:1\r\n").unwrap();

        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("EVAL")),
                Frame::Null,
                Frame::Array(vec![Frame::Integer(1)]),
            ])
        );
    }

    #[test]
    fn reject_unsupported_types() {
        assert!(matches!(parse(b"#t\r\n"), Err(Error::UnsupportedDataType('#'))));
        assert!(matches!(parse(b"?x\r\n"), Err(Error::InvalidDataType(b'?'))));
    }

    #[test]
    fn serialize_frames() {
        let frame = Frame::Array(vec![
            Frame::Simple("OK".to_string()),
            Frame::Error("ERR nope".to_string()),
            Frame::Integer(-2),
            Frame::Bulk(Bytes::from("abc")),
            Frame::Null,
            Frame::Array(vec![]),
        ]);

        assert_eq!(
            frame.serialize(),
            b"*6\r\n+OK\r\n-ERR nope\r\n:-2\r\n$3\r\nabc\r\n$-1\r\n*0\r\n".to_vec()
        );
    }

    #[test]
    fn serialize_line_breaks_in_simple_strings_and_errors() {
        assert_eq!(
            Frame::Simple("A\r\n+INJECTED".to_string()).serialize(),
            b"+A  +INJECTED\r\n".to_vec()
        );
        assert_eq!(
            Frame::Error("ERR x\r\n:1".to_string()).serialize(),
            b"-ERR x  :1\r\n".to_vec()
        );
        assert_eq!(
            Frame::Bulk(Bytes::from("a\r\nb")).serialize(),
            b"$4\r\na\r\nb\r\n".to_vec()
        );
    }
}
