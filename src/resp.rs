//! Redis Serialization Protocol (RESP) values.
//!
//! [`RespValue`] is used both as the wire representation and as the argument and
//! result type of every command. Decoding works on a [`BytesMut`] buffer that may
//! hold a partial frame, so the caller can keep reading from the socket until a
//! whole value is available.

use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors produced while decoding RESP data.
#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    /// Not enough data buffered to decode a full value.
    #[error("incomplete RESP value")]
    Incomplete,
    #[error("unknown RESP type byte '{0}'")]
    UnknownRespType(char),
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string length")]
    InvalidBulkStringLength,
    #[error("bulk string is not terminated by CRLF")]
    InvalidBulkStringTerminator,
    #[error("invalid array length")]
    InvalidArrayLength,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
}

impl RespError {
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR Protocol error: {}", self))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    NullBulkString,
    Array(Vec<RespValue>),
    /// A `$<len>\r\n` framed blob without the trailing CRLF, used for snapshot transfer.
    RawPayload(Bytes),
}

impl RespValue {
    pub fn simple_string(value: impl Into<String>) -> Self {
        RespValue::SimpleString(value.into())
    }

    pub fn bulk_string(value: impl Into<Bytes>) -> Self {
        RespValue::BulkString(value.into())
    }

    /// Builds a command array where every element is a bulk string.
    pub fn command<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|part| RespValue::BulkString(Bytes::copy_from_slice(part.as_ref())))
                .collect(),
        )
    }

    /// Returns the textual content of simple and bulk strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RespValue::SimpleString(s) | RespValue::Error(s) => Some(s.clone()),
            RespValue::BulkString(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode_into(&mut dst);
        dst.freeze()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                dst.put_u8(b'-');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                dst.put_slice(format!(":{}\r\n", n).as_bytes());
            }
            RespValue::BulkString(data) => {
                dst.put_slice(format!("${}\r\n", data.len()).as_bytes());
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            RespValue::NullBulkString => dst.put_slice(b"$-1\r\n"),
            RespValue::Array(elements) => {
                dst.put_slice(format!("*{}\r\n", elements.len()).as_bytes());
                for element in elements {
                    element.encode_into(dst);
                }
            }
            RespValue::RawPayload(data) => {
                dst.put_slice(format!("${}\r\n", data.len()).as_bytes());
                dst.put_slice(data);
            }
        }
    }

    /// Decodes one complete value from the front of `buffer`.
    ///
    /// Returns `Ok(None)` and leaves the buffer untouched when the value is not
    /// fully buffered yet. On success the consumed bytes are removed from the buffer.
    pub fn decode(buffer: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let mut cursor = Cursor::new(&buffer[..]);

        match parse_value(&mut cursor) {
            Ok(value) => {
                let consumed = cursor.position() as usize;
                buffer.advance(consumed);
                Ok(Some(value))
            }
            Err(RespError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decodes a raw payload (`$<len>\r\n<len bytes>`, no trailing CRLF).
    pub fn decode_raw_payload(buffer: &mut BytesMut) -> Result<Option<Bytes>, RespError> {
        let mut cursor = Cursor::new(&buffer[..]);

        let parsed = match get_u8(&mut cursor) {
            Ok(b'$') => get_length(&mut cursor, RespError::InvalidBulkStringLength)
                .and_then(|len| len.ok_or(RespError::InvalidBulkStringLength))
                .and_then(|len| take(&mut cursor, len).map(|_| len)),
            Ok(other) => Err(RespError::UnknownRespType(other as char)),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(len) => {
                let header = cursor.position() as usize - len;
                buffer.advance(header);
                Ok(Some(buffer.split_to(len).freeze()))
            }
            Err(RespError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn parse_value(src: &mut Cursor<&[u8]>) -> Result<RespValue, RespError> {
    match get_u8(src)? {
        b'+' => Ok(RespValue::SimpleString(get_text(src)?)),
        b'-' => Ok(RespValue::Error(get_text(src)?)),
        b':' => {
            let line = get_line(src)?;
            let text = std::str::from_utf8(line).map_err(|_| RespError::FailedToParseInteger)?;
            text.parse::<i64>()
                .map(RespValue::Integer)
                .map_err(|_| RespError::FailedToParseInteger)
        }
        b'$' => match get_length(src, RespError::InvalidBulkStringLength)? {
            None => Ok(RespValue::NullBulkString),
            Some(len) => {
                let data = Bytes::copy_from_slice(take(src, len)?);

                if take(src, 2)? != b"\r\n" {
                    return Err(RespError::InvalidBulkStringTerminator);
                }

                Ok(RespValue::BulkString(data))
            }
        },
        b'*' => {
            let len = get_length(src, RespError::InvalidArrayLength)?
                .ok_or(RespError::InvalidArrayLength)?;

            let mut elements = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                elements.push(parse_value(src)?);
            }

            Ok(RespValue::Array(elements))
        }
        other => Err(RespError::UnknownRespType(other as char)),
    }
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, RespError> {
    if !src.has_remaining() {
        return Err(RespError::Incomplete);
    }

    Ok(src.get_u8())
}

fn take<'a>(src: &mut Cursor<&'a [u8]>, n: usize) -> Result<&'a [u8], RespError> {
    if src.remaining() < n {
        return Err(RespError::Incomplete);
    }

    let start = src.position() as usize;
    let data = *src.get_ref();
    src.advance(n);
    Ok(&data[start..start + n])
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], RespError> {
    let start = src.position() as usize;
    let data = *src.get_ref();

    match data[start..].windows(2).position(|window| window == b"\r\n") {
        Some(offset) => {
            src.set_position((start + offset + 2) as u64);
            Ok(&data[start..start + offset])
        }
        None => Err(RespError::Incomplete),
    }
}

fn get_text(src: &mut Cursor<&[u8]>) -> Result<String, RespError> {
    let line = get_line(src)?;
    String::from_utf8(line.to_vec()).map_err(|_| RespError::InvalidUtf8)
}

/// Parses a length header. `-1` means null and maps to `None`.
fn get_length(src: &mut Cursor<&[u8]>, invalid: RespError) -> Result<Option<usize>, RespError> {
    let line = get_line(src)?;

    let length = std::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse::<i64>().ok());

    match length {
        Some(-1) => Ok(None),
        Some(n) if n >= 0 => Ok(Some(n as usize)),
        _ => Err(invalid),
    }
}
