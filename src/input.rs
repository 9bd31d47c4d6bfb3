//! Reading and writing RESP values over network streams.
//!
//! [`RespReader`] owns the read half of a connection together with a buffer, so bytes
//! that arrive ahead of the value currently being decoded are kept for the next call.
//! This matters during replication, where the master may send the FULLRESYNC line, the
//! snapshot and the first propagated commands in a single TCP segment.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::resp::{RespError, RespValue};

/// Errors that can occur while reading values from a stream.
#[derive(Error, Debug)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// The peer closed the connection in the middle of a value.
    #[error("connection closed while reading a value")]
    ConnectionReset,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
}

pub struct RespReader<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R> RespReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        RespReader {
            reader,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Reads exactly one RESP value from the stream.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - A complete value was decoded
    /// * `Ok(None)` - The peer closed the connection cleanly between values
    /// * `Err(CommandReadError::ConnectionReset)` - The stream ended inside a value
    /// * `Err(CommandReadError::RespParseError)` - The bytes are not valid RESP
    pub async fn read_value(&mut self) -> Result<Option<RespValue>, CommandReadError> {
        loop {
            if let Some(value) = RespValue::decode(&mut self.buffer)? {
                return Ok(Some(value));
            }

            if !self.fill_buffer().await? {
                return Ok(None);
            }
        }
    }

    /// Reads a `$<len>\r\n<len bytes>` payload that is not followed by CRLF.
    pub async fn read_raw_payload(&mut self) -> Result<Bytes, CommandReadError> {
        loop {
            if let Some(payload) = RespValue::decode_raw_payload(&mut self.buffer)? {
                return Ok(payload);
            }

            if !self.fill_buffer().await? {
                return Err(CommandReadError::ConnectionReset);
            }
        }
    }

    /// Reads more bytes into the buffer. Returns `false` on a clean end of stream.
    async fn fill_buffer(&mut self) -> Result<bool, CommandReadError> {
        if self.reader.read_buf(&mut self.buffer).await? == 0 {
            if self.buffer.is_empty() {
                return Ok(false);
            }

            return Err(CommandReadError::ConnectionReset);
        }

        Ok(true)
    }
}

pub async fn write_value<W>(writer: &mut W, value: &RespValue) -> tokio::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&value.encode()).await?;
    writer.flush().await?;

    Ok(())
}
