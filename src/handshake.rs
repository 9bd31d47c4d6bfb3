//! Replica side of replication.
//!
//! A replica connects to its master, performs the handshake (PING, two REPLCONFs,
//! PSYNC), receives the snapshot and then applies every write the master propagates.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{error, info};

use crate::{
    connection::{apply_master_command, handle_master_connection},
    input::{write_value, CommandReadError, RespReader},
    replication::shared_writer,
    resp::RespValue,
    state::{ServerState, Session},
};

/// Capabilities announced to the master.
pub const REPLICA_CAPABILITIES: &str = "psync2";

/// Connection id used for the link to the master. Client connections start at 1.
pub const MASTER_LINK_ID: u64 = 0;

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to connect to master {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to read response from master: {0}")]
    ReadError(#[from] CommandReadError),
    #[error("master closed the connection during the handshake")]
    ConnectionClosed,
    #[error("invalid PSYNC response from master: {0:?}")]
    InvalidPsyncResponse(RespValue),
}

/// What the master answered to `PSYNC ? -1`.
#[derive(Debug, PartialEq, Clone)]
pub struct FullResync {
    pub repl_id: String,
    pub offset: String,
}

#[derive(Debug, PartialEq)]
pub struct HandshakeOutcome {
    pub full_resync: FullResync,
    /// Writes the master propagated before its PSYNC reply. The master registers a replica
    /// on REPLCONF, so these can arrive ahead of the snapshot.
    pub early_writes: Vec<RespValue>,
}

/// Performs the replication handshake against a master.
///
/// 1. `PING`
/// 2. `REPLCONF listening-port <listening_port>`
/// 3. `REPLCONF capa psync2`
/// 4. `PSYNC ? -1`, which must be answered with `FULLRESYNC <repl_id> <offset>`
///
/// Replies to the first three steps are not inspected. Arrays received while waiting for
/// a reply are propagated writes, not replies, and are collected in `early_writes`. The
/// snapshot that follows FULLRESYNC is left in `reader` for the caller.
pub async fn handshake<R, W>(
    reader: &mut RespReader<R>,
    writer: &mut W,
    listening_port: u16,
) -> Result<HandshakeOutcome, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut early_writes = Vec::new();
    let listening_port = listening_port.to_string();

    let commands = [
        RespValue::command(["PING"]),
        RespValue::command(["REPLCONF", "listening-port", listening_port.as_str()]),
        RespValue::command(["REPLCONF", "capa", REPLICA_CAPABILITIES]),
    ];

    for command in commands {
        send_and_handle_handshake_command(reader, writer, command, &mut early_writes).await?;
    }

    let response = send_and_handle_handshake_command(
        reader,
        writer,
        RespValue::command(["PSYNC", "?", "-1"]),
        &mut early_writes,
    )
    .await?;

    Ok(HandshakeOutcome {
        full_resync: parse_fullresync(&response)?,
        early_writes,
    })
}

async fn send_and_handle_handshake_command<R, W>(
    reader: &mut RespReader<R>,
    writer: &mut W,
    command: RespValue,
    early_writes: &mut Vec<RespValue>,
) -> Result<RespValue, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_value(writer, &command).await?;

    loop {
        match reader.read_value().await? {
            Some(write @ RespValue::Array(_)) => early_writes.push(write),
            Some(reply) => return Ok(reply),
            None => return Err(HandshakeError::ConnectionClosed),
        }
    }
}

/// Validates the reply to PSYNC.
///
/// The master may send the header as a simple string (`+FULLRESYNC <id> <offset>`) or
/// as a bulk string whose text holds the header, with or without the leading `+`. Only
/// the first line is considered and it must have exactly three space separated tokens.
pub fn parse_fullresync(response: &RespValue) -> Result<FullResync, HandshakeError> {
    let invalid = || HandshakeError::InvalidPsyncResponse(response.clone());

    let text = match response {
        RespValue::SimpleString(_) | RespValue::BulkString(_) => {
            response.as_text().ok_or_else(invalid)?
        }
        _ => return Err(invalid()),
    };

    let first_line = text.split("\r\n").next().unwrap_or_default();
    let tokens = first_line
        .strip_prefix('+')
        .unwrap_or(first_line)
        .split(' ')
        .collect::<Vec<_>>();

    match tokens.as_slice() {
        ["FULLRESYNC", repl_id, offset] => Ok(FullResync {
            repl_id: repl_id.to_string(),
            offset: offset.to_string(),
        }),
        _ => Err(invalid()),
    }
}

/// Connects to the master, completes the handshake and applies the replication stream.
///
/// Failures are logged and end the link; there is no retry.
pub async fn run_replication_link(host: String, port: u16, state: ServerState) {
    if let Err(e) = follow_master(&host, port, state).await {
        error!(master = %format!("{}:{}", host, port), error = %e, "replication handshake failed");
    }
}

async fn follow_master(host: &str, port: u16, state: ServerState) -> Result<(), HandshakeError> {
    let address = format!("{}:{}", host, port);

    let stream = TcpStream::connect(&address)
        .await
        .map_err(|source| HandshakeError::Connect {
            address: address.clone(),
            source,
        })?;
    info!(master = %address, "connected to master");

    let (reader, mut writer) = stream.into_split();
    let mut reader = RespReader::new(reader);

    let outcome = handshake(&mut reader, &mut writer, state.port).await?;
    info!(
        master = %address,
        repl_id = %outcome.full_resync.repl_id,
        offset = %outcome.full_resync.offset,
        "handshake completed"
    );

    let snapshot = reader.read_raw_payload().await?;
    info!(master = %address, bytes = snapshot.len(), "received snapshot");

    let session = Session {
        id: MASTER_LINK_ID,
        address,
        writer: shared_writer(writer),
    };

    for write in outcome.early_writes {
        apply_master_command(write, &state, &session).await;
    }

    handle_master_connection(reader, session, state).await;

    Ok(())
}
