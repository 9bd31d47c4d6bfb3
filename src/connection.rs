use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{
    commands::{CommandHandler, CommandResult},
    input::{CommandReadError, RespReader},
    replication::{shared_writer, ConnectionId, SharedWriter, EMPTY_SNAPSHOT},
    resp::RespValue,
    state::{ServerState, Session},
};

/// Serves one client until it disconnects or sends malformed data.
///
/// Every value read is dispatched as a command and its reply written back. A clean end of
/// stream ends the session quietly; a protocol error is reported to the client and then
/// ends the session. If the client had registered as a replica it is deregistered.
pub async fn handle_client_connection(
    stream: TcpStream,
    id: ConnectionId,
    client_address: String,
    state: ServerState,
) {
    let (reader, writer) = stream.into_split();
    let mut reader = RespReader::new(reader);

    let session = Session {
        id,
        address: client_address,
        writer: shared_writer(writer),
    };

    loop {
        let input = match reader.read_value().await {
            Ok(Some(input)) => input,
            Ok(None) => {
                debug!(client = %session.address, "client disconnected");
                break;
            }
            Err(CommandReadError::RespParseError(e)) => {
                warn!(client = %session.address, error = %e, "closing connection after protocol error");
                let _ = thread_safe_write_to_stream(&session.writer, &[e.as_resp()]).await;
                break;
            }
            Err(e) => {
                warn!(client = %session.address, error = %e, "closing connection after read error");
                break;
            }
        };

        if let Err(e) = process_input(input, &state, &session).await {
            warn!(client = %session.address, error = %e, "error writing to stream");
            break;
        }
    }

    state.replication.registry().deregister(session.id).await;
}

async fn process_input(
    input: RespValue,
    state: &ServerState,
    session: &Session,
) -> tokio::io::Result<()> {
    let command_handler = match CommandHandler::new(input) {
        Ok(handler) => handler,
        Err(e) => return thread_safe_write_to_stream(&session.writer, &[e.as_resp()]).await,
    };

    match command_handler.handle_command(state, session).await {
        Ok(CommandResult::Response(response)) => {
            thread_safe_write_to_stream(&session.writer, &[response]).await
        }
        Ok(CommandResult::Sync(header)) => {
            let snapshot = RespValue::RawPayload(Bytes::from_static(EMPTY_SNAPSHOT));
            thread_safe_write_to_stream(&session.writer, &[header, snapshot]).await
        }
        Err(e) => thread_safe_write_to_stream(&session.writer, &[e.as_resp()]).await,
    }
}

/// Applies the write stream a master sends after the handshake. Nothing is written back.
pub async fn handle_master_connection<R>(
    mut reader: RespReader<R>,
    session: Session,
    state: ServerState,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let input = match reader.read_value().await {
            Ok(Some(input)) => input,
            Ok(None) => {
                info!(master = %session.address, "master closed the replication link");
                break;
            }
            Err(e) => {
                warn!(master = %session.address, error = %e, "replication link failed");
                break;
            }
        };

        apply_master_command(input, &state, &session).await;
    }
}

/// Applies one command received from the master without replying.
///
/// Replication commands coming from the master itself are ignored so the link never
/// registers as a replica of this server.
pub async fn apply_master_command(input: RespValue, state: &ServerState, session: &Session) {
    let command_handler = match CommandHandler::new(input) {
        Ok(handler) => handler,
        Err(e) => {
            warn!(master = %session.address, error = %e, "ignoring invalid command from master");
            return;
        }
    };

    if matches!(command_handler.name.as_str(), "REPLCONF" | "PSYNC") {
        debug!(command = %command_handler.name, "ignoring replication command from master");
        return;
    }

    match command_handler.handle_command(state, session).await {
        Ok(_) => debug!(command = %command_handler.name, "applied command from master"),
        Err(e) => {
            warn!(command = %command_handler.name, error = %e, "failed to apply command from master")
        }
    }
}

/// Writes the values back to back while holding the writer lock, so propagated writes
/// can never be interleaved with them.
async fn thread_safe_write_to_stream(
    writer: &SharedWriter,
    values: &[RespValue],
) -> tokio::io::Result<()> {
    let mut buffer = BytesMut::new();
    for value in values {
        value.encode_into(&mut buffer);
    }

    let mut writer_guard = writer.lock().await;
    writer_guard.write_all(&buffer).await?;
    writer_guard.flush().await?;

    Ok(())
}
