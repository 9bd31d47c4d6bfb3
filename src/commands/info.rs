use bytes::Bytes;

use crate::{commands::CommandError, replication::ReplicationManager, resp::RespValue};

/// Handles the INFO command.
///
/// Only the replication section exists, so it is returned whatever section is asked for.
pub async fn info(
    replication: &ReplicationManager,
    arguments: Vec<Bytes>,
) -> Result<RespValue, CommandError> {
    if arguments.len() > 1 {
        return Err(CommandError::WrongNumberOfArguments("info"));
    }

    let identity = replication.identity();

    let lines = [
        format!("role:{}", replication.role().as_string()),
        format!("connected_slaves:{}", replication.registry().len().await),
        format!("master_replid:{}", identity.repl_id),
        format!("master_repl_offset:{}", identity.repl_offset),
    ];

    Ok(RespValue::bulk_string(lines.join("\r\n")))
}
