//! PSYNC command implementation for Redis replication synchronization.
//!
//! Only full resynchronization is supported: the replica must send `PSYNC ? -1`
//! and receives the FULLRESYNC header followed by an empty snapshot.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    commands::{command_handler::CommandResult, CommandError},
    replication::{ReplicaAnnouncement, ReplicationManager, Role},
    resp::RespValue,
    state::Session,
};

/// Handles the Redis PSYNC command.
///
/// # Returns
///
/// * `Ok(CommandResult::Sync)` - Bulk string `FULLRESYNC <repl_id> <offset>`; the
///   connection writes the snapshot payload right after it
/// * `Err(CommandError::PsyncOnReplica)` - If this server is a replica
/// * `Err(CommandError::WrongNumberOfArguments)` - If not exactly 2 arguments
/// * `Err(CommandError::InvalidPsyncArguments)` - If the arguments are not `?` and `-1`
pub async fn psync(
    replication: &ReplicationManager,
    session: &Session,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    if replication.role() != &Role::Master {
        return Err(CommandError::PsyncOnReplica);
    }

    let Ok([repl_id, offset]) = <[Bytes; 2]>::try_from(arguments) else {
        return Err(CommandError::WrongNumberOfArguments("psync"));
    };

    if &repl_id[..] != b"?" || &offset[..] != b"-1" {
        return Err(CommandError::InvalidPsyncArguments);
    }

    replication
        .registry()
        .register(
            session.id,
            &session.address,
            Arc::clone(&session.writer),
            ReplicaAnnouncement::default(),
        )
        .await;

    let identity = replication.identity();

    Ok(CommandResult::Sync(RespValue::bulk_string(format!(
        "FULLRESYNC {} {}",
        identity.repl_id, identity.repl_offset
    ))))
}
