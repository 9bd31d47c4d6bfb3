//! REPLCONF command implementation for Redis replication configuration.
//!
//! A replica sends REPLCONF during the handshake to announce its listening port and
//! capabilities. Any connection issuing REPLCONF is registered as a replica, so it
//! starts receiving propagated writes.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::{
    replication::{ReplicaAnnouncement, ReplicationManager},
    resp::RespValue,
    state::Session,
};

/// Represents the parsed arguments for the REPLCONF command.
///
/// Arguments come in `<option> <value>` pairs. Only `listening-port` and `capa` are
/// recorded; unknown options and malformed values are ignored.
#[derive(Debug, PartialEq)]
pub struct ReplconfArguments {
    pub announcement: ReplicaAnnouncement,
}

impl ReplconfArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Self {
        let mut announcement = ReplicaAnnouncement::default();

        for pair in arguments.chunks(2) {
            let [option, value] = pair else {
                debug!("ignoring REPLCONF option without a value");
                continue;
            };

            let value = String::from_utf8_lossy(value);

            match option.to_ascii_lowercase().as_slice() {
                b"listening-port" => match value.parse::<u16>() {
                    Ok(port) => announcement.listening_port = Some(port),
                    Err(_) => debug!(port = %value, "ignoring invalid REPLCONF listening-port"),
                },
                b"capa" => announcement.capabilities.push(value.into_owned()),
                other => {
                    debug!(option = %String::from_utf8_lossy(other), "ignoring REPLCONF option")
                }
            }
        }

        ReplconfArguments { announcement }
    }
}

/// Handles the Redis REPLCONF command.
///
/// Registers the calling connection as a replica (idempotent per connection),
/// records what it announced and returns "OK".
pub async fn replconf(
    replication: &ReplicationManager,
    session: &Session,
    arguments: Vec<Bytes>,
) -> RespValue {
    let replconf_arguments = ReplconfArguments::parse(arguments);

    replication
        .registry()
        .register(
            session.id,
            &session.address,
            Arc::clone(&session.writer),
            replconf_arguments.announcement,
        )
        .await;

    RespValue::simple_string("OK")
}
