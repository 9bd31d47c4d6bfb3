use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        echo::echo,
        get::get,
        hash::{hget, hgetall, hset},
        info::info,
        ping::ping,
        replication::{psync, replconf},
        set::set,
    },
    resp::RespValue,
    state::{ServerState, Session},
};

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Response(RespValue),
    /// FULLRESYNC header. The connection follows it with the snapshot payload.
    Sync(RespValue),
}

/// A decoded client command: upper-cased name plus raw arguments.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<Bytes>,
}

impl CommandHandler {
    /// Builds a handler from a RESP array of bulk strings, e.g. `["set", "key", "value"]`.
    pub fn new(input: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = input else {
            return Err(CommandError::InvalidCommand);
        };

        let mut elements = elements.into_iter();

        let name = match elements.next() {
            Some(RespValue::BulkString(name)) => String::from_utf8_lossy(&name).to_uppercase(),
            _ => return Err(CommandError::InvalidCommand),
        };

        let arguments = elements
            .map(|element| match element {
                RespValue::BulkString(argument) => Ok(argument),
                _ => Err(CommandError::InvalidCommand),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { name, arguments })
    }

    /// Runs the command against the server state.
    ///
    /// Unknown commands reply with an empty simple string rather than an error, which is
    /// what existing clients of this server expect.
    pub async fn handle_command(
        &self,
        state: &ServerState,
        session: &Session,
    ) -> Result<CommandResult, CommandError> {
        let response = match self.name.as_str() {
            "PING" => ping(self.arguments.clone())?,
            "ECHO" => echo(self.arguments.clone()),
            "SET" => set(state, self.arguments.clone()).await?,
            "GET" => get(&state.store, self.arguments.clone()).await?,
            "HSET" => hset(&state.hashes, self.arguments.clone()).await?,
            "HGET" => hget(&state.hashes, self.arguments.clone()).await?,
            "HGETALL" => hgetall(&state.hashes, self.arguments.clone()).await?,
            "INFO" => info(&state.replication, self.arguments.clone()).await?,
            "REPLCONF" => replconf(&state.replication, session, self.arguments.clone()).await,
            "PSYNC" => return psync(&state.replication, session, self.arguments.clone()).await,
            _ => RespValue::simple_string(""),
        };

        Ok(CommandResult::Response(response))
    }
}
