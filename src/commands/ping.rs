use bytes::Bytes;

use crate::{commands::command_error::CommandError, resp::RespValue};

/// Handles the PING command.
///
/// Without arguments replies `PONG`; with one argument replies with that argument.
pub fn ping(arguments: Vec<Bytes>) -> Result<RespValue, CommandError> {
    match arguments.len() {
        0 => Ok(RespValue::simple_string("PONG")),
        1 => Ok(RespValue::BulkString(arguments[0].clone())),
        _ => Err(CommandError::WrongNumberOfArguments("ping")),
    }
}
