use thiserror::Error;

use crate::resp::RespValue;

/// Errors returned to the client as a RESP error. The connection stays open.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("invalid command")]
    InvalidCommand,
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(&'static str),
    #[error("syntax error")]
    InvalidSetCommandArgument,
    #[error("invalid expire time in 'set' command")]
    InvalidSetCommandExpiration,
    #[error("PSYNC only supports full resynchronization ('PSYNC ? -1')")]
    InvalidPsyncArguments,
    #[error("PSYNC is not supported by a replica")]
    PsyncOnReplica,
}

impl CommandError {
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}
