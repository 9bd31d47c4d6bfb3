use bytes::Bytes;
use tokio::time::Duration;

use crate::{commands::command_error::CommandError, resp::RespValue, state::ServerState};

/// Represents the parsed arguments for SET command
#[derive(Debug, PartialEq)]
pub struct SetArguments {
    /// The key name to store the value under
    key: Bytes,
    /// The value to be stored under the given key
    value: Bytes,
    /// Time to live of the key value pair
    expire: Option<Duration>,
}

impl SetArguments {
    /// Parses command arguments into a SetArguments structure.
    ///
    /// # Arguments
    ///
    /// * `arguments` - A vector of the command arguments:
    ///   - Format 1: `[key, value]` - For permanent storage
    ///   - Format 2: `[key, value, "PX", milliseconds]` - For expiring storage
    ///
    /// # Returns
    ///
    /// * `Ok(SetArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::WrongNumberOfArguments)` - If fewer than 2 arguments are given
    /// * `Err(CommandError::InvalidSetCommandArgument)` - If an option other than "PX" is given
    /// * `Err(CommandError::InvalidSetCommandExpiration)` - If the milliseconds are missing,
    ///   not a number or not positive
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // SET with expiration (expires in 1000ms)
    /// let result = SetArguments::parse(vec![
    ///     Bytes::from("mykey"),
    ///     Bytes::from("hello"),
    ///     Bytes::from("px"),
    ///     Bytes::from("1000"),
    /// ]);
    /// // Returns: Ok(SetArguments { key: "mykey", value: "hello", expire: Some(1000ms) })
    /// ```
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments("set"));
        }

        let mut arguments = arguments.into_iter();
        let key = arguments.next().unwrap_or_default();
        let value = arguments.next().unwrap_or_default();
        let mut expire = None;

        while let Some(option) = arguments.next() {
            if !option.eq_ignore_ascii_case(b"px") {
                return Err(CommandError::InvalidSetCommandArgument);
            }

            let milliseconds = arguments
                .next()
                .and_then(|ms| std::str::from_utf8(&ms).ok()?.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .ok_or(CommandError::InvalidSetCommandExpiration)?;

            expire = Some(Duration::from_millis(milliseconds));
        }

        Ok(Self { key, value, expire })
    }

    /// The command forwarded to replicas. The expiration is not part of it.
    fn replication_command(&self) -> RespValue {
        RespValue::Array(vec![
            RespValue::bulk_string("SET"),
            RespValue::BulkString(self.key.clone()),
            RespValue::BulkString(self.value.clone()),
        ])
    }
}

/// Handles the Redis SET command.
///
/// Stores a key-value pair with optional expiration and, when replicas are
/// registered, queues `SET key value` for propagation.
///
/// # Returns
///
/// * `Ok(RespValue)` - An "OK" simple string on success
/// * `Err(CommandError)` - If the arguments cannot be parsed
pub async fn set(state: &ServerState, arguments: Vec<Bytes>) -> Result<RespValue, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;
    let replication_command = set_arguments.replication_command();

    state
        .store
        .set(set_arguments.key, set_arguments.value, set_arguments.expire)
        .await;

    state.replication.propagate(replication_command).await;

    Ok(RespValue::simple_string("OK"))
}
