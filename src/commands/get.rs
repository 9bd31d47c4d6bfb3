use bytes::Bytes;

use crate::{
    commands::command_error::CommandError, key_value_store::KeyValueStore, resp::RespValue,
};

/// Handles the Redis GET command.
///
/// Retrieves the value associated with a key from the key-value store. Keys whose
/// expiration has passed are treated as missing.
///
/// # Arguments
///
/// * `store` - The shared key-value store
/// * `arguments` - A vector containing exactly one element (the key to retrieve)
///
/// # Returns
///
/// * `Ok(RespValue::BulkString)` - The stored value
/// * `Ok(RespValue::NullBulkString)` - If the key doesn't exist or has expired
/// * `Err(CommandError::WrongNumberOfArguments)` - If the number of arguments is not exactly 1
pub async fn get(store: &KeyValueStore, arguments: Vec<Bytes>) -> Result<RespValue, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments("get"));
    }

    match store.get(&arguments[0]).await {
        Some(value) => Ok(RespValue::BulkString(value)),
        None => Ok(RespValue::NullBulkString),
    }
}
