//! HSET, HGET and HGETALL.

use bytes::Bytes;

use crate::{commands::command_error::CommandError, key_value_store::HashStore, resp::RespValue};

pub async fn hset(hashes: &HashStore, arguments: Vec<Bytes>) -> Result<RespValue, CommandError> {
    let Ok([hash, field, value]) = <[Bytes; 3]>::try_from(arguments) else {
        return Err(CommandError::WrongNumberOfArguments("hset"));
    };

    hashes.set(hash, field, value).await;

    Ok(RespValue::simple_string("OK"))
}

pub async fn hget(hashes: &HashStore, arguments: Vec<Bytes>) -> Result<RespValue, CommandError> {
    let Ok([hash, field]) = <[Bytes; 2]>::try_from(arguments) else {
        return Err(CommandError::WrongNumberOfArguments("hget"));
    };

    match hashes.get(&hash, &field).await {
        Some(value) => Ok(RespValue::BulkString(value)),
        None => Ok(RespValue::NullBulkString),
    }
}

/// Replies with a flat array of field, value pairs. The pair order is unspecified.
pub async fn hgetall(hashes: &HashStore, arguments: Vec<Bytes>) -> Result<RespValue, CommandError> {
    let Ok([hash]) = <[Bytes; 1]>::try_from(arguments) else {
        return Err(CommandError::WrongNumberOfArguments("hgetall"));
    };

    let elements = hashes
        .get_all(&hash)
        .await
        .into_iter()
        .flat_map(|(field, value)| [RespValue::BulkString(field), RespValue::BulkString(value)])
        .collect();

    Ok(RespValue::Array(elements))
}
