use bytes::Bytes;

use crate::resp::RespValue;

/// Handles the Redis ECHO command.
///
/// Returns the single argument as a bulk string. Any other number of arguments yields an
/// empty simple string instead of an error, matching the behavior clients rely on.
///
/// # Examples
///
/// ```ignore
/// // ECHO "hello world"
/// let result = echo(vec![Bytes::from("hello world")]);
/// // Returns: RespValue::BulkString("hello world")
/// ```
pub fn echo(arguments: Vec<Bytes>) -> RespValue {
    match <[Bytes; 1]>::try_from(arguments) {
        Ok([message]) => RespValue::BulkString(message),
        Err(_) => RespValue::simple_string(""),
    }
}
