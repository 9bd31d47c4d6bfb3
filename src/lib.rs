//! An in-memory Redis-compatible key-value server.
//!
//! Supported commands:
//!
//! - Strings with optional millisecond expiry (SET, GET)
//! - Hashes (HSET, HGET, HGETALL)
//! - Server commands (PING, ECHO, INFO)
//! - Master-replica replication (REPLCONF, PSYNC and write propagation)
//!
//! Clients speak the Redis Serialization Protocol (RESP). Every connection is served by
//! its own Tokio task.

pub mod commands;
pub mod connection;
pub mod handshake;
pub mod input;
pub mod key_value_store;
pub mod replication;
pub mod resp;
pub mod server;
pub mod state;
