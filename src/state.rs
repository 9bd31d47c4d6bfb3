//! Shared server state handed to every connection.

use crate::key_value_store::{HashStore, KeyValueStore};
use crate::replication::{ConnectionId, ReplicationManager, SharedWriter};

/// Process-wide state. Cloning is shallow: every clone refers to the same stores.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Port this server listens on, announced to the master when running as a replica.
    pub port: u16,
    pub store: KeyValueStore,
    pub hashes: HashStore,
    pub replication: ReplicationManager,
}

impl ServerState {
    pub fn new(port: u16, replication: ReplicationManager) -> Self {
        ServerState {
            port,
            store: KeyValueStore::new(),
            hashes: HashStore::new(),
            replication,
        }
    }
}

/// Per-connection context passed to command handlers.
#[derive(Clone)]
pub struct Session {
    pub id: ConnectionId,
    pub address: String,
    pub writer: SharedWriter,
}
