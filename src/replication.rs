//! Master-side replication: replica bookkeeping and write propagation.
//!
//! Connections that issue `REPLCONF` or `PSYNC` are registered in the
//! [`ReplicaRegistry`]. Write commands are queued with [`ReplicationManager::propagate`]
//! and a single worker task forwards them, in order, to every registered replica.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::resp::RespValue;

/// Number of write commands that may wait for the propagation worker.
pub const PROPAGATION_QUEUE_CAPACITY: usize = 1024;

/// A replica that does not accept a write within this time is dropped.
pub const REPLICA_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of an empty database, sent after `FULLRESYNC`.
pub const EMPTY_SNAPSHOT: &[u8] = &[
    0x52, 0x45, 0x44, 0x49, 0x53, 0x30, 0x30, 0x31, 0x31, 0xfa, 0x09, 0x72,
    0x65, 0x64, 0x69, 0x73, 0x2d, 0x76, 0x65, 0x72, 0x05, 0x37, 0x2e, 0x32,
    0x2e, 0x30, 0xfa, 0x0a, 0x72, 0x65, 0x64, 0x69, 0x73, 0x2d, 0x62, 0x69,
    0x74, 0x73, 0xc0, 0x40, 0xfa, 0x05, 0x63, 0x74, 0x69, 0x6d, 0x65, 0xc2,
    0x6d, 0x08, 0xbc, 0x65, 0xfa, 0x08, 0x75, 0x73, 0x65, 0x64, 0x2d, 0x6d,
    0x65, 0x6d, 0xc2, 0xb0, 0xc4, 0x10, 0x00, 0xfa, 0x08, 0x61, 0x6f, 0x66,
    0x2d, 0x62, 0x61, 0x73, 0x65, 0xc0, 0x00, 0xff, 0xf0, 0x6e, 0x3b, 0xfe,
    0xc0, 0xff, 0x5a, 0xa2,
];

/// Write half of a client connection, shared between its session and the propagation worker.
pub type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

pub type ConnectionId = u64;

pub fn shared_writer<W>(writer: W) -> SharedWriter
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    Arc::new(Mutex::new(Box::new(writer)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Master,
    Replica { host: String, port: u16 },
}

impl Role {
    pub fn as_string(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Replica { .. } => "slave",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationIdentity {
    pub repl_id: String,
    pub repl_offset: u64,
}

impl ReplicationIdentity {
    pub fn new(repl_id: impl Into<String>) -> Self {
        ReplicationIdentity {
            repl_id: repl_id.into(),
            repl_offset: 0,
        }
    }

    /// Generates a random 40 character hexadecimal replication id.
    pub fn generate() -> Self {
        const HEX: &[u8] = b"0123456789abcdef";

        let mut rng = rand::thread_rng();
        let repl_id = (0..40)
            .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
            .collect::<String>();

        Self::new(repl_id)
    }
}

#[derive(Clone)]
pub struct ReplicaHandle {
    pub id: ConnectionId,
    pub address: String,
    pub listening_port: Option<u16>,
    pub capabilities: Vec<String>,
    pub writer: SharedWriter,
}

impl fmt::Debug for ReplicaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("listening_port", &self.listening_port)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Settings a replica announces with `REPLCONF`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplicaAnnouncement {
    pub listening_port: Option<u16>,
    pub capabilities: Vec<String>,
}

/// Registered replica connections, keyed by connection id.
#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    replicas: RwLock<HashMap<ConnectionId, ReplicaHandle>>,
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection, or merges the announcement into an existing entry.
    pub async fn register(
        &self,
        id: ConnectionId,
        address: &str,
        writer: SharedWriter,
        announcement: ReplicaAnnouncement,
    ) {
        let mut replicas = self.replicas.write().await;

        let replica = replicas.entry(id).or_insert_with(|| {
            info!(replica = %address, "registered replica");
            ReplicaHandle {
                id,
                address: address.to_string(),
                listening_port: None,
                capabilities: Vec::new(),
                writer,
            }
        });

        if announcement.listening_port.is_some() {
            replica.listening_port = announcement.listening_port;
        }

        for capability in announcement.capabilities {
            if !replica.capabilities.contains(&capability) {
                replica.capabilities.push(capability);
            }
        }
    }

    pub async fn deregister(&self, id: ConnectionId) -> Option<ReplicaHandle> {
        let removed = self.replicas.write().await.remove(&id);

        if let Some(replica) = &removed {
            info!(replica = %replica.address, "deregistered replica");
        }

        removed
    }

    /// Copies the current replicas so fan-out never holds the registry lock while writing.
    pub async fn snapshot_for_fanout(&self) -> Vec<ReplicaHandle> {
        self.replicas.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: ConnectionId) -> Option<ReplicaHandle> {
        self.replicas.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.replicas.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Role, identity and replica fan-out of this server.
#[derive(Debug, Clone)]
pub struct ReplicationManager {
    role: Role,
    identity: ReplicationIdentity,
    registry: Arc<ReplicaRegistry>,
    propagation: mpsc::Sender<RespValue>,
}

impl ReplicationManager {
    /// Creates the manager and spawns its propagation worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(role: Role, identity: ReplicationIdentity) -> Self {
        let registry = Arc::new(ReplicaRegistry::new());
        let (propagation, receiver) = mpsc::channel(PROPAGATION_QUEUE_CAPACITY);

        tokio::spawn(run_propagation_worker(receiver, Arc::clone(&registry)));

        ReplicationManager {
            role,
            identity,
            registry,
            propagation,
        }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn identity(&self) -> &ReplicationIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &ReplicaRegistry {
        &self.registry
    }

    /// Queues a write command for every registered replica.
    ///
    /// Never waits: when no replica is registered the command is skipped, and when the
    /// queue is full the command is dropped with a warning.
    pub async fn propagate(&self, command: RespValue) {
        if self.registry.is_empty().await {
            return;
        }

        if let Err(e) = self.propagation.try_send(command) {
            warn!(error = %e, "dropping write command, propagation queue unavailable");
        }
    }
}

async fn run_propagation_worker(
    mut receiver: mpsc::Receiver<RespValue>,
    registry: Arc<ReplicaRegistry>,
) {
    while let Some(command) = receiver.recv().await {
        let frame = command.encode();

        for replica in registry.snapshot_for_fanout().await {
            let write = async {
                let mut writer = replica.writer.lock().await;
                writer.write_all(&frame).await?;
                writer.flush().await
            };

            match tokio::time::timeout(REPLICA_WRITE_TIMEOUT, write).await {
                Ok(Ok(())) => {
                    debug!(replica = %replica.address, bytes = frame.len(), "propagated write");
                }
                Ok(Err(e)) => {
                    warn!(replica = %replica.address, error = %e, "failed to propagate write");
                    registry.deregister(replica.id).await;
                }
                Err(_) => {
                    warn!(replica = %replica.address, "timed out propagating write");
                    registry.deregister(replica.id).await;
                }
            }
        }
    }
}
