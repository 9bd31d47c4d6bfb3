use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use clap::Parser;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    connection::handle_client_connection,
    handshake::run_replication_link,
    replication::{ReplicationIdentity, ReplicationManager, Role},
    state::ServerState,
};

pub const DEFAULT_PORT: u16 = 6379;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("Invalid --replicaof value: {0}")]
    InvalidReplicaOf(String),
    #[error("Missing master port for --replicaof")]
    MissingMasterPort,
}

/// Command line flags. Mirrors the `redis-server` flags this server understands.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Master to replicate from, as `<host> <port>` or `<host>` followed by the port.
    /// `*` runs as a master.
    #[arg(long)]
    replicaof: Option<String>,

    /// Master port when given as a separate argument after `--replicaof <host>`.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    master_port: Option<u16>,
}

#[derive(Debug, PartialEq)]
pub struct RedisServer {
    pub port: u16,
    pub role: Role,
}

impl RedisServer {
    /// Builds the server configuration from command line arguments, program name included.
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let cli = Cli::try_parse_from(command_line_args)
            .map_err(|e| CliError::InvalidArguments(e.to_string()))?;

        let role = parse_role(cli.replicaof.as_deref(), cli.master_port)?;

        Ok(RedisServer {
            port: cli.port,
            role,
        })
    }

    /// Binds `0.0.0.0:<port>` and serves until the process is stopped.
    pub async fn run(self) -> anyhow::Result<()> {
        let address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        self.run_with_listener(listener).await
    }

    /// Serves on an already bound listener. The listener's port is the one announced
    /// to the master.
    pub async fn run_with_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        let port = listener
            .local_addr()
            .context("failed to read listener address")?
            .port();

        let identity = ReplicationIdentity::generate();
        info!(
            port,
            role = self.role.as_string(),
            repl_id = %identity.repl_id,
            "starting server"
        );

        let replication = ReplicationManager::start(self.role.clone(), identity);
        let state = ServerState::new(port, replication);

        state.store.spawn_expiry_sweeper();

        if let Role::Replica {
            host,
            port: master_port,
        } = &self.role
        {
            tokio::spawn(run_replication_link(host.clone(), *master_port, state.clone()));
        }

        serve(listener, state).await
    }
}

fn parse_role(replicaof: Option<&str>, master_port: Option<u16>) -> Result<Role, CliError> {
    let replicaof = match replicaof.map(str::trim) {
        None | Some("*") => {
            return match master_port {
                Some(port) => Err(CliError::InvalidArguments(format!(
                    "unexpected argument '{}'",
                    port
                ))),
                None => Ok(Role::Master),
            };
        }
        Some(replicaof) => replicaof,
    };

    let tokens = replicaof.split_whitespace().collect::<Vec<_>>();

    match (tokens.as_slice(), master_port) {
        ([host], Some(port)) => Ok(Role::Replica {
            host: host.to_string(),
            port,
        }),
        ([_], None) => Err(CliError::MissingMasterPort),
        ([host, port], None) => {
            let port = port
                .parse::<u16>()
                .ok()
                .filter(|port| *port > 0)
                .ok_or_else(|| CliError::InvalidReplicaOf(replicaof.to_string()))?;

            Ok(Role::Replica {
                host: host.to_string(),
                port,
            })
        }
        _ => Err(CliError::InvalidReplicaOf(replicaof.to_string())),
    }
}

/// Accept loop. Every connection gets its own task and a unique id.
pub async fn serve(listener: TcpListener, state: ServerState) -> anyhow::Result<()> {
    let next_connection_id = AtomicU64::new(1);

    loop {
        let (stream, address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let id = next_connection_id.fetch_add(1, Ordering::Relaxed);
        info!(client = %address, id, "accepted new connection");

        tokio::spawn(handle_client_connection(
            stream,
            id,
            address.to_string(),
            state.clone(),
        ));
    }
}
