use std::time::Duration;

use bytes::Bytes;
use replikv::{
    commands::{CommandError, CommandHandler, CommandResult},
    input::{write_value, RespReader},
    replication::{shared_writer, ReplicationIdentity, ReplicationManager, Role},
    resp::RespValue,
    server::RedisServer,
    state::{ServerState, Session},
};
use tokio::{
    io::{duplex, AsyncWriteExt, DuplexStream},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    time::timeout,
};

pub const TEST_REPL_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Test utilities for simplifying Redis command tests
pub struct TestUtils;

/// Server state plus a source of sessions, without any sockets involved
pub struct TestEnv {
    pub state: ServerState,
    next_connection_id: u64,
}

impl TestEnv {
    /// Create a new test environment with a master server
    pub fn new_master_server() -> Self {
        Self::with_role(Role::Master)
    }

    /// Create a new test environment with a replica server
    pub fn new_replica_server() -> Self {
        Self::with_role(Role::Replica {
            host: "127.0.0.1".to_string(),
            port: 6379,
        })
    }

    fn with_role(role: Role) -> Self {
        let replication = ReplicationManager::start(role, ReplicationIdentity::new(TEST_REPL_ID));

        Self {
            state: ServerState::new(6379, replication),
            next_connection_id: 1,
        }
    }

    /// Create a session whose replies and propagated writes can be read from the returned reader
    pub fn new_session(&mut self, client_address: &str) -> (Session, RespReader<DuplexStream>) {
        let (server_side, client_side) = duplex(64 * 1024);

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        let session = Session {
            id,
            address: client_address.to_string(),
            writer: shared_writer(server_side),
        };

        (session, RespReader::new(client_side))
    }

    /// Execute a command on behalf of the session and return the result
    pub async fn exec_command(
        &self,
        command: RespValue,
        session: &Session,
    ) -> Result<CommandResult, CommandError> {
        let command_handler = CommandHandler::new(command)?;

        command_handler.handle_command(&self.state, session).await
    }

    /// Execute a command on a fresh session and assert it succeeds with the expected reply
    pub async fn exec_command_immediate_success_response(
        &mut self,
        command: RespValue,
        expected_response: RespValue,
    ) {
        let (session, _client) = self.new_session(&TestUtils::client_address(41844));

        let result = self.exec_command(command, &session).await;
        assert_eq!(result, Ok(CommandResult::Response(expected_response)));
    }

    /// Execute a command on a fresh session and assert it fails
    pub async fn exec_command_immediate_error_response(
        &mut self,
        command: RespValue,
        expected_error: CommandError,
    ) {
        let (session, _client) = self.new_session(&TestUtils::client_address(41844));

        let result = self.exec_command(command, &session).await;
        assert_eq!(result, Err(expected_error));
    }
}

/// A client connected to a running server over TCP
pub struct TestClient {
    reader: RespReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (reader, writer) = stream.into_split();

        Self {
            reader: RespReader::new(reader),
            writer,
        }
    }

    pub async fn send(&mut self, command: RespValue) {
        write_value(&mut self.writer, &command).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next value from the server, or `None` once the server closed the connection
    pub async fn read(&mut self) -> Option<RespValue> {
        timeout(READ_TIMEOUT, self.reader.read_value())
            .await
            .expect("timed out waiting for the server")
            .unwrap()
    }

    pub async fn read_raw_payload(&mut self) -> Bytes {
        timeout(READ_TIMEOUT, self.reader.read_raw_payload())
            .await
            .expect("timed out waiting for the snapshot")
            .unwrap()
    }

    /// Send a command and wait for its reply
    pub async fn request(&mut self, command: RespValue) -> RespValue {
        self.send(command).await;
        self.read().await.expect("connection closed by the server")
    }
}

impl TestUtils {
    /// Start a server on an ephemeral port and return that port
    pub async fn spawn_server(args: &[&str]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = RedisServer::new(Self::server_args(args)).unwrap();
        tokio::spawn(server.run_with_listener(listener));

        port
    }

    pub fn server_args(args: &[&str]) -> Vec<String> {
        std::iter::once("replikv")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    /// Poll `command` on the client until it replies `expected` or the read timeout passes
    pub async fn wait_for_response(client: &mut TestClient, command: RespValue, expected: RespValue) {
        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;

        loop {
            let response = client.request(command.clone()).await;
            if response == expected {
                return;
            }

            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {:?}, last reply was {:?}",
                expected,
                response
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll INFO on a master until `count` replicas are registered
    pub async fn wait_for_connected_replicas(client: &mut TestClient, count: usize) {
        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
        let expected = format!("connected_slaves:{}", count);

        loop {
            let info = client.request(Self::info_command("replication")).await;
            if info.as_text().unwrap_or_default().contains(&expected) {
                return;
            }

            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {}, last reply was {:?}",
                expected,
                info
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn client_address(port: u16) -> String {
        format!("127.0.0.1:{}", port)
    }

    pub fn ping_command() -> RespValue {
        RespValue::command(["PING"])
    }

    pub fn echo_command(message: &str) -> RespValue {
        RespValue::command(["ECHO", message])
    }

    pub fn set_command(key: &str, value: &str) -> RespValue {
        RespValue::command(["SET", key, value])
    }

    pub fn set_command_with_expiration(key: &str, value: &str, milliseconds: u64) -> RespValue {
        let milliseconds = milliseconds.to_string();
        RespValue::command(["SET", key, value, "PX", milliseconds.as_str()])
    }

    pub fn get_command(key: &str) -> RespValue {
        RespValue::command(["GET", key])
    }

    pub fn hset_command(hash: &str, field: &str, value: &str) -> RespValue {
        RespValue::command(["HSET", hash, field, value])
    }

    pub fn hget_command(hash: &str, field: &str) -> RespValue {
        RespValue::command(["HGET", hash, field])
    }

    pub fn hgetall_command(hash: &str) -> RespValue {
        RespValue::command(["HGETALL", hash])
    }

    pub fn info_command(section: &str) -> RespValue {
        RespValue::command(["INFO", section])
    }

    pub fn replconf_command(arguments: &[&str]) -> RespValue {
        RespValue::command(std::iter::once("REPLCONF").chain(arguments.iter().copied()))
    }

    pub fn psync_command(repl_id: &str, offset: &str) -> RespValue {
        RespValue::command(["PSYNC", repl_id, offset])
    }

    pub fn expected_simple_string(value: &str) -> RespValue {
        RespValue::simple_string(value)
    }

    pub fn expected_bulk_string(value: &str) -> RespValue {
        RespValue::BulkString(Bytes::copy_from_slice(value.as_bytes()))
    }

    pub fn expected_null() -> RespValue {
        RespValue::NullBulkString
    }
}
