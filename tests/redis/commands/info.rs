use replikv::{commands::CommandError, resp::RespValue};

use crate::test_utils::{TestEnv, TestUtils, TEST_REPL_ID};

fn expected_info(role: &str, connected_slaves: usize) -> RespValue {
    TestUtils::expected_bulk_string(&format!(
        "role:{}\r\nconnected_slaves:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:0",
        role, connected_slaves, TEST_REPL_ID
    ))
}

#[tokio::test]
async fn test_handle_info_command_on_master() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_immediate_success_response(
        TestUtils::info_command("replication"),
        expected_info("master", 0),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_on_replica() {
    let mut env = TestEnv::new_replica_server();

    env.exec_command_immediate_success_response(
        TestUtils::info_command("replication"),
        expected_info("slave", 0),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_ignores_section() {
    let mut env = TestEnv::new_master_server();

    for command in [RespValue::command(["INFO"]), TestUtils::info_command("server")] {
        env.exec_command_immediate_success_response(command, expected_info("master", 0))
            .await;
    }
}

#[tokio::test]
async fn test_handle_info_command_counts_replicas() {
    let mut env = TestEnv::new_master_server();
    let (replica, _replica_stream) = env.new_session(&TestUtils::client_address(6380));

    assert!(env
        .exec_command(
            TestUtils::replconf_command(&["listening-port", "6380"]),
            &replica
        )
        .await
        .is_ok());

    env.exec_command_immediate_success_response(
        TestUtils::info_command("replication"),
        expected_info("master", 1),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_with_too_many_arguments() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_immediate_error_response(
        RespValue::command(["INFO", "replication", "server"]),
        CommandError::WrongNumberOfArguments("info"),
    )
    .await;
}
