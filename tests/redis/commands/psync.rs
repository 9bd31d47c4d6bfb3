use replikv::{
    commands::{CommandError, CommandResult},
    resp::RespValue,
};

use crate::test_utils::{TestEnv, TestUtils, TEST_REPL_ID};

#[tokio::test]
async fn test_handle_psync_command() {
    let mut env = TestEnv::new_master_server();
    let (replica, _replica_stream) = env.new_session(&TestUtils::client_address(6380));

    let result = env
        .exec_command(TestUtils::psync_command("?", "-1"), &replica)
        .await;

    assert_eq!(
        result,
        Ok(CommandResult::Sync(TestUtils::expected_bulk_string(
            &format!("FULLRESYNC {} 0", TEST_REPL_ID)
        )))
    );
    assert!(env
        .state
        .replication
        .registry()
        .get(replica.id)
        .await
        .is_some());
}

#[tokio::test]
async fn test_handle_psync_command_invalid() {
    let mut env = TestEnv::new_master_server();

    let test_cases = vec![
        (
            RespValue::command(["PSYNC", "?"]),
            CommandError::WrongNumberOfArguments("psync"),
        ),
        (
            TestUtils::psync_command(TEST_REPL_ID, "-1"),
            CommandError::InvalidPsyncArguments,
        ),
        (
            TestUtils::psync_command("?", "100"),
            CommandError::InvalidPsyncArguments,
        ),
    ];

    for (command, expected_error) in test_cases {
        env.exec_command_immediate_error_response(command, expected_error)
            .await;
    }

    assert!(env.state.replication.registry().is_empty().await);
}

#[tokio::test]
async fn test_handle_psync_command_on_replica() {
    let mut env = TestEnv::new_replica_server();

    env.exec_command_immediate_error_response(
        TestUtils::psync_command("?", "-1"),
        CommandError::PsyncOnReplica,
    )
    .await;
}
