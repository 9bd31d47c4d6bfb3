use std::collections::HashSet;

use replikv::{
    commands::{CommandError, CommandResult},
    resp::RespValue,
};

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_hset_and_hget_commands() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_immediate_success_response(
        TestUtils::hset_command("fruits", "grape", "purple"),
        TestUtils::expected_simple_string("OK"),
    )
    .await;

    env.exec_command_immediate_success_response(
        TestUtils::hget_command("fruits", "grape"),
        TestUtils::expected_bulk_string("purple"),
    )
    .await;

    env.exec_command_immediate_success_response(
        TestUtils::hget_command("fruits", "banana"),
        TestUtils::expected_null(),
    )
    .await;

    env.exec_command_immediate_success_response(
        TestUtils::hget_command("vegetables", "carrot"),
        TestUtils::expected_null(),
    )
    .await;
}

#[tokio::test]
async fn test_handle_hgetall_command() {
    let mut env = TestEnv::new_master_server();

    for (field, value) in [("grape", "purple"), ("banana", "yellow"), ("grape", "green")] {
        env.exec_command_immediate_success_response(
            TestUtils::hset_command("fruits", field, value),
            TestUtils::expected_simple_string("OK"),
        )
        .await;
    }

    let (session, _client) = env.new_session(&TestUtils::client_address(41844));
    let result = env
        .exec_command(TestUtils::hgetall_command("fruits"), &session)
        .await;

    let Ok(CommandResult::Response(RespValue::Array(elements))) = result else {
        panic!("Expected an array response");
    };

    let pairs = elements
        .chunks(2)
        .map(|pair| (pair[0].as_text().unwrap(), pair[1].as_text().unwrap()))
        .collect::<HashSet<_>>();

    let expected = [("grape", "green"), ("banana", "yellow")]
        .into_iter()
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .collect::<HashSet<_>>();

    assert_eq!(elements.len(), 4);
    assert_eq!(pairs, expected);
}

#[tokio::test]
async fn test_handle_hgetall_command_for_missing_hash() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_immediate_success_response(
        TestUtils::hgetall_command("missing"),
        RespValue::Array(vec![]),
    )
    .await;
}

#[tokio::test]
async fn test_handle_hash_commands_with_wrong_number_of_arguments() {
    let mut env = TestEnv::new_master_server();

    let test_cases = vec![
        (
            RespValue::command(["HSET", "fruits", "grape"]),
            CommandError::WrongNumberOfArguments("hset"),
        ),
        (
            RespValue::command(["HGET", "fruits"]),
            CommandError::WrongNumberOfArguments("hget"),
        ),
        (
            RespValue::command(["HGETALL"]),
            CommandError::WrongNumberOfArguments("hgetall"),
        ),
    ];

    for (command, expected_error) in test_cases {
        env.exec_command_immediate_error_response(command, expected_error)
            .await;
    }
}
