use goat_notify::models::task::TaskType;
use goat_notify::telegram::commands::{BotCommand, UnknownTaskType};

#[test]
fn start_with_and_without_token() {
    assert_eq!(
        BotCommand::parse("/start abc123"),
        Ok(Some(BotCommand::Start {
            token: Some("abc123".into())
        }))
    );
    assert_eq!(
        BotCommand::parse("/start"),
        Ok(Some(BotCommand::Start { token: None }))
    );
}

#[test]
fn bot_suffix_is_ignored() {
    assert_eq!(
        BotCommand::parse("/start@goat_bot tok"),
        Ok(Some(BotCommand::Start {
            token: Some("tok".into())
        }))
    );
    assert_eq!(
        BotCommand::parse("/tasks_inbox@goat_bot"),
        Ok(Some(BotCommand::Tasks {
            task_type: Some(TaskType::Inbox)
        }))
    );
}

#[test]
fn tasks_argument_forms() {
    assert_eq!(
        BotCommand::parse("/tasks"),
        Ok(Some(BotCommand::Tasks { task_type: None }))
    );
    assert_eq!(
        BotCommand::parse("/tasks ALL"),
        Ok(Some(BotCommand::Tasks { task_type: None }))
    );
    assert_eq!(
        BotCommand::parse("/tasks routine"),
        Ok(Some(BotCommand::Tasks {
            task_type: Some(TaskType::Routine)
        }))
    );
    assert_eq!(
        BotCommand::parse("/tasks_all"),
        Ok(Some(BotCommand::Tasks { task_type: None }))
    );
}

#[test]
fn unknown_task_type_is_an_error() {
    assert_eq!(
        BotCommand::parse("/tasks chores"),
        Err(UnknownTaskType("chores".into()))
    );
    assert_eq!(
        BotCommand::parse("/tasks_chores"),
        Err(UnknownTaskType("chores".into()))
    );
}

#[test]
fn plain_text_and_other_commands_are_ignored() {
    assert_eq!(BotCommand::parse("hello there"), Ok(None));
    assert_eq!(BotCommand::parse(""), Ok(None));
    assert_eq!(BotCommand::parse("/help"), Ok(None));
}
