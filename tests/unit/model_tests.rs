//! Unit tests for domain models.

use chrono::{TimeZone, Utc};

use goat_notify::models::job::{Job, JobKind, JobPayload, JobStatus};
use goat_notify::models::link::{hash_token, LinkToken};
use goat_notify::models::task::{TaskStatus, TaskType};
use goat_notify::models::user::UserRole;

#[test]
fn task_type_names_parse_case_insensitively() {
    assert_eq!(TaskType::from_name("INBOX"), Some(TaskType::Inbox));
    assert_eq!(TaskType::from_name("Routine"), Some(TaskType::Routine));
    assert_eq!(TaskType::from_name(" calendar "), Some(TaskType::Calendar));
    assert_eq!(TaskType::from_name("chores"), None);
    assert!(TaskType::parse("bogus").is_err());
}

#[test]
fn task_status_round_trips_storage_name() {
    for status in [TaskStatus::Open, TaskStatus::Done, TaskStatus::Archived] {
        assert_eq!(TaskStatus::parse(status.as_str()).expect("parse"), status);
    }
}

#[test]
fn user_role_parses_case_insensitively() {
    assert_eq!("admin".parse::<UserRole>().expect("parse"), UserRole::Admin);
    assert_eq!("Trusted".parse::<UserRole>().expect("parse"), UserRole::Trusted);
    assert_eq!(UserRole::default(), UserRole::User);
    assert_eq!(UserRole::Admin.to_string(), "ADMIN");
}

#[test]
fn unknown_role_lists_available_roles() {
    let err = "overlord".parse::<UserRole>().expect_err("unknown role");
    let msg = err.to_string();
    assert!(msg.contains("overlord"));
    assert!(msg.contains("USER, ADMIN, TRUSTED"));
}

#[test]
fn job_payload_is_tagged_by_kind() {
    let payload = JobPayload::TaskList {
        chat_id: "123".into(),
        task_type: Some(TaskType::Current),
    };
    let json: serde_json::Value =
        serde_json::from_str(&payload.to_json().expect("encode")).expect("valid json");
    assert_eq!(json["kind"], "task_list");
    assert_eq!(json["task_type"], "CURRENT");
    assert_eq!(payload.kind(), JobKind::TaskList);

    let decoded = JobPayload::from_json(r#"{"kind":"send_message","chat_id":"1","text":"hi"}"#)
        .expect("decode");
    assert_eq!(decoded, JobPayload::send_message("1", "hi"));
}

#[test]
fn unknown_job_kind_is_rejected() {
    assert!(JobPayload::from_json(r#"{"kind":"launch_rockets"}"#).is_err());
}

#[test]
fn new_job_is_queued_and_due_now() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let job = Job::new(JobPayload::send_message("1", "x"), 3, now);

    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_attempts, 3);
    assert_eq!(job.run_at, now);
    assert_eq!(job.kind(), JobKind::SendMessage);
    assert_eq!(JobKind::SendMessage.as_str(), "send_message");
}

#[test]
fn link_tokens_are_unique_and_long() {
    let expires = Utc.with_ymd_and_hms(2024, 1, 1, 9, 10, 0).unwrap();
    let a = LinkToken::generate(1, expires);
    let b = LinkToken::generate(1, expires);

    assert_ne!(a.token, b.token);
    assert_eq!(a.token.len(), 64);
    assert!(a.token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn link_token_hash_is_sha256_hex_of_trimmed_token() {
    assert_eq!(
        hash_token("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(hash_token(" abc\n"), hash_token("abc"));

    let token = LinkToken::generate(1, Utc::now());
    assert_eq!(token.hash(), hash_token(&token.token));
}

#[test]
fn link_token_debug_redacts_secret() {
    let token = LinkToken::generate(7, Utc::now());
    let debug = format!("{token:?}");
    assert!(!debug.contains(&token.token));
    assert!(debug.contains("<redacted>"));
}
