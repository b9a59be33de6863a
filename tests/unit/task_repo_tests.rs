use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use goat_notify::models::task::{NewTask, TaskStatus, TaskType};
use goat_notify::models::user::UserRole;
use goat_notify::persistence::task_repo::TaskRepo;
use goat_notify::persistence::{db, user_repo::UserRepo};

async fn setup() -> (Arc<db::Database>, TaskRepo, i64) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let user = UserRepo::new(Arc::clone(&db))
        .create("alice", None, UserRole::User)
        .await
        .expect("create user");
    (Arc::clone(&db), TaskRepo::new(db), user.id)
}

#[tokio::test]
async fn create_task_defaults_to_open_and_unnotified() {
    let (_db, repo, user_id) = setup().await;
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

    let task = repo
        .create(&NewTask {
            task_type: TaskType::Calendar,
            planned_start: Some(start),
            ..NewTask::new(user_id, "Dentist")
        })
        .await
        .expect("create");

    assert_eq!(task.title, "Dentist");
    assert_eq!(task.status, TaskStatus::Open);
    assert_eq!(task.task_type, TaskType::Calendar);
    assert_eq!(task.planned_start, Some(start));
    assert!(!task.planned_start_notified);

    let fetched = repo.get_by_id(task.id).await.expect("get").expect("exists");
    assert_eq!(fetched, task);
    assert!(repo.get_by_id(task.id + 1).await.expect("get").is_none());
}

#[tokio::test]
async fn list_open_filters_by_type() {
    let (_db, repo, user_id) = setup().await;
    repo.create(&NewTask::new(user_id, "a")).await.expect("create");
    repo.create(&NewTask {
        task_type: TaskType::Routine,
        ..NewTask::new(user_id, "b")
    })
    .await
    .expect("create");

    let all = repo.list_open_for_user(user_id, None).await.expect("list");
    assert_eq!(all.len(), 2);

    let routine = repo
        .list_open_for_user(user_id, Some(TaskType::Routine))
        .await
        .expect("list");
    assert_eq!(routine.len(), 1);
    assert_eq!(routine[0].title, "b");

    let other_user = repo.list_open_for_user(user_id + 1, None).await.expect("list");
    assert!(other_user.is_empty());
}

#[tokio::test]
async fn suspend_moves_task_to_someday() {
    let (_db, repo, user_id) = setup().await;
    let task = repo.create(&NewTask::new(user_id, "later")).await.expect("create");
    let due = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

    let suspended = repo
        .suspend_until(task.id, due)
        .await
        .expect("suspend")
        .expect("exists");
    assert_eq!(suspended.task_type, TaskType::Someday);
    assert_eq!(suspended.suspend_due, Some(due));
}

#[tokio::test]
async fn resume_suspended_only_touches_due_tasks() {
    let (db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let due = repo.create(&NewTask::new(user_id, "due")).await.expect("create");
    let later = repo.create(&NewTask::new(user_id, "later")).await.expect("create");
    repo.suspend_until(due.id, now).await.expect("suspend");
    repo.suspend_until(later.id, now + Duration::seconds(1))
        .await
        .expect("suspend");

    let mut conn = db.acquire().await.expect("conn");
    let resumed = TaskRepo::resume_suspended(&mut conn, now).await.expect("resume");
    drop(conn);
    assert_eq!(resumed, vec![due.id]);

    let due = repo.get_by_id(due.id).await.expect("get").expect("exists");
    assert_eq!(due.task_type, TaskType::Current);
    assert!(due.suspend_due.is_none());
    let later = repo.get_by_id(later.id).await.expect("get").expect("exists");
    assert_eq!(later.task_type, TaskType::Someday);
}

#[tokio::test]
async fn due_reminders_carry_linked_chat() {
    let (db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let task = repo
        .create(&NewTask {
            notify_at: Some(now - Duration::minutes(1)),
            ..NewTask::new(user_id, "call mom")
        })
        .await
        .expect("create");

    let mut conn = db.acquire().await.expect("conn");
    let unlinked = TaskRepo::due_reminders(&mut conn, now).await.expect("query");
    assert_eq!(unlinked.len(), 1);
    assert_eq!(unlinked[0].id, task.id);
    assert!(unlinked[0].chat_id.is_none());

    UserRepo::link_chat(&mut conn, user_id, "555", None)
        .await
        .expect("link");
    let linked = TaskRepo::due_reminders(&mut conn, now).await.expect("query");
    assert_eq!(linked[0].chat_id.as_deref(), Some("555"));

    TaskRepo::clear_notify_at(&mut conn, task.id).await.expect("clear");
    let cleared = TaskRepo::due_reminders(&mut conn, now).await.expect("query");
    assert!(cleared.is_empty());
}

#[tokio::test]
async fn changing_planned_start_rearms_notice() {
    let (db, repo, user_id) = setup().await;
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    let task = repo
        .create(&NewTask {
            planned_start: Some(start),
            ..NewTask::new(user_id, "standup")
        })
        .await
        .expect("create");

    let mut conn = db.acquire().await.expect("conn");
    TaskRepo::mark_start_notified(&mut conn, task.id)
        .await
        .expect("mark");
    drop(conn);

    let same = repo
        .set_planned_window(task.id, Some(start), None)
        .await
        .expect("update")
        .expect("exists");
    assert!(same.planned_start_notified);

    let moved = repo
        .set_planned_window(task.id, Some(start + Duration::hours(1)), None)
        .await
        .expect("update")
        .expect("exists");
    assert!(!moved.planned_start_notified);
    assert_eq!(moved.planned_start, Some(start + Duration::hours(1)));
}

#[tokio::test]
async fn set_notify_at_arms_and_disarms() {
    let (_db, repo, user_id) = setup().await;
    let task = repo.create(&NewTask::new(user_id, "ping")).await.expect("create");
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    let armed = repo
        .set_notify_at(task.id, Some(at))
        .await
        .expect("arm")
        .expect("exists");
    assert_eq!(armed.notify_at, Some(at));

    let disarmed = repo
        .set_notify_at(task.id, None)
        .await
        .expect("disarm")
        .expect("exists");
    assert!(disarmed.notify_at.is_none());

    assert!(repo.set_notify_at(9999, Some(at)).await.expect("update").is_none());
}
