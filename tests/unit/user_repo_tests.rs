use std::sync::Arc;

use goat_notify::models::user::UserRole;
use goat_notify::persistence::{db, user_repo::UserRepo};
use goat_notify::AppError;

async fn repo() -> (Arc<db::Database>, UserRepo) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    (Arc::clone(&db), UserRepo::new(db))
}

#[tokio::test]
async fn in_memory_connect_creates_all_tables() {
    let pool = db::connect_memory().await.expect("in-memory connect");

    for table in ["user", "task", "link_token", "job"] {
        let query = format!("SELECT COUNT(*) AS cnt FROM {table}");
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("table '{table}' should be queryable: {e}"));
        assert_eq!(row.0, 0, "table '{table}' should start empty");
    }
}

#[tokio::test]
async fn create_and_lookup_user() {
    let (_db, repo) = repo().await;

    let created = repo
        .create("alice", Some("$argon2$x"), UserRole::User)
        .await
        .expect("create user");
    assert_eq!(created.username, "alice");
    assert_eq!(created.role, UserRole::User);
    assert!(!created.is_linked());

    let by_id = repo.get_by_id(created.id).await.expect("get").expect("exists");
    assert_eq!(by_id, created);
    let by_name = repo
        .get_by_username("alice")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(by_name.id, created.id);
    assert!(repo.get_by_username("bob").await.expect("get").is_none());
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let (_db, repo) = repo().await;
    repo.create("alice", None, UserRole::User).await.expect("first");

    let err = repo
        .create("alice", None, UserRole::Admin)
        .await
        .expect_err("duplicate");
    assert!(matches!(err, AppError::Db(_)));
}

#[tokio::test]
async fn link_and_unlink_chat() {
    let (db, repo) = repo().await;
    let user = repo.create("alice", None, UserRole::User).await.expect("create");

    let mut conn = db.acquire().await.expect("conn");
    let linked = UserRepo::link_chat(&mut conn, user.id, "555", Some("alice_tg"))
        .await
        .expect("link");
    drop(conn);
    assert_eq!(linked.telegram_chat_id.as_deref(), Some("555"));
    assert_eq!(linked.telegram_username.as_deref(), Some("alice_tg"));

    let holder = repo.get_by_chat_id("555").await.expect("get").expect("linked");
    assert_eq!(holder.id, user.id);

    let unlinked = repo.unlink_chat(user.id).await.expect("unlink");
    assert!(unlinked.telegram_chat_id.is_none());
    assert!(unlinked.telegram_username.is_none());
    assert!(repo.get_by_chat_id("555").await.expect("get").is_none());
}

#[tokio::test]
async fn chat_id_is_unique_across_users() {
    let (db, repo) = repo().await;
    let alice = repo.create("alice", None, UserRole::User).await.expect("create");
    let bob = repo.create("bob", None, UserRole::User).await.expect("create");

    let mut conn = db.acquire().await.expect("conn");
    UserRepo::link_chat(&mut conn, alice.id, "555", None)
        .await
        .expect("link alice");

    let holder = UserRepo::find_other_holder(&mut conn, "555", bob.id)
        .await
        .expect("query");
    assert_eq!(holder, Some(alice.id));
    let own = UserRepo::find_other_holder(&mut conn, "555", alice.id)
        .await
        .expect("query");
    assert_eq!(own, None);

    let err = UserRepo::link_chat(&mut conn, bob.id, "555", None)
        .await
        .expect_err("unique violation");
    assert!(matches!(err, AppError::AlreadyLinked(_)));
}

#[tokio::test]
async fn link_chat_for_missing_user_is_not_found() {
    let (db, _repo) = repo().await;
    let mut conn = db.acquire().await.expect("conn");

    let err = UserRepo::link_chat(&mut conn, 404, "555", None)
        .await
        .expect_err("missing user");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn set_role_updates_named_user() {
    let (_db, repo) = repo().await;
    repo.create("alice", None, UserRole::User).await.expect("create");

    let updated = repo.set_role("alice", UserRole::Trusted).await.expect("set role");
    assert_eq!(updated.role, UserRole::Trusted);

    let err = repo
        .set_role("nobody", UserRole::Admin)
        .await
        .expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn serialized_user_omits_password_hash() {
    let (_db, repo) = repo().await;
    let user = repo
        .create("alice", Some("secret-hash"), UserRole::Admin)
        .await
        .expect("create");

    let json = serde_json::to_value(&user).expect("serialize");
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["role"], "ADMIN");
}
