use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use goat_notify::models::link::LinkToken;
use goat_notify::models::user::UserRole;
use goat_notify::persistence::token_repo::TokenRepo;
use goat_notify::persistence::{db, user_repo::UserRepo};

async fn setup() -> (Arc<db::Database>, TokenRepo, i64) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let user = UserRepo::new(Arc::clone(&db))
        .create("alice", None, UserRole::User)
        .await
        .expect("create user");
    (Arc::clone(&db), TokenRepo::new(db), user.id)
}

#[tokio::test]
async fn only_the_digest_is_stored() {
    let (db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let token = LinkToken::generate(user_id, now + Duration::minutes(10));
    repo.insert(&token).await.expect("insert");

    let stored: Vec<String> = sqlx::query_scalar("SELECT token_hash FROM link_token")
        .fetch_all(db.as_ref())
        .await
        .expect("select");
    assert_eq!(stored, vec![token.hash()]);
    assert_ne!(stored[0], token.token);
}

#[tokio::test]
async fn peek_does_not_consume() {
    let (_db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let token = LinkToken::generate(user_id, now + Duration::minutes(10));
    repo.insert(&token).await.expect("insert");

    assert_eq!(repo.peek(&token.token, now).await.expect("peek"), Some(user_id));
    assert_eq!(repo.peek(&token.token, now).await.expect("peek"), Some(user_id));
    assert_eq!(repo.peek("nope", now).await.expect("peek"), None);
}

#[tokio::test]
async fn take_is_single_use_and_respects_expiry() {
    let (db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let live = LinkToken::generate(user_id, now + Duration::minutes(10));
    let stale = LinkToken::generate(user_id, now);
    repo.insert(&live).await.expect("insert");
    repo.insert(&stale).await.expect("insert");

    let mut conn = db.acquire().await.expect("conn");
    assert_eq!(
        TokenRepo::take(&mut conn, &live.token, now).await.expect("take"),
        Some(user_id)
    );
    assert_eq!(
        TokenRepo::take(&mut conn, &live.token, now).await.expect("take"),
        None
    );
    assert_eq!(
        TokenRepo::take(&mut conn, &stale.token, now).await.expect("take"),
        None,
        "a token expiring exactly now is already dead"
    );
}

#[tokio::test]
async fn rolled_back_take_restores_token() {
    let (db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let token = LinkToken::generate(user_id, now + Duration::minutes(10));
    repo.insert(&token).await.expect("insert");

    let mut tx = db.begin().await.expect("begin");
    assert!(TokenRepo::take(&mut tx, &token.token, now)
        .await
        .expect("take")
        .is_some());
    tx.rollback().await.expect("rollback");

    assert_eq!(repo.peek(&token.token, now).await.expect("peek"), Some(user_id));
}

#[tokio::test]
async fn purge_removes_only_expired_tokens() {
    let (_db, repo, user_id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let live = LinkToken::generate(user_id, now + Duration::seconds(1));
    repo.insert(&live).await.expect("insert");
    repo.insert(&LinkToken::generate(user_id, now)).await.expect("insert");
    repo.insert(&LinkToken::generate(user_id, now - Duration::hours(1)))
        .await
        .expect("insert");

    assert_eq!(repo.purge_expired(now).await.expect("purge"), 2);
    assert_eq!(repo.peek(&live.token, now).await.expect("peek"), Some(user_id));
}
