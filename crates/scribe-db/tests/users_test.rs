//! Tests for the `users` query module.

use chrono::{Duration, Utc};
use uuid::Uuid;

use scribe_db::queries::users::{self, NewUser, ProfileUpdate};
use scribe_db::queries::is_unique_violation;
use scribe_test_utils::{create_test_db, drop_test_db, seed_user};

fn new_user<'a>(username: &'a str, email: Option<&'a str>) -> NewUser<'a> {
    NewUser {
        username,
        email,
        hashed_password: Some("$2b$12$hash"),
        full_name: Some("Test Writer"),
        is_superuser: false,
        subscription_tier: "free",
        monthly_api_limit: 100,
        api_limit_reset_at: None,
    }
}

#[tokio::test]
async fn insert_and_fetch_user() {
    let (pool, db_name) = create_test_db().await;

    let user = users::insert_user(&pool, &new_user("alice", Some("alice@example.com")))
        .await
        .expect("insert should succeed");
    assert_eq!(user.username, "alice");
    assert!(user.is_active);
    assert!(!user.is_superuser);
    assert_eq!(user.subscription_tier, "free");
    assert_eq!(user.api_call_count, 0);
    assert_eq!(user.monthly_api_limit, 100);

    let by_id = users::get_user(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, "alice");

    let by_name = users::get_user_by_username(&pool, "alice").await.unwrap();
    assert_eq!(by_name.map(|u| u.id), Some(user.id));

    let by_email = users::get_user_by_email(&pool, "alice@example.com")
        .await
        .unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id));

    assert!(users::get_user(&pool, Uuid::new_v4()).await.unwrap().is_none());
    assert!(
        users::get_user_by_username(&pool, "nobody")
            .await
            .unwrap()
            .is_none()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_username_is_unique_violation() {
    let (pool, db_name) = create_test_db().await;

    users::insert_user(&pool, &new_user("bob", None)).await.unwrap();
    let err = users::insert_user(&pool, &new_user("bob", None))
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err), "got: {err:#}");

    users::insert_user(&pool, &new_user("carol", Some("shared@example.com")))
        .await
        .unwrap();
    let err = users::insert_user(&pool, &new_user("dave", Some("shared@example.com")))
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err), "got: {err:#}");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn short_username_violates_check() {
    let (pool, db_name) = create_test_db().await;

    let err = users::insert_user(&pool, &new_user("ab", None))
        .await
        .unwrap_err();
    assert!(!is_unique_violation(&err));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_users_paginates_in_creation_order() {
    let (pool, db_name) = create_test_db().await;

    for name in ["user_a", "user_b", "user_c"] {
        seed_user(&pool, name, "free", 100, None).await;
    }

    let first_two = users::list_users(&pool, 0, 2).await.unwrap();
    let names: Vec<&str> = first_two.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["user_a", "user_b"]);

    let rest = users::list_users(&pool, 2, 10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].username, "user_c");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn lock_and_update_quota_state_in_transaction() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool, "quota_user", "free", 100, None).await;
    let reset_at = Utc::now() + Duration::days(30);

    let mut tx = pool.begin().await.unwrap();
    let locked = users::lock_user(&mut *tx, user.id).await.unwrap().unwrap();
    assert_eq!(locked.api_call_count, 0);
    let updated = users::update_quota_state(&mut *tx, user.id, 1, Some(reset_at))
        .await
        .unwrap();
    assert_eq!(updated.api_call_count, 1);
    tx.commit().await.unwrap();

    let stored = users::get_user(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(stored.api_call_count, 1);
    let stored_reset = stored.api_limit_reset_at.expect("reset_at should be set");
    assert!((stored_reset - reset_at).num_milliseconds().abs() < 5);

    let mut tx = pool.begin().await.unwrap();
    assert!(users::lock_user(&mut *tx, Uuid::new_v4()).await.unwrap().is_none());
    assert!(
        users::update_quota_state(&mut *tx, Uuid::new_v4(), 1, None)
            .await
            .is_err()
    );
    tx.rollback().await.unwrap();

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_subscription_resets_counter() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool, "upgrader", "free", 100, None).await;
    scribe_test_utils::set_quota(&pool, user.id, 42, None).await;

    let reset_at = Utc::now() + Duration::days(30);
    let updated = users::update_subscription(&pool, user.id, "premium", 10_000, reset_at)
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(updated.subscription_tier, "premium");
    assert_eq!(updated.monthly_api_limit, 10_000);
    assert_eq!(updated.api_call_count, 0);
    assert!(updated.api_limit_reset_at.is_some());

    let missing = users::update_subscription(&pool, Uuid::new_v4(), "basic", 1000, reset_at)
        .await
        .unwrap();
    assert!(missing.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn set_active_status_and_profile_update() {
    let (pool, db_name) = create_test_db().await;
    let user = users::insert_user(&pool, &new_user("editor", Some("old@example.com")))
        .await
        .unwrap();

    let inactive = users::set_active_status(&pool, user.id, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!inactive.is_active);
    assert!(
        users::set_active_status(&pool, Uuid::new_v4(), true)
            .await
            .unwrap()
            .is_none()
    );

    let updated = users::update_profile(
        &pool,
        user.id,
        &ProfileUpdate {
            email: Some("new@example.com"),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.email.as_deref(), Some("new@example.com"));
    // Untouched fields keep their values.
    assert_eq!(updated.full_name.as_deref(), Some("Test Writer"));
    assert_eq!(updated.hashed_password.as_deref(), Some("$2b$12$hash"));

    pool.close().await;
    drop_test_db(&db_name).await;
}
