//! Shared test utilities for scribe integration tests.
//!
//! Every test gets its own freshly migrated database inside one shared
//! PostgreSQL server:
//! - with **`SCRIBE_TEST_PG_URL`** set, that server is used directly;
//! - otherwise a container is started through testcontainers, once per test
//!   binary.
//!
//! Also provides seeding helpers for the rows most tests need.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use scribe_db::models::User;
use scribe_db::pool;
use scribe_db::queries::users::{self, NewUser};

/// Server URL plus the container handle that keeps it alive.
struct SharedPg {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("SCRIBE_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server root URL (no database name) of the shared PostgreSQL.
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    &shared.base_url
}

async fn maintenance_pool() -> PgPool {
    let maint_url = format!("{}/postgres", pg_url().await);
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&maint_url)
        .await
        .expect("failed to connect to maintenance database")
}

/// Create a temporary database with migrations applied.
///
/// Returns `(pool, db_name)`; pass `db_name` to [`drop_test_db`] when done.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("scribe_test_{}", Uuid::new_v4().simple());

    let maint_pool = maintenance_pool().await;
    maint_pool
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create temp database {db_name}: {e}"));
    maint_pool.close().await;

    let temp_url = format!("{}/{db_name}", pg_url().await);
    let temp_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&temp_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to temp database {db_name}: {e}"));

    pool::run_migrations(&temp_pool)
        .await
        .expect("migrations should succeed");

    (temp_pool, db_name)
}

/// Drop a temporary database, terminating any connections still open on it.
pub async fn drop_test_db(db_name: &str) {
    let maint_pool = maintenance_pool().await;

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) \
         FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint_pool.execute(terminate.as_str()).await;
    let _ = maint_pool
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    maint_pool.close().await;
}

/// Insert a user on the given tier with no password and the given quota
/// counters already in place.
pub async fn seed_user(
    pool: &PgPool,
    username: &str,
    tier: &str,
    monthly_api_limit: i32,
    api_limit_reset_at: Option<DateTime<Utc>>,
) -> User {
    users::insert_user(
        pool,
        &NewUser {
            username,
            email: None,
            hashed_password: None,
            full_name: None,
            is_superuser: false,
            subscription_tier: tier,
            monthly_api_limit,
            api_limit_reset_at,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("failed to seed user {username}: {e:#}"))
}

/// Overwrite a user's call counter and reset timestamp.
pub async fn set_quota(
    pool: &PgPool,
    user_id: Uuid,
    api_call_count: i32,
    api_limit_reset_at: Option<DateTime<Utc>>,
) -> User {
    let mut conn = pool.acquire().await.expect("failed to acquire connection");
    users::update_quota_state(&mut conn, user_id, api_call_count, api_limit_reset_at)
        .await
        .expect("failed to set quota state")
}
