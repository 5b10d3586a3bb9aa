//! Operator CLI handlers for `scribe user` subcommands and `scribe plans`.
//!
//! Implements:
//! - `scribe user create <username>`        -- create an account (optionally admin)
//! - `scribe user list`                     -- list accounts with quota state
//! - `scribe user set-tier <id> <tier>`     -- move a user to another tier
//! - `scribe user set-active <id> --active` -- enable or disable an account
//! - `scribe plans`                         -- print the tier table

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use scribe_core::accounts::{self, AccountOptions, RegisterRequest};
use scribe_core::tiers::TierRegistry;
use scribe_db::models::User;

use crate::UserCommands;

/// Dispatch a `UserCommands` variant to the appropriate handler.
pub async fn run_user_command(
    command: UserCommands,
    pool: &PgPool,
    tiers: &TierRegistry,
) -> Result<()> {
    match command {
        UserCommands::Create {
            username,
            password,
            email,
            full_name,
            tier,
            superuser,
        } => {
            let req = RegisterRequest {
                username,
                password,
                email,
                full_name,
            };
            let options = AccountOptions {
                is_superuser: superuser,
                tier,
            };
            cmd_create(pool, tiers, &req, &options).await
        }
        UserCommands::List { skip, limit } => cmd_list(pool, skip, limit).await,
        UserCommands::SetTier { user_id, tier } => cmd_set_tier(pool, tiers, &user_id, &tier).await,
        UserCommands::SetActive { user_id, active } => cmd_set_active(pool, &user_id, active).await,
    }
}

fn parse_user_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid user ID: {raw}"))
}

async fn cmd_create(
    pool: &PgPool,
    tiers: &TierRegistry,
    req: &RegisterRequest,
    options: &AccountOptions,
) -> Result<()> {
    let user = accounts::create_account(pool, tiers, req, options).await?;
    println!("Created user {} ({})", user.username, user.id);
    println!("  tier:      {}", user.subscription_tier);
    println!("  limit:     {} calls per period", user.monthly_api_limit);
    if user.is_superuser {
        println!("  superuser: yes");
    }
    Ok(())
}

async fn cmd_list(pool: &PgPool, skip: i64, limit: i64) -> Result<()> {
    let users = accounts::list(pool, skip, limit).await?;
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }
    println!("{}", format_user_table(&users));
    Ok(())
}

async fn cmd_set_tier(pool: &PgPool, tiers: &TierRegistry, raw_id: &str, tier: &str) -> Result<()> {
    let id = parse_user_id(raw_id)?;
    let user = accounts::change_tier(pool, tiers, id, tier).await?;
    println!(
        "User {} moved to {} ({} calls per period, usage reset).",
        user.username, user.subscription_tier, user.monthly_api_limit
    );
    Ok(())
}

async fn cmd_set_active(pool: &PgPool, raw_id: &str, active: bool) -> Result<()> {
    let id = parse_user_id(raw_id)?;
    let user = accounts::set_active(pool, id, active).await?;
    let state = if user.is_active { "active" } else { "inactive" };
    println!("User {} is now {state}.", user.username);
    Ok(())
}

/// Print the tier table, marking the default.
pub fn cmd_plans(tiers: &TierRegistry) {
    let default_id = tiers.default_tier().tier_id.clone();
    for plan in tiers.list_plans() {
        let marker = if plan.tier_id == default_id { " (default)" } else { "" };
        println!(
            "{:<10} {:>7} calls  {}{marker}",
            plan.tier_id, plan.api_calls, plan.display_name
        );
        println!("           {}", plan.description);
    }
}

fn format_user_table(users: &[User]) -> String {
    let mut lines = vec![format!(
        "{:<36}  {:<20}  {:<8}  {:>11}  {:<6}  {:<5}",
        "ID", "USERNAME", "TIER", "USAGE", "ACTIVE", "ADMIN"
    )];
    for u in users {
        lines.push(format!(
            "{:<36}  {:<20}  {:<8}  {:>11}  {:<6}  {:<5}",
            u.id,
            u.username,
            u.subscription_tier,
            format!("{}/{}", u.api_call_count, u.monthly_api_limit),
            if u.is_active { "yes" } else { "no" },
            if u.is_superuser { "yes" } else { "no" },
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use scribe_test_utils::{create_test_db, drop_test_db};

    use super::*;

    fn sample_user(username: &str, active: bool) -> User {
        User {
            id: Uuid::nil(),
            username: username.to_string(),
            email: None,
            full_name: None,
            hashed_password: None,
            is_active: active,
            is_superuser: false,
            subscription_tier: "free".to_string(),
            api_call_count: 7,
            monthly_api_limit: 100,
            api_limit_reset_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn user_table_shows_usage_and_flags() {
        let table = format_user_table(&[sample_user("alice", true), sample_user("bob", false)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("alice"));
        assert!(lines[1].contains("7/100"));
        assert!(lines[2].contains("bob"));
        assert!(lines[2].contains("no"));
    }

    #[test]
    fn bad_user_id_is_rejected() {
        let err = parse_user_id("not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("invalid user ID: not-a-uuid"));
    }

    #[tokio::test]
    async fn create_then_change_tier_and_disable() {
        let (pool, db_name) = create_test_db().await;
        let tiers = TierRegistry::builtin();

        run_user_command(
            UserCommands::Create {
                username: "operator".to_string(),
                password: "long-enough-pw".to_string(),
                email: None,
                full_name: None,
                tier: Some("basic".to_string()),
                superuser: true,
            },
            &pool,
            &tiers,
        )
        .await
        .unwrap();

        let user = accounts::list(&pool, 0, 10).await.unwrap().remove(0);
        assert!(user.is_superuser);
        assert_eq!(user.subscription_tier, "basic");

        run_user_command(
            UserCommands::SetTier {
                user_id: user.id.to_string(),
                tier: "premium".to_string(),
            },
            &pool,
            &tiers,
        )
        .await
        .unwrap();

        run_user_command(
            UserCommands::SetActive {
                user_id: user.id.to_string(),
                active: false,
            },
            &pool,
            &tiers,
        )
        .await
        .unwrap();

        let user = accounts::list(&pool, 0, 10).await.unwrap().remove(0);
        assert_eq!(user.subscription_tier, "premium");
        assert_eq!(user.monthly_api_limit, 10000);
        assert!(!user.is_active);

        let err = run_user_command(
            UserCommands::SetTier {
                user_id: user.id.to_string(),
                tier: "gold".to_string(),
            },
            &pool,
            &tiers,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("Invalid subscription tier: gold"));

        pool.close().await;
        drop_test_db(&db_name).await;
    }
}
