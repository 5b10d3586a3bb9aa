mod api;
mod config;
mod serve_cmd;
mod user_cmds;

use clap::{Parser, Subcommand};

use scribe_db::pool;

use config::ScribeConfig;

#[derive(Parser)]
#[command(name = "scribe", about = "SEO and marketing content generation service")]
struct Cli {
    /// Database URL (overrides SCRIBE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a scribe config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/scribe")]
        db_url: String,
        /// Gemini API key to store in the config file
        #[arg(long)]
        gemini_api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the scribe database (requires config file or env vars)
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Show the subscription tiers
    Plans,
    /// User account management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an account
    Create {
        /// Login name (3-50 characters)
        username: String,
        /// Password (at least 8 characters)
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        /// Starting tier (defaults to the registry default)
        #[arg(long)]
        tier: Option<String>,
        /// Grant admin rights
        #[arg(long)]
        superuser: bool,
    },
    /// List accounts
    List {
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Move a user to another tier (resets usage)
    SetTier {
        /// User ID
        user_id: String,
        /// Tier ID (e.g. basic)
        tier: String,
    },
    /// Enable or disable an account
    SetActive {
        /// User ID
        user_id: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
}

/// Execute the `scribe init` command: write config file.
fn cmd_init(db_url: &str, gemini_api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let token_secret = config::generate_token_secret();
    let has_key = gemini_api_key.is_some();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            token_secret: token_secret.clone(),
        },
        generator: config::GeneratorSection {
            api_key: gemini_api_key,
            model: None,
        },
        server: None,
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  auth.token_secret = {}...{}", &token_secret[..8], &token_secret[56..]);
    if !has_key {
        println!("  generator.api_key not set; set GEMINI_API_KEY or content will fall back");
    }
    println!();
    println!("Next: run `scribe db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `scribe db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = ScribeConfig::resolve(cli_db_url)?;

    println!("Initializing scribe database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("scribe db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            gemini_api_key,
            force,
        } => {
            cmd_init(&db_url, gemini_api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = ScribeConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = serve_cmd::run_serve(&resolved, db_pool.clone(), &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::Plans => {
            let resolved = ScribeConfig::resolve(cli.database_url.as_deref())?;
            user_cmds::cmd_plans(&serve_cmd::load_tiers(&resolved)?);
        }
        Commands::User { command } => {
            let resolved = ScribeConfig::resolve(cli.database_url.as_deref())?;
            let tiers = serve_cmd::load_tiers(&resolved)?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = user_cmds::run_user_command(command, &db_pool, &tiers).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["scribe", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { bind, port } => {
                assert_eq!(bind, "127.0.0.1");
                assert_eq!(port, 8000);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn set_active_takes_explicit_bool() {
        let cli = Cli::try_parse_from([
            "scribe",
            "--database-url",
            "postgresql://h/db",
            "user",
            "set-active",
            "00000000-0000-0000-0000-000000000000",
            "--active",
            "false",
        ])
        .unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("postgresql://h/db"));
        match cli.command {
            Commands::User {
                command: UserCommands::SetActive { active, .. },
            } => assert!(!active),
            _ => panic!("expected user set-active"),
        }
    }

    #[test]
    fn user_create_requires_password() {
        assert!(Cli::try_parse_from(["scribe", "user", "create", "alice"]).is_err());
    }
}
