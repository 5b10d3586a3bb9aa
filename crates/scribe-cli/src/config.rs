//! Configuration file management for scribe.
//!
//! Provides a TOML-based config file at `~/.config/scribe/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use scribe_core::generator::gemini::DEFAULT_MODEL;
use scribe_core::token::{TOKEN_SECRET_ENV, TokenConfig};
use scribe_db::config::DbConfig;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL_ENV: &str = "SCRIBE_GEMINI_MODEL";
pub const TIERS_FILE_ENV: &str = "SCRIBE_TIERS_FILE";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded token secret (64 hex chars = 32 bytes).
    pub token_secret: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    /// Tier table to load instead of the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers_file: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// `$XDG_CONFIG_HOME/scribe` or `~/.config/scribe`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("scribe");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("scribe")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file holds secrets, so it is made owner-only (0600) on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// 32 random bytes, hex-encoded (64 chars).
pub fn generate_token_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Model client settings after resolution. A missing key is not an error
/// here; the server starts and serves fallback content.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub api_key: Option<String>,
    pub model: String,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ScribeConfig {
    pub db_config: DbConfig,
    pub token_config: TokenConfig,
    pub generator: GeneratorSettings,
    pub tiers_file: Option<PathBuf>,
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ScribeConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `SCRIBE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Token secret: `SCRIBE_TOKEN_SECRET` > `auth.token_secret` > error
    /// - API key: `GEMINI_API_KEY` > `generator.api_key` > none
    /// - Model: `SCRIBE_GEMINI_MODEL` > `generator.model` > `gemini-1.5-flash-latest`
    /// - Tiers file: `SCRIBE_TIERS_FILE` > `server.tiers_file` > built-in table
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Some(url) = env_non_empty(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let token_config = if let Some(secret_hex) = env_non_empty(TOKEN_SECRET_ENV) {
            TokenConfig::from_hex(&secret_hex)
                .context("SCRIBE_TOKEN_SECRET env var is not valid hex")?
        } else if let Some(ref cfg) = file_config {
            TokenConfig::from_hex(&cfg.auth.token_secret)
                .context("invalid hex in config file token_secret")?
        } else {
            bail!(
                "token secret not found; set SCRIBE_TOKEN_SECRET or run `scribe init` to create a config file"
            );
        };

        let file_generator = file_config.as_ref().map(|c| &c.generator);
        let api_key = env_non_empty(GEMINI_API_KEY_ENV)
            .or_else(|| file_generator.and_then(|g| g.api_key.clone()));
        let model = env_non_empty(GEMINI_MODEL_ENV)
            .or_else(|| file_generator.and_then(|g| g.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let tiers_file = env_non_empty(TIERS_FILE_ENV).map(PathBuf::from).or_else(|| {
            file_config
                .as_ref()
                .and_then(|c| c.server.as_ref())
                .and_then(|s| s.tiers_file.clone())
        });

        Ok(Self {
            db_config,
            token_config,
            generator: GeneratorSettings { api_key, model },
            tiers_file,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55";

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point config lookup at an empty temp dir for the guard's lifetime.
    struct IsolatedConfigDir {
        _tmp: tempfile::TempDir,
        orig_xdg: Option<String>,
    }

    impl IsolatedConfigDir {
        fn new() -> Self {
            let tmp = tempfile::TempDir::new().unwrap();
            let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
            unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
            Self {
                _tmp: tmp,
                orig_xdg,
            }
        }

        fn write(&self, contents: &str) {
            let dir = config_dir();
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("config.toml"), contents).unwrap();
        }
    }

    impl Drop for IsolatedConfigDir {
        fn drop(&mut self) {
            match self.orig_xdg.take() {
                Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
                None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
            }
        }
    }

    fn clear_scribe_env() {
        for var in [
            DbConfig::ENV_VAR,
            TOKEN_SECRET_ENV,
            GEMINI_API_KEY_ENV,
            GEMINI_MODEL_ENV,
            TIERS_FILE_ENV,
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn generate_token_secret_is_64_hex_chars() {
        let secret = generate_token_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_token_secret());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_writes_owner_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let _dir = IsolatedConfigDir::new();

        let cfg = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            auth: AuthSection {
                token_secret: SECRET.to_string(),
            },
            generator: GeneratorSection {
                api_key: Some("AIza-test-key-123".to_string()),
                model: None,
            },
            server: None,
        };
        save_config(&cfg).unwrap();

        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);

        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, cfg.database.url);
        assert_eq!(loaded.auth.token_secret, SECRET);
        assert_eq!(loaded.generator.api_key.as_deref(), Some("AIza-test-key-123"));
        assert!(loaded.server.is_none());
    }

    #[test]
    fn minimal_file_parses_without_optional_sections() {
        let cfg: ConfigFile = toml::from_str(&format!(
            "[database]\nurl = \"postgresql://h/db\"\n[auth]\ntoken_secret = \"{SECRET}\"\n"
        ))
        .unwrap();
        assert!(cfg.generator.api_key.is_none());
        assert!(cfg.server.is_none());
    }

    #[test]
    fn cli_flag_beats_env_and_file() {
        let _lock = lock_env();
        let dir = IsolatedConfigDir::new();
        clear_scribe_env();
        dir.write(&format!(
            "[database]\nurl = \"postgresql://file:5432/filedb\"\n[auth]\ntoken_secret = \"{SECRET}\"\n"
        ));
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };

        let config = ScribeConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        let config = ScribeConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");

        unsafe { std::env::remove_var(DbConfig::ENV_VAR) };
        let config = ScribeConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://file:5432/filedb");
    }

    #[test]
    fn generator_and_tiers_settings_resolve() {
        let _lock = lock_env();
        let dir = IsolatedConfigDir::new();
        clear_scribe_env();
        dir.write(&format!(
            "[database]\nurl = \"postgresql://h/db\"\n\
             [auth]\ntoken_secret = \"{SECRET}\"\n\
             [generator]\napi_key = \"file-key-0123456\"\nmodel = \"gemini-pro\"\n\
             [server]\ntiers_file = \"/etc/scribe/tiers.toml\"\n"
        ));

        let config = ScribeConfig::resolve(None).unwrap();
        assert_eq!(config.generator.api_key.as_deref(), Some("file-key-0123456"));
        assert_eq!(config.generator.model, "gemini-pro");
        assert_eq!(config.tiers_file, Some(PathBuf::from("/etc/scribe/tiers.toml")));

        unsafe { std::env::set_var(GEMINI_API_KEY_ENV, "env-key-0123456") };
        unsafe { std::env::set_var(GEMINI_MODEL_ENV, "gemini-env") };
        let config = ScribeConfig::resolve(None).unwrap();
        assert_eq!(config.generator.api_key.as_deref(), Some("env-key-0123456"));
        assert_eq!(config.generator.model, "gemini-env");

        clear_scribe_env();
    }

    #[test]
    fn defaults_when_only_secret_is_set() {
        let _lock = lock_env();
        let _dir = IsolatedConfigDir::new();
        clear_scribe_env();
        unsafe { std::env::set_var(TOKEN_SECRET_ENV, SECRET) };

        let config = ScribeConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert!(config.generator.api_key.is_none());
        assert_eq!(config.generator.model, DEFAULT_MODEL);
        assert!(config.tiers_file.is_none());

        clear_scribe_env();
    }

    #[test]
    fn missing_token_secret_is_an_error() {
        let _lock = lock_env();
        let _dir = IsolatedConfigDir::new();
        clear_scribe_env();

        let msg = ScribeConfig::resolve(None).unwrap_err().to_string();
        assert!(msg.contains("token secret not found"), "unexpected error: {msg}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        assert!(config_path().ends_with("scribe/config.toml"));
    }
}
