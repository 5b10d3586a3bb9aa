//! `scribe serve`: assemble shared state and run the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{info, warn};

use scribe_core::content::ContentGenerator;
use scribe_core::generator::gemini::{GeminiConfig, GeminiGenerator};
use scribe_core::generator::{TextGenerator, UnavailableGenerator};
use scribe_core::tiers::TierRegistry;

use crate::api::{AppState, build_router};
use crate::config::{GeneratorSettings, ScribeConfig};

pub async fn run_serve(resolved: &ScribeConfig, pool: PgPool, bind: &str, port: u16) -> Result<()> {
    let tiers = load_tiers(resolved)?;
    let generator = build_generator(&resolved.generator);
    info!(
        generator = generator.name(),
        tiers = tiers.list_plans().len(),
        "scribe state assembled"
    );

    let state = AppState {
        pool,
        tiers: Arc::new(tiers),
        content: ContentGenerator::new(generator),
        tokens: Arc::new(resolved.token_config.clone()),
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {bind}:{port}"))?;
    info!("scribe serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("scribe serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

/// The configured tier file, or the built-in table.
pub fn load_tiers(resolved: &ScribeConfig) -> Result<TierRegistry> {
    match &resolved.tiers_file {
        Some(path) => TierRegistry::from_file(path)
            .with_context(|| format!("failed to load tier table from {}", path.display())),
        None => Ok(TierRegistry::builtin()),
    }
}

/// The Gemini client when a usable key is configured, otherwise a generator
/// that always fails so every endpoint serves fallback content.
fn build_generator(settings: &GeneratorSettings) -> Arc<dyn TextGenerator> {
    let Some(api_key) = settings.api_key.as_deref() else {
        warn!("no Gemini API key configured; serving fallback content only");
        return Arc::new(UnavailableGenerator::new("Gemini API key not found"));
    };

    let config = GeminiConfig {
        model: settings.model.clone(),
        ..GeminiConfig::new(api_key)
    };
    match GeminiGenerator::new(config) {
        Ok(g) => {
            info!(model = g.model(), "Gemini client ready");
            Arc::new(g)
        }
        Err(e) => {
            warn!(error = %e, "Gemini client unavailable; serving fallback content only");
            Arc::new(UnavailableGenerator::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use scribe_core::token::TokenConfig;
    use scribe_db::config::DbConfig;

    use super::*;

    fn resolved_with_tiers(tiers_file: Option<PathBuf>) -> ScribeConfig {
        ScribeConfig {
            db_config: DbConfig::new(DbConfig::DEFAULT_URL),
            token_config: TokenConfig::new(b"serve-test".to_vec()),
            generator: GeneratorSettings {
                api_key: None,
                model: "gemini-test".to_string(),
            },
            tiers_file,
        }
    }

    #[test]
    fn missing_key_uses_unavailable_generator() {
        let g = build_generator(&GeneratorSettings {
            api_key: None,
            model: "gemini-test".to_string(),
        });
        assert_eq!(g.name(), "unavailable");
    }

    #[test]
    fn malformed_key_uses_unavailable_generator() {
        let g = build_generator(&GeneratorSettings {
            api_key: Some("short".to_string()),
            model: "gemini-test".to_string(),
        });
        assert_eq!(g.name(), "unavailable");
    }

    #[test]
    fn usable_key_builds_gemini_client() {
        let g = build_generator(&GeneratorSettings {
            api_key: Some("AIza-plausible-key-0123".to_string()),
            model: "gemini-test".to_string(),
        });
        assert_ne!(g.name(), "unavailable");
    }

    #[test]
    fn builtin_tiers_without_file() {
        let tiers = load_tiers(&resolved_with_tiers(None)).unwrap();
        assert_eq!(tiers.list_plans().len(), 3);
    }

    #[test]
    fn tiers_file_overrides_builtin() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tiers.toml");
        std::fs::write(
            &path,
            "default_tier = \"trial\"\n\n\
             [[tiers]]\ntier_id = \"trial\"\ndisplay_name = \"Trial\"\n\
             description = \"Try it out\"\napi_calls = 5\n",
        )
        .unwrap();

        let tiers = load_tiers(&resolved_with_tiers(Some(path))).unwrap();
        assert_eq!(tiers.default_tier().tier_id, "trial");
        assert_eq!(tiers.default_tier().api_calls, 5);
    }

    #[test]
    fn unreadable_tiers_file_is_an_error() {
        let err = load_tiers(&resolved_with_tiers(Some(PathBuf::from("/nonexistent/tiers.toml"))))
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to load tier table"));
    }
}
