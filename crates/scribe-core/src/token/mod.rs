//! HMAC-signed bearer access tokens.
//!
//! Format: `scribe_at_<user_id>_<expires_unix>_<hmac_hex>`, where the
//! HMAC-SHA256 is computed over `<user_id>:<expires_unix>`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PREFIX: &str = "scribe_at_";

/// Environment variable holding the hex-encoded signing secret.
pub const TOKEN_SECRET_ENV: &str = "SCRIBE_TOKEN_SECRET";

/// Minutes an access token stays valid.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid expiry in token: {0}")]
    InvalidExpiry(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("token expired")]
    Expired,

    #[error("missing token secret")]
    MissingSecret,
}

/// Signing configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: Vec<u8>,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            ttl: Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        }
    }

    /// Build from a hex-encoded secret, as written by `scribe init`.
    pub fn from_hex(secret_hex: &str) -> Result<Self, TokenError> {
        if secret_hex.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let secret = hex::decode(secret_hex)
            .map_err(|e| TokenError::InvalidFormat(format!("token secret is not valid hex: {e}")))?;
        Ok(Self::new(secret))
    }

    /// Read the secret from `SCRIBE_TOKEN_SECRET`.
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex = std::env::var(TOKEN_SECRET_ENV).map_err(|_| TokenError::MissingSecret)?;
        Self::from_hex(&secret_hex)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued token and when it stops working.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a token for `user_id` expiring at `expires_at` (second precision).
pub fn generate_token(config: &TokenConfig, user_id: Uuid, expires_at: DateTime<Utc>) -> String {
    let expires = expires_at.timestamp();
    let message = format!("{user_id}:{expires}");
    let hmac_hex = hex::encode(compute_hmac(&config.secret, message.as_bytes()));
    format!("{TOKEN_PREFIX}{user_id}_{expires}_{hmac_hex}")
}

/// Issue a token valid for the configured TTL from `now`.
pub fn issue_access_token(config: &TokenConfig, user_id: Uuid, now: DateTime<Utc>) -> AccessToken {
    let expires_at = (now + config.ttl).trunc_subsecs(0);
    AccessToken {
        token: generate_token(config, user_id, expires_at),
        expires_at,
    }
}

/// Verify a token's signature and expiry at `now`.
pub fn validate_token(
    config: &TokenConfig,
    token: &str,
    now: DateTime<Utc>,
) -> Result<TokenClaims, TokenError> {
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        TokenError::InvalidFormat(format!("token must start with '{TOKEN_PREFIX}'"))
    })?;

    // A hyphenated UUID is 36 chars.
    let (user_id_str, after_id) = rest
        .split_at_checked(36)
        .ok_or_else(|| TokenError::InvalidFormat("token too short to contain a user ID".into()))?;
    let user_id =
        Uuid::parse_str(user_id_str).map_err(|e| TokenError::InvalidUserId(e.to_string()))?;

    let after_underscore = after_id
        .strip_prefix('_')
        .ok_or_else(|| TokenError::InvalidFormat("expected underscore after user ID".into()))?;
    let (expires_str, hmac_hex) = after_underscore.split_once('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore between expiry and hmac".into())
    })?;

    let expires: i64 = expires_str
        .parse()
        .map_err(|e: std::num::ParseIntError| TokenError::InvalidExpiry(e.to_string()))?;
    let expires_at = DateTime::<Utc>::from_timestamp(expires, 0)
        .ok_or_else(|| TokenError::InvalidExpiry(format!("{expires} is out of range")))?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    let message = format!("{user_id}:{expires}");
    verify_hmac_constant_time(&config.secret, message.as_bytes(), &provided_mac)?;

    if now >= expires_at {
        return Err(TokenError::Expired);
    }

    Ok(TokenClaims {
        user_id,
        expires_at,
    })
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    }
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), TokenError> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| TokenError::HmacMismatch)
}
